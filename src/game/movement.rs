//! Movement and Pushout
//!
//! Applies one input's displacement, then pushes the circle out of every
//! player-blocking tile it overlaps. Overlaps are resolved one tile at a
//! time in sampling order, each against the position left by the previous
//! one. Client predictors run the same sequence, so the order matters.

use crate::core::geometry::{circle_rect_overlap, circle_triangle_overlap, Circle};
use crate::core::vec2::Vec2;
use crate::game::config::GameConfig;
use crate::game::input::PlayerInput;
use crate::game::map::{Map, TileShape, COLLIDE_PLAYER};

/// Penetration of a circle into one tile shape.
#[inline]
fn shape_overlap(circle: Circle, shape: TileShape) -> Option<Vec2> {
    match shape {
        TileShape::Square(rect) => circle_rect_overlap(circle, rect),
        TileShape::Triangle(points) => circle_triangle_overlap(circle, points),
    }
}

/// Push a circle at `pos` out of the player-blocking tiles around it.
pub fn constrain(map: &Map, pos: Vec2, radius: f64) -> Vec2 {
    let tile_size = map.tile_size();
    let mut pos = pos;
    for tile in map.sample_tiles(pos, radius, COLLIDE_PLAYER) {
        let Some(shape) = tile.shape(tile_size) else {
            continue;
        };
        if let Some(overlap) = shape_overlap(Circle::new(pos, radius), shape) {
            pos = pos - overlap;
        }
    }
    pos
}

/// Whether a circle at `pos` overlaps any player-blocking tile.
pub fn overlaps_solid(map: &Map, pos: Vec2, radius: f64) -> bool {
    let tile_size = map.tile_size();
    map.sample_tiles(pos, radius, COLLIDE_PLAYER)
        .iter()
        .filter_map(|tile| tile.shape(tile_size))
        .any(|shape| shape_overlap(Circle::new(pos, radius), shape).is_some())
}

/// Position after one tick of `input` starting from `pos`.
#[inline]
pub fn step(map: &Map, pos: Vec2, input: &PlayerInput, config: &GameConfig) -> Vec2 {
    constrain(map, pos + input.displacement(config.player_speed), config.player_radius)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::{MapCell, TileTable, TileType};
    use proptest::prelude::*;

    const TS: f64 = 32.0;
    const R: f64 = 16.0;

    /// Open 10x8 room with a triangle at (4,4).
    fn room() -> Map {
        let mut cells = vec![vec![MapCell::from(TileType::Floor); 10]; 8];
        for (r, row) in cells.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                if r == 0 || r == 7 || c == 0 || c == 9 {
                    *cell = TileType::Wall.into();
                }
            }
        }
        cells[1][1] = TileType::GreenSpawn.into();
        cells[1][2] = TileType::GreenJail.into();
        cells[1][8] = TileType::RedSpawn.into();
        cells[1][7] = TileType::RedJail.into();
        cells[4][4] = MapCell::new(TileType::WallTriangleCorner, 0);
        Map::from_cells(&TileTable::standard(), &cells, TS).unwrap()
    }

    #[test]
    fn test_free_space_unchanged() {
        let map = room();
        let pos = Vec2::new(200.0, 80.0);
        assert_eq!(constrain(&map, pos, R), pos);
        assert!(!overlaps_solid(&map, pos, R));
    }

    #[test]
    fn test_pushed_out_of_floor_wall() {
        let map = room();
        // Wall row 0 spans y in [0, 32); circle bottom at 38 - 16 = 22
        let pos = constrain(&map, Vec2::new(150.0, 38.0), R);
        assert!(pos.approx_eq(Vec2::new(150.0, 48.0), 1e-9), "got {}", pos);
        assert!(!overlaps_solid(&map, pos, R));
    }

    #[test]
    fn test_pushed_out_of_corner() {
        let map = room();
        let pos = constrain(&map, Vec2::new(40.0, 40.0), R);
        assert!(pos.approx_eq(Vec2::new(48.0, 48.0), 1e-9), "got {}", pos);
    }

    #[test]
    fn test_pushed_off_triangle_hypotenuse() {
        let map = room();
        // Corner triangle (128,128),(160,128),(128,160); hypotenuse normal is (1,1)/sqrt2
        let start = Vec2::new(148.0, 148.0);
        assert!(overlaps_solid(&map, start, R));
        let pos = constrain(&map, start, R);
        assert!(!overlaps_solid(&map, pos, R - 1e-6));
        assert!((pos.x - pos.y).abs() < 1e-9);
        assert!(pos.x > start.x);
    }

    #[test]
    fn test_step_applies_speed() {
        let map = room();
        let config = GameConfig { player_radius: R, ..GameConfig::default() };
        let input = PlayerInput::with_movement(0, PlayerInput::MOVE_RIGHT);
        let pos = step(&map, Vec2::new(200.0, 80.0), &input, &config);
        assert_eq!(pos, Vec2::new(202.0, 80.0));

        // Walking into the right wall stops at contact
        let mut pos = Vec2::new(260.0, 80.0);
        for _ in 0..20 {
            pos = step(&map, pos, &input, &config);
        }
        assert!((pos.x - (288.0 - R)).abs() < 1e-9, "got {}", pos);
    }

    proptest! {
        /// Positions clear of every wall come back unchanged.
        #[test]
        fn constrain_is_identity_when_clear(x in 0.0f64..320.0, y in 0.0f64..256.0) {
            let map = room();
            let pos = Vec2::new(x, y);
            prop_assume!(!overlaps_solid(&map, pos, R));
            prop_assert_eq!(constrain(&map, pos, R), pos);
        }
    }
}
