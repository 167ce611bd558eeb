//! Tile Map
//!
//! Immutable grid of typed tiles. Built once at startup from a [`TileTable`]
//! and a run-length encoded map file (or the built-in arena), then shared
//! read-only by the world for the lifetime of the process.
//!
//! Row 0 is the bottom of the map. A tile at `(row, col)` covers
//! `[col*ts, (col+1)*ts) x [row*ts, (row+1)*ts)`.

use std::path::Path;

use crate::core::geometry::Rect;
use crate::core::vec2::Vec2;
use crate::game::state::Team;

/// Tile blocks player movement.
pub const COLLIDE_PLAYER: u8 = 0x01;
/// Tile blocks projectiles.
pub const COLLIDE_LASER: u8 = 0x02;

/// Most flag spawns a map may hold. A carried flag index goes on the wire
/// as an `i8`.
pub const MAX_FLAGS: usize = i8::MAX as usize + 1;

/// Errors building or loading a map.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Map io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Map file truncated at byte {0}")]
    Truncated(usize),

    #[error("Map row width must be non-zero")]
    ZeroWidth,

    #[error("Last map row has {got} tiles, expected {expected}")]
    PartialRow { got: usize, expected: usize },

    #[error("Unknown tile type id {0}")]
    UnknownTileType(u8),

    #[error("Invalid tile orientation {0}")]
    BadOrientation(u8),

    #[error("Map has no {kind} for team {team:?}")]
    MissingLocations { team: Team, kind: &'static str },

    #[error("Arena of {cols}x{rows} tiles is too small")]
    TooSmall { cols: usize, rows: usize },

    #[error("Map has {count} {what}, at most {max} allowed")]
    TooMany { what: &'static str, count: usize, max: usize },
}

// =============================================================================
// TILE TYPES
// =============================================================================

/// Every tile type a map may contain. The discriminant is the on-disk id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TileType {
    Empty = 0,
    Floor = 1,
    Wall = 2,
    WallTriangle = 3,
    WallTriangleCorner = 4,
    GreenSpawn = 5,
    RedSpawn = 6,
    YellowSpawn = 7,
    BlueSpawn = 8,
    GreenJail = 9,
    RedJail = 10,
    YellowJail = 11,
    BlueJail = 12,
    GreenFlagGoal = 13,
    RedFlagGoal = 14,
    YellowFlagGoal = 15,
    BlueFlagGoal = 16,
    FlagSpawn = 17,
}

impl TileType {
    /// All types in id order.
    pub const ALL: [TileType; 18] = [
        TileType::Empty,
        TileType::Floor,
        TileType::Wall,
        TileType::WallTriangle,
        TileType::WallTriangleCorner,
        TileType::GreenSpawn,
        TileType::RedSpawn,
        TileType::YellowSpawn,
        TileType::BlueSpawn,
        TileType::GreenJail,
        TileType::RedJail,
        TileType::YellowJail,
        TileType::BlueJail,
        TileType::GreenFlagGoal,
        TileType::RedFlagGoal,
        TileType::YellowFlagGoal,
        TileType::BlueFlagGoal,
        TileType::FlagSpawn,
    ];

    /// On-disk and wire id.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// True for the two triangular wall variants.
    #[inline]
    pub fn is_triangle(self) -> bool {
        matches!(self, TileType::WallTriangle | TileType::WallTriangleCorner)
    }
}

/// What a tile is used for beyond collision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileRole {
    Plain,
    Spawn,
    Jail,
    FlagGoal,
    FlagSpawn,
}

/// Static properties of one tile type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileKind {
    pub tile_type: TileType,
    pub team: Option<Team>,
    pub role: TileRole,
    pub collision_groups: u8,
}

/// Lookup table from tile id to [`TileKind`].
///
/// Built once at startup and handed to the map loader.
#[derive(Clone, Debug)]
pub struct TileTable {
    kinds: Vec<TileKind>,
}

impl Default for TileTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TileTable {
    /// The standard set of tile types.
    pub fn standard() -> Self {
        let kinds = TileType::ALL
            .iter()
            .map(|&tile_type| {
                use TileType::*;
                let (team, role) = match tile_type {
                    Empty | Floor | Wall | WallTriangle | WallTriangleCorner => (None, TileRole::Plain),
                    GreenSpawn => (Some(Team::Green), TileRole::Spawn),
                    RedSpawn => (Some(Team::Red), TileRole::Spawn),
                    YellowSpawn => (Some(Team::Yellow), TileRole::Spawn),
                    BlueSpawn => (Some(Team::Blue), TileRole::Spawn),
                    GreenJail => (Some(Team::Green), TileRole::Jail),
                    RedJail => (Some(Team::Red), TileRole::Jail),
                    YellowJail => (Some(Team::Yellow), TileRole::Jail),
                    BlueJail => (Some(Team::Blue), TileRole::Jail),
                    GreenFlagGoal => (Some(Team::Green), TileRole::FlagGoal),
                    RedFlagGoal => (Some(Team::Red), TileRole::FlagGoal),
                    YellowFlagGoal => (Some(Team::Yellow), TileRole::FlagGoal),
                    BlueFlagGoal => (Some(Team::Blue), TileRole::FlagGoal),
                    FlagSpawn => (None, TileRole::FlagSpawn),
                };
                let collision_groups = match tile_type {
                    Wall | WallTriangle | WallTriangleCorner => COLLIDE_PLAYER | COLLIDE_LASER,
                    _ => 0,
                };
                TileKind { tile_type, team, role, collision_groups }
            })
            .collect();

        Self { kinds }
    }

    /// Look up a tile id.
    #[inline]
    pub fn get(&self, id: u8) -> Option<&TileKind> {
        self.kinds.get(id as usize)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

// =============================================================================
// TILES
// =============================================================================

/// One placed tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    pub tile_type: TileType,
    /// Bottom-left corner in world units.
    pub pos: Vec2,
    /// Counter-clockwise quarter turns, 0..=3.
    pub orientation: u8,
    pub collision_groups: u8,
}

/// Collision shape of a solid tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TileShape {
    Square(Rect),
    Triangle([Vec2; 3]),
}

impl Tile {
    /// Whether this tile blocks any of the given groups.
    #[inline]
    pub fn blocks(&self, group: u8) -> bool {
        self.collision_groups & group != 0
    }

    /// Axis-aligned bounds of the tile.
    #[inline]
    pub fn rect(&self, tile_size: f64) -> Rect {
        Rect::new(self.pos, Vec2::new(tile_size, tile_size))
    }

    /// Triangle vertices for triangular walls, counter-clockwise.
    pub fn triangle_points(&self, tile_size: f64) -> Option<[Vec2; 3]> {
        let ts = tile_size;
        let p = self.pos;
        let c = p.add_xy(ts / 2.0, ts / 2.0);
        let bl = p;
        let br = p.add_xy(ts, 0.0);
        let tr = p.add_xy(ts, ts);
        let tl = p.add_xy(0.0, ts);

        match (self.tile_type, self.orientation) {
            (TileType::WallTriangle, 0) => Some([bl, br, c]),
            (TileType::WallTriangle, 1) => Some([br, tr, c]),
            (TileType::WallTriangle, 2) => Some([tr, tl, c]),
            (TileType::WallTriangle, 3) => Some([tl, bl, c]),
            (TileType::WallTriangleCorner, 0) => Some([bl, br, tl]),
            (TileType::WallTriangleCorner, 1) => Some([br, tr, bl]),
            (TileType::WallTriangleCorner, 2) => Some([tr, tl, br]),
            (TileType::WallTriangleCorner, 3) => Some([tl, bl, tr]),
            _ => None,
        }
    }

    /// Collision shape, or `None` for tiles that block nothing.
    pub fn shape(&self, tile_size: f64) -> Option<TileShape> {
        if self.collision_groups == 0 {
            return None;
        }
        match self.triangle_points(tile_size) {
            Some(points) => Some(TileShape::Triangle(points)),
            None => Some(TileShape::Square(self.rect(tile_size))),
        }
    }
}

/// Raw map cell before it is resolved through the tile table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MapCell {
    pub type_id: u8,
    pub orientation: u8,
}

impl MapCell {
    pub const fn new(tile_type: TileType, orientation: u8) -> Self {
        Self { type_id: tile_type as u8, orientation }
    }
}

impl From<TileType> for MapCell {
    fn from(tile_type: TileType) -> Self {
        Self::new(tile_type, 0)
    }
}

/// Centre of the tile at `(row, col)`.
#[inline]
pub fn tile_centre(row: usize, col: usize, tile_size: f64) -> Vec2 {
    Vec2::new((col as f64 + 0.5) * tile_size, (row as f64 + 0.5) * tile_size)
}

// =============================================================================
// MAP
// =============================================================================

#[derive(Clone, Debug, Default)]
struct TeamLocations {
    spawns: Vec<Vec2>,
    jails: Vec<Vec2>,
    flag_goals: Vec<Vec2>,
}

/// Immutable tile grid with per-team location lists.
#[derive(Clone, Debug)]
pub struct Map {
    tile_size: f64,
    rows: Vec<Vec<Tile>>,
    teams: [TeamLocations; Team::COUNT],
    flag_spawns: Vec<Vec2>,
}

impl Map {
    /// Build a map from rows of raw cells.
    ///
    /// Fails on unknown tile ids, invalid orientations, when Green or Red
    /// lack a spawn or jail, or when the grid or flag count is too large to
    /// send to clients.
    pub fn from_cells(table: &TileTable, cells: &[Vec<MapCell>], tile_size: f64) -> Result<Self, MapError> {
        let max_dim = u16::MAX as usize;
        if cells.len() > max_dim {
            return Err(MapError::TooMany { what: "rows", count: cells.len(), max: max_dim });
        }
        if let Some(row) = cells.iter().find(|row| row.len() > max_dim) {
            return Err(MapError::TooMany { what: "tiles in a row", count: row.len(), max: max_dim });
        }

        let mut rows = Vec::with_capacity(cells.len());
        let mut teams: [TeamLocations; Team::COUNT] = Default::default();
        let mut flag_spawns = Vec::new();

        for (r, row_cells) in cells.iter().enumerate() {
            let mut row = Vec::with_capacity(row_cells.len());
            for (c, cell) in row_cells.iter().enumerate() {
                let kind = table.get(cell.type_id).ok_or(MapError::UnknownTileType(cell.type_id))?;
                if cell.orientation > 3 {
                    return Err(MapError::BadOrientation(cell.orientation));
                }

                let centre = tile_centre(r, c, tile_size);
                match (kind.role, kind.team) {
                    (TileRole::Spawn, Some(team)) => teams[team.index()].spawns.push(centre),
                    (TileRole::Jail, Some(team)) => teams[team.index()].jails.push(centre),
                    (TileRole::FlagGoal, Some(team)) => teams[team.index()].flag_goals.push(centre),
                    (TileRole::FlagSpawn, _) => flag_spawns.push(centre),
                    _ => {}
                }

                row.push(Tile {
                    tile_type: kind.tile_type,
                    pos: Vec2::new(c as f64 * tile_size, r as f64 * tile_size),
                    orientation: cell.orientation,
                    collision_groups: kind.collision_groups,
                });
            }
            rows.push(row);
        }

        for team in [Team::Green, Team::Red] {
            let locations = &teams[team.index()];
            if locations.spawns.is_empty() {
                return Err(MapError::MissingLocations { team, kind: "spawn" });
            }
            if locations.jails.is_empty() {
                return Err(MapError::MissingLocations { team, kind: "jail" });
            }
        }

        if flag_spawns.len() > MAX_FLAGS {
            return Err(MapError::TooMany { what: "flag spawns", count: flag_spawns.len(), max: MAX_FLAGS });
        }

        Ok(Self { tile_size, rows, teams, flag_spawns })
    }

    /// Parse the run-length encoded binary map format.
    ///
    /// Layout: big-endian `u16` row width, then `u16` run words. Bits 0-4
    /// hold run length minus one, 5-8 a render variation (ignored), 9-10
    /// the orientation and 11-15 the tile type id.
    pub fn parse(table: &TileTable, bytes: &[u8], tile_size: f64) -> Result<Self, MapError> {
        if bytes.len() < 2 {
            return Err(MapError::Truncated(bytes.len()));
        }
        let width = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if width == 0 {
            return Err(MapError::ZeroWidth);
        }

        let body = &bytes[2..];
        if body.len() % 2 != 0 {
            return Err(MapError::Truncated(bytes.len()));
        }

        let mut cells: Vec<Vec<MapCell>> = vec![Vec::with_capacity(width)];
        for word in body.chunks_exact(2) {
            let mut bits = u16::from_be_bytes([word[0], word[1]]);
            let count = (bits & 0x1f) as usize + 1;
            bits >>= 5;
            bits >>= 4; // variation
            let orientation = (bits & 0x3) as u8;
            bits >>= 2;
            let type_id = (bits & 0x1f) as u8;

            for _ in 0..count {
                if cells.last().map_or(true, |row| row.len() == width) {
                    cells.push(Vec::with_capacity(width));
                }
                if let Some(row) = cells.last_mut() {
                    row.push(MapCell { type_id, orientation });
                }
            }
        }

        if let Some(last) = cells.last() {
            if last.len() != width && !(cells.len() == 1 && last.is_empty()) {
                return Err(MapError::PartialRow { got: last.len(), expected: width });
            }
        }

        Self::from_cells(table, &cells, tile_size)
    }

    /// Read and parse a binary map file.
    pub fn load(table: &TileTable, path: impl AsRef<Path>, tile_size: f64) -> Result<Self, MapError> {
        let bytes = std::fs::read(path)?;
        Self::parse(table, &bytes, tile_size)
    }

    /// Encode into the binary map format. Runs are capped at 32 tiles.
    pub fn to_bytes(&self) -> Vec<u8> {
        let width = self.rows.first().map_or(0, Vec::len) as u16;
        let mut out = width.to_be_bytes().to_vec();

        let mut write_run = |tile: &Tile, count: u16| {
            let mut bits = tile.tile_type.id() as u16;
            bits = (bits << 2) | tile.orientation as u16;
            bits <<= 4;
            bits = (bits << 5) | (count - 1);
            out.extend_from_slice(&bits.to_be_bytes());
        };

        let mut current: Option<(Tile, u16)> = None;
        for tile in self.rows.iter().flatten() {
            current = match current {
                Some((run, count))
                    if run.tile_type == tile.tile_type && run.orientation == tile.orientation && count < 32 =>
                {
                    Some((run, count + 1))
                }
                Some((run, count)) => {
                    write_run(&run, count);
                    Some((*tile, 1))
                }
                None => Some((*tile, 1)),
            };
        }
        if let Some((run, count)) = current {
            write_run(&run, count);
        }
        out
    }

    /// Built-in walled arena for running without a map file.
    ///
    /// Green holds the left half and Red the right. Each side gets a
    /// spawn column, a jail cell in the top corner and a flag goal; flag
    /// spawns sit on the centre line with a few obstacles around them.
    pub fn arena(table: &TileTable, cols: usize, rows: usize, tile_size: f64) -> Result<Self, MapError> {
        if cols < 16 || rows < 9 {
            return Err(MapError::TooSmall { cols, rows });
        }

        let mut cells = vec![vec![MapCell::from(TileType::Floor); cols]; rows];
        for (r, row) in cells.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                if r == 0 || r == rows - 1 || c == 0 || c == cols - 1 {
                    *cell = TileType::Wall.into();
                }
            }
        }

        let mid_row = rows / 2;
        let mid_col = cols / 2;
        let top = rows - 3;

        for r in mid_row - 1..=mid_row + 1 {
            cells[r][3] = TileType::GreenSpawn.into();
            cells[r][cols - 4] = TileType::RedSpawn.into();
        }
        cells[top][2] = TileType::GreenJail.into();
        cells[top][cols - 3] = TileType::RedJail.into();
        cells[mid_row][6] = TileType::GreenFlagGoal.into();
        cells[mid_row][cols - 7] = TileType::RedFlagGoal.into();

        cells[2][mid_col] = TileType::FlagSpawn.into();
        cells[rows - 3][mid_col] = TileType::FlagSpawn.into();

        // Centre pillar with cut corners
        cells[mid_row][mid_col - 1] = MapCell::new(TileType::WallTriangleCorner, 3);
        cells[mid_row][mid_col] = TileType::Wall.into();
        cells[mid_row][mid_col + 1] = MapCell::new(TileType::WallTriangleCorner, 1);
        cells[mid_row - 1][mid_col] = MapCell::new(TileType::WallTriangle, 0);
        cells[mid_row + 1][mid_col] = MapCell::new(TileType::WallTriangle, 2);

        Self::from_cells(table, &cells, tile_size)
    }

    /// Edge length of one tile.
    #[inline]
    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All rows, bottom first.
    pub fn rows(&self) -> &[Vec<Tile>] {
        &self.rows
    }

    /// Tile at `(row, col)` if in bounds.
    #[inline]
    pub fn tile(&self, row: usize, col: usize) -> Option<&Tile> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Tile type ids row by row, as sent to joining clients.
    pub fn type_ids(&self) -> Vec<Vec<u8>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|t| t.tile_type.id()).collect())
            .collect()
    }

    /// Tiles in `group` near a circle, row-major order.
    ///
    /// Visits every cell within `trunc(radius/ts) + 1` cells of the cell
    /// containing `pos`.
    pub fn sample_tiles(&self, pos: Vec2, radius: f64, group: u8) -> Vec<&Tile> {
        let ts = self.tile_size;
        let col = (pos.x / ts).trunc() as i64;
        let row = (pos.y / ts).trunc() as i64;
        let steps = (radius / ts).trunc() as i64 + 1;

        let mut samples = Vec::new();
        for r in row - steps..=row + steps {
            if r < 0 || r as usize >= self.rows.len() {
                continue;
            }
            let tiles = &self.rows[r as usize];
            for c in col - steps..=col + steps {
                if c < 0 || c as usize >= tiles.len() {
                    continue;
                }
                let tile = &tiles[c as usize];
                if tile.blocks(group) {
                    samples.push(tile);
                }
            }
        }
        samples
    }

    /// Spawn centres for a team.
    #[inline]
    pub fn spawns(&self, team: Team) -> &[Vec2] {
        &self.teams[team.index()].spawns
    }

    /// Jail centres for a team.
    #[inline]
    pub fn jails(&self, team: Team) -> &[Vec2] {
        &self.teams[team.index()].jails
    }

    /// Flag goal centres for a team.
    #[inline]
    pub fn flag_goals(&self, team: Team) -> &[Vec2] {
        &self.teams[team.index()].flag_goals
    }

    /// Flag spawn centres, one flag per entry.
    #[inline]
    pub fn flag_spawns(&self) -> &[Vec2] {
        &self.flag_spawns
    }
}

// =============================================================================
// TESTS
// =============================================================================
