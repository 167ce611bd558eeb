//! Weapons and Projectiles
//!
//! Firing, lag compensation and the per-tick projectile update.
//!
//! ## Tick Order
//!
//! ```text
//! age & cull -> advance -> resolve collisions -> stage new shots
//! ```
//!
//! Shots fired this tick are staged after the advance, so they first move
//! on the next tick together with everything else.

use std::collections::BTreeMap;

use crate::core::geometry::{line_circle_intersect, line_rect_intersect, line_triangle_intersect, Circle, Hit, Line};
use crate::core::vec2::Vec2;
use crate::game::config::GameConfig;
use crate::game::events::GameEvent;
use crate::game::input::{tick_delta, PlayerInput};
use crate::game::map::{Map, TileShape, COLLIDE_LASER};
use crate::game::state::{Player, PlayerId, Projectile, ProjectileKind};

// =============================================================================
// FIRING
// =============================================================================

/// Spend energy and spawn a projectile if the pool can pay for it.
///
/// The leading edge is fast-forwarded by the ticks between the client tick
/// the input was sampled on and the current server tick, capped at
/// `max_motion_predictions`. A non-finite aim fires nothing.
pub fn try_fire(
    player: &mut Player,
    kind: ProjectileKind,
    aim_angle: f64,
    client_tick: u8,
    server_tick: u8,
    config: &GameConfig,
) -> Option<Projectile> {
    if !aim_angle.is_finite() {
        return None;
    }
    let (pool, cost) = match kind {
        ProjectileKind::Laser => (&mut player.acked.energy, config.laser_energy_cost),
        ProjectileKind::Bouncy => (&mut player.acked.bouncy_energy, config.bouncy_energy_cost),
    };
    if *pool < cost {
        return None;
    }
    *pool -= cost;

    let dir = Vec2::from_angle(aim_angle);
    let lag = u32::from(tick_delta(server_tick, client_tick)).min(config.max_motion_predictions) as f64;
    let start = player.acked.pos;
    let end = start + dir.scale(kind.speed(config) * lag);

    Some(Projectile {
        kind,
        owner: player.id,
        line: Line::new(start, end),
        dir,
        angle: aim_angle,
        age: 0,
        last_bounce_angle: None,
    })
}

/// Fire whatever the input asks for.
pub fn fire_input(
    player: &mut Player,
    input: &PlayerInput,
    server_tick: u8,
    config: &GameConfig,
    out: &mut Vec<Projectile>,
) {
    if input.fires_primary() {
        out.extend(try_fire(player, ProjectileKind::Laser, input.aim_angle, input.tick, server_tick, config));
    }
    if input.fires_secondary() {
        out.extend(try_fire(player, ProjectileKind::Bouncy, input.aim_angle, input.tick, server_tick, config));
    }
}

/// One tick of energy regeneration, capped per pool.
#[inline]
pub fn regenerate(player: &mut Player, config: &GameConfig) {
    let acked = &mut player.acked;
    acked.energy = acked.energy.saturating_add(1).min(config.max_laser_energy);
    acked.bouncy_energy = acked.bouncy_energy.saturating_add(1).min(config.max_bouncy_energy);
}

// =============================================================================
// COLLISION RESOLUTION
// =============================================================================

/// How a projectile's sweep ended this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Resolution {
    /// Still flying after `bounces` reflections.
    Flying { bounces: u32 },
    /// Hit a player at `pos`.
    HitPlayer { victim: PlayerId, pos: Vec2 },
    /// Stopped by a wall.
    HitWall,
    /// Would need more than the allowed reflections.
    Stuck { bounces: u32 },
}

impl Resolution {
    #[inline]
    pub fn destroys(&self) -> bool {
        !matches!(self, Resolution::Flying { .. })
    }
}

/// Nearest wall contact along a segment.
fn nearest_wall_hit(map: &Map, line: Line) -> Option<(f64, Hit)> {
    let tile_size = map.tile_size();
    let mut nearest: Option<(f64, Hit)> = None;
    for tile in map.sample_tiles(line.end, line.length(), COLLIDE_LASER) {
        let hit = match tile.shape(tile_size) {
            Some(TileShape::Square(rect)) => line_rect_intersect(line, rect),
            Some(TileShape::Triangle(points)) => line_triangle_intersect(line, points),
            None => None,
        };
        if let Some(hit) = hit {
            let dist = line.start.distance(hit.pos);
            if nearest.map_or(true, |(best, _)| dist < best) {
                nearest = Some((dist, hit));
            }
        }
    }
    nearest
}

/// Nearest alive player, other than the owner, crossed by the segment.
fn nearest_player_hit(
    players: &BTreeMap<PlayerId, Player>,
    projectile: &Projectile,
    radius: f64,
) -> Option<(f64, PlayerId, Vec2)> {
    let line = projectile.line;
    let mut nearest: Option<(f64, PlayerId, Vec2)> = None;
    for player in players.values() {
        if player.id == projectile.owner || !player.is_alive() {
            continue;
        }
        if let Some(pos) = line_circle_intersect(line, Circle::new(player.acked.pos, radius)) {
            let dist = line.start.distance(pos);
            if nearest.map_or(true, |(best, _, _)| dist < best) {
                nearest = Some((dist, player.id, pos));
            }
        }
    }
    nearest
}

/// Reflect about `normal` and restart the segment at the contact point,
/// keeping the length still to travel.
fn bounce(projectile: &mut Projectile, hit: Hit) {
    let incident = projectile.line.direction();
    let remaining = projectile.line.end.distance(hit.pos);
    projectile.dir = incident.reflect(hit.normal).normalize();
    projectile.line = Line::new(hit.pos, hit.pos + projectile.dir.scale(remaining));
    projectile.last_bounce_angle = Some(projectile.dir.y.atan2(projectile.dir.x));
}

/// Resolve a projectile's swept segment against walls and players.
///
/// A bouncy projectile keeps resolving from each contact point until its
/// segment is clear. Reaching a wall with `max_bounces` reflections already
/// spent destroys it.
pub fn resolve_collisions(
    projectile: &mut Projectile,
    map: &Map,
    players: &BTreeMap<PlayerId, Player>,
    config: &GameConfig,
) -> Resolution {
    let mut bounces = 0;
    loop {
        let wall = nearest_wall_hit(map, projectile.line);
        let player = nearest_player_hit(players, projectile, config.player_radius);

        let wall_hit = match (wall, player) {
            (None, None) => return Resolution::Flying { bounces },
            (Some((wall_dist, _)), Some((player_dist, victim, pos))) if player_dist < wall_dist => {
                return Resolution::HitPlayer { victim, pos };
            }
            (None, Some((_, victim, pos))) => return Resolution::HitPlayer { victim, pos },
            (Some((_, hit)), _) => hit,
        };

        if projectile.kind != ProjectileKind::Bouncy {
            return Resolution::HitWall;
        }
        if bounces >= config.max_bounces {
            return Resolution::Stuck { bounces };
        }
        bounce(projectile, wall_hit);
        bounces += 1;
    }
}

// =============================================================================
// TICK UPDATE
// =============================================================================

/// Age, advance and collide every projectile, then stage this tick's shots.
///
/// Player hits cost one health and record a hit point in `new_hits`.
pub fn update_projectiles(
    projectiles: &mut Vec<Projectile>,
    new_projectiles: &[Projectile],
    new_hits: &mut Vec<Vec2>,
    players: &mut BTreeMap<PlayerId, Player>,
    map: &Map,
    config: &GameConfig,
    events: &mut Vec<GameEvent>,
) {
    new_hits.clear();

    projectiles.retain_mut(|p| {
        p.age += 1;
        p.age <= config.laser_time_ticks
    });

    for p in projectiles.iter_mut() {
        let speed = p.kind.speed(config);
        p.line.start = p.line.end;
        p.line.end = p.line.end + p.dir.scale(speed);
    }

    projectiles.retain_mut(|p| {
        let resolution = resolve_collisions(p, map, players, config);
        match resolution {
            Resolution::HitPlayer { victim, pos } => {
                if let Some(player) = players.get_mut(&victim) {
                    player.health -= 1;
                }
                new_hits.push(pos);
                events.push(GameEvent::PlayerHit { victim, shooter: p.owner });
            }
            Resolution::Stuck { bounces } => {
                tracing::trace!(owner = %p.owner, bounces, "projectile stuck, removing");
                events.push(GameEvent::ProjectileStuck { owner: p.owner });
            }
            Resolution::Flying { bounces } if bounces > 0 => {
                tracing::trace!(owner = %p.owner, bounces, "projectile bounced");
            }
            Resolution::Flying { .. } | Resolution::HitWall => {}
        }
        !resolution.destroys()
    });

    projectiles.extend_from_slice(new_projectiles);
}

// =============================================================================
// TESTS
// =============================================================================
