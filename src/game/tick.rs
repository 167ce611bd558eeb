//! Simulation Step
//!
//! One tick of the world, in a fixed order:
//!
//! ```text
//! players (life, inputs, acked + predicted motion, firing)
//!   -> projectiles -> flags -> round
//! ```
//!
//! Receiving, sending and evicting happen around this in the session.

use crate::core::rng::WorldRng;
use crate::game::config::GameConfig;
use crate::game::events::GameEvent;
use crate::game::flag::{update_flags, update_round};
use crate::game::input::{prediction_steps, take_tick_inputs, PlayerInput};
use crate::game::map::Map;
use crate::game::movement;
use crate::game::state::{random_location, NetState, Player, Projectile, SimState, World};
use crate::game::weapons::{fire_input, regenerate, update_projectiles};

/// Outcome of one simulation step.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Server tick that was simulated.
    pub tick: u8,
    /// Events generated this tick.
    pub events: Vec<GameEvent>,
}

/// Run one simulation step. Does not advance the tick counter.
pub fn simulate(world: &mut World) -> TickResult {
    world.new_projectiles.clear();

    update_players(world);

    {
        let World { projectiles, new_projectiles, new_hits, players, map, config, events, .. } = &mut *world;
        update_projectiles(projectiles, new_projectiles, new_hits, players, map, config, events);
    }

    update_flags(world);
    update_round(world);

    TickResult { tick: world.tick, events: world.take_events() }
}

/// Step the wrapping tick counter.
#[inline]
pub fn advance_tick(world: &mut World) {
    world.tick = world.tick.wrapping_add(1);
}

fn update_players(world: &mut World) {
    let World { players, map, config, rng, new_projectiles, events, tick, .. } = world;
    let server_tick = *tick;

    for player in players.values_mut() {
        if player.net_state != NetState::Ready {
            continue;
        }

        update_life(player, map, config, rng, events);
        player.flag_cooldown_ticks = player.flag_cooldown_ticks.saturating_sub(1);

        let inputs = take_tick_inputs(player, config);
        for input in &inputs {
            apply_input(player, input, map, config, server_tick, new_projectiles);
        }
        match inputs.last() {
            Some(last) => {
                player.acked_input_tick = Some(last.tick);
                player.last_input = *last;
            }
            None => player.acked_input_tick = None,
        }

        predict(player, map, config);
    }
}

/// Jail the dead, count down and release the jailed.
fn update_life(player: &mut Player, map: &Map, config: &GameConfig, rng: &mut WorldRng, events: &mut Vec<GameEvent>) {
    match player.sim_state {
        SimState::Alive if player.health <= 0 => {
            let pos = random_location(rng, map.jails(player.team));
            player.send_to_jail(pos, config);
            events.push(GameEvent::PlayerJailed { player: player.id });
        }
        SimState::Jailed => {
            player.jail_time_ticks = player.jail_time_ticks.saturating_sub(1);
            if player.jail_time_ticks == 0 {
                let pos = random_location(rng, map.spawns(player.team));
                player.release(pos, config);
                events.push(GameEvent::PlayerReleased { player: player.id });
            }
        }
        _ => {}
    }
}

/// Advance the acked state by one received input.
fn apply_input(
    player: &mut Player,
    input: &PlayerInput,
    map: &Map,
    config: &GameConfig,
    server_tick: u8,
    new_projectiles: &mut Vec<Projectile>,
) {
    if player.sim_state != SimState::Spectating {
        player.acked.pos = movement::step(map, player.acked.pos, input, config);
    }
    if player.is_alive() {
        fire_input(player, input, server_tick, config, new_projectiles);
    }
    if input.drops_flag() {
        player.drop_flag_requested = true;
    }
    regenerate(player, config);
}

/// Extrapolate the acked state over the ticks still owed, movement only.
fn predict(player: &mut Player, map: &Map, config: &GameConfig) {
    player.predicted = player.acked;
    if player.sim_state == SimState::Spectating {
        return;
    }
    for _ in 0..prediction_steps(player, config) {
        player.predicted.pos = movement::step(map, player.predicted.pos, &player.last_input, config);
    }
}

// =============================================================================
// TESTS
// =============================================================================
