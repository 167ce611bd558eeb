//! Flag State Machine and Round Lifecycle
//!
//! ```text
//!            pickup               carrier reaches own goal
//!  Dropped ----------> Carried --------------------------> Captured(team)
//!     ^                  |  ^                                   |
//!     +------------------+  +-----------------------------------+
//!      carrier dies/drops          stolen by another team
//! ```
//!
//! The round is won once every flag is captured by the same team. After a
//! cooldown the round resets.

use std::collections::BTreeSet;

use crate::game::events::GameEvent;
use crate::game::state::{random_location, Flag, FlagState, NetState, PlayerId, SimState, World};

/// Advance every flag one tick, then check for a winner.
///
/// Does nothing while a won round is cooling down.
pub fn update_flags(world: &mut World) {
    if world.winning_team.is_some() {
        return;
    }

    for index in 0..world.flags.len() {
        update_carried(world, index);
        try_pickup(world, index);
    }

    for player in world.players.values_mut() {
        player.drop_flag_requested = false;
    }

    check_win(world);
}

/// Follow the carrier, drop on death or request, capture at a goal.
fn update_carried(world: &mut World, index: usize) {
    let Some(carrier_id) = world.flags[index].carrier() else {
        return;
    };
    let tile_size = world.map.tile_size();
    let cooldown = world.config.flag_cooldown_ticks;

    let Some(carrier) = world.players.get_mut(&carrier_id) else {
        world.flags[index].state = FlagState::Dropped;
        return;
    };

    // A carrier already moved to jail leaves the flag where it was last carried
    let flag = &mut world.flags[index];
    if carrier.sim_state == SimState::Alive {
        flag.pos = carrier.acked.pos;
    }

    if !carrier.is_alive() || carrier.drop_flag_requested {
        flag.state = FlagState::Dropped;
        carrier.flag_cooldown_ticks = cooldown;
        world.events.push(GameEvent::FlagDropped { flag: index, player: carrier_id });
        return;
    }

    let team = carrier.team;
    if let Some(&goal) = world.map.flag_goals(team).iter().find(|&&goal| flag.pos.distance(goal) < tile_size) {
        flag.pos = goal;
        flag.state = FlagState::Captured(team);
        world.events.push(GameEvent::FlagCaptured { flag: index, team });
        tracing::info!(flag = index, ?team, player = %carrier_id, "flag captured");
    }
}

/// Give a loose flag to the closest eligible player in range.
///
/// Eligible players are alive, off pickup cooldown, not already carrying
/// and not on the team that captured the flag. Exact distance ties go to
/// the lower id.
fn try_pickup(world: &mut World, index: usize) {
    let flag = world.flags[index];
    let captured_by = match flag.state {
        FlagState::Carried(_) => return,
        FlagState::Dropped => None,
        FlagState::Captured(team) => Some(team),
    };

    let carriers: BTreeSet<PlayerId> = world.flags.iter().filter_map(Flag::carrier).collect();
    let radius = world.config.flag_pickup_radius;

    let mut closest: Option<(f64, PlayerId)> = None;
    for player in world.players.values() {
        if !player.is_alive()
            || player.flag_cooldown_ticks > 0
            || Some(player.team) == captured_by
            || carriers.contains(&player.id)
        {
            continue;
        }
        let dist = player.acked.pos.distance(flag.pos);
        if dist > radius {
            continue;
        }
        if closest.map_or(true, |(best, _)| dist < best) {
            closest = Some((dist, player.id));
        }
    }

    if let Some((_, id)) = closest {
        let Some(player) = world.players.get(&id) else {
            return;
        };
        let flag = &mut world.flags[index];
        flag.state = FlagState::Carried(id);
        flag.pos = player.acked.pos;
        world.events.push(GameEvent::FlagPickedUp { flag: index, player: id });
    }
}

/// Declare a winner when one team holds every flag.
fn check_win(world: &mut World) {
    let Some(first) = world.flags.first() else {
        return;
    };
    let FlagState::Captured(team) = first.state else {
        return;
    };
    if world.flags.iter().all(|f| f.state == FlagState::Captured(team)) {
        world.winning_team = Some(team);
        world.win_cooldown_ticks = world.config.win_cooldown_ticks;
        world.events.push(GameEvent::RoundWon { team });
        tracing::info!(?team, "round won");
    }
}

/// Count down a won round and reset it when the cooldown expires.
pub fn update_round(world: &mut World) {
    if world.winning_team.is_none() {
        return;
    }
    world.win_cooldown_ticks = world.win_cooldown_ticks.saturating_sub(1);
    if world.win_cooldown_ticks == 0 {
        reset_round(world);
    }
}

/// Flags back to their spawns, ready players to jail, projectiles cleared.
pub fn reset_round(world: &mut World) {
    world.flags = world.map.flag_spawns().iter().map(|&pos| Flag::new(pos)).collect();
    world.projectiles.clear();
    world.new_projectiles.clear();
    world.new_hits.clear();
    world.winning_team = None;
    world.win_cooldown_ticks = 0;

    for player in world.players.values_mut() {
        if player.net_state != NetState::Ready {
            continue;
        }
        let pos = random_location(&mut world.rng, world.map.jails(player.team));
        player.send_to_jail(pos, &world.config);
        player.refill_energy(&world.config);
        player.predicted = player.acked;
        player.flag_cooldown_ticks = 0;
        player.drop_flag_requested = false;
    }

    world.events.push(GameEvent::RoundReset);
    tracing::info!("round reset");
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::state::tests::{spawn_alive, test_world};
    use crate::game::state::Team;

    #[test]
    fn test_single_eligible_player_picks_up() {
        let mut world = test_world();
        let flag_pos = world.flags[0].pos;
        let id = spawn_alive(&mut world, flag_pos.add_xy(10.0, 0.0));

        update_flags(&mut world);
        assert_eq!(world.flags[0].state, FlagState::Carried(id));
        assert_eq!(world.flags[0].pos, flag_pos.add_xy(10.0, 0.0));
        assert_eq!(world.flag_carried_by(id), Some(0));
        assert!(world.events.contains(&GameEvent::FlagPickedUp { flag: 0, player: id }));
    }

    #[test]
    fn test_out_of_range_or_cooling_down() {
        let mut world = test_world();
        let flag_pos = world.flags[0].pos;
        let radius = world.config.flag_pickup_radius;
        let far = spawn_alive(&mut world, flag_pos.add_xy(radius + 1.0, 0.0));
        let cooling = spawn_alive(&mut world, flag_pos.add_xy(0.0, 5.0));
        world.get_player_mut(cooling).unwrap().flag_cooldown_ticks = 3;

        update_flags(&mut world);
        assert_eq!(world.flags[0].state, FlagState::Dropped);
        assert!(world.flag_carried_by(far).is_none());
    }

    #[test]
    fn test_closest_wins_then_lower_id() {
        let mut world = test_world();
        let flag_pos = world.flags[0].pos;
        let _a = spawn_alive(&mut world, flag_pos.add_xy(20.0, 0.0));
        let b = spawn_alive(&mut world, flag_pos.add_xy(-5.0, 0.0));
        update_flags(&mut world);
        assert_eq!(world.flags[0].state, FlagState::Carried(b));

        let mut world = test_world();
        let flag_pos = world.flags[0].pos;
        let a = spawn_alive(&mut world, flag_pos.add_xy(10.0, 0.0));
        let _b = spawn_alive(&mut world, flag_pos.add_xy(-10.0, 0.0));
        update_flags(&mut world);
        assert_eq!(world.flags[0].state, FlagState::Carried(a));
    }

    #[test]
    fn test_dead_carrier_drops() {
        let mut world = test_world();
        let flag_pos = world.flags[0].pos;
        let id = spawn_alive(&mut world, flag_pos);
        update_flags(&mut world);

        let player = world.get_player_mut(id).unwrap();
        player.acked.pos = flag_pos.add_xy(0.0, 30.0);
        player.health = 0;
        update_flags(&mut world);

        assert_eq!(world.flags[0].state, FlagState::Dropped);
        assert_eq!(world.flags[0].pos, flag_pos.add_xy(0.0, 30.0));
        assert_eq!(world.get_player(id).unwrap().flag_cooldown_ticks, world.config.flag_cooldown_ticks);
    }

    #[test]
    fn test_drop_request() {
        let mut world = test_world();
        let flag_pos = world.flags[0].pos;
        let id = spawn_alive(&mut world, flag_pos);
        update_flags(&mut world);

        world.get_player_mut(id).unwrap().drop_flag_requested = true;
        update_flags(&mut world);
        assert_eq!(world.flags[0].state, FlagState::Dropped);
        assert!(!world.get_player(id).unwrap().drop_flag_requested);
    }

    #[test]
    fn test_capture_at_own_goal() {
        let mut world = test_world();
        let flag_pos = world.flags[0].pos;
        let id = spawn_alive(&mut world, flag_pos);
        assert_eq!(world.get_player(id).unwrap().team, Team::Green);
        update_flags(&mut world);

        let goal = world.map.flag_goals(Team::Green)[0];
        world.get_player_mut(id).unwrap().acked.pos = goal.add_xy(5.0, 5.0);
        update_flags(&mut world);

        assert_eq!(world.flags[0].state, FlagState::Captured(Team::Green));
        assert_eq!(world.flags[0].pos, goal);
        assert!(world.winning_team.is_none());
    }

    #[test]
    fn test_capturing_team_cannot_recollect_but_others_steal() {
        let mut world = test_world();
        let goal = world.map.flag_goals(Team::Green)[0];
        world.flags[0].state = FlagState::Captured(Team::Green);
        world.flags[0].pos = goal;

        let green = spawn_alive(&mut world, goal);
        update_flags(&mut world);
        assert_eq!(world.flags[0].state, FlagState::Captured(Team::Green));

        let red = spawn_alive(&mut world, goal.add_xy(3.0, 0.0));
        assert_eq!(world.get_player(red).unwrap().team, Team::Red);
        update_flags(&mut world);
        assert_eq!(world.flags[0].state, FlagState::Carried(red));
        assert!(world.flag_carried_by(green).is_none());
    }

    #[test]
    fn test_win_and_reset() {
        let mut world = test_world();
        let id = spawn_alive(&mut world, Vec2::new(300.0, 300.0));
        for flag in &mut world.flags {
            flag.state = FlagState::Captured(Team::Red);
        }
        world.projectiles.clear();

        update_flags(&mut world);
        assert_eq!(world.winning_team, Some(Team::Red));
        assert_eq!(world.win_cooldown_ticks, world.config.win_cooldown_ticks);

        for _ in 0..world.config.win_cooldown_ticks - 1 {
            update_round(&mut world);
        }
        assert_eq!(world.winning_team, Some(Team::Red));
        update_round(&mut world);

        assert!(world.winning_team.is_none());
        assert!(world.flags.iter().all(|f| f.state == FlagState::Dropped));
        let player = world.get_player(id).unwrap();
        assert_eq!(player.sim_state, SimState::Jailed);
        assert!(world.map.jails(player.team).contains(&player.acked.pos));
        assert!(world.events.contains(&GameEvent::RoundReset));
    }

    #[test]
    fn test_no_flags_no_winner() {
        let mut world = test_world();
        world.flags.clear();
        update_flags(&mut world);
        assert!(world.winning_team.is_none());
    }
}
