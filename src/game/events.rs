//! Game Events
//!
//! Notable things that happened during a simulation step. The session logs
//! them; they never go on the wire.

use std::fmt;

use crate::game::state::{PlayerId, Team};

/// Something that happened during one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// Player entered jail.
    PlayerJailed { player: PlayerId },
    /// Player left jail at a spawn.
    PlayerReleased { player: PlayerId },
    /// A projectile hit a player.
    PlayerHit { victim: PlayerId, shooter: PlayerId },
    /// A bouncing projectile ran out of reflections in one tick.
    ProjectileStuck { owner: PlayerId },
    FlagPickedUp { flag: usize, player: PlayerId },
    FlagDropped { flag: usize, player: PlayerId },
    FlagCaptured { flag: usize, team: Team },
    /// Every flag is captured by one team.
    RoundWon { team: Team },
    /// Flags and players went back to their starting places.
    RoundReset,
}

impl GameEvent {
    /// Player the event is about, if any.
    pub fn player(&self) -> Option<PlayerId> {
        match *self {
            GameEvent::PlayerJailed { player }
            | GameEvent::PlayerReleased { player }
            | GameEvent::FlagPickedUp { player, .. }
            | GameEvent::FlagDropped { player, .. } => Some(player),
            GameEvent::PlayerHit { victim, .. } => Some(victim),
            GameEvent::ProjectileStuck { owner } => Some(owner),
            GameEvent::FlagCaptured { .. } | GameEvent::RoundWon { .. } | GameEvent::RoundReset => None,
        }
    }

    /// Round-level events, as opposed to per-player ones.
    pub fn is_notable(&self) -> bool {
        matches!(
            self,
            GameEvent::FlagCaptured { .. } | GameEvent::RoundWon { .. } | GameEvent::RoundReset
        )
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::PlayerJailed { player } => write!(f, "player {} jailed", player),
            GameEvent::PlayerReleased { player } => write!(f, "player {} released", player),
            GameEvent::PlayerHit { victim, shooter } => write!(f, "player {} hit by {}", victim, shooter),
            GameEvent::ProjectileStuck { owner } => write!(f, "projectile from {} stuck", owner),
            GameEvent::FlagPickedUp { flag, player } => write!(f, "flag {} picked up by {}", flag, player),
            GameEvent::FlagDropped { flag, player } => write!(f, "flag {} dropped by {}", flag, player),
            GameEvent::FlagCaptured { flag, team } => write!(f, "flag {} captured by {:?}", flag, team),
            GameEvent::RoundWon { team } => write!(f, "round won by {:?}", team),
            GameEvent::RoundReset => write!(f, "round reset"),
        }
    }
}
