//! Game Logic Module
//!
//! The synchronous simulation. Nothing in here blocks or touches the
//! network; the session drives it one tick at a time.
//!
//! ## Module Structure
//!
//! - `config`: Shared gameplay parameters
//! - `map`: Tile table, map grid and loader
//! - `state`: World, players, projectiles, flags, id pool
//! - `input`: Player input and reconciliation
//! - `movement`: Displacement and wall pushout
//! - `weapons`: Firing, lag compensation, projectile update
//! - `flag`: Flag state machine and round lifecycle
//! - `events`: Per-tick game events
//! - `tick`: The simulation step

pub mod config;
pub mod map;
pub mod state;
pub mod input;
pub mod movement;
pub mod weapons;
pub mod flag;
pub mod events;
pub mod tick;

// Re-export key types
pub use config::{GameConfig, ConfigError};
pub use map::{Map, MapError, TileTable, TileType};
pub use state::{World, Player, PlayerId, Team, SimState, NetState, Projectile, ProjectileKind, Flag, FlagState};
pub use input::PlayerInput;
pub use tick::{simulate, advance_tick, TickResult};
pub use events::GameEvent;
