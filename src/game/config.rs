//! Shared Game Parameters
//!
//! Gameplay constants supplied from outside the simulation. The same JSON
//! document is served to clients so their predictors run on identical
//! numbers, hence the PascalCase keys.

use std::path::Path;
use serde::{Serialize, Deserialize};

/// Errors loading or writing game parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written.
    #[error("Config io error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid parameter JSON.
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Gameplay parameters shared by server and clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GameConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Edge length of a map tile.
    pub tile_size: f64,
    /// Distance moved per acknowledged input.
    pub player_speed: f64,
    /// Player collision radius.
    pub player_radius: f64,
    /// Health on release from jail.
    pub player_health: i32,
    /// Primary weapon energy cap.
    pub max_laser_energy: u16,
    /// Secondary weapon energy cap.
    pub max_bouncy_energy: u16,
    /// Ticks spent in jail.
    pub jail_time_ticks: u32,
    /// Laser travel per tick.
    pub laser_speed: f64,
    /// Projectile lifetime in ticks.
    pub laser_time_ticks: u32,
    /// Energy cost of a laser shot.
    pub laser_energy_cost: u16,
    /// Energy cost of a bouncy shot.
    pub bouncy_energy_cost: u16,
    /// Bouncy projectile travel per tick.
    pub bouncy_speed: f64,
    /// Most reflections a projectile may make within one tick.
    pub max_bounces: u32,
    /// Distance within which a flag can be picked up.
    pub flag_pickup_radius: f64,
    /// Ticks after dropping a flag before that player may pick one up.
    pub flag_cooldown_ticks: u32,
    /// Ticks between a round being won and the reset.
    pub win_cooldown_ticks: u32,
    /// Inbound frames drained per player per tick.
    pub max_reads_per_tick: usize,
    /// Received-but-unprocessed inputs kept per player.
    pub input_buffer_capacity: usize,
    /// Ceiling on owed ticks before a client is told to speed up.
    pub max_input_lag_ticks: u32,
    /// Ticks a player's motion is extrapolated for other clients.
    pub max_motion_predictions: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            tile_size: 32.0,
            player_speed: 2.0,
            player_radius: 32.0,
            player_health: 10,
            max_laser_energy: 70,
            max_bouncy_energy: 120,
            jail_time_ticks: 300,
            laser_speed: 6.0,
            laser_time_ticks: 60,
            laser_energy_cost: 10,
            bouncy_energy_cost: 30,
            bouncy_speed: 9.0,
            max_bounces: 10,
            flag_pickup_radius: 1.2 * 32.0,
            flag_cooldown_ticks: 60,
            win_cooldown_ticks: 150,
            max_reads_per_tick: 10,
            input_buffer_capacity: 30,
            max_input_lag_ticks: 30,
            max_motion_predictions: 5,
        }
    }
}

impl GameConfig {
    /// Load parameters from a JSON file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the parameters for clients to fetch.
    pub fn write_shared(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Projectile travel per tick for a projectile kind.
    #[inline]
    pub fn projectile_speed(&self, bouncy: bool) -> f64 {
        if bouncy {
            self.bouncy_speed
        } else {
            self.laser_speed
        }
    }
}
