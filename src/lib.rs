//! # CTF Arena Server
//!
//! Authoritative tick server for a multiplayer capture-the-flag arena.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CTF ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Primitives                                │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  ├── geometry.rs - Lines, rects, circles, triangles          │
//! │  └── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │                                                              │
//! │  game/           - Simulation (synchronous)                  │
//! │  ├── config.rs   - Shared gameplay parameters                │
//! │  ├── map.rs      - Tile table, map loader, sampling          │
//! │  ├── state.rs    - World, players, projectiles, flags        │
//! │  ├── input.rs    - Input queue and reconciliation            │
//! │  ├── movement.rs - Displacement and wall pushout             │
//! │  ├── weapons.rs  - Firing, lag compensation, bounces         │
//! │  ├── flag.rs     - Flag state machine, rounds                │
//! │  ├── events.rs   - Per-tick events                           │
//! │  └── tick.rs     - The simulation step                       │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── codec.rs    - Big-endian encoder/decoder                │
//! │  ├── protocol.rs - Wire messages                             │
//! │  ├── link.rs     - Per-player bounded queues                 │
//! │  ├── session.rs  - Receive, simulate, send, evict            │
//! │  ├── ticker.rs   - Drift-corrected sleep                     │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threading
//!
//! One task owns the [`game::World`] and runs every tick start to finish.
//! Connections talk to it only through bounded queues it polls without
//! blocking, so a slow client is disconnected instead of stalling the
//! others.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use game::config::GameConfig;
pub use game::input::PlayerInput;
pub use game::state::{World, PlayerId};
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
