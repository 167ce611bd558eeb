//! Core primitives.
//!
//! Vector math, collision geometry and the seeded RNG. Nothing in here
//! knows about players, tiles or the network.

pub mod vec2;
pub mod geometry;
pub mod rng;

// Re-export core types
pub use vec2::Vec2;
pub use geometry::{Line, Rect, Circle, Hit};
pub use rng::WorldRng;
