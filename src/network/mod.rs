//! Network Module
//!
//! Everything between the socket and the simulation.
//!
//! ## Module Structure
//!
//! - `codec`: Big-endian encoder/decoder
//! - `protocol`: Input, Init and StateUpdate messages
//! - `link`: Non-blocking per-player queues
//! - `session`: Receive, simulate, send, evict
//! - `ticker`: Drift-corrected tick timing
//! - `server`: WebSocket accept loop and connection pumps

pub mod codec;
pub mod protocol;
pub mod link;
pub mod session;
pub mod ticker;
pub mod server;

// Re-export key types
pub use codec::CodecError;
pub use protocol::{ClientMessage, ServerMessage, InitMessage, StateUpdate};
pub use link::{Link, ChannelLink};
pub use session::{Session, SessionError};
pub use ticker::Ticker;
pub use server::{GameServer, GameServerError, ServerConfig, load_world};
