//! Realtime relay: rooms keyed by conversation id, fanned out over WebSocket.
//!
//! The relay is best-effort and at-most-once. Anything a client must not
//! lose goes through the REST API first.

pub mod connection;
pub mod directory;
pub mod hub;

pub use connection::{RelayContext, RelayTiming, handle_connection};
pub use directory::RoomDirectory;
pub use hub::RelayHub;
