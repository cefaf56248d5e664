//! # scoreboard-protocol
//!
//! Scoreboard WebSocket message types and codec.
//!
//! This crate defines the JSON frames exchanged with the scoreboard
//! authority over WebSocket text frames.

pub mod codec;
pub mod messages;

pub use codec::*;
pub use messages::*;
