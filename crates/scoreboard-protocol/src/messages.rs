//! Protocol message types for WebSocket communication.
//!
//! This module defines all message types exchanged with the scoreboard:
//! - Client → Server: Register, Set, Ping
//! - Server → Client: State, Error, Pong
//!
//! Messages are serialized as JSON over WebSocket text frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use scoreboard_core::Request;

/// Messages sent from the client to the authority.
///
/// The `action` field selects the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientMessage {
    /// Start receiving changes for these key-paths (and their families).
    ///
    /// # Example
    /// ```json
    /// {"action": "Register", "paths": ["ScoreBoard.Team"]}
    /// ```
    Register { paths: Vec<String> },

    /// Ask the authority to adopt a value. `null` clears the key.
    Set { key: String, value: Value },

    /// Keep-alive.
    Ping,
}

impl From<Request> for ClientMessage {
    fn from(request: Request) -> Self {
        match request {
            Request::Register(paths) => ClientMessage::Register { paths },
            Request::Set { key, value } => ClientMessage::Set { key, value },
        }
    }
}

/// A batch of key changes, in the order the authority emitted them.
///
/// # Example
/// ```json
/// {"state": {"ScoreBoard.Team(1).Skater(42).Name": "J. Doe"}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub state: Map<String, Value>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fake authorities.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    pub fn into_changes(self) -> impl Iterator<Item = (String, Value)> {
        self.state.into_iter()
    }
}

/// Error report from the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

/// Reply to a ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PongMessage {
    #[serde(rename = "Pong")]
    pub pong: Value,
}

/// Messages sent from the authority to the client.
///
/// Uses untagged deserialization - the message type is determined by
/// examining which fields are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Key changes to apply to the mirror.
    State(StateUpdate),

    /// Something the authority could not process.
    Error(ErrorMessage),

    /// Keep-alive reply.
    Pong(PongMessage),
}
