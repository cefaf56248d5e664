//! WebSocket message codec.
//!
//! The scoreboard speaks JSON over WebSocket text frames. This module
//! provides encoding and decoding utilities for both directions; the
//! server-side half is used by test authorities.

use crate::messages::{ClientMessage, ServerMessage};
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON (de)serialization failed.
    #[error("Invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Received binary frame instead of text.
    #[error("Expected text frame, received binary")]
    BinaryFrame,
}

/// Encode a client message for transmission.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}

/// Decode a frame received from the authority.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

/// Encode a server message (authority side).
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, CodecError> {
    serde_json::to_string(msg).map_err(CodecError::from)
}

/// Decode a client frame (authority side).
pub fn decode_client_message(text: &str) -> Result<ClientMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::StateUpdate;
    use serde_json::json;

    #[test]
    fn test_encode_state() {
        let msg = ServerMessage::State(
            StateUpdate::new()
                .with("ScoreBoard.Team(1).Skater(42).Number", "9")
                .with("ScoreBoard.Team(1).Skater(42).Flags", json!(null)),
        );
        let json = encode_server_message(&msg).unwrap();

        assert!(json.starts_with("{\"state\":{"));
        assert!(json.contains("\"ScoreBoard.Team(1).Skater(42).Flags\":null"));
    }

    #[test]
    fn test_decode_set() {
        let json = r#"{"action":"Set","key":"ScoreBoard.Settings.Setting(Overlay.Interactive.Clock)","value":"On"}"#;
        let msg = decode_client_message(json).unwrap();

        match msg {
            ClientMessage::Set { key, value } => {
                assert_eq!(key, "ScoreBoard.Settings.Setting(Overlay.Interactive.Clock)");
                assert_eq!(value, json!("On"));
            }
            _ => panic!("Expected Set"),
        }
    }

    #[test]
    fn test_decode_unknown_frame() {
        assert!(matches!(decode_server_message(r#"{"hello":1}"#), Err(CodecError::Json(_))));
        assert!(decode_server_message("not json").is_err());
    }

    #[test]
    fn test_encode_register() {
        let msg = ClientMessage::Register {
            paths: vec!["ScoreBoard.Team".into()],
        };
        let json = encode_client_message(&msg).unwrap();
        assert_eq!(json, r#"{"action":"Register","paths":["ScoreBoard.Team"]}"#);
    }
}
