//! Error types for the synchronization engine.
//!
//! None of these cross into observer or trigger callbacks: the store and
//! binders log them and keep the notification loop running.

use thiserror::Error;

/// Errors produced while tokenizing a key-path or pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyPathError {
    #[error("Empty key-path")]
    Empty,

    #[error("Empty segment in key-path")]
    EmptySegment,

    #[error("Unbalanced parentheses in `{0}`")]
    Unbalanced(String),

    #[error("Parameterized segment without a name: `{0}`")]
    MissingName(String),

    #[error("Unexpected text after parameter in `{0}`")]
    TrailingText(String),
}

/// Errors produced by [`ReactiveCollection`](crate::collection::ReactiveCollection).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("Record has no `{0}` identity field")]
    MissingIdentity(String),
}

/// Errors reported by a [`Transport`](crate::store::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Transport is closed")]
    Closed,

    #[error("Not connected to the authority")]
    NotConnected,
}
