//! # scoreboard-core
//!
//! Client-side state synchronization for a scoreboard control panel.
//!
//! This crate provides:
//! - Key-path grammar, family pattern matching and entity key parsing
//! - A local key/value mirror with replay-on-subscribe subscriptions
//! - A reactive record collection with CREATE/UPDATE/DELETE triggers
//! - Display observers and the binders that feed them
//! - Overlay admin actions (lower third, keepers)
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! Everything runs on a single thread; the transport that carries requests
//! to the authority is plugged in through [`store::Transport`].

pub mod binder;
pub mod collection;
pub mod context;
pub mod error;
pub mod keypath;
pub mod model;
pub mod observer;
pub mod overlay;
pub mod store;

pub use binder::{ControlPanel, SettingsBinder, SkaterBinder};
pub use collection::{EventKind, ReactiveCollection, RecordEvent, TriggerId, TriggerOptions, UpsertOutcome};
pub use context::SyncContext;
pub use error::{CollectionError, KeyPathError, TransportError};
pub use keypath::{KeyParser, KeyPath, KeyPattern, ParsedKey};
pub use model::{Matcher, Record, Request};
pub use observer::Observer;
pub use store::{KeyPathStore, MemoryTransport, SubscriptionId, Transport};
