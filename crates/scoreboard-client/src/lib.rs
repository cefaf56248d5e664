//! # scoreboard-client
//!
//! WebSocket session driver for the scoreboard sync engine.
//!
//! Enable features based on target platform:
//! - `tokio-runtime` (default) - tokio + tokio-tungstenite session

pub mod config;
#[cfg(feature = "tokio-runtime")]
pub mod session;
#[cfg(feature = "tokio-runtime")]
pub mod transport;

pub use config::{ClientConfig, ConfigError};
#[cfg(feature = "tokio-runtime")]
pub use session::{ClientError, Session};
#[cfg(feature = "tokio-runtime")]
pub use transport::{ChannelTransport, Outbound};

pub use scoreboard_core::SyncContext;

/// Build a context wired to a fresh session.
///
/// Bind observers and skaters on the context, call
/// [`SyncContext::start`], then drive [`Session::run`].
#[cfg(feature = "tokio-runtime")]
pub fn session(config: ClientConfig) -> (SyncContext, Session) {
    let (transport, outbound) = ChannelTransport::new();
    let ctx = SyncContext::new(Box::new(transport));
    (ctx, Session::new(config, outbound))
}
