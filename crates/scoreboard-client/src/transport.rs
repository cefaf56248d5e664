//! Channel-backed [`Transport`] connecting the synchronous engine to the
//! async session task.

use tokio::sync::mpsc;

use scoreboard_core::{Request, Transport, TransportError};

/// Instruction from the engine to the session driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Open the session (ignored once running).
    Connect,
    /// Forward a request to the authority.
    Request(Request),
}

/// Transport that queues instructions for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.tx
            .send(Outbound::Connect)
            .map_err(|_| TransportError::Closed)
    }

    fn send(&mut self, request: Request) -> Result<(), TransportError> {
        self.tx
            .send(Outbound::Request(request))
            .map_err(|_| TransportError::Closed)
    }
}
