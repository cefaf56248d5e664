//! WebSocket session with the scoreboard authority.
//!
//! The session handles:
//! - Waiting for the engine's first connect request
//! - Dialing, then restoring subscriptions via `auto_register`
//! - Applying state frames to the store mirror
//! - Forwarding registrations and writes
//! - Keep-alive pings and reconnects
//!
//! The engine is single-threaded, so the session borrows the context only
//! while dispatching a frame and never across an await point. The future
//! returned by [`Session::run`] is not `Send`; drive it on the current task.

use std::cell::RefCell;
use std::rc::Rc;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use scoreboard_core::SyncContext;
use scoreboard_protocol::{
    decode_server_message, encode_client_message, ClientMessage, CodecError, ServerMessage,
};

use crate::config::ClientConfig;
use crate::transport::Outbound;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Gave up after {0} reconnect attempt(s)")]
    ReconnectLimit(u32),
}

/// How a connection ended.
enum Disconnect {
    /// The engine went away; stop for good.
    Shutdown,
    /// The authority closed or dropped the socket; reconnect.
    Lost,
}

pub struct Session {
    config: ClientConfig,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl Session {
    pub fn new(config: ClientConfig, outbound: mpsc::UnboundedReceiver<Outbound>) -> Self {
        Self { config, outbound }
    }

    /// Drive the session until the engine drops its transport or the
    /// reconnect limit is reached. The context passed here keeps the
    /// transport alive, so callers normally stop the session by dropping
    /// this future.
    pub async fn run(mut self, ctx: Rc<RefCell<SyncContext>>) -> Result<(), ClientError> {
        if !self.wait_for_connect().await {
            return Ok(());
        }

        let mut attempts = 0u32;
        loop {
            match connect_async(self.config.url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Connected to {}", self.config.url);
                    attempts = 0;
                    {
                        let mut ctx = ctx.borrow_mut();
                        ctx.store_mut().mark_connected();
                        ctx.store_mut().auto_register();
                    }

                    let result = self.pump(ws, &ctx).await;
                    ctx.borrow_mut().store_mut().mark_disconnected();
                    match result {
                        Ok(Disconnect::Shutdown) => return Ok(()),
                        Ok(Disconnect::Lost) => info!("Connection to {} lost", self.config.url),
                        Err(e) => warn!("Connection to {} failed: {}", self.config.url, e),
                    }
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", self.config.url, e);
                }
            }

            attempts += 1;
            if let Some(max) = self.config.max_reconnect_attempts {
                if attempts > max {
                    error!("Giving up on {}", self.config.url);
                    return Err(ClientError::ReconnectLimit(max));
                }
            }
            if !self.wait_reconnect().await {
                return Ok(());
            }
        }
    }

    /// Block until the engine asks to connect. Returns false if the engine
    /// went away first.
    async fn wait_for_connect(&mut self) -> bool {
        loop {
            match self.outbound.recv().await {
                Some(Outbound::Connect) => return true,
                Some(Outbound::Request(request)) => {
                    warn!("Not connected, dropping {:?}", request);
                }
                None => return false,
            }
        }
    }

    /// Sleep out the reconnect delay, dropping writes issued meanwhile.
    async fn wait_reconnect(&mut self) -> bool {
        let delay = sleep(self.config.reconnect_delay());
        tokio::pin!(delay);
        debug!("Reconnecting in {:?}", self.config.reconnect_delay());

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                outbound = self.outbound.recv() => match outbound {
                    Some(Outbound::Request(request)) => {
                        warn!("Not connected, dropping {:?}", request);
                    }
                    Some(Outbound::Connect) => {}
                    None => return false,
                },
            }
        }
    }

    async fn pump(&mut self, ws: WsStream, ctx: &RefCell<SyncContext>) -> Result<Disconnect, ClientError> {
        let (mut ws_tx, mut ws_rx) = ws.split();
        let period = self.config.ping_interval();
        let mut ping = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                // Frames from the authority
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => dispatch(&text, ctx),
                        Some(Ok(Message::Binary(_))) => warn!("{}", CodecError::BinaryFrame),
                        Some(Ok(Message::Ping(data))) => {
                            ws_tx.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Authority closed the connection");
                            return Ok(Disconnect::Lost);
                        }
                        Some(Err(e)) => return Err(e.into()),
                        _ => {} // Ignore other message types
                    }
                }

                // Requests from the engine
                outbound = self.outbound.recv() => {
                    match outbound {
                        Some(Outbound::Request(request)) => {
                            let text = encode_client_message(&ClientMessage::from(request))?;
                            trace!("Sending {}", text);
                            ws_tx.send(Message::Text(text)).await?;
                        }
                        Some(Outbound::Connect) => {} // already connected
                        None => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            return Ok(Disconnect::Shutdown);
                        }
                    }
                }

                _ = ping.tick() => {
                    let text = encode_client_message(&ClientMessage::Ping)?;
                    ws_tx.send(Message::Text(text)).await?;
                }
            }
        }
    }
}

/// Apply one authority frame to the engine.
fn dispatch(text: &str, ctx: &RefCell<SyncContext>) {
    let msg = match decode_server_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Ignoring frame: {}", e);
            return;
        }
    };

    match msg {
        ServerMessage::State(update) => {
            let Ok(mut ctx) = ctx.try_borrow_mut() else {
                error!("Context busy, dropping {} change(s)", update.state.len());
                return;
            };
            debug!("Applying {} change(s)", update.state.len());
            ctx.store_mut().apply_state(update.into_changes());
        }
        ServerMessage::Error(e) => warn!("Authority error: {}", e.error),
        ServerMessage::Pong(_) => trace!("Pong"),
    }
}
