//! Reconnecting wrapper that presents an always-available send surface.
//!
//! A [`PersistentClient`] never holds a connection it does not need: the
//! first send (or an explicit [`preconnect`](PersistentClient::preconnect))
//! establishes and authenticates a session, and a session lost mid-command
//! is rebuilt transparently, up to the configured retry budget. Retry policy
//! lives here and only here; the layers below never retry themselves.

use crate::client::{RconClient, RconEvent};
use crate::command::RconSender;
use crate::config::ServerConfig;
use crate::error::RconError;
use crate::packet::Packet;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of this layer's own event stream.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A lazily connecting, automatically reconnecting RCON client.
///
/// ## Example
/// ```no_run
/// use palrcon::command::RconSender;
/// use palrcon::config::ServerConfig;
/// use palrcon::persistent::PersistentClient;
/// use std::error::Error;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn Error>> {
///     let client = PersistentClient::new(ServerConfig::new("127.0.0.1", 25575, "hunter2"));
///
///     // no connection exists yet; the first command brings one up
///     let players = client.show_players().await?;
///     println!("{}", players.content());
///     Ok(())
/// }
/// ```
pub struct PersistentClient {
    config: ServerConfig,
    client: tokio::sync::Mutex<Option<Arc<RconClient>>>,
    events: broadcast::Sender<RconEvent>,
}

impl PersistentClient {
    pub fn new(config: ServerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        PersistentClient {
            config,
            client: tokio::sync::Mutex::new(None),
            events,
        }
    }

    /// Subscribe to the event streams of every session this client runs,
    /// present and future.
    pub fn subscribe(&self) -> broadcast::Receiver<RconEvent> {
        self.events.subscribe()
    }

    /// Whether a ready session is currently held.
    pub async fn is_ready(&self) -> bool {
        self.client
            .lock()
            .await
            .as_ref()
            .is_some_and(|client| client.is_ready())
    }

    /// Connect and authenticate without sending anything. Mostly useful as a
    /// credential and reachability probe.
    pub async fn preconnect(&self) -> bool {
        self.ensure_client().await.is_ok()
    }

    /// Send a packet, bringing a session up first if none is ready.
    ///
    /// Only a session lost mid-command is retried, and only up to the
    /// configured maximum; failed credentials and oversized packets fail the
    /// same way every time, so they propagate immediately.
    pub async fn send(&self, packet: Packet) -> Result<Packet, RconError> {
        let mut attempt = 0u32;
        loop {
            let client = self.ensure_client().await?;

            match client.send(packet.clone()).await {
                Ok(response) => return Ok(response),
                Err(e @ RconError::ClientDisconnected) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "lost connection mid-command, retrying ({attempt}/{})",
                        self.config.max_retries
                    );
                    let _ = self.events.send(RconEvent::Error(Arc::new(e)));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Tear down the held session, if any. The next send reconnects.
    pub async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            client.close().await;
        }
    }

    /// Hand back the held client when it is ready, or replace it with a
    /// freshly connected and authenticated one.
    ///
    /// The swap happens under the lock, so callers only ever observe either
    /// the old session or a fully ready new one, never a half-built client.
    async fn ensure_client(&self) -> Result<Arc<RconClient>, RconError> {
        let mut slot = self.client.lock().await;

        if let Some(client) = slot.as_ref() {
            if client.is_ready() {
                return Ok(Arc::clone(client));
            }
        }

        if let Some(stale) = slot.take() {
            stale.close().await;
        }

        let client = Arc::new(RconClient::new(self.config.clone()));

        // surface the new session's events through this layer's own stream
        let mut session_events = client.subscribe();
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                match session_events.recv().await {
                    Ok(event) => {
                        let _ = events.send(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Err(e) = client.connect().await {
            debug!("connect failed: {e}");
            client.close().await;
            return Err(RconError::ClientDisconnected);
        }

        if let Err(e) = client.authenticate().await {
            // the socket is up but the session is useless; keep it out of
            // the slot so the next attempt starts clean
            client.close().await;
            return Err(e);
        }

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }
}

impl RconSender for PersistentClient {
    async fn send(&self, packet: Packet) -> Result<Packet, RconError> {
        PersistentClient::send(self, packet).await
    }
}
