//! One logical RCON session over one transport + codec pair.
//!
//! A [`RconClient`] walks the `Disconnected → Connected → Authenticated`
//! state machine and correlates pipelined requests with their responses.
//! The protocol gives no correlation mechanism beyond FIFO ordering: the
//! server answers commands in the order it received them, so every send
//! enqueues a resolver at the tail of a queue and every decoded packet
//! resolves the head. Session happenings fan out to subscribers as
//! [`RconEvent`]s on a broadcast channel that never blocks on slow readers.

use crate::codec::PacketCodec;
use crate::command::RconSender;
use crate::config::ServerConfig;
use crate::error::RconError;
use crate::packet::{Packet, PacketType};
use crate::transport::{Transport, TransportEvent};
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

/// Capacity of the event broadcast channel. Subscribers that fall this far
/// behind start losing the oldest events instead of stalling the receive
/// path.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Session notifications fanned out to any number of subscribers.
#[derive(Debug, Clone)]
pub enum RconEvent {
    /// The TCP session was established.
    Connected,
    /// The session ended; all pending commands were failed.
    Disconnected,
    /// A packet was decoded off the wire, before request correlation.
    Packet(Packet),
    /// A fault occurred away from any caller's send path.
    Error(Arc<RconError>),
}

/// An in-flight request awaiting exactly one matching response.
type PendingRequest = oneshot::Sender<Result<Packet, RconError>>;

/// State shared between the client handle and its dispatch task.
struct SessionState {
    connected: AtomicBool,
    authenticated: AtomicBool,
    pending: Mutex<VecDeque<PendingRequest>>,
    events: broadcast::Sender<RconEvent>,
}

impl SessionState {
    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every pending request with `ClientDisconnected` and empty the
    /// queue.
    fn fail_pending(&self) {
        let drained: Vec<PendingRequest> = self.lock_pending().drain(..).collect();
        for waiter in drained {
            let _ = waiter.send(Err(RconError::ClientDisconnected));
        }
    }

    /// Observability first, then correlation: subscribers see every decoded
    /// packet, and the oldest pending request (if any) is resolved with it.
    fn handle_packet(&self, packet: Packet) {
        let _ = self.events.send(RconEvent::Packet(packet.clone()));

        let waiter = self.lock_pending().pop_front();
        if let Some(waiter) = waiter {
            // the receiver may have timed out and gone away; that's fine
            let _ = waiter.send(Ok(packet));
        }
    }

    fn handle_disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.authenticated.store(false, Ordering::SeqCst);
        let _ = self.events.send(RconEvent::Disconnected);
        self.fail_pending();
    }
}

/// Asynchronous RCON session client.
///
/// Construct with [`RconClient::new`], then [`connect`](Self::connect) and
/// [`authenticate`](Self::authenticate) before sending commands. Most users
/// want the reconnecting [`PersistentClient`] instead, which drives this
/// type internally.
///
/// [`PersistentClient`]: crate::persistent::PersistentClient
///
/// ## Example
/// ```no_run
/// use palrcon::client::RconClient;
/// use palrcon::command::RconSender;
/// use palrcon::config::ServerConfig;
/// use std::error::Error;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn Error>> {
///     let client = RconClient::new(ServerConfig::new("127.0.0.1", 25575, "hunter2"));
///     client.connect().await?;
///     client.authenticate().await?;
///
///     let response = client.command("info").await?;
///     println!("{}", response.content());
///     Ok(())
/// }
/// ```
pub struct RconClient {
    config: ServerConfig,
    /// Serializer only; each connection's dispatch task owns its own
    /// deframing codec and accumulator.
    serializer: PacketCodec,
    state: Arc<SessionState>,
    transport: tokio::sync::Mutex<Option<Arc<Transport>>>,
    /// Keeps concurrent senders' enqueue + write atomic so the FIFO queue
    /// matches the order bytes actually left the socket.
    send_lock: tokio::sync::Mutex<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl RconClient {
    pub fn new(config: ServerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        RconClient {
            serializer: PacketCodec::new(config.encoder.clone()),
            state: Arc::new(SessionState {
                connected: AtomicBool::new(false),
                authenticated: AtomicBool::new(false),
                pending: Mutex::new(VecDeque::new()),
                events,
            }),
            transport: tokio::sync::Mutex::new(None),
            send_lock: tokio::sync::Mutex::new(()),
            dispatcher: Mutex::new(None),
            config,
        }
    }

    /// Subscribe to this session's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<RconEvent> {
        self.state.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.authenticated.load(Ordering::SeqCst)
    }

    /// Connected and authenticated: able to carry commands right now.
    pub fn is_ready(&self) -> bool {
        self.is_connected() && self.is_authenticated()
    }

    /// Establish the TCP session. A no-op when already connected.
    ///
    /// Anything in flight from a previous session is failed with
    /// [`RconError::ClientDisconnected`], and a fresh transport and codec are
    /// built so no stale bytes or pending state survive into the new
    /// connection.
    pub async fn connect(&self) -> Result<(), RconError> {
        if self.is_connected() {
            return Ok(());
        }

        self.state.fail_pending();
        self.state.authenticated.store(false, Ordering::SeqCst);

        let (transport, mut events) = Transport::new(&self.config.host, self.config.port);
        let transport = Arc::new(transport);
        transport.start().await?;

        let state = Arc::clone(&self.state);
        let mut codec = PacketCodec::new(self.config.encoder.clone());
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::Data(chunk) => {
                        for result in codec.received(&chunk) {
                            match result {
                                Ok(packet) => state.handle_packet(packet),
                                Err(e) => {
                                    let _ = state.events.send(RconEvent::Error(Arc::new(e)));
                                }
                            }
                        }
                    }
                    TransportEvent::Disconnected => {
                        state.handle_disconnect();
                        break;
                    }
                    TransportEvent::Error(e) => {
                        let _ = state.events.send(RconEvent::Error(Arc::new(e)));
                    }
                }
            }
        });

        if let Ok(mut dispatcher) = self.dispatcher.lock() {
            if let Some(old) = dispatcher.replace(handle) {
                old.abort();
            }
        }
        *self.transport.lock().await = Some(transport);

        self.state.connected.store(true, Ordering::SeqCst);
        let _ = self.state.events.send(RconEvent::Connected);
        debug!("connected to {}:{}", self.config.host, self.config.port);
        Ok(())
    }

    /// Log in with the configured password.
    ///
    /// Returns immediately when already authenticated, and refuses with
    /// [`RconError::ClientDisconnected`] when there is no session. The
    /// protocol reports bad credentials by answering with id `-1`; any other
    /// id authenticates the session.
    pub async fn authenticate(&self) -> Result<(), RconError> {
        if self.is_authenticated() {
            return Ok(());
        }
        if !self.is_connected() {
            return Err(RconError::ClientDisconnected);
        }

        trace!("authenticating");
        let response = self
            .send(Packet::authentication(&self.config.password))
            .await?;

        if response.id() == -1 {
            self.state.authenticated.store(false, Ordering::SeqCst);
            return Err(RconError::AuthenticationFailed);
        }

        self.state.authenticated.store(true, Ordering::SeqCst);
        debug!("authentication complete");
        Ok(())
    }

    /// Send one packet and await its correlated response, bounded by the
    /// configured command timeout.
    ///
    /// Fails fast with [`RconError::ClientDisconnected`] when there is no
    /// session, and with [`RconError::AuthenticationFailed`] when the session
    /// has not authenticated yet (authentication packets themselves are
    /// exempt). A timeout abandons the wait but deliberately leaves the
    /// pending entry queued: the server may still answer late, and a
    /// disconnect purges whatever remains.
    pub async fn send(&self, packet: Packet) -> Result<Packet, RconError> {
        if !self.is_connected() {
            return Err(RconError::ClientDisconnected);
        }
        if !self.is_authenticated() && packet.kind() != PacketType::Authentication {
            return Err(RconError::AuthenticationFailed);
        }

        let frame = self.serializer.serialize(&packet)?;
        let transport = self
            .transport
            .lock()
            .await
            .clone()
            .ok_or(RconError::ClientDisconnected)?;

        let (tx, rx) = oneshot::channel();
        {
            let _ordered = self.send_lock.lock().await;
            self.state.lock_pending().push_back(tx);

            trace!("sending packet: {packet}");
            if let Err(e) = transport.write(&frame).await {
                // the request never reached the wire; retract its waiter
                self.state.lock_pending().pop_back();
                return Err(e);
            }
        }

        match tokio::time::timeout(self.config.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            // resolver dropped with the session before answering
            Ok(Err(_)) => Err(RconError::ClientDisconnected),
            Err(elapsed) => Err(RconError::Timeout(elapsed)),
        }
    }

    /// Tear the session down. Pending requests are failed, the transport is
    /// stopped, and calling this more than once is harmless.
    pub async fn close(&self) {
        self.state.fail_pending();
        self.state.connected.store(false, Ordering::SeqCst);
        self.state.authenticated.store(false, Ordering::SeqCst);

        if let Some(transport) = self.transport.lock().await.take() {
            // emits the disconnected event; the dispatch task drains it and
            // exits on its own
            transport.stop().await;
        }
    }
}

impl Drop for RconClient {
    fn drop(&mut self) {
        if let Ok(mut dispatcher) = self.dispatcher.lock() {
            if let Some(handle) = dispatcher.take() {
                handle.abort();
            }
        }
    }
}

impl RconSender for RconClient {
    async fn send(&self, packet: Packet) -> Result<Packet, RconError> {
        RconClient::send(self, packet).await
    }
}
