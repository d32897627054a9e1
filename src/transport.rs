//! Raw TCP byte pipe with lifecycle events.
//!
//! A [`Transport`] owns one socket and one background task that drains it.
//! Everything it learns flows upward as [`TransportEvent`]s on an unbounded
//! channel: raw data chunks, the single disconnect transition, and receive
//! path faults. It knows nothing about frames; chunk boundaries are whatever
//! the kernel handed us and reassembly belongs to the codec.

use crate::error::RconError;
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// How much we ask the socket for in one read. A read that fills the buffer
/// does not imply a complete logical message, and a short read does not
/// imply the message ended; only the codec can tell.
const READ_BUFFER_SIZE: usize = 4096;

/// Raw notifications pushed up by the transport.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// A chunk of bytes arrived, trimmed to the exact read length.
    Data(Vec<u8>),
    /// The socket transitioned to closed. Fired exactly once per transport.
    Disconnected,
    /// The receive path hit a fault.
    Error(RconError),
}

pub(crate) struct Transport {
    host: String,
    port: u16,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    events: UnboundedSender<TransportEvent>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Create an unconnected transport and the receiving end of its event
    /// stream.
    pub(crate) fn new(host: &str, port: u16) -> (Self, UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Transport {
            host: host.to_owned(),
            port,
            writer: tokio::sync::Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            events,
            reader: std::sync::Mutex::new(None),
        };
        (transport, rx)
    }

    /// Open the TCP connection and start the background receive loop.
    ///
    /// A refused or unreachable endpoint is an ordinary typed failure, not a
    /// crash; an endpoint that does not resolve at all is
    /// [`RconError::NetworkAddressInvalid`].
    pub(crate) async fn start(&self) -> Result<(), RconError> {
        let addr = lookup_host((self.host.as_str(), self.port))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(RconError::NetworkAddressInvalid)?;

        let stream = TcpStream::connect(addr)
            .await
            .map_err(RconError::UnreachableHost)?;

        trace!("opened tcp stream to {}:{}", self.host, self.port);

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        self.connected.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(read_loop(
            read_half,
            self.events.clone(),
            Arc::clone(&self.connected),
            Arc::clone(&self.closed),
        ));
        if let Ok(mut reader) = self.reader.lock() {
            *reader = Some(handle);
        }
        Ok(())
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send bytes on the open stream.
    pub(crate) async fn write(&self, bytes: &[u8]) -> Result<(), RconError> {
        if !self.is_connected() {
            self.stop().await;
            return Err(RconError::ClientDisconnected);
        }

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or(RconError::NetworkStreamNotAvailable)?;

        match writer.write_all(bytes).await {
            Ok(()) => {
                trace!("wrote {} bytes", bytes.len());
                Ok(())
            }
            Err(e) => Err(RconError::FailedToSendPacket(e)),
        }
    }

    /// Close the stream and socket. Idempotent; errors while closing are
    /// swallowed, and the disconnected event fires exactly once no matter
    /// how the transport came down.
    pub(crate) async fn stop(&self) {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }

        emit_disconnected(&self.events, &self.closed);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}

/// Continuously read from the socket and push chunks upward.
///
/// Zero bytes read means the remote closed; a receive fault is reported and
/// then the loop stops. Either way the loop, not its owner, flips the
/// transport to disconnected on the way out.
async fn read_loop(
    mut reader: OwnedReadHalf,
    events: UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                trace!("received {n} bytes");
                if events.send(TransportEvent::Data(buffer[..n].to_vec())).is_err() {
                    // nobody is listening anymore
                    break;
                }
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(RconError::ReceiveError(e)));
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    emit_disconnected(&events, &closed);
}

/// Raise the disconnected signal exactly once per transition to closed.
fn emit_disconnected(events: &UnboundedSender<TransportEvent>, closed: &AtomicBool) {
    if !closed.swap(true, Ordering::SeqCst) {
        let _ = events.send(TransportEvent::Disconnected);
    }
}
