use crate::codec::MAX_PACKET_SIZE;
use thiserror::Error;
use tokio::time::error::Elapsed;

/// Possible errors for the package.
#[derive(Error, Debug)]
pub enum RconError {
    /// Returned if the client was either disconnected or has never been
    /// connected. The only error kind a [`PersistentClient`] retries.
    ///
    /// [`PersistentClient`]: crate::persistent::PersistentClient
    #[error("client is not connected")]
    ClientDisconnected,
    /// Returned if the server rejected the RCON password, or if a command was
    /// sent before the session authenticated. Never retried.
    #[error("authentication failed, rcon password is invalid")]
    AuthenticationFailed,
    /// The session was ready but the write did not go through.
    #[error("failed to send packet")]
    FailedToSendPacket(#[source] std::io::Error),
    /// Returned if the host is down or behind a firewall.
    #[error("host cannot be reached")]
    UnreachableHost(#[source] std::io::Error),
    /// The configured host:port did not resolve to a usable address.
    #[error("the network address is invalid")]
    NetworkAddressInvalid,
    /// I/O was attempted on a connection with no live stream.
    #[error("network stream is not available on client")]
    NetworkStreamNotAvailable,
    /// The encoded id + type + body payload exceeds the protocol limit.
    /// Never retried.
    #[error("packet is too large to send: {size} bytes (max {MAX_PACKET_SIZE})")]
    PacketTooLarge {
        /// Encoded payload size in bytes.
        size: usize,
    },
    /// Internal error used if the stream was successfully established, but
    /// there was a problem reading from the socket.
    #[error("cannot receive response from host")]
    ReceiveError(#[source] std::io::Error),
    /// Returned if a frame is too short to carry its id, type and terminators.
    #[error("packet header malformed: need {needed} bytes, have {have}")]
    MalformedPacketHeader {
        /// Minimum bytes a frame must carry.
        needed: usize,
        /// Bytes the frame actually carried.
        have: usize,
    },
    /// Returned if the body is mangled in some way (not valid text under the
    /// configured encoder).
    #[error("packet body malformed: {0}")]
    MalformedPacketBody(String),
    /// Returned if we received a packet that does not have a type known to us.
    #[error("unknown rcon packet type: {0}")]
    UnknownPacketType(i32),
    /// Returned if the server did not respond in time. Reported distinctly
    /// from disconnection: the session stays up and the command may still be
    /// answered late.
    #[error("timeout")]
    Timeout(#[from] Elapsed),
}
