//! Pure Rust async client for the Source-style [RCON protocol](https://developer.valvesoftware.com/wiki/Source_RCON_Protocol)
//! spoken by Palworld dedicated servers.
//!
//! The crate is built in layers: a raw TCP [`transport`] with a background
//! receive loop, a [`codec`] that reassembles the byte stream into frames, a
//! [`client`] that drives the connect → authenticate → ready session and
//! correlates pipelined requests FIFO, and a [`persistent`] wrapper that
//! adds lazy connection and bounded reconnect-retry on top. Game commands
//! are plain text; the [`command`] module formats them and the
//! [`RconSender`] trait exposes them on both client types.
//!
//! ## Example
//! ```no_run
//! use palrcon::{PersistentClient, RconSender, ServerConfig};
//! use std::error::Error;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let client = PersistentClient::new(ServerConfig::new("127.0.0.1", 25575, "hunter2"));
//!
//!     let response = client.broadcast("server restarting in 5 minutes").await?;
//!     println!("{}", response.content());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod encoding;
pub mod error;
pub mod packet;
pub mod persistent;
mod transport;

pub use client::{RconClient, RconEvent};
pub use command::RconSender;
pub use config::ServerConfig;
pub use error::RconError;
pub use packet::{Packet, PacketType};
pub use persistent::PersistentClient;
