//! A scripted in-process RCON server for session-level tests.
#![allow(dead_code)]

use palrcon::codec::PacketCodec;
use palrcon::encoding::default_encoder;
use palrcon::packet::{Packet, PacketType};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "hunter2";

/// Behavior knobs for a [`MockServer`].
pub struct MockOptions {
    pub password: String,
    /// Connections numbered `1..=n` are closed without a reply when their
    /// first exec command arrives, simulating a server that dies
    /// mid-command.
    pub drop_execs_for_first: usize,
}

impl Default for MockOptions {
    fn default() -> Self {
        MockOptions {
            password: PASSWORD.to_owned(),
            drop_execs_for_first: 0,
        }
    }
}

/// Accepts real TCP connections and speaks just enough of the protocol to
/// drive the client: authentication replies echo the request id (or `-1` on
/// a bad password), and exec commands are answered with `echo:<content>`.
///
/// Two command strings are magic: `stall` is swallowed without a reply and
/// `drop` closes the connection on the spot.
pub struct MockServer {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockOptions::default()).await
    }

    pub async fn spawn_with(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let options = Arc::new(options);

        let counter = Arc::clone(&connections);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let connection = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::spawn(serve(stream, Arc::clone(&options), connection));
            }
        });

        MockServer {
            addr,
            connections,
            handle,
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// How many connections the server has accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, options: Arc<MockOptions>, connection: usize) {
    let mut codec = PacketCodec::new(default_encoder());
    let mut buffer = [0u8; 4096];

    loop {
        let read = match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let requests: Vec<Packet> = codec
            .received(&buffer[..read])
            .into_iter()
            .filter_map(Result::ok)
            .collect();

        for request in requests {
            match request.kind() {
                PacketType::Authentication => {
                    let id = if request.content() == options.password {
                        request.id()
                    } else {
                        -1
                    };
                    let reply = Packet::new(id, PacketType::ServerResponse, "");
                    if write_packet(&mut stream, &codec, &reply).await.is_err() {
                        return;
                    }
                }
                PacketType::ExecCommand => {
                    if connection <= options.drop_execs_for_first {
                        return;
                    }
                    match request.content() {
                        "stall" => {}
                        "drop" => return,
                        content => {
                            let reply = Packet::new(
                                request.id(),
                                PacketType::ServerResponse,
                                format!("echo:{content}"),
                            );
                            if write_packet(&mut stream, &codec, &reply).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                PacketType::ServerResponse => {}
            }
        }
    }
}

async fn write_packet(
    stream: &mut TcpStream,
    codec: &PacketCodec,
    packet: &Packet,
) -> std::io::Result<()> {
    let frame = codec.serialize(packet).unwrap();
    stream.write_all(&frame).await
}
