//! Stream transport to the viewer
//!
//! Opens the TCP or Unix-socket connection and performs the banner
//! handshake: read the server's line through the first LF, answer with the
//! client banner, and the channel is up. After the handshake the transport
//! is write-only from the core's perspective: the viewer acknowledges every
//! frame with two bytes, which [`AckReader::drain`] reads and discards so
//! the kernel receive buffer can never stall writes. Dead peers are caught
//! by TCP keepalive, not by read timeouts.
//!
//! # Handshake
//!
//! ```text
//! server -> client   one line, LF-terminated (the server banner)
//! client -> server   one ASCII line, LF-terminated (the client banner)
//! ```

use std::io;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp;
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::{unix, UnixStream};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Banner identifying this client, sent after the server banner
pub const CLIENT_BANNER: &str = concat!("spyglass-client/", env!("CARGO_PKG_VERSION"), "\n");

/// Longest server banner accepted before the handshake is abandoned
const BANNER_LIMIT: usize = 1024;

/// Keepalive idle time probing for dead peers
const KEEPALIVE_IDLE: Duration = Duration::from_secs(30);

/// Where the viewer listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Endpoint {
    Tcp { host: String, port: u16 },
    #[cfg(unix)]
    Unix { path: PathBuf },
}

impl Endpoint {
    /// Resolve the endpoint from the configuration
    ///
    /// A configured pipe takes precedence over TCP; `pipe_path` overrides
    /// the default location under the system temp directory.
    pub(crate) fn from_config(config: &ClientConfig) -> Self {
        #[cfg(unix)]
        {
            if let Some(path) = &config.pipe_path {
                return Endpoint::Unix { path: path.clone() };
            }
            if let Some(name) = &config.pipe {
                return Endpoint::Unix {
                    path: std::env::temp_dir().join(format!("{name}.sock")),
                };
            }
        }
        Endpoint::Tcp {
            host: config.host.clone(),
            port: config.port,
        }
    }

    /// Human-readable target for logs and errors
    pub(crate) fn describe(&self) -> String {
        match self {
            Endpoint::Tcp { host, port } => format!("{host}:{port}"),
            #[cfg(unix)]
            Endpoint::Unix { path } => path.display().to_string(),
        }
    }
}

#[derive(Debug)]
enum WriteHalf {
    Tcp(tcp::OwnedWriteHalf),
    #[cfg(unix)]
    Unix(unix::OwnedWriteHalf),
}

#[derive(Debug)]
enum ReadHalf {
    Tcp(tcp::OwnedReadHalf),
    #[cfg(unix)]
    Unix(unix::OwnedReadHalf),
}

/// A connected, handshaken transport
#[derive(Debug)]
pub(crate) struct Transport {
    writer: FrameWriter,
    reader: AckReader,
    server_banner: String,
}

impl Transport {
    /// Connect and handshake under `connect_timeout`
    pub(crate) async fn connect(
        endpoint: &Endpoint,
        connect_timeout: Duration,
    ) -> Result<Transport, ClientError> {
        let target = endpoint.describe();
        match tokio::time::timeout(connect_timeout, Self::open(endpoint, &target)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::ConnectTimeout {
                target,
                timeout_ms: connect_timeout.as_millis() as u64,
            }),
        }
    }

    async fn open(endpoint: &Endpoint, target: &str) -> Result<Transport, ClientError> {
        match endpoint {
            Endpoint::Tcp { host, port } => {
                let mut stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| ClientError::Connect {
                        target: target.into(),
                        source: e,
                    })?;
                configure_tcp(&stream);

                let server_banner = handshake(&mut stream, target).await?;
                let (read, write) = stream.into_split();
                Ok(Transport {
                    writer: FrameWriter {
                        half: WriteHalf::Tcp(write),
                    },
                    reader: AckReader {
                        half: ReadHalf::Tcp(read),
                    },
                    server_banner,
                })
            }
            #[cfg(unix)]
            Endpoint::Unix { path } => {
                let mut stream =
                    UnixStream::connect(path)
                        .await
                        .map_err(|e| ClientError::Connect {
                            target: target.into(),
                            source: e,
                        })?;

                let server_banner = handshake(&mut stream, target).await?;
                let (read, write) = stream.into_split();
                Ok(Transport {
                    writer: FrameWriter {
                        half: WriteHalf::Unix(write),
                    },
                    reader: AckReader {
                        half: ReadHalf::Unix(read),
                    },
                    server_banner,
                })
            }
        }
    }

    pub(crate) fn server_banner(&self) -> &str {
        &self.server_banner
    }

    /// Split into the write path, the ack drain, and the banner
    pub(crate) fn into_parts(self) -> (FrameWriter, AckReader, String) {
        (self.writer, self.reader, self.server_banner)
    }
}

/// Write path of an established connection
#[derive(Debug)]
pub(crate) struct FrameWriter {
    half: WriteHalf,
}

impl FrameWriter {
    /// Write one complete frame and flush it
    pub(crate) async fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        match &mut self.half {
            WriteHalf::Tcp(half) => {
                half.write_all(frame).await?;
                half.flush().await
            }
            #[cfg(unix)]
            WriteHalf::Unix(half) => {
                half.write_all(frame).await?;
                half.flush().await
            }
        }
    }

    /// Graceful end-of-stream bounded by `grace`, then forceful teardown
    ///
    /// The socket is destroyed on drop either way; the timer only bounds
    /// how long the FIN handshake may take.
    pub(crate) async fn finish(mut self, grace: Duration) {
        let shutdown = async {
            match &mut self.half {
                WriteHalf::Tcp(half) => half.shutdown().await,
                #[cfg(unix)]
                WriteHalf::Unix(half) => half.shutdown().await,
            }
        };
        if tokio::time::timeout(grace, shutdown).await.is_err() {
            tracing::debug!("graceful shutdown timed out, destroying socket");
        }
    }
}

/// Read path of an established connection
///
/// The viewer sends a 2-byte acknowledgement per frame; nothing else ever
/// arrives. Draining them is mandatory: an ignored receive buffer
/// eventually exerts back-pressure on the peer and stalls our writes.
#[derive(Debug)]
pub(crate) struct AckReader {
    half: ReadHalf,
}

impl AckReader {
    /// Read and discard until the peer closes or the connection errors
    pub(crate) async fn drain(mut self) {
        let mut buf = [0u8; 256];
        loop {
            let read = match &mut self.half {
                ReadHalf::Tcp(half) => half.read(&mut buf).await,
                #[cfg(unix)]
                ReadHalf::Unix(half) => half.read(&mut buf).await,
            };
            match read {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        }
    }
}

/// Read the LF-terminated server banner, then answer with ours
async fn handshake<S>(stream: &mut S, target: &str) -> Result<String, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(256);
    let banner = loop {
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            break String::from_utf8_lossy(&buf[..=pos]).into_owned();
        }
        if buf.len() >= BANNER_LIMIT {
            return Err(ClientError::BannerTooLong {
                limit: BANNER_LIMIT,
            });
        }
        let read = stream
            .read_buf(&mut buf)
            .await
            .map_err(|e| ClientError::Connect {
                target: target.into(),
                source: e,
            })?;
        if read == 0 {
            return Err(ClientError::HandshakeEof);
        }
    };

    // Anything past the LF would be early acknowledgements; they are
    // discarded here like everywhere else.
    stream
        .write_all(CLIENT_BANNER.as_bytes())
        .await
        .map_err(|e| ClientError::Connect {
            target: target.into(),
            source: e,
        })?;
    stream.flush().await.map_err(|e| ClientError::Connect {
        target: target.into(),
        source: e,
    })?;

    Ok(banner)
}

/// Disable Nagle and enable keepalive; both best-effort
fn configure_tcp(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
    }

    let sock_ref = SockRef::from(stream);
    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_IDLE);
    #[cfg(target_os = "linux")]
    let keepalive = keepalive.with_interval(KEEPALIVE_IDLE);
    if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
        tracing::debug!(error = %e, "failed to set TCP keepalive");
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;
