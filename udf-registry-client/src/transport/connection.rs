//! Single info connection to a cluster node.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder};
use udf_registry_core::{InfoCodec, Result, UdfError};

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "info-{}", self.0)
    }
}

/// A request/response connection to the info port of one node.
#[derive(Debug)]
pub struct InfoConnection {
    id: ConnectionId,
    address: SocketAddr,
    stream: TcpStream,
    codec: InfoCodec,
    read_buffer: BytesMut,
    last_used_at: Instant,
}

impl InfoConnection {
    /// Wraps an established TCP stream.
    pub fn new(stream: TcpStream, address: SocketAddr) -> Self {
        Self {
            id: ConnectionId::new(),
            address,
            stream,
            codec: InfoCodec::new(),
            read_buffer: BytesMut::with_capacity(8192),
            last_used_at: Instant::now(),
        }
    }

    /// Returns the connection's unique identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address of this connection.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns when the last exchange completed.
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// Connects to `address`, failing with `UdfError::Transport` if the
    /// connection is not established within `connect_timeout`.
    pub async fn connect(address: SocketAddr, connect_timeout: Duration) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                UdfError::Transport(format!(
                    "connection to {} timed out after {:?}",
                    address, connect_timeout
                ))
            })?
            .map_err(|e| {
                UdfError::Transport(format!("failed to connect to {}: {}", address, e))
            })?;

        stream.set_nodelay(true).map_err(|e| {
            UdfError::Transport(format!("failed to set TCP_NODELAY: {}", e))
        })?;

        let connection = Self::new(stream, address);
        tracing::debug!(id = %connection.id, address = %address, "established info connection");
        Ok(connection)
    }

    /// Sends one command and waits for its response.
    ///
    /// A connection that returned an error must not be reused: the stream
    /// may hold a partial frame.
    pub async fn request(&mut self, command: &str) -> Result<String> {
        let mut buf = BytesMut::new();
        self.codec.encode(command, &mut buf)?;

        self.stream.write_all(&buf).await.map_err(|e| {
            UdfError::Transport(format!("failed to write to {}: {}", self.address, e))
        })?;

        let response = self.receive().await?;
        self.last_used_at = Instant::now();
        Ok(response)
    }

    async fn receive(&mut self) -> Result<String> {
        loop {
            if let Some(response) = self.codec.decode(&mut self.read_buffer)? {
                return Ok(response);
            }

            let bytes_read = self.stream.read_buf(&mut self.read_buffer).await.map_err(|e| {
                UdfError::Transport(format!("failed to read from {}: {}", self.address, e))
            })?;

            if bytes_read == 0 {
                return Err(UdfError::Transport(format!(
                    "connection to {} closed before a response arrived",
                    self.address
                )));
            }
        }
    }
}
