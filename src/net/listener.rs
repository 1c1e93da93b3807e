//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind the wildcard host on the requested port (0 = ephemeral)
//! - Report the port actually assigned
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Host every listener binds to.
pub const WILDCARD_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept connection.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
}

/// Where to listen. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenSpec {
    port: u16,
}

impl ListenSpec {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Port as requested by the caller (may be 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(WILDCARD_HOST, self.port)
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind the wildcard host on the requested port.
    ///
    /// Failure is terminal for the caller: nothing is retried here.
    pub async fn bind(spec: ListenSpec, max_connections: usize) -> Result<Self, ListenerError> {
        let addr = spec.socket_addr();

        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { addr, source })?;

        tracing::info!(
            address = %local_addr,
            requested_port = spec.port(),
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            local_addr,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        // The semaphore is owned by the listener and never closed.
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| {
                ListenerError::Accept(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "connection limit closed",
                ))
            })?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// The address actually bound (carries the assigned port for ephemeral binds).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool,
/// including when the connection task is aborted.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
