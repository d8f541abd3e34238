//! Push substrate transport layer for Vigil.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the bidirectional push channel, plus the [`ConnectionContext`] each
//! connection carries from its upgrade request.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod context;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use context::ConnectionContext;
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced once a peer is upgraded.
    type Connection: Connection;
    /// A peer that has been accepted but not yet upgraded.
    type Pending: PendingConnection<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming peer.
    ///
    /// Returns as soon as the peer is accepted. Nothing is read from it
    /// until [`PendingConnection::upgrade`] runs.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;
}

/// An accepted peer whose upgrade handshake has not run yet.
pub trait PendingConnection: Send + 'static {
    /// The connection this peer becomes.
    type Connection: Connection;
    /// The error type for the handshake.
    type Error: std::error::Error + Send + Sync;

    /// Address of the remote peer.
    fn remote_addr(&self) -> SocketAddr;

    /// Runs the upgrade handshake and captures the request context.
    ///
    /// This waits on the peer, so callers bound it with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive bytes.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends data to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection with a close handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Tears the connection down without a close handshake and without
    /// writing any further frame.
    async fn abort(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the request context captured when the connection opened.
    fn context(&self) -> &ConnectionContext;
}
