//! Transport abstraction layer for Tandem.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the relay
//! consumes. A connection is an ordered, bidirectional stream of text
//! messages plus a "this connection ended" signal ([`Event::Closed`]).
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    IncomingWebSocket, WebSocketConfig, WebSocketConnection, WebSocketTransport,
};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
///
/// This is the identity a room uses to find and remove a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
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

/// The next thing that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The peer sent a text message.
    Data(String),
    /// The peer went away. No further events follow.
    Closed,
}

/// Accepts new incoming connections.
///
/// Accepting is split in two: [`accept`](Transport::accept) only waits for
/// a peer to connect, and [`Incoming::handshake`] finishes the opening
/// handshake. A slow peer therefore only holds up its own task, never the
/// accept loop.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// A connected peer that has not completed its handshake.
    type Incoming: Incoming<Connection = Self::Connection>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next peer to connect.
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;
}

/// A connected peer whose opening handshake is still pending.
pub trait Incoming: Send + 'static {
    /// The connection produced once the handshake succeeds.
    type Connection: Connection;
    /// The error type for a failed or refused handshake.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs the opening handshake.
    fn handshake(
        self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A single connection that can send and receive text messages.
///
/// The futures are required to be `Send` so a connection can be driven
/// from spawned Tokio tasks.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes one text message to the remote peer.
    ///
    /// Fails if the peer is gone.
    fn send(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Waits for the next event from the remote peer.
    fn recv(&self) -> impl Future<Output = Result<Event, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_ordering_follows_raw_value() {
        assert!(ConnectionId::new(1) < ConnectionId::new(2));
        assert_eq!(ConnectionId::new(3), ConnectionId::new(3));
    }

    #[test]
    fn test_event_data_keeps_payload_verbatim() {
        let event = Event::Data("{\"board\": [0, 1]}".to_string());
        assert_eq!(event, Event::Data("{\"board\": [0, 1]}".into()));
        assert_ne!(event, Event::Closed);
    }
}
