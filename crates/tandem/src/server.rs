//! `TandemServer` builder and server loop.
//!
//! This is the entry point for running a relay. It ties together the
//! layers: transport → session driver → matchmaker → rooms.

use std::sync::Arc;

use tandem_protocol::{Codec, JsonCodec};
use tandem_room::{Matchmaker, RoomConfig};
use tandem_transport::{
    Incoming, Transport, TransportError, WebSocketConfig, WebSocketTransport,
};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{ServerConfig, TandemError};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The
/// matchmaker sits behind a `Mutex`: seating and releasing connections
/// must not interleave.
pub(crate) struct ServerState<C: Codec + Clone> {
    pub(crate) matchmaker: Mutex<Matchmaker<C>>,
}

impl<C: Codec + Clone> ServerState<C> {
    pub(crate) fn new(matchmaker: Matchmaker<C>) -> Self {
        Self {
            matchmaker: Mutex::new(matchmaker),
        }
    }
}

/// Builder for configuring and starting a Tandem server.
///
/// # Example
///
/// ```rust,no_run
/// # async fn run() -> Result<(), tandem::TandemError> {
/// use tandem::TandemServer;
///
/// let server = TandemServer::builder()
///     .bind("0.0.0.0:8000")
///     .path("/ws/tetris")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TandemServerBuilder {
    bind_addr: String,
    websocket: WebSocketConfig,
    room_config: RoomConfig,
}

impl TandemServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            websocket: WebSocketConfig::default(),
            room_config: RoomConfig::default(),
        }
    }

    /// Takes address, path and origins from a [`ServerConfig`].
    pub fn config(mut self, config: &ServerConfig) -> Self {
        self.bind_addr = config.bind_addr();
        self.websocket = config.websocket();
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Only accepts WebSocket handshakes on this path.
    pub fn path(mut self, path: &str) -> Self {
        self.websocket.path = Some(path.to_string());
        self
    }

    /// Only accepts browser handshakes from these origins.
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.websocket.allowed_origins =
            origins.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener. Status notices are encoded as JSON.
    pub async fn build(self) -> Result<TandemServer<JsonCodec>, TandemError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the listener, encoding status notices with `codec`.
    pub async fn build_with_codec<C: Codec + Clone>(
        self,
        codec: C,
    ) -> Result<TandemServer<C>, TandemError> {
        let transport =
            WebSocketTransport::bind_with(&self.bind_addr, self.websocket)
                .await?;

        let matchmaker = Matchmaker::with_codec(self.room_config, codec);
        let state = Arc::new(ServerState::new(matchmaker));

        Ok(TandemServer { transport, state })
    }
}

impl Default for TandemServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Tandem relay.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TandemServer<C: Codec + Clone = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl TandemServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> TandemServerBuilder {
        TandemServerBuilder::new()
    }
}

impl<C: Codec + Clone> TandemServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a session task for each. The
    /// WebSocket handshake runs inside that task, so a peer that never
    /// finishes it only stalls itself. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), TandemError> {
        tracing::info!("Tandem relay running");

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        let conn = match incoming.handshake().await {
                            Ok(conn) => conn,
                            Err(TransportError::HandshakeRejected(reason)) => {
                                tracing::debug!(%peer, %reason, "handshake rejected");
                                return;
                            }
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
