//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    Connection, ConnectionId, Event, Incoming, Transport, TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Handshake policy for a [`WebSocketTransport`].
#[derive(Debug, Clone, Default)]
pub struct WebSocketConfig {
    /// Request path clients must connect to. `None` accepts any path.
    pub path: Option<String>,

    /// Origins browsers may connect from. Empty accepts every origin.
    ///
    /// Requests without an `Origin` header are not browser requests and
    /// are always accepted.
    pub allowed_origins: Vec<String>,
}

impl WebSocketConfig {
    /// Checks an opening handshake against this policy.
    fn check(&self, req: &Request) -> Result<(), (StatusCode, String)> {
        if let Some(path) = &self.path {
            if req.uri().path() != path {
                return Err((
                    StatusCode::NOT_FOUND,
                    format!("unknown path {}", req.uri().path()),
                ));
            }
        }

        if self.allowed_origins.is_empty() {
            return Ok(());
        }
        match req.headers().get("origin").map(|v| v.to_str()) {
            None => Ok(()),
            Some(Ok(origin))
                if self.allowed_origins.iter().any(|o| o == origin) =>
            {
                Ok(())
            }
            Some(Ok(origin)) => Err((
                StatusCode::FORBIDDEN,
                format!("origin {origin} not allowed"),
            )),
            Some(Err(_)) => Err((
                StatusCode::FORBIDDEN,
                "malformed origin header".to_string(),
            )),
        }
    }
}

/// How long a connected peer has to complete its opening handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: Arc<WebSocketConfig>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport that accepts every handshake.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, WebSocketConfig::default()).await
    }

    /// Binds a new WebSocket transport with a handshake policy.
    pub async fn bind_with(
        addr: &str,
        config: WebSocketConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(
            addr,
            path = config.path.as_deref().unwrap_or("*"),
            "WebSocket transport listening"
        );
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Incoming = IncomingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "TCP connection accepted");

        Ok(IncomingWebSocket {
            stream,
            addr,
            config: Arc::clone(&self.config),
        })
    }
}

/// A TCP peer whose WebSocket handshake has not run yet.
pub struct IncomingWebSocket {
    stream: TcpStream,
    addr: SocketAddr,
    config: Arc<WebSocketConfig>,
}

impl IncomingWebSocket {
    /// The peer's socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Incoming for IncomingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn handshake(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            stream,
            addr,
            config,
        } = self;

        let mut rejected: Option<String> = None;
        let callback = |req: &Request, resp: Response| {
            match config.check(req) {
                Ok(()) => Ok(resp),
                Err((status, reason)) => {
                    let mut err = ErrorResponse::new(Some(reason.clone()));
                    *err.status_mut() = status;
                    rejected = Some(reason);
                    Err(err)
                }
            }
        };

        let result = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            tokio_tungstenite::accept_hdr_async(stream, callback),
        )
        .await;
        let ws = match result {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(match rejected {
                    Some(reason) => TransportError::HandshakeRejected(reason),
                    None => TransportError::AcceptFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        e,
                    )),
                });
            }
            Err(_) => {
                tracing::debug!(%addr, "handshake timed out");
                return Err(TransportError::AcceptFailed(
                    std::io::ErrorKind::TimedOut.into(),
                ));
            }
        };

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        // Split so a pending recv never blocks writes from the room.
        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, text: &str) -> Result<(), Self::Error> {
        let msg = Message::Text(text.to_owned().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Event, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Event::Data(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    match String::from_utf8(data.to_vec()) {
                        Ok(text) => return Ok(Event::Data(text)),
                        Err(_) => {
                            tracing::debug!(
                                id = %self.id,
                                "skipping non-UTF-8 binary frame"
                            );
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(Event::Closed),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, origin: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(path);
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_default_config_accepts_anything() {
        let config = WebSocketConfig::default();
        assert!(config.check(&request("/anything", Some("http://evil"))).is_ok());
    }

    #[test]
    fn test_path_mismatch_is_not_found() {
        let config = WebSocketConfig {
            path: Some("/ws/tetris".into()),
            ..WebSocketConfig::default()
        };
        assert!(config.check(&request("/ws/tetris", None)).is_ok());
        let (status, _) = config.check(&request("/ws/chess", None)).unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_origin_allow_list() {
        let config = WebSocketConfig {
            path: None,
            allowed_origins: vec!["http://localhost".into()],
        };
        assert!(config.check(&request("/", Some("http://localhost"))).is_ok());
        assert!(config.check(&request("/", None)).is_ok());
        let (status, reason) = config
            .check(&request("/", Some("http://example.com")))
            .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(reason.contains("example.com"));
    }
}
