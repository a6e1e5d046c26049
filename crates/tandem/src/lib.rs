//! # Tandem
//!
//! A two-player message relay. Tandem pairs incoming WebSocket connections
//! into rooms of exactly two and forwards every message one peer sends to
//! the other, verbatim. It never looks inside the relayed messages.
//!
//! Each peer receives `true` when its room fills up and `false` when the
//! other peer leaves. Anything sent before the room is full is dropped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem::prelude::*;
//!
//! # async fn run() -> Result<(), TandemError> {
//! let server = TandemServer::builder()
//!     .bind("0.0.0.0:8000")
//!     .path("/ws/tetris")
//!     .allowed_origins(["http://localhost"])
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::TandemError;
pub use server::{TandemServer, TandemServerBuilder};

/// Re-exports of the types most users need.
pub mod prelude {
    pub use crate::{
        ConfigError, ServerConfig, TandemError, TandemServer,
        TandemServerBuilder,
    };
    pub use tandem_protocol::{RoomId, Status};
    pub use tandem_room::{
        Matchmaker, Relay, Release, RoomConfig, RoomError, RoomHandle, Seat,
    };
    pub use tandem_transport::{
        Connection, ConnectionId, Event, Incoming, TransportError,
        WebSocketConfig,
    };
}
