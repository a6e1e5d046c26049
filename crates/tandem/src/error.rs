//! Unified error type for the Tandem server.

use tandem_protocol::ProtocolError;
use tandem_room::RoomError;
use tandem_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    /// A transport-level error (bind, accept, handshake, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encoding a notice).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, vacant seat, not registered).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The server configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::HandshakeRejected("unknown path /x".into());
        let tandem_err: TandemError = err.into();
        assert!(matches!(tandem_err, TandemError::Transport(_)));
        assert!(tandem_err.to_string().contains("unknown path /x"));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotRegistered(tandem_protocol::RoomId(1));
        let tandem_err: TandemError = err.into();
        assert!(matches!(tandem_err, TandemError::Room(_)));
        assert_eq!(tandem_err.to_string(), "room R-1 is not registered");
    }

    #[test]
    fn test_from_config_error() {
        let err = ConfigError::Invalid {
            key: "TANDEM_PORT",
            value: "eighty".into(),
        };
        let tandem_err: TandemError = err.into();
        assert!(matches!(tandem_err, TandemError::Config(_)));
        assert!(tandem_err.to_string().contains("TANDEM_PORT"));
    }
}
