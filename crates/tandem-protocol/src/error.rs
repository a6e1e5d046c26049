//! Error types for the protocol layer.
//!
//! Each crate in Tandem defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in encoding a notification,
//! not in networking or room management.

/// Errors that can occur in the protocol layer.
///
/// `#[derive(thiserror::Error)]` auto-generates the `std::error::Error`
/// implementation; `#[error("...")]` is the human-readable message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into text).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),
}
