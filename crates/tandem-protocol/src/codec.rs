//! Codec trait and implementations for the notifications the server emits.
//!
//! A "codec" (coder/decoder) turns Rust types into the text
//! frames that travel over the connection. Rooms only need *something*
//! that implements [`Codec`]; which format it speaks is the codec's
//! business. This is the "strategy pattern".
//!
//! Relayed game data never passes through a codec. It is forwarded
//! exactly as received.

use serde::Serialize;

use crate::ProtocolError;

/// A codec that turns Rust values into text frames.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between threads (Tokio may run room
///   actors on any worker thread).
/// - `'static` → the codec owns everything it needs, so it can live
///   inside long-running tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use tandem_protocol::{Codec, JsonCodec, Status};
///
/// let codec = JsonCodec;
///
/// assert_eq!(codec.encode(&Status::ACTIVE).unwrap(), "true");
/// assert_eq!(codec.encode(&Status::INACTIVE).unwrap(), "false");
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        // `serde_json::to_string` produces compact JSON: `true`, not ` true `.
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{RoomId, Status};

    #[test]
    fn test_json_codec_encodes_status_without_whitespace() {
        let codec = JsonCodec;
        assert_eq!(codec.encode(&Status::INACTIVE).unwrap(), "false");
    }

    #[test]
    fn test_json_codec_encodes_room_id_as_number() {
        let codec = JsonCodec;
        assert_eq!(codec.encode(&RoomId(12)).unwrap(), "12");
    }

    #[test]
    fn test_json_codec_reports_unencodable_values() {
        use std::collections::HashMap;

        // JSON object keys must be strings.
        let mut map = HashMap::new();
        map.insert(vec![1u8], true);
        let result = JsonCodec.encode(&map);
        assert!(matches!(result, Err(ProtocolError::Encode(_))));
    }
}
