//! Core protocol types for Tandem's wire format.
//!
//! The relay forwards game data as opaque text and never looks inside it,
//! so the only structured thing the server ever puts on the wire is the
//! room status notification defined here.

// Serde is Rust's standard library for **ser**ializing and **de**serializing
// data. The derive macros auto-generate the trait implementations.
use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room (one two-player relay session).
///
/// This is a "newtype wrapper": a `u64` with its own name, so a `RoomId`
/// can never be confused with some other number in a function signature.
///
/// The `#[serde(transparent)]` attribute tells serde to serialize this as
/// just the inner `u64`, not as `{ "0": 42 }`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

/// Display lets us use `{}` in format strings and `%room_id` in tracing.
impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Status — the activation notice
// ---------------------------------------------------------------------------

/// Tells the seated participants whether their room is active.
///
/// A room is active while both seats are taken. Clients receive
/// `Status(true)` once the second participant arrives and `Status(false)`
/// whenever a participant leaves while someone is still seated.
///
/// On the wire this is nothing but the JSON literal `true` or `false`
/// (thanks to `#[serde(transparent)]`), which is what existing clients
/// parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub bool);

impl Status {
    /// Both seats are taken; relaying has begun.
    pub const ACTIVE: Status = Status(true);

    /// A participant left; relaying has stopped.
    pub const INACTIVE: Status = Status(false);
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&RoomId(99)).unwrap();
        assert_eq!(json, "99");
    }

    #[test]
    fn test_room_id_display() {
        assert_eq!(RoomId(3).to_string(), "R-3");
    }

    #[test]
    fn test_room_ids_order_by_creation() {
        assert!(RoomId(1) < RoomId(2));
    }

    #[test]
    fn test_status_is_a_bare_json_boolean() {
        // Clients compare the raw frame against "true" / "false".
        assert_eq!(serde_json::to_string(&Status::ACTIVE).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Status::INACTIVE).unwrap(), "false");
    }

    #[test]
    fn test_status_parses_from_bare_boolean() {
        let parsed: Status = serde_json::from_str("false").unwrap();
        assert_eq!(parsed, Status::INACTIVE);
    }
}
