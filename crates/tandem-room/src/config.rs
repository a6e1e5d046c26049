//! Room configuration and the derived room state.

use serde::{Deserialize, Serialize};

/// Number of seats in every room. Tandem only ever pairs two peers.
pub const SEATS: usize = 2;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for rooms and the matchmaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Capacity of each room actor's command channel. When it fills up,
    /// callers wait (backpressure).
    pub channel_size: usize,

    /// How many open rooms the matchmaker tries before it stops searching
    /// and seats the connection in a brand new room.
    pub max_join_attempts: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            max_join_attempts: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// Where a room is in its lifecycle.
///
/// The state is never stored. It is computed from the number of occupied
/// seats every time it is asked for, so it cannot drift from the seats:
///
/// ```text
/// Empty (0 seats) ⇄ Waiting (1 seat) ⇄ Active (2 seats)
/// ```
///
/// - **Empty**: nobody seated. A freshly created room, or one whose last
///   occupant just left (about to be discarded).
/// - **Waiting**: one participant seated, messages are dropped.
/// - **Active**: both seats taken, messages are relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Empty,
    Waiting,
    Active,
}

impl RoomState {
    /// Derives the state from a seat count.
    pub fn from_seated(seated: usize) -> Self {
        match seated {
            0 => Self::Empty,
            n if n < SEATS => Self::Waiting,
            _ => Self::Active,
        }
    }

    /// Returns `true` if the room can still take a participant.
    pub fn is_joinable(&self) -> bool {
        !self.is_active()
    }

    /// Returns `true` if both seats are taken.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Waiting => write!(f, "Waiting"),
            Self::Active => write!(f, "Active"),
        }
    }
}
