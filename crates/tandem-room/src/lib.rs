//! Two-seat rooms and matchmaking for Tandem.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its two
//! seats. The matchmaker pairs incoming connections into rooms.
//!
//! # Key types
//!
//! - [`Matchmaker`] — creates/discards rooms, assigns connections to seats
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`Seat`] — a participant's stable position in its room
//! - [`RoomState`] — lifecycle state, derived from the seat count
//! - [`RoomConfig`] — channel sizing and retry settings

mod config;
mod error;
mod matchmaker;
mod room;

pub use config::{RoomConfig, RoomState, SEATS};
pub use error::RoomError;
pub use matchmaker::{Matchmaker, Release};
pub use room::{Outbox, Relay, RoomHandle, RoomInfo, Seat};
