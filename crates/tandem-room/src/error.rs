//! Error types for the room layer.

use tandem_protocol::{ProtocolError, RoomId};
use tandem_transport::ConnectionId;

use crate::Seat;

/// Errors that can occur during room and matchmaking operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Both seats are taken. The caller should ask the matchmaker for
    /// another room.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The connection is already seated in this room.
    #[error("{0} already in room {1}")]
    AlreadyInRoom(ConnectionId, RoomId),

    /// The connection is not seated in this room.
    #[error("{0} not in room {1}")]
    NotInRoom(ConnectionId, RoomId),

    /// Nobody sits in the addressed seat.
    #[error("{1} of room {0} is vacant")]
    SeatVacant(RoomId, Seat),

    /// The seat's connection can no longer be written to.
    #[error("{1} of room {0} is gone")]
    SeatGone(RoomId, Seat),

    /// A seat index other than 0 or 1.
    #[error("seat index {0} out of range")]
    SeatOutOfRange(usize),

    /// The matchmaker does not know this room (already discarded).
    #[error("room {0} is not registered")]
    NotRegistered(RoomId),

    /// The room's actor has stopped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The status notice could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
