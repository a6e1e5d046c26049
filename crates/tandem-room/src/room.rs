//! Room actor: an isolated Tokio task that owns two seats.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Every operation (join, remove, send, relay,
//! broadcast) is a command processed one at a time, so no two of them can
//! interleave their reads and writes of the seats.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tandem_protocol::{Codec, RoomId, Status};
use tandem_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::{RoomConfig, RoomError, RoomState, SEATS};

/// Channel for delivering outbound text to a participant's connection.
///
/// The receiving end is drained by the connection's writer task. Once that
/// task stops (the peer is gone), sends fail.
pub type Outbox = mpsc::UnboundedSender<String>;

// ---------------------------------------------------------------------------
// Seat
// ---------------------------------------------------------------------------

/// A participant's position within a room.
///
/// The seat is the participant's identity for the whole session and the
/// address for directed sends. It never changes, even when the other
/// participant leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    /// Both seats, in broadcast order.
    pub const ALL: [Seat; SEATS] = [Seat::First, Seat::Second];

    /// Returns the position, `0` or `1`.
    pub fn index(self) -> usize {
        match self {
            Seat::First => 0,
            Seat::Second => 1,
        }
    }

    /// Returns the other seat.
    pub fn opponent(self) -> Seat {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }
}

impl TryFrom<usize> for Seat {
    type Error = RoomError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Seat::First),
            1 => Ok(Seat::Second),
            other => Err(RoomError::SeatOutOfRange(other)),
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat-{}", self.index())
    }
}

/// What happened to a relayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    /// Handed to the opponent's connection.
    Delivered,
    /// The room was not active, so there was nobody to relay to.
    Dropped,
}

// ---------------------------------------------------------------------------
// Commands and handle
// ---------------------------------------------------------------------------

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel: the caller
/// sends a command and waits for the answer on it.
pub(crate) enum RoomCommand {
    Join {
        conn_id: ConnectionId,
        outbox: Outbox,
        reply: oneshot::Sender<Result<Seat, RoomError>>,
    },
    Remove {
        conn_id: ConnectionId,
        reply: oneshot::Sender<Result<Seat, RoomError>>,
    },
    /// Remove, then tell whoever remains that the room is inactive.
    Leave {
        conn_id: ConnectionId,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },
    Send {
        seat: Seat,
        message: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Relay {
        from: Seat,
        message: String,
        reply: oneshot::Sender<Result<Relay, RoomError>>,
    },
    Broadcast {
        status: Status,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// A snapshot of a room's seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    /// The room's unique ID.
    pub room_id: RoomId,
    /// Number of occupied seats.
    pub seated: usize,
}

impl RoomInfo {
    /// The lifecycle state derived from the seat count.
    pub fn state(&self) -> RoomState {
        RoomState::from_seated(self.seated)
    }

    /// True iff both seats are taken.
    pub fn has_started(&self) -> bool {
        self.state().is_active()
    }

    /// True iff nobody is seated.
    pub fn is_empty(&self) -> bool {
        self.seated == 0
    }
}

/// Handle to a running room actor.
///
/// Cheap to clone: it's an `mpsc::Sender` plus the seat count the actor
/// publishes. The matchmaker holds one per room and every seated session
/// holds another.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
    occupancy: Arc<AtomicUsize>,
}

impl fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Join { .. } => "Join",
            Self::Remove { .. } => "Remove",
            Self::Leave { .. } => "Leave",
            Self::Send { .. } => "Send",
            Self::Relay { .. } => "Relay",
            Self::Broadcast { .. } => "Broadcast",
            Self::GetInfo { .. } => "GetInfo",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl RoomHandle {
    /// Returns the room's unique ID.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// The seat count as of the last command the actor finished.
    ///
    /// Read without queueing behind the room's pending commands, so it may
    /// lag a join or leave that is still in flight. Only [`join`] decides
    /// admission.
    ///
    /// [`join`]: Self::join
    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Acquire)
    }

    /// True once the actor has stopped and will take no more commands.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a command and waits for the actor's reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Seats a connection and returns its seat.
    ///
    /// Fails with [`RoomError::RoomFull`] without seating anyone if both
    /// seats are already taken. When this join fills the room, both
    /// participants are sent the active status before this returns.
    pub async fn join(
        &self,
        conn_id: ConnectionId,
        outbox: Outbox,
    ) -> Result<Seat, RoomError> {
        self.request(|reply| RoomCommand::Join {
            conn_id,
            outbox,
            reply,
        })
        .await?
    }

    /// Unseats a connection, returning the seat it occupied.
    pub async fn remove(
        &self,
        conn_id: ConnectionId,
    ) -> Result<Seat, RoomError> {
        self.request(|reply| RoomCommand::Remove { conn_id, reply })
            .await?
    }

    /// Unseats a connection and broadcasts the inactive status to whoever
    /// remains, as one step. Returns the number of seats still occupied.
    pub async fn leave(
        &self,
        conn_id: ConnectionId,
    ) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Leave { conn_id, reply })
            .await?
    }

    /// Sends `message` verbatim to `seat`.
    pub async fn send(
        &self,
        seat: Seat,
        message: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Send {
            seat,
            message,
            reply,
        })
        .await?
    }

    /// Forwards `message` to the opponent of `from`, but only while the
    /// room is active.
    pub async fn relay(
        &self,
        from: Seat,
        message: String,
    ) -> Result<Relay, RoomError> {
        self.request(|reply| RoomCommand::Relay {
            from,
            message,
            reply,
        })
        .await?
    }

    /// Sends `status` to every seated participant, in seat order.
    pub async fn broadcast(&self, status: Status) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Broadcast { status, reply })
            .await?
    }

    /// Requests a snapshot of the seats.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// True iff both seats are taken.
    pub async fn has_started(&self) -> Result<bool, RoomError> {
        Ok(self.info().await?.has_started())
    }

    /// True iff nobody is seated.
    pub async fn is_empty(&self) -> Result<bool, RoomError> {
        Ok(self.info().await?.is_empty())
    }

    /// Tells the room to stop. Pending commands behind it are dropped.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A seated participant.
struct Occupant {
    conn_id: ConnectionId,
    outbox: Outbox,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<C: Codec> {
    room_id: RoomId,
    seats: [Option<Occupant>; SEATS],
    codec: C,
    receiver: mpsc::Receiver<RoomCommand>,
    occupancy: Arc<AtomicUsize>,
}

impl<C: Codec> RoomActor<C> {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::debug!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    conn_id,
                    outbox,
                    reply,
                } => {
                    let result = self.handle_join(conn_id, outbox);
                    self.publish();
                    let _ = reply.send(result);
                }
                RoomCommand::Remove { conn_id, reply } => {
                    let result = self.handle_remove(conn_id);
                    self.publish();
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { conn_id, reply } => {
                    let result = self.handle_leave(conn_id);
                    self.publish();
                    let _ = reply.send(result);
                }
                RoomCommand::Send {
                    seat,
                    message,
                    reply,
                } => {
                    let _ = reply.send(self.send_to(seat, message));
                }
                RoomCommand::Relay {
                    from,
                    message,
                    reply,
                } => {
                    let _ = reply.send(self.handle_relay(from, message));
                }
                RoomCommand::Broadcast { status, reply } => {
                    let _ = reply.send(self.broadcast(status));
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::Shutdown => {
                    tracing::debug!(room_id = %self.room_id, "room shutting down");
                    break;
                }
            }
        }

        tracing::debug!(room_id = %self.room_id, "room actor stopped");
    }

    fn seated(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    /// Makes the current seat count visible to handles.
    fn publish(&self) {
        self.occupancy.store(self.seated(), Ordering::Release);
    }

    fn has_started(&self) -> bool {
        RoomState::from_seated(self.seated()).is_active()
    }

    fn handle_join(
        &mut self,
        conn_id: ConnectionId,
        outbox: Outbox,
    ) -> Result<Seat, RoomError> {
        if self.has_started() {
            return Err(RoomError::RoomFull(self.room_id));
        }
        if self.seat_of(conn_id).is_some() {
            return Err(RoomError::AlreadyInRoom(conn_id, self.room_id));
        }

        // Not started means at least one seat is vacant.
        let seat = Seat::ALL
            .into_iter()
            .find(|s| self.seats[s.index()].is_none())
            .ok_or(RoomError::RoomFull(self.room_id))?;
        self.seats[seat.index()] = Some(Occupant { conn_id, outbox });

        tracing::info!(
            room_id = %self.room_id,
            %conn_id,
            %seat,
            seated = self.seated(),
            "participant joined"
        );

        if self.has_started() {
            tracing::info!(room_id = %self.room_id, "room active");
            if let Err(e) = self.broadcast(Status::ACTIVE) {
                tracing::debug!(
                    room_id = %self.room_id,
                    error = %e,
                    "activation notice not delivered"
                );
            }
        }

        Ok(seat)
    }

    fn handle_remove(
        &mut self,
        conn_id: ConnectionId,
    ) -> Result<Seat, RoomError> {
        let seat = self
            .seat_of(conn_id)
            .ok_or(RoomError::NotInRoom(conn_id, self.room_id))?;
        self.seats[seat.index()] = None;

        tracing::info!(
            room_id = %self.room_id,
            %conn_id,
            %seat,
            seated = self.seated(),
            "participant left"
        );
        Ok(seat)
    }

    fn handle_leave(
        &mut self,
        conn_id: ConnectionId,
    ) -> Result<usize, RoomError> {
        self.handle_remove(conn_id)?;
        if let Err(e) = self.broadcast(Status::INACTIVE) {
            tracing::debug!(
                room_id = %self.room_id,
                error = %e,
                "deactivation notice not delivered"
            );
        }
        Ok(self.seated())
    }

    fn handle_relay(
        &self,
        from: Seat,
        message: String,
    ) -> Result<Relay, RoomError> {
        if !self.has_started() {
            return Ok(Relay::Dropped);
        }
        self.send_to(from.opponent(), message)?;
        Ok(Relay::Delivered)
    }

    /// Sends the encoded status to every occupied seat. Every seat is
    /// attempted; the first failure is returned.
    fn broadcast(&self, status: Status) -> Result<(), RoomError> {
        let text = self.codec.encode(&status)?;
        let mut result = Ok(());
        for seat in Seat::ALL {
            if self.seats[seat.index()].is_none() {
                continue;
            }
            if let Err(e) = self.send_to(seat, text.clone()) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    fn send_to(&self, seat: Seat, message: String) -> Result<(), RoomError> {
        let occupant = self.seats[seat.index()]
            .as_ref()
            .ok_or(RoomError::SeatVacant(self.room_id, seat))?;
        occupant
            .outbox
            .send(message)
            .map_err(|_| RoomError::SeatGone(self.room_id, seat))
    }

    fn seat_of(&self, conn_id: ConnectionId) -> Option<Seat> {
        Seat::ALL.into_iter().find(|s| {
            self.seats[s.index()]
                .as_ref()
                .is_some_and(|o| o.conn_id == conn_id)
        })
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id,
            seated: self.seated(),
        }
    }
}

/// Spawns a new, empty room actor and returns a handle to it.
pub(crate) fn spawn_room<C: Codec>(
    room_id: RoomId,
    config: &RoomConfig,
    codec: C,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let occupancy = Arc::new(AtomicUsize::new(0));

    let actor = RoomActor {
        room_id,
        seats: [None, None],
        codec,
        receiver: rx,
        occupancy: Arc::clone(&occupancy),
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
        occupancy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_protocol::JsonCodec;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn room() -> RoomHandle {
        spawn_room(RoomId(1), &RoomConfig::default(), JsonCodec)
    }

    #[test]
    fn test_seat_index_and_opponent() {
        assert_eq!(Seat::First.index(), 0);
        assert_eq!(Seat::Second.index(), 1);
        assert_eq!(Seat::First.opponent(), Seat::Second);
        assert_eq!(Seat::Second.opponent(), Seat::First);
    }

    #[test]
    fn test_seat_try_from_rejects_out_of_range() {
        assert_eq!(Seat::try_from(1).unwrap(), Seat::Second);
        assert!(matches!(
            Seat::try_from(2),
            Err(RoomError::SeatOutOfRange(2))
        ));
    }

    #[test]
    fn test_seat_display() {
        assert_eq!(Seat::Second.to_string(), "seat-1");
    }

    #[tokio::test]
    async fn test_fresh_room_is_empty_and_not_started() {
        let room = room();
        assert!(room.is_empty().await.unwrap());
        assert!(!room.has_started().await.unwrap());
    }

    #[tokio::test]
    async fn test_seats_follow_arrival_order() {
        let room = room();
        let (a, mut a_rx) = mpsc::unbounded_channel();
        let (b, mut b_rx) = mpsc::unbounded_channel();

        assert_eq!(room.join(conn(1), a).await.unwrap(), Seat::First);
        assert!(a_rx.try_recv().is_err(), "no notice before activation");
        assert!(!room.has_started().await.unwrap());

        assert_eq!(room.join(conn(2), b).await.unwrap(), Seat::Second);
        assert_eq!(a_rx.try_recv().unwrap(), "true");
        assert_eq!(b_rx.try_recv().unwrap(), "true");
        assert!(room.has_started().await.unwrap());
    }

    #[tokio::test]
    async fn test_vacated_seat_is_refilled_without_moving_the_other() {
        let room = room();
        let (a, _a_rx) = mpsc::unbounded_channel();
        let (b, _b_rx) = mpsc::unbounded_channel();
        let (c, _c_rx) = mpsc::unbounded_channel();

        room.join(conn(1), a).await.unwrap();
        room.join(conn(2), b).await.unwrap();
        assert_eq!(room.remove(conn(1)).await.unwrap(), Seat::First);

        // conn-2 keeps seat 1; the newcomer takes the vacant seat 0.
        assert_eq!(room.join(conn(3), c).await.unwrap(), Seat::First);
        assert!(matches!(
            room.remove(conn(2)).await,
            Ok(Seat::Second)
        ));
    }

    #[tokio::test]
    async fn test_remove_unknown_connection_fails() {
        let room = room();
        let result = room.remove(conn(9)).await;
        assert!(matches!(result, Err(RoomError::NotInRoom(_, _))));
    }

    #[tokio::test]
    async fn test_send_to_vacant_seat_fails() {
        let room = room();
        let result = room.send(Seat::Second, "x".into()).await;
        assert!(matches!(
            result,
            Err(RoomError::SeatVacant(_, Seat::Second))
        ));
    }

    #[tokio::test]
    async fn test_send_to_closed_outbox_is_seat_gone() {
        let room = room();
        let (a, a_rx) = mpsc::unbounded_channel();
        room.join(conn(1), a).await.unwrap();
        drop(a_rx);

        let result = room.send(Seat::First, "x".into()).await;
        assert!(matches!(result, Err(RoomError::SeatGone(_, Seat::First))));
    }

    #[tokio::test]
    async fn test_occupancy_follows_joins_and_removals() {
        let room = room();
        let (a, _a_rx) = mpsc::unbounded_channel();
        let (b, _b_rx) = mpsc::unbounded_channel();
        assert_eq!(room.occupancy(), 0);

        room.join(conn(1), a).await.unwrap();
        assert_eq!(room.occupancy(), 1);
        room.join(conn(2), b).await.unwrap();
        assert_eq!(room.occupancy(), 2);

        // A rejected join leaves the count alone.
        let (c, _c_rx) = mpsc::unbounded_channel();
        assert!(room.join(conn(3), c).await.is_err());
        assert_eq!(room.occupancy(), 2);

        room.leave(conn(1)).await.unwrap();
        assert_eq!(room.occupancy(), 1);
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_are_unavailable() {
        let room = room();
        room.shutdown().await.unwrap();
        tokio::task::yield_now().await;

        assert!(room.is_closed());
        let result = room.info().await;
        assert!(matches!(result, Err(RoomError::Unavailable(RoomId(1)))));
    }
}
