//! Matchmaker: creates, tracks, and pairs connections into rooms.

use std::collections::BTreeMap;

use tandem_protocol::{Codec, JsonCodec, RoomId};
use tandem_transport::ConnectionId;

use crate::room::spawn_room;
use crate::{Outbox, RoomConfig, RoomError, RoomHandle, RoomState, Seat};

/// What [`Matchmaker::release`] did with the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Someone is still seated; the room stays registered.
    Kept { remaining: usize },
    /// The room emptied out and was discarded.
    Destroyed,
}

/// Registry of live rooms.
///
/// Rooms are kept in creation order (ids only grow), so the first-fit scan
/// in [`get_room`](Self::get_room) is deterministic. A started room stays
/// registered but is skipped by assignment; an empty room is discarded by
/// [`release`](Self::release) as soon as its last occupant leaves.
///
/// The server keeps the matchmaker behind a lock and runs
/// [`assign`](Self::assign) and [`release`](Self::release) under it, so an
/// assignment never lands in a room that is being torn down. The scan reads
/// each room's published seat count instead of messaging its actor, so a
/// room with a long queue of relays does not slow down assignment while
/// the lock is held.
pub struct Matchmaker<C: Codec + Clone = JsonCodec> {
    rooms: BTreeMap<RoomId, RoomHandle>,
    config: RoomConfig,
    codec: C,
    next_room_id: u64,
}

impl Matchmaker<JsonCodec> {
    /// Creates an empty matchmaker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RoomConfig::default())
    }

    /// Creates an empty matchmaker with the given configuration.
    pub fn with_config(config: RoomConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }
}

impl Default for Matchmaker<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec + Clone> Matchmaker<C> {
    /// Creates an empty matchmaker whose rooms encode notices with `codec`.
    pub fn with_codec(config: RoomConfig, codec: C) -> Self {
        Self {
            rooms: BTreeMap::new(),
            config,
            codec,
            next_room_id: 1,
        }
    }

    /// Returns the first registered room that has not started, creating a
    /// new one if every room is full.
    ///
    /// Rooms whose actor has stopped are dropped from the registry along
    /// the way.
    pub async fn get_room(&mut self) -> RoomHandle {
        let mut chosen = None;
        let mut stale = Vec::new();

        for (room_id, handle) in &self.rooms {
            if handle.is_closed() {
                tracing::debug!(%room_id, "skipping stale room");
                stale.push(*room_id);
            } else if RoomState::from_seated(handle.occupancy()).is_joinable() {
                chosen = Some(handle.clone());
                break;
            }
        }

        for room_id in stale {
            self.rooms.remove(&room_id);
        }

        match chosen {
            Some(handle) => handle,
            None => self.create_room(),
        }
    }

    /// Creates an empty room, registers it, and returns it.
    pub fn create_room(&mut self) -> RoomHandle {
        let room_id = RoomId(self.next_room_id);
        self.next_room_id += 1;

        let handle = spawn_room(room_id, &self.config, self.codec.clone());
        self.rooms.insert(room_id, handle.clone());
        tracing::info!(%room_id, rooms = self.rooms.len(), "room created");
        handle
    }

    /// Deregisters a room and stops its actor.
    ///
    /// Fails with [`RoomError::NotRegistered`] if the room was already
    /// removed.
    pub async fn remove_room(
        &mut self,
        room_id: RoomId,
    ) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotRegistered(room_id))?;

        let _ = handle.shutdown().await;

        tracing::info!(%room_id, rooms = self.rooms.len(), "room destroyed");
        Ok(())
    }

    /// Seats a connection in an open room (or a new one).
    ///
    /// If the chosen room fills up before the join lands, another room is
    /// requested. After `max_join_attempts` misses a fresh room is used.
    pub async fn assign(
        &mut self,
        conn_id: ConnectionId,
        outbox: Outbox,
    ) -> Result<(RoomHandle, Seat), RoomError> {
        for _ in 0..self.config.max_join_attempts {
            let room = self.get_room().await;
            match room.join(conn_id, outbox.clone()).await {
                Ok(seat) => return Ok((room, seat)),
                Err(RoomError::RoomFull(room_id)) => {
                    tracing::debug!(
                        %room_id,
                        %conn_id,
                        "room filled before join, retrying"
                    );
                }
                Err(RoomError::Unavailable(room_id)) => {
                    tracing::debug!(
                        %room_id,
                        %conn_id,
                        "room stopped before join, retrying"
                    );
                    self.rooms.remove(&room_id);
                }
                Err(e) => return Err(e),
            }
        }

        let room = self.create_room();
        let seat = room.join(conn_id, outbox).await?;
        Ok((room, seat))
    }

    /// Unseats a connection, tells whoever remains that the room is
    /// inactive, and discards the room if it is now empty.
    ///
    /// A connection that already left, or a room that was already
    /// discarded, is not an error.
    pub async fn release(
        &mut self,
        room: &RoomHandle,
        conn_id: ConnectionId,
    ) -> Result<Release, RoomError> {
        let room_id = room.room_id();
        let remaining = match room.leave(conn_id).await {
            Ok(remaining) => remaining,
            Err(RoomError::NotInRoom(..)) => {
                tracing::debug!(%room_id, %conn_id, "already left");
                room.info().await?.seated
            }
            Err(RoomError::Unavailable(_)) => {
                tracing::debug!(%room_id, %conn_id, "room already stopped");
                0
            }
            Err(e) => return Err(e),
        };

        if remaining > 0 {
            return Ok(Release::Kept { remaining });
        }

        match self.remove_room(room_id).await {
            Ok(()) | Err(RoomError::NotRegistered(_)) => Ok(Release::Destroyed),
            Err(e) => Err(e),
        }
    }

    /// Returns the number of registered rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Lists registered room IDs in creation order.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn outbox() -> Outbox {
        mpsc::unbounded_channel().0
    }

    #[tokio::test]
    async fn test_create_room_returns_increasing_ids() {
        let mut mm = Matchmaker::new();
        let r1 = mm.create_room();
        let r2 = mm.create_room();
        assert!(r1.room_id() < r2.room_id());
        assert_eq!(mm.room_ids(), vec![r1.room_id(), r2.room_id()]);
    }

    #[tokio::test]
    async fn test_get_room_reuses_open_room() {
        let mut mm = Matchmaker::new();
        let first = mm.get_room().await;
        let again = mm.get_room().await;
        assert_eq!(first.room_id(), again.room_id());
        assert_eq!(mm.room_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_room_twice_is_not_registered() {
        let mut mm = Matchmaker::new();
        let room = mm.create_room();
        mm.remove_room(room.room_id()).await.unwrap();
        let result = mm.remove_room(room.room_id()).await;
        assert!(matches!(result, Err(RoomError::NotRegistered(_))));
    }

    #[tokio::test]
    async fn test_get_room_drops_stopped_rooms() {
        let mut mm = Matchmaker::new();
        let room = mm.create_room();
        room.shutdown().await.unwrap();
        tokio::task::yield_now().await;

        let next = mm.get_room().await;
        assert_ne!(next.room_id(), room.room_id());
        assert_eq!(mm.room_ids(), vec![next.room_id()]);
    }

    #[tokio::test]
    async fn test_assign_skips_room_that_stopped_before_join() {
        let mut mm = Matchmaker::new();
        let room = mm.create_room();
        // Still looks open, but stops before the join is processed.
        room.shutdown().await.unwrap();

        let (next, seat) = mm.assign(ConnectionId::new(1), outbox()).await.unwrap();
        assert_ne!(next.room_id(), room.room_id());
        assert_eq!(seat, Seat::First);
        assert_eq!(mm.room_ids(), vec![next.room_id()]);
    }

    #[tokio::test]
    async fn test_release_unknown_connection_is_tolerated() {
        let mut mm = Matchmaker::new();
        let (room, _) = mm.assign(ConnectionId::new(1), outbox()).await.unwrap();

        let outcome = mm.release(&room, ConnectionId::new(42)).await.unwrap();
        assert_eq!(outcome, Release::Kept { remaining: 1 });
    }
}
