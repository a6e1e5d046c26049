//! Per-connection session driver: seat, relay, clean up.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task that drains the connection's outbox
//!   2. Ask the matchmaker for a seat
//!   3. Loop: receive messages → relay to the opponent once the room is active
//!   4. On disconnect, or once a write to this peer fails: leave the room,
//!      discard it if empty, close the connection

use std::sync::Arc;

use tandem_protocol::Codec;
use tandem_room::{Relay, Release, RoomError, RoomHandle, Seat};
use tandem_transport::{Connection, ConnectionId, Event};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::TandemError;

/// Drop guard that releases the seat if the handler exits without doing so
/// itself (a panic, or the task being dropped).
///
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async lock.
struct SeatGuard<C: Codec + Clone> {
    room: RoomHandle,
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
    armed: bool,
}

impl<C: Codec + Clone> SeatGuard<C> {
    /// Releases the seat now, under the matchmaker lock.
    async fn release(mut self) -> Result<Release, RoomError> {
        self.armed = false;
        let mut matchmaker = self.state.matchmaker.lock().await;
        matchmaker.release(&self.room, self.conn_id).await
    }
}

impl<C: Codec + Clone> Drop for SeatGuard<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let room = self.room.clone();
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut matchmaker = state.matchmaker.lock().await;
            if let Err(e) = matchmaker.release(&room, conn_id).await {
                tracing::debug!(
                    %conn_id,
                    room_id = %room.room_id(),
                    error = %e,
                    "release on drop failed"
                );
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<T, C>(
    conn: T,
    state: Arc<ServerState<C>>,
) -> Result<(), TandemError>
where
    T: Connection,
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (outbox, inbox) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_outbox(Arc::clone(&conn), inbox));

    // --- Step 1: Seat ---
    let (room, seat) = {
        let mut matchmaker = state.matchmaker.lock().await;
        matchmaker.assign(conn_id, outbox).await?
    };
    let room_id = room.room_id();
    tracing::info!(%conn_id, %room_id, %seat, "connection seated");

    let guard = SeatGuard {
        room: room.clone(),
        conn_id,
        state: Arc::clone(&state),
        armed: true,
    };

    // --- Step 2: Relay loop ---
    relay_until_closed(conn.as_ref(), &room, seat, &mut writer).await;

    // --- Step 3: Clean up ---
    match guard.release().await {
        Ok(Release::Kept { remaining }) => {
            tracing::debug!(%conn_id, %room_id, remaining, "left room");
        }
        Ok(Release::Destroyed) => {
            tracing::debug!(%conn_id, %room_id, "left room, room discarded");
        }
        Err(e) => {
            tracing::debug!(%conn_id, %room_id, error = %e, "release failed");
        }
    }

    // The room no longer holds our outbox, so the writer task drains what is
    // left and stops on its own.
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    Ok(())
}

/// Forwards every inbound message to the opponent until the connection
/// ends, or until the writer stops: a peer we can no longer write to has
/// left, even if its read side is still open.
async fn relay_until_closed<T: Connection>(
    conn: &T,
    room: &RoomHandle,
    seat: Seat,
    writer: &mut JoinHandle<()>,
) {
    let conn_id = conn.id();
    loop {
        let received = tokio::select! {
            received = conn.recv() => received,
            _ = &mut *writer => {
                tracing::info!(%conn_id, "peer stopped accepting writes");
                break;
            }
        };
        let text = match received {
            Ok(Event::Data(text)) => text,
            Ok(Event::Closed) => {
                tracing::info!(%conn_id, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        match room.relay(seat, text).await {
            Ok(Relay::Delivered) => {}
            Ok(Relay::Dropped) => {
                tracing::debug!(%conn_id, "room not active, message dropped");
            }
            // The opponent is gone; its own session cleans up.
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "relay failed");
            }
        }
    }
}

/// Writes everything a room sends to this connection, in order. Stops at
/// the first failed write or once no room holds the outbox any more.
/// While the session is seated the room holds the outbox, so an early
/// return here means the peer is gone.
async fn write_outbox<T: Connection>(
    conn: Arc<T>,
    mut inbox: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = inbox.recv().await {
        if let Err(e) = conn.send(&text).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tandem_protocol::JsonCodec;
    use tandem_room::{Matchmaker, RoomConfig};
    use tandem_transport::TransportError;
    use tokio::sync::Mutex;

    use super::*;

    /// An in-memory connection driven by the test.
    struct MockConnection {
        id: ConnectionId,
        events: Mutex<mpsc::UnboundedReceiver<Event>>,
        sent: mpsc::UnboundedSender<String>,
    }

    impl Connection for MockConnection {
        type Error = TransportError;

        async fn send(&self, text: &str) -> Result<(), Self::Error> {
            self.sent.send(text.to_string()).map_err(|_| {
                TransportError::SendFailed(
                    std::io::ErrorKind::BrokenPipe.into(),
                )
            })
        }

        async fn recv(&self) -> Result<Event, Self::Error> {
            Ok(self.events.lock().await.recv().await.unwrap_or(Event::Closed))
        }

        async fn close(&self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            self.id
        }
    }

    /// The test's side of a mock connection.
    struct Client {
        events: mpsc::UnboundedSender<Event>,
        sent: mpsc::UnboundedReceiver<String>,
    }

    impl Client {
        fn say(&self, text: &str) {
            self.events.send(Event::Data(text.to_string())).unwrap();
        }

        fn hang_up(&self) {
            self.events.send(Event::Closed).unwrap();
        }

        async fn next(&mut self) -> String {
            tokio::time::timeout(Duration::from_secs(2), self.sent.recv())
                .await
                .expect("timed out waiting for a message")
                .expect("writer stopped")
        }
    }

    fn mock(id: u64) -> (MockConnection, Client) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        (
            MockConnection {
                id: ConnectionId::new(id),
                events: Mutex::new(events_rx),
                sent: sent_tx,
            },
            Client {
                events: events_tx,
                sent: sent_rx,
            },
        )
    }

    fn state() -> Arc<ServerState<JsonCodec>> {
        Arc::new(ServerState::new(Matchmaker::with_config(
            RoomConfig::default(),
        )))
    }

    /// Waits until exactly one room exists and it holds `seated` occupants.
    async fn wait_for_seated(state: &ServerState<JsonCodec>, seated: usize) {
        for _ in 0..200 {
            {
                let mut mm = state.matchmaker.lock().await;
                if mm.room_count() == 1 {
                    let room = mm.get_room().await;
                    if mm.room_count() == 1 && room.occupancy() == seated {
                        return;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("room never reached {seated} seats");
    }

    #[tokio::test]
    async fn test_session_pairs_relays_and_cleans_up() {
        let state = state();
        let (conn_a, mut a) = mock(1);
        let (conn_b, mut b) = mock(2);

        let task_a = tokio::spawn(handle_connection(conn_a, Arc::clone(&state)));
        wait_for_seated(&state, 1).await;

        // Nobody to talk to yet: dropped.
        a.say("early");
        tokio::time::sleep(Duration::from_millis(20)).await;

        let task_b = tokio::spawn(handle_connection(conn_b, Arc::clone(&state)));
        assert_eq!(a.next().await, "true");
        assert_eq!(b.next().await, "true");

        a.say("X");
        assert_eq!(b.next().await, "X");
        b.say("{\"garbage\":2}");
        assert_eq!(a.next().await, "{\"garbage\":2}");

        b.hang_up();
        assert_eq!(a.next().await, "false");
        task_b.await.unwrap().unwrap();
        assert_eq!(state.matchmaker.lock().await.room_count(), 1);

        a.hang_up();
        task_a.await.unwrap().unwrap();
        assert_eq!(state.matchmaker.lock().await.room_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_counts_as_peer_leaving() {
        let state = state();
        let (conn_a, mut a) = mock(1);
        let (conn_b, mut b) = mock(2);

        let task_a = tokio::spawn(handle_connection(conn_a, Arc::clone(&state)));
        wait_for_seated(&state, 1).await;
        let task_b = tokio::spawn(handle_connection(conn_b, Arc::clone(&state)));
        assert_eq!(a.next().await, "true");
        assert_eq!(b.next().await, "true");

        // B's socket dies for writing; its read side never reports it.
        b.sent.close();
        a.say("into the void");

        // The failed write unseats B and A is told the room is inactive.
        assert_eq!(a.next().await, "false");
        tokio::time::timeout(Duration::from_secs(2), task_b)
            .await
            .expect("B's session should end")
            .unwrap()
            .unwrap();
        wait_for_seated(&state, 1).await;

        // A keeps waiting and is paired again with a newcomer.
        assert!(!task_a.is_finished());
        let (conn_c, mut c) = mock(3);
        let _task_c = tokio::spawn(handle_connection(conn_c, Arc::clone(&state)));
        assert_eq!(a.next().await, "true");
        assert_eq!(c.next().await, "true");
        c.say("hello");
        assert_eq!(a.next().await, "hello");
    }
}
