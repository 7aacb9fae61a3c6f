use crate::realtime::event::ServerEvent;
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque handle for one live gateway connection. A user with several
/// devices holds several of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

/// Fan-out capability handed to the service layer.
///
/// Services never reach into gateway state directly; they emit through this
/// interface, which makes them unit-testable against a recording fake.
pub trait Broadcaster: Send + Sync + std::fmt::Debug {
    /// Emits to every live connection bound to the user (their personal
    /// channel). A user with no connections receives nothing.
    fn emit_to_user(&self, user_id: i64, event: &ServerEvent);

    /// Emits to every connection currently subscribed to the room channel.
    fn emit_to_room(&self, room_id: i64, event: &ServerEvent);

    fn is_connected(&self, user_id: i64) -> bool;
}

#[derive(Debug)]
struct ConnectionHandle {
    user_id: i64,
    tx: mpsc::Sender<ServerEvent>,
}

/// Connection registry and channel router.
///
/// Personal channels are keyed by user id and cover all of that user's
/// connections; room channels are connection-scoped and only mutated by
/// explicit join/leave actions from that connection.
#[derive(Debug, Default)]
pub struct Hub {
    connections: DashMap<ConnectionId, ConnectionHandle>,
    users: DashMap<i64, HashSet<ConnectionId>>,
    rooms: DashMap<i64, HashSet<ConnectionId>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a verified user id to a new connection and joins it to the
    /// user's personal channel.
    pub fn register(&self, user_id: i64, tx: mpsc::Sender<ServerEvent>) -> ConnectionId {
        let id = ConnectionId(Uuid::new_v4());
        self.connections.insert(id, ConnectionHandle { user_id, tx });
        self.users.entry(user_id).or_default().insert(id);
        id
    }

    /// Removes a connection from all channels it is subscribed to.
    pub fn unregister(&self, conn_id: ConnectionId) {
        let Some((_, handle)) = self.connections.remove(&conn_id) else {
            return;
        };

        if let Some(mut conns) = self.users.get_mut(&handle.user_id) {
            conns.remove(&conn_id);
        }
        self.users.remove_if(&handle.user_id, |_, conns| conns.is_empty());

        self.rooms.retain(|_, conns| {
            conns.remove(&conn_id);
            !conns.is_empty()
        });
    }

    /// Subscribes this connection (and only this connection) to a room
    /// channel.
    pub fn join_room(&self, conn_id: ConnectionId, room_id: i64) {
        if self.connections.contains_key(&conn_id) {
            self.rooms.entry(room_id).or_default().insert(conn_id);
        }
    }

    pub fn leave_room(&self, conn_id: ConnectionId, room_id: i64) {
        if let Some(mut conns) = self.rooms.get_mut(&room_id) {
            conns.remove(&conn_id);
        }
        self.rooms.remove_if(&room_id, |_, conns| conns.is_empty());
    }

    /// Emits to a single connection, e.g. an error event scoped to the
    /// actor whose action failed.
    pub fn emit_to_connection(&self, conn_id: ConnectionId, event: &ServerEvent) {
        if let Some(handle) = self.connections.get(&conn_id) {
            Self::push(&handle, event);
        }
    }

    /// Emits to every live connection. Used for presence changes, which go
    /// to all connected peers and are filtered client-side.
    pub fn emit_to_all(&self, event: &ServerEvent) {
        for entry in &self.connections {
            Self::push(entry.value(), event);
        }
    }

    fn push(handle: &ConnectionHandle, event: &ServerEvent) {
        // A slow consumer loses the event; the store remains the source of
        // truth and clients recover via the fetch endpoints.
        if let Err(mpsc::error::TrySendError::Full(_)) = handle.tx.try_send(event.clone()) {
            tracing::warn!(user_id = handle.user_id, "Dropped event: outbound buffer full");
        }
    }
}

impl Broadcaster for Hub {
    fn emit_to_user(&self, user_id: i64, event: &ServerEvent) {
        let Some(conns) = self.users.get(&user_id) else {
            return;
        };
        for conn_id in conns.iter() {
            if let Some(handle) = self.connections.get(conn_id) {
                Self::push(&handle, event);
            }
        }
    }

    fn emit_to_room(&self, room_id: i64, event: &ServerEvent) {
        let Some(conns) = self.rooms.get(&room_id) else {
            return;
        };
        for conn_id in conns.iter() {
            if let Some(handle) = self.connections.get(conn_id) {
                Self::push(&handle, event);
            }
        }
    }

    fn is_connected(&self, user_id: i64) -> bool {
        self.users.get(&user_id).is_some_and(|conns| !conns.is_empty())
    }
}
