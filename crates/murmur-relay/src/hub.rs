use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use murmur_types::events::RelayEvent;

/// Outbound events buffered per connection before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 256;

pub type ConnId = Uuid;

/// Room membership and per-connection outbound queues.
///
/// Cheap to clone; every clone shares the same state. A connection only
/// ever joins or leaves rooms for itself.
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    state: RwLock<HubState>,
    capacity: usize,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnId, ConnEntry>,
    /// Room id to the connections joined to it
    rooms: HashMap<Uuid, HashSet<ConnId>>,
    /// Last sequence number handed out per room. Outlives the room's
    /// membership so numbers never repeat while the hub is up.
    seqs: HashMap<Uuid, u64>,
}

struct ConnEntry {
    user_id: Uuid,
    username: String,
    tx: mpsc::Sender<RelayEvent>,
    rooms: HashSet<Uuid>,
}

/// What `unregister` tore down.
#[derive(Debug, PartialEq, Eq)]
pub struct Departure {
    pub user_id: Uuid,
    pub username: String,
    /// True when this was the user's last open connection
    pub went_offline: bool,
}

impl HubState {
    fn is_online(&self, user_id: Uuid) -> bool {
        self.connections.values().any(|c| c.user_id == user_id)
    }

    /// Users with at least one open connection, each listed once.
    fn online_users(&self) -> Vec<(Uuid, String)> {
        let mut seen = HashSet::new();
        self.connections
            .values()
            .filter(|c| seen.insert(c.user_id))
            .map(|c| (c.user_id, c.username.clone()))
            .collect()
    }

    fn next_seq(&mut self, room_id: Uuid) -> u64 {
        let seq = self.seqs.entry(room_id).or_default();
        *seq += 1;
        *seq
    }

    fn remove_member(&mut self, room_id: Uuid, conn_id: ConnId) {
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
    }

    fn broadcast_all(&self, event: &RelayEvent) {
        for (conn_id, conn) in &self.connections {
            deliver(*conn_id, conn, event.clone());
        }
    }

    /// Send to every member of `room_id`, optionally skipping one connection.
    fn fan_out(&self, room_id: Uuid, skip: Option<ConnId>, event: &RelayEvent) -> usize {
        let Some(members) = self.rooms.get(&room_id) else {
            return 0;
        };
        let mut sent = 0;
        for conn_id in members {
            if Some(*conn_id) == skip {
                continue;
            }
            if let Some(conn) = self.connections.get(conn_id) {
                if deliver(*conn_id, conn, event.clone()) {
                    sent += 1;
                }
            }
        }
        sent
    }

    fn is_member(&self, conn_id: ConnId, room_id: Uuid) -> bool {
        self.connections
            .get(&conn_id)
            .is_some_and(|c| c.rooms.contains(&room_id))
    }
}

/// Queue an event without waiting. A full or closed queue drops it.
fn deliver(conn_id: ConnId, conn: &ConnEntry, event: RelayEvent) -> bool {
    match conn.tx.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!(
                "Outbound queue full for {} ({}) on {}, dropping {:?}",
                conn.username,
                conn.user_id,
                conn_id,
                event.chat_id()
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Outbound queue closed for connection {}", conn_id);
            false
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayHub {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                state: RwLock::new(HubState::default()),
                capacity,
            }),
        }
    }

    /// Register an identified connection. The returned receiver drains its
    /// outbound queue.
    ///
    /// The new connection is first told who is already online. When this is
    /// the user's first connection, everyone learns the user came online.
    pub async fn register(&self, user_id: Uuid, username: String) -> (ConnId, mpsc::Receiver<RelayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.inner.capacity);

        let mut state = self.inner.state.write().await;
        let first_connection = !state.is_online(user_id);
        let already_online = state.online_users();

        let entry = ConnEntry {
            user_id,
            username: username.clone(),
            tx,
            rooms: HashSet::new(),
        };
        for (other_id, other_name) in already_online {
            if other_id == user_id {
                continue;
            }
            let event = RelayEvent::PresenceUpdate {
                user_id: other_id,
                username: other_name,
                online: true,
            };
            if !deliver(conn_id, &entry, event) {
                break;
            }
        }
        state.connections.insert(conn_id, entry);

        if first_connection {
            state.broadcast_all(&RelayEvent::PresenceUpdate {
                user_id,
                username,
                online: true,
            });
        }

        (conn_id, rx)
    }

    /// Add the connection to a room. Returns false for an unknown connection.
    pub async fn join(&self, conn_id: ConnId, room_id: Uuid) -> bool {
        let mut state = self.inner.state.write().await;
        let Some(conn) = state.connections.get_mut(&conn_id) else {
            return false;
        };
        conn.rooms.insert(room_id);
        state.rooms.entry(room_id).or_default().insert(conn_id);
        true
    }

    /// Remove the connection from one room. Empty rooms are dropped.
    pub async fn leave(&self, conn_id: ConnId, room_id: Uuid) {
        let mut state = self.inner.state.write().await;
        if let Some(conn) = state.connections.get_mut(&conn_id) {
            conn.rooms.remove(&room_id);
        }
        state.remove_member(room_id, conn_id);
    }

    /// Fan a typing indicator out to the rest of the room.
    pub async fn relay_typing(&self, conn_id: ConnId, room_id: Uuid, is_typing: bool) -> bool {
        let state = self.inner.state.read().await;
        let Some(conn) = state.connections.get(&conn_id) else {
            return false;
        };
        if !conn.rooms.contains(&room_id) {
            debug!("{} typed into {} without joining", conn.username, room_id);
            return false;
        }

        let event = RelayEvent::Typing {
            chat_id: room_id,
            user_id: conn.user_id,
            username: conn.username.clone(),
            is_typing,
        };
        let sent = state.fan_out(room_id, Some(conn_id), &event);
        trace!("typing in {} fanned out to {}", room_id, sent);
        true
    }

    /// Fan an already-persisted message out to the rest of the room, stamped
    /// with the sender and the room's next sequence number. Numbering keeps
    /// counting across the room emptying and filling again.
    ///
    /// Returns `None` when the sender has not joined the room.
    pub async fn relay_message(&self, conn_id: ConnId, room_id: Uuid, message: serde_json::Value) -> Option<u64> {
        let mut state = self.inner.state.write().await;
        if !state.is_member(conn_id, room_id) {
            return None;
        }
        let from_user_id = state.connections.get(&conn_id)?.user_id;

        let seq = state.next_seq(room_id);

        let event = RelayEvent::MessageReceived {
            chat_id: room_id,
            seq,
            from_user_id,
            message,
        };
        let sent = state.fan_out(room_id, Some(conn_id), &event);
        trace!("message #{} in {} fanned out to {}", seq, room_id, sent);
        Some(seq)
    }

    /// Queue an event for a single connection.
    pub async fn send_to(&self, conn_id: ConnId, event: RelayEvent) -> bool {
        let state = self.inner.state.read().await;
        state
            .connections
            .get(&conn_id)
            .is_some_and(|conn| deliver(conn_id, conn, event))
    }

    /// Send to every member of the room, sender included.
    pub async fn broadcast_room(&self, room_id: Uuid, event: RelayEvent) -> usize {
        self.inner.state.read().await.fan_out(room_id, None, &event)
    }

    /// Drop a connection from the hub and every room it joined.
    pub async fn unregister(&self, conn_id: ConnId) -> Option<Departure> {
        let mut state = self.inner.state.write().await;
        let conn = state.connections.remove(&conn_id)?;

        for room_id in &conn.rooms {
            state.remove_member(*room_id, conn_id);
        }

        let went_offline = !state.is_online(conn.user_id);
        if went_offline {
            state.broadcast_all(&RelayEvent::PresenceUpdate {
                user_id: conn.user_id,
                username: conn.username.clone(),
                online: false,
            });
        }

        Some(Departure {
            user_id: conn.user_id,
            username: conn.username,
            went_offline,
        })
    }

    pub async fn room_size(&self, room_id: Uuid) -> usize {
        self.inner
            .state
            .read()
            .await
            .rooms
            .get(&room_id)
            .map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.state.read().await.connections.len()
    }

    /// Forget every connection and room. Dropping the senders closes each
    /// connection's queue, which ends its session.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.write().await;
        let count = state.connections.len();
        state.connections.clear();
        state.rooms.clear();
        state.seqs.clear();
        debug!("Relay hub shut down, closed {} connections", count);
    }
}
