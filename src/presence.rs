use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::ServerEvent;

pub type ConnectionId = Uuid;

#[derive(Debug, Clone)]
pub enum Outbound {
    Event(ServerEvent),
    Close,
}

struct Entry {
    user_id: String,
    alias: String,
    tx: mpsc::UnboundedSender<Outbound>,
}

/// All live connections of the single global room. A user may hold any
/// number of simultaneous connections; each counts independently, and
/// `live_count` is the size of this map at the instant it is read.
pub struct PresenceRegistry {
    connections: DashMap<ConnectionId, Entry>,
}

impl PresenceRegistry {
    pub fn new() -> PresenceRegistry {
        PresenceRegistry { connections: DashMap::new() }
    }

    pub fn join(
        &self,
        id: ConnectionId,
        user_id: &str,
        alias: &str,
        tx: mpsc::UnboundedSender<Outbound>,
    ) {
        self.connections.insert(
            id,
            Entry { user_id: user_id.to_owned(), alias: alias.to_owned(), tx },
        );
        let count = self.live_count();
        self.broadcast(ServerEvent::UserJoined { alias: alias.to_owned(), online_count: count });
        self.broadcast(ServerEvent::OnlineCount { count });
    }

    pub fn leave(&self, id: ConnectionId) {
        let Some((_, entry)) = self.connections.remove(&id) else {
            return;
        };
        let count = self.live_count();
        self.broadcast(ServerEvent::UserLeft { alias: entry.alias, online_count: count });
        self.broadcast(ServerEvent::OnlineCount { count });
    }

    pub fn live_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn broadcast(&self, event: ServerEvent) {
        for entry in self.connections.iter() {
            let _ = entry.tx.send(Outbound::Event(event.clone()));
        }
    }

    pub fn broadcast_except(&self, origin: ConnectionId, event: ServerEvent) {
        for entry in self.connections.iter() {
            if *entry.key() == origin {
                continue;
            }
            let _ = entry.tx.send(Outbound::Event(event.clone()));
        }
    }

    /// Delivers only while the connection is still registered; a verdict
    /// resolving after a disconnect is dropped here, not mis-delivered.
    pub fn send_to(&self, id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&id) {
            Some(entry) => entry.tx.send(Outbound::Event(event)).is_ok(),
            None => false,
        }
    }

    /// Orders every connection bound to `user_id` to close itself.
    pub fn kick(&self, user_id: &str) -> usize {
        let mut kicked = 0;
        for entry in self.connections.iter() {
            if entry.user_id == user_id {
                let _ = entry.tx.send(Outbound::Close);
                kicked += 1;
            }
        }
        kicked
    }
}

impl Default for PresenceRegistry {
    fn default() -> PresenceRegistry {
        PresenceRegistry::new()
    }
}
