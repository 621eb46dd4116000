//! Connection registry
//!
//! This module tracks the live event-channel connections for each user. One
//! user may own several concurrent connections (multi-device); a user is
//! online iff their connection set is non-empty.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;

/// Handle for sending events to a specific connection
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Owning user
    pub user_id: Uuid,

    /// Channel for pushing events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// When this connection was established (Unix timestamp ms)
    pub connected_at: i64,

    /// Last activity timestamp (atomic for thread-safe updates)
    pub last_activity: Arc<AtomicI64>,
}

impl ConnectionHandle {
    pub fn new(user_id: Uuid, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            user_id,
            sender,
            connected_at: now,
            last_activity: Arc::new(AtomicI64::new(now)),
        }
    }

    /// Update last activity timestamp
    pub fn touch(&self) {
        self.last_activity
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Get last activity timestamp
    pub fn last_seen(&self) -> i64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// Send an event to this connection
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.touch();
        self.sender.send(event)
    }

    /// Check if the connection is still alive
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Tracks live connections for all users
///
/// Thread-safe structure shared across the application. Uses DashMap for
/// concurrent access without explicit locking; wrapped in Arc for cheap
/// cloning. Process-local only: rebuilt from scratch on restart, when all
/// clients reconnect and re-join.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    /// Map of connection_id -> ConnectionHandle
    connections: Arc<DashMap<Uuid, ConnectionHandle>>,

    /// Map of user_id -> set of live connection ids
    by_user: Arc<DashMap<Uuid, HashSet<Uuid>>>,
}

impl ConnectionRegistry {
    /// Create a new connection registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user
    ///
    /// The user becomes online if this is their first connection.
    pub fn register(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        self.connections
            .insert(connection_id, ConnectionHandle::new(user_id, sender));

        let mut set = self.by_user.entry(user_id).or_default();
        let first = set.is_empty();
        set.insert(connection_id);
        drop(set);

        if first {
            tracing::debug!(user_id = %user_id, "User online");
        }
        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            "Connection registered"
        );
    }

    /// Remove a connection
    ///
    /// Idempotent: unregistering an unknown connection is a no-op. The user
    /// becomes offline when their last connection is removed.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        let Some((_, handle)) = self.connections.remove(&connection_id) else {
            return false;
        };

        let user_id = handle.user_id;
        if let Some(mut set) = self.by_user.get_mut(&user_id) {
            set.remove(&connection_id);
            let empty = set.is_empty();
            drop(set);

            if empty {
                self.by_user.remove(&user_id);
                tracing::debug!(user_id = %user_id, "User offline");
            }
        }

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            "Connection unregistered"
        );
        true
    }

    /// The (possibly empty) set of live connection ids for a user
    pub fn connections_for(&self, user_id: Uuid) -> Vec<Uuid> {
        self.by_user
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True iff the user has at least one live connection
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.by_user
            .get(&user_id)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    /// The owning user of a connection, if it is still live
    pub fn user_of(&self, connection_id: Uuid) -> Option<Uuid> {
        self.connections.get(&connection_id).map(|h| h.user_id)
    }

    /// Update last activity for a connection (call when receiving frames)
    pub fn touch(&self, connection_id: Uuid) {
        if let Some(handle) = self.connections.get(&connection_id) {
            handle.touch();
        }
    }

    /// Send an event to a specific connection
    pub fn send_to_connection(
        &self,
        connection_id: Uuid,
        event: ServerEvent,
    ) -> Result<(), SendError> {
        let handle = self
            .connections
            .get(&connection_id)
            .ok_or(SendError::ConnectionNotFound)?;

        handle.send(event).map_err(|_| SendError::ConnectionClosed)
    }

    /// Send an event to every live connection of a user, returning the count
    pub fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let mut sent = 0;
        for connection_id in self.connections_for(user_id) {
            if self.send_to_connection(connection_id, event.clone()).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Total number of live connections
    pub fn total_connections(&self) -> usize {
        self.connections.len()
    }

    /// Number of online users
    pub fn total_users(&self) -> usize {
        self.by_user.len()
    }

    /// Remove connections that are dead or idle past `max_idle_ms`
    ///
    /// A connection that missed its heartbeats gets the same cleanup as an
    /// explicit close; the returned ids let the caller clear room memberships.
    pub fn sweep_stale(&self, max_idle_ms: i64) -> Vec<Uuid> {
        let now = chrono::Utc::now().timestamp_millis();

        let stale: Vec<Uuid> = self
            .connections
            .iter()
            .filter(|e| {
                let idle = now - e.value().last_seen();
                idle > max_idle_ms || !e.value().is_alive()
            })
            .map(|e| *e.key())
            .collect();

        for connection_id in &stale {
            if self.unregister(*connection_id) {
                tracing::debug!(connection_id = %connection_id, "Removed stale connection");
            }
        }

        stale
    }
}

/// Error type for send operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    ConnectionNotFound,
    ConnectionClosed,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::ConnectionNotFound => write!(f, "connection not found"),
            SendError::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for SendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unregister_flips_online_status() {
        let registry = ConnectionRegistry::new();
        let user_id = Uuid::new_v4();
        let connection_id = Uuid::new_v4();

        assert!(!registry.is_online(user_id));

        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(user_id, connection_id, tx);

        assert!(registry.is_online(user_id));
        assert_eq!(registry.connections_for(user_id), vec![connection_id]);

        assert!(registry.unregister(connection_id));
        assert!(!registry.is_online(user_id));
        assert!(registry.connections_for(user_id).is_empty());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let connection_id = Uuid::new_v4();

        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(Uuid::new_v4(), connection_id, tx);

        assert!(registry.unregister(connection_id));
        assert!(!registry.unregister(connection_id));
        assert!(!registry.unregister(Uuid::new_v4()));
    }

    #[test]
    fn test_multiple_connections_per_user() {
        let registry = ConnectionRegistry::new();
        let user_id = Uuid::new_v4();
        let conn_1 = Uuid::new_v4();
        let conn_2 = Uuid::new_v4();

        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        registry.register(user_id, conn_1, tx1);
        registry.register(user_id, conn_2, tx2);

        assert_eq!(registry.connections_for(user_id).len(), 2);

        registry.unregister(conn_1);
        assert!(registry.is_online(user_id));

        registry.unregister(conn_2);
        assert!(!registry.is_online(user_id));
    }

    #[test]
    fn test_lookups_for_unknown_users_return_empty() {
        let registry = ConnectionRegistry::new();

        assert!(registry.connections_for(Uuid::new_v4()).is_empty());
        assert!(!registry.is_online(Uuid::new_v4()));
        assert!(registry.user_of(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_send_to_user_reaches_all_connections() {
        let registry = ConnectionRegistry::new();
        let user_id = Uuid::new_v4();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(user_id, Uuid::new_v4(), tx1);
        registry.register(user_id, Uuid::new_v4(), tx2);

        let sent = registry.send_to_user(user_id, ServerEvent::Pong { server_time: 1 });
        assert_eq!(sent, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_sweep_removes_dead_connections() {
        let registry = ConnectionRegistry::new();
        let user_id = Uuid::new_v4();
        let connection_id = Uuid::new_v4();

        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(user_id, connection_id, tx);

        // Receiver dropped: the connection is dead even though it is not idle
        drop(rx);

        let removed = registry.sweep_stale(60_000);
        assert_eq!(removed, vec![connection_id]);
        assert!(!registry.is_online(user_id));
    }
}
