//! Room manager
//!
//! Rooms are the live-subscription grouping used purely for real-time push
//! fan-out. Membership exists only while the owning connection is alive and
//! has explicitly joined; it is rebuilt on every reconnect from the client's
//! active conversation context, never persisted.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::ConversationId;

/// Maps conversations to their subscribing connections
///
/// Keeps a reverse index (connection -> joined conversations) so that
/// `leave_all` on disconnect does not scan every room.
#[derive(Debug, Clone, Default)]
pub struct RoomManager {
    /// Map of conversation -> subscriber connection ids
    rooms: Arc<DashMap<ConversationId, HashSet<Uuid>>>,

    /// Map of connection id -> conversations it joined
    joined: Arc<DashMap<Uuid, HashSet<ConversationId>>>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a conversation
    ///
    /// Idempotent: joining twice is a no-op. Returns true if the connection
    /// was newly added.
    pub fn join(&self, connection_id: Uuid, conversation: ConversationId) -> bool {
        let added = self
            .rooms
            .entry(conversation)
            .or_default()
            .insert(connection_id);

        self.joined
            .entry(connection_id)
            .or_default()
            .insert(conversation);

        if added {
            tracing::debug!(
                connection_id = %connection_id,
                conversation = %conversation,
                "Joined room"
            );
        }
        added
    }

    /// Unsubscribe a connection from a conversation
    pub fn leave(&self, connection_id: Uuid, conversation: ConversationId) -> bool {
        let removed = self.remove_from_room(connection_id, &conversation);

        if let Some(mut set) = self.joined.get_mut(&connection_id) {
            set.remove(&conversation);
            let empty = set.is_empty();
            drop(set);
            if empty {
                self.joined.remove(&connection_id);
            }
        }

        removed
    }

    /// Remove a connection from every room it joined (called on disconnect)
    ///
    /// Returns the number of memberships removed. Safe to call for unknown
    /// connections.
    pub fn leave_all(&self, connection_id: Uuid) -> usize {
        let Some((_, conversations)) = self.joined.remove(&connection_id) else {
            return 0;
        };

        let mut removed = 0;
        for conversation in conversations {
            if self.remove_from_room(connection_id, &conversation) {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(
                connection_id = %connection_id,
                rooms = removed,
                "Left all rooms"
            );
        }
        removed
    }

    /// Connection ids currently subscribed to a conversation
    pub fn subscribers(&self, conversation: &ConversationId) -> Vec<Uuid> {
        self.rooms
            .get(conversation)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a connection is subscribed to a conversation
    pub fn is_subscribed(&self, connection_id: Uuid, conversation: &ConversationId) -> bool {
        self.rooms
            .get(conversation)
            .map(|set| set.contains(&connection_id))
            .unwrap_or(false)
    }

    /// Conversations a connection has joined
    pub fn rooms_of(&self, connection_id: Uuid) -> Vec<ConversationId> {
        self.joined
            .get(&connection_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one subscriber
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_from_room(&self, connection_id: Uuid, conversation: &ConversationId) -> bool {
        let Some(mut set) = self.rooms.get_mut(conversation) else {
            return false;
        };

        let removed = set.remove(&connection_id);
        let empty = set.is_empty();
        drop(set);

        if empty {
            self.rooms.remove(conversation);
        }
        removed
    }
}
