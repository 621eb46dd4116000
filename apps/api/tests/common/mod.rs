//! Common test utilities for API integration tests
//!
//! Builds a full delivery engine over the in-memory boundaries so delivery
//! semantics can be exercised without a database or a live socket.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use commons_api::models::ConversationId;
use commons_api::services::DeliveryService;
use commons_api::websocket::events::ServerEvent;
use commons_api::websocket::{ConnectionRegistry, RoomManager};
use commons_test_utils::{MemoryMessageStore, RecordingNotifier, StaticMembership};

/// A delivery engine wired to in-memory boundaries
pub struct Harness {
    pub store: Arc<MemoryMessageStore>,
    pub membership: Arc<StaticMembership>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: ConnectionRegistry,
    pub rooms: RoomManager,
    pub delivery: DeliveryService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_persist_timeout(Duration::from_secs(1))
    }

    pub fn with_persist_timeout(persist_timeout: Duration) -> Self {
        let store = Arc::new(MemoryMessageStore::new());
        let membership = Arc::new(StaticMembership::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = ConnectionRegistry::new();
        let rooms = RoomManager::new();

        let delivery = DeliveryService::new(
            store.clone(),
            membership.clone(),
            notifier.clone(),
            registry.clone(),
            rooms.clone(),
            persist_timeout,
        );

        Self {
            store,
            membership,
            notifier,
            registry,
            rooms,
            delivery,
        }
    }

    /// Register a live connection for a user
    pub fn connect(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.register(user_id, connection_id, tx);
        (connection_id, rx)
    }

    /// Register a live connection already joined to a conversation's room
    pub fn connect_joined(
        &self,
        user_id: Uuid,
        conversation: ConversationId,
    ) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let (connection_id, rx) = self.connect(user_id);
        self.rooms.join(connection_id, conversation);
        (connection_id, rx)
    }
}

/// Drain every event currently queued on a connection
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = vec![];
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
