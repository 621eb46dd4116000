//! In-memory message store

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use commons_api::models::{ConversationId, HistoryPage, Message, NewMessage, ReadReceipt};
use commons_api::repositories::{DeleteScope, MessageStore, StoreError, MAX_HISTORY_LIMIT};

/// In-memory implementation of the message store boundary
///
/// Mirrors the PostgreSQL repository's semantics: tombstone deletes,
/// idempotent read-marking, ascending history pages. An optional artificial
/// latency lets tests exercise the delivery engine's persistence bound.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<Message>>,
    delay: Mutex<Option<Duration>>,
}

impl MemoryMessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every store call by the given duration
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Snapshot of every stored message, tombstoned included
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    /// Number of stored, non-tombstoned messages
    pub fn live_count(&self) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.deleted_at.is_none())
            .count()
    }

    async fn apply_delay(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: NewMessage) -> Result<Message, StoreError> {
        self.apply_delay().await;

        let (media_url, media_kind) = match message.media {
            Some(media) => (Some(media.url), Some(media.kind)),
            None => (None, None),
        };

        let stored = Message {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            body: message.body,
            media_url,
            media_kind,
            read_by: vec![],
            created_at: Utc::now(),
            deleted_at: None,
        };

        self.messages.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn list(
        &self,
        conversation: &ConversationId,
        page: HistoryPage,
    ) -> Result<Vec<Message>, StoreError> {
        self.apply_delay().await;

        let limit = page.limit.clamp(1, MAX_HISTORY_LIMIT) as usize;

        let mut matching: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.conversation_id == *conversation
                    && m.deleted_at.is_none()
                    && page.before.map(|b| m.created_at < b).unwrap_or(true)
            })
            .cloned()
            .collect();

        matching.sort_by_key(|m| m.created_at);

        // Newest `limit` messages, ascending
        if matching.len() > limit {
            matching.drain(..matching.len() - limit);
        }
        Ok(matching)
    }

    async fn mark_read(
        &self,
        conversation: &ConversationId,
        reader_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReadReceipt>, StoreError> {
        self.apply_delay().await;

        let mut receipts = vec![];
        for message in self.messages.lock().unwrap().iter_mut() {
            if message.conversation_id == *conversation
                && message_ids.contains(&message.id)
                && message.sender_id != reader_id
                && !message.read_by.contains(&reader_id)
                && message.deleted_at.is_none()
            {
                message.read_by.push(reader_id);
                receipts.push(ReadReceipt {
                    message_id: message.id,
                    sender_id: message.sender_id,
                });
            }
        }
        Ok(receipts)
    }

    async fn delete(
        &self,
        conversation: &ConversationId,
        message_ids: &[Uuid],
        scope: DeleteScope,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.apply_delay().await;

        let now = Utc::now();
        let mut deleted = vec![];
        for message in self.messages.lock().unwrap().iter_mut() {
            let in_scope = match scope {
                DeleteScope::Sender(sender_id) => message.sender_id == sender_id,
                DeleteScope::Any => true,
            };
            if message.conversation_id == *conversation
                && message_ids.contains(&message.id)
                && message.deleted_at.is_none()
                && in_scope
            {
                message.deleted_at = Some(now);
                deleted.push(message.id);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_message(conversation: ConversationId, sender: Uuid, body: &str) -> NewMessage {
        NewMessage {
            conversation_id: conversation,
            sender_id: sender,
            body: Some(body.to_string()),
            media: None,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_id_and_timestamp() {
        let store = MemoryMessageStore::new();
        let conversation = ConversationId::community(Uuid::new_v4());

        let stored = store
            .append(new_message(conversation, Uuid::new_v4(), "hello"))
            .await
            .unwrap();

        assert!(!stored.id.is_nil());
        assert!(stored.read_by.is_empty());
        assert_eq!(store.live_count(), 1);
    }

    #[tokio::test]
    async fn test_list_excludes_tombstones_and_respects_limit() {
        let store = MemoryMessageStore::new();
        let conversation = ConversationId::community(Uuid::new_v4());
        let sender = Uuid::new_v4();

        let first = store
            .append(new_message(conversation, sender, "one"))
            .await
            .unwrap();
        store
            .append(new_message(conversation, sender, "two"))
            .await
            .unwrap();
        store
            .append(new_message(conversation, sender, "three"))
            .await
            .unwrap();

        store
            .delete(&conversation, &[first.id], DeleteScope::Sender(sender))
            .await
            .unwrap();

        let page = store
            .list(
                &conversation,
                HistoryPage {
                    before: None,
                    limit: 10,
                },
            )
            .await
            .unwrap();

        let bodies: Vec<_> = page.iter().filter_map(|m| m.body.clone()).collect();
        assert_eq!(bodies, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let store = MemoryMessageStore::new();
        let conversation = ConversationId::community(Uuid::new_v4());
        let sender = Uuid::new_v4();
        let reader = Uuid::new_v4();

        let stored = store
            .append(new_message(conversation, sender, "hello"))
            .await
            .unwrap();

        let first = store
            .mark_read(&conversation, reader, &[stored.id])
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].sender_id, sender);

        let second = store
            .mark_read(&conversation, reader, &[stored.id])
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_sender_cannot_read_own_message() {
        let store = MemoryMessageStore::new();
        let conversation = ConversationId::community(Uuid::new_v4());
        let sender = Uuid::new_v4();

        let stored = store
            .append(new_message(conversation, sender, "hello"))
            .await
            .unwrap();

        let receipts = store
            .mark_read(&conversation, sender, &[stored.id])
            .await
            .unwrap();
        assert!(receipts.is_empty());
    }

    #[tokio::test]
    async fn test_delete_scope_restricts_to_sender() {
        let store = MemoryMessageStore::new();
        let conversation = ConversationId::community(Uuid::new_v4());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let from_alice = store
            .append(new_message(conversation, alice, "mine"))
            .await
            .unwrap();
        let from_bob = store
            .append(new_message(conversation, bob, "theirs"))
            .await
            .unwrap();

        let deleted = store
            .delete(
                &conversation,
                &[from_alice.id, from_bob.id],
                DeleteScope::Sender(alice),
            )
            .await
            .unwrap();
        assert_eq!(deleted, vec![from_alice.id]);

        let deleted = store
            .delete(&conversation, &[from_bob.id], DeleteScope::Any)
            .await
            .unwrap();
        assert_eq!(deleted, vec![from_bob.id]);
    }
}
