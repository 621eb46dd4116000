//! Message persistence boundary
//!
//! Defines the `MessageStore` trait the delivery engine depends on, plus the
//! PostgreSQL implementation. The schema itself is owned by the external
//! document store; this repository only issues queries against it.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::StoreError;
use crate::models::{ConversationId, HistoryPage, Message, NewMessage, ReadReceipt};

/// Upper bound for a single history page
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Which messages a delete request may touch
///
/// The policy decision (sender-only vs. community admin) is made by the
/// caller; the store just applies the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    /// Only messages sent by this user
    Sender(Uuid),

    /// Any message in the conversation (community admins)
    Any,
}

/// Persistence boundary for messages
///
/// Append-only except for the read-state and the deletion tombstone: sender
/// and conversation reference are immutable once created.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message, returning it with server-assigned id and timestamp
    async fn append(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// List messages for a conversation, ascending by creation time
    ///
    /// Tombstoned messages are excluded.
    async fn list(
        &self,
        conversation: &ConversationId,
        page: HistoryPage,
    ) -> Result<Vec<Message>, StoreError>;

    /// Record that `reader_id` has read the given messages
    ///
    /// Only messages the reader did not send and has not already read
    /// transition; the returned receipts cover exactly those, so re-marking
    /// is idempotent and produces nothing.
    async fn mark_read(
        &self,
        conversation: &ConversationId,
        reader_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReadReceipt>, StoreError>;

    /// Tombstone the given messages within `scope`, returning the ids
    /// actually deleted
    async fn delete(
        &self,
        conversation: &ConversationId,
        message_ids: &[Uuid],
        scope: DeleteScope,
    ) -> Result<Vec<Uuid>, StoreError>;
}

/// PostgreSQL-backed message store
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new MessageRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for MessageRepository {
    #[instrument(skip(self, message), fields(conversation = %message.conversation_id, sender_id = %message.sender_id))]
    async fn append(&self, message: NewMessage) -> Result<Message, StoreError> {
        let (media_url, media_kind) = match message.media {
            Some(media) => (Some(media.url), Some(media.kind)),
            None => (None, None),
        };

        let row = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, body, media_url, media_kind, read_by)
            VALUES ($1, $2, $3, $4, $5, '{}')
            RETURNING id, conversation_id, sender_id, body, media_url, media_kind,
                      read_by, created_at, deleted_at
            "#,
        )
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.body)
        .bind(media_url)
        .bind(media_kind)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        conversation: &ConversationId,
        page: HistoryPage,
    ) -> Result<Vec<Message>, StoreError> {
        let limit = page.limit.clamp(1, MAX_HISTORY_LIMIT);

        // Fetch the newest page, then flip to ascending for the client
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM (
                SELECT id, conversation_id, sender_id, body, media_url, media_kind,
                       read_by, created_at, deleted_at
                FROM messages
                WHERE conversation_id = $1
                  AND deleted_at IS NULL
                  AND ($2::timestamptz IS NULL OR created_at < $2)
                ORDER BY created_at DESC
                LIMIT $3
            ) AS recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation)
        .bind(page.before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self, message_ids), fields(count = message_ids.len()))]
    async fn mark_read(
        &self,
        conversation: &ConversationId,
        reader_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReadReceipt>, StoreError> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            UPDATE messages
            SET read_by = array_append(read_by, $2)
            WHERE conversation_id = $1
              AND id = ANY($3)
              AND sender_id <> $2
              AND NOT ($2 = ANY(read_by))
              AND deleted_at IS NULL
            RETURNING id, sender_id
            "#,
        )
        .bind(conversation)
        .bind(reader_id)
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(message_id, sender_id)| ReadReceipt {
                message_id,
                sender_id,
            })
            .collect())
    }

    #[instrument(skip(self, message_ids), fields(count = message_ids.len()))]
    async fn delete(
        &self,
        conversation: &ConversationId,
        message_ids: &[Uuid],
        scope: DeleteScope,
    ) -> Result<Vec<Uuid>, StoreError> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        let deleted: Vec<(Uuid,)> = match scope {
            DeleteScope::Sender(sender_id) => {
                sqlx::query_as(
                    r#"
                    UPDATE messages
                    SET deleted_at = NOW()
                    WHERE conversation_id = $1
                      AND id = ANY($2)
                      AND sender_id = $3
                      AND deleted_at IS NULL
                    RETURNING id
                    "#,
                )
                .bind(conversation)
                .bind(message_ids)
                .bind(sender_id)
                .fetch_all(&self.pool)
                .await?
            }
            DeleteScope::Any => {
                sqlx::query_as(
                    r#"
                    UPDATE messages
                    SET deleted_at = NOW()
                    WHERE conversation_id = $1
                      AND id = ANY($2)
                      AND deleted_at IS NULL
                    RETURNING id
                    "#,
                )
                .bind(conversation)
                .bind(message_ids)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(deleted.into_iter().map(|(id,)| id).collect())
    }
}
