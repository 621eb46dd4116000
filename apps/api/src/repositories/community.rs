//! Community membership boundary
//!
//! Community membership CRUD is owned by the external community service; the
//! messaging core only needs read access to answer "is this user a member /
//! an admin" and to enumerate members for offline hand-off.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::StoreError;

/// Read-only view of community membership
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Whether the user belongs to the community
    async fn is_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Whether the user is an admin of the community
    async fn is_admin(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// All current members of the community
    async fn members_of(&self, community_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

/// PostgreSQL-backed membership directory
#[derive(Clone)]
pub struct CommunityRepository {
    pool: PgPool,
}

impl CommunityRepository {
    /// Create a new CommunityRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipDirectory for CommunityRepository {
    #[instrument(skip(self))]
    async fn is_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM community_members
                WHERE community_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn is_admin(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM community_members
                WHERE community_id = $1 AND user_id = $2 AND role = 'admin'
            )
            "#,
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn members_of(&self, community_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT user_id FROM community_members
            WHERE community_id = $1
            "#,
        )
        .bind(community_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
