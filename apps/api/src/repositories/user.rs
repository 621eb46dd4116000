//! User repository for push-token fields
//!
//! The user account store is external; this repository only touches the
//! push-token columns the external notification dispatcher reads.

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::StoreError;
use crate::models::{PushPlatform, PushToken};

/// Repository for the push-token fields on the user row
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new UserRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store (or replace) the push token for a user
    ///
    /// # Returns
    /// * `Ok(PushToken)` - The stored registration
    /// * `Err(StoreError::NotFound)` - If no such user exists
    #[instrument(skip(self, push_token))]
    pub async fn set_push_token(
        &self,
        user_id: Uuid,
        push_token: &str,
        platform: PushPlatform,
    ) -> Result<PushToken, StoreError> {
        sqlx::query_as::<_, PushToken>(
            r#"
            UPDATE users
            SET push_token = $2, push_platform = $3
            WHERE id = $1
            RETURNING id AS user_id, push_token, push_platform AS platform
            "#,
        )
        .bind(user_id)
        .bind(push_token)
        .bind(platform)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound { resource: "user" })
    }

    /// Clear the push token for a user
    ///
    /// # Returns
    /// * `Ok(true)` - If the user existed and the token was cleared
    /// * `Ok(false)` - If no such user exists
    #[instrument(skip(self))]
    pub async fn clear_push_token(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET push_token = NULL, push_platform = NULL
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
