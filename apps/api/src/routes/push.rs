//! Push-token REST route handlers
//!
//! Stores the device push token on the user row for the external notification
//! dispatcher; the messaging core itself never sends pushes.
//! - `PUT    /push-tokens` - register (or replace) the caller's push token
//! - `DELETE /push-tokens` - clear the caller's push token

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::put,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::Identity;
use crate::models::{PushToken, PushTokenRegistration};
use crate::repositories::{StoreError, UserRepository};

/// Shared application state for push-token handlers
#[derive(Clone)]
pub struct PushState {
    /// Repository for the push-token fields on the user row
    pub users: UserRepository,
}

impl PushState {
    /// Create new push state
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }
}

/// Create the push-token router
pub fn push_router(state: PushState) -> Router {
    Router::new()
        .route("/", put(register_push_token).delete(clear_push_token))
        .with_state(state)
}

// ========== Route Handlers ==========

/// Register (or replace) the caller's push token
///
/// # Response
/// - 200 OK: the stored registration
/// - 400 Bad Request: empty token
/// - 404 Not Found: unknown user
async fn register_push_token(
    State(state): State<PushState>,
    identity: Identity,
    Json(body): Json<PushTokenRegistration>,
) -> ApiResult<Json<PushToken>> {
    if body.push_token.trim().is_empty() {
        return Err(ApiError::ValidationError("push_token must not be empty".into()));
    }

    let stored = state
        .users
        .set_push_token(identity.user_id, body.push_token.trim(), body.platform)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => {
                ApiError::not_found("user", identity.user_id.to_string())
            }
            other => other.into(),
        })?;

    Ok(Json(stored))
}

/// Clear the caller's push token
///
/// # Response
/// - 204 No Content: token cleared (or none was set)
/// - 404 Not Found: unknown user
async fn clear_push_token(
    State(state): State<PushState>,
    identity: Identity,
) -> ApiResult<impl IntoResponse> {
    let found = state.users.clear_push_token(identity.user_id).await?;

    if !found {
        return Err(ApiError::not_found("user", identity.user_id.to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
