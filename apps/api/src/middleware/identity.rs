//! Identity extractor for Axum handlers
//!
//! Authentication (OTP signup/login, token verification) is owned by the
//! upstream gateway, which injects the authenticated user id into the
//! `x-user-id` header. Handlers that require an identity take this extractor
//! and get a 401 when the header is missing or malformed.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::middleware::Identity;
//!
//! async fn handler(identity: Identity) -> impl IntoResponse {
//!     format!("acting as {}", identity.user_id)
//! }
//! ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the upstream-authenticated user id
pub const IDENTITY_HEADER: &str = "x-user-id";

/// The authenticated identity of the request
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    /// The authenticated user
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let user_id = Uuid::parse_str(value)
            .map_err(|_| ApiError::InvalidIdentity(format!("malformed {}", IDENTITY_HEADER)))?;

        if user_id.is_nil() {
            return Err(ApiError::InvalidIdentity("user id must not be nil".into()));
        }

        Ok(Self { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Identity, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(IDENTITY_HEADER, value);
        }
        let request = builder.body(()).unwrap();
        let (mut parts, _) = request.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let result = extract(None).await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_malformed_header_is_rejected() {
        let result = extract(Some("not-a-uuid")).await;
        assert!(matches!(result, Err(ApiError::InvalidIdentity(_))));
    }

    #[tokio::test]
    async fn test_nil_user_id_is_rejected() {
        let result = extract(Some("00000000-0000-0000-0000-000000000000")).await;
        assert!(matches!(result, Err(ApiError::InvalidIdentity(_))));
    }

    #[tokio::test]
    async fn test_valid_header_extracts_identity() {
        let user_id = Uuid::new_v4();
        let identity = extract(Some(&user_id.to_string())).await.unwrap();
        assert_eq!(identity.user_id, user_id);
    }
}
