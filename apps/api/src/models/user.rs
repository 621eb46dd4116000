//! User-facing types owned by the messaging core
//!
//! The user account itself lives in the external account store; the messaging
//! core only writes the push-token fields used by the external notification
//! dispatcher.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform a push token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PushPlatform {
    Ios,
    Android,
    Web,
}

impl PushPlatform {
    /// Returns the string representation of the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            PushPlatform::Ios => "ios",
            PushPlatform::Android => "android",
            PushPlatform::Web => "web",
        }
    }
}

impl std::fmt::Display for PushPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registration payload for a device push token
#[derive(Debug, Clone, Deserialize)]
pub struct PushTokenRegistration {
    /// Opaque device token issued by the platform's push service
    pub push_token: String,

    /// Platform the token belongs to
    pub platform: PushPlatform,
}

/// A stored push token, as read by the external notification dispatcher
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PushToken {
    pub user_id: Uuid,
    pub push_token: String,
    pub platform: PushPlatform,
}
