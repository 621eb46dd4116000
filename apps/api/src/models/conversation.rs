//! Conversation identifiers
//!
//! A conversation is either a community (many-to-many membership) or a
//! direct thread between exactly two users. Direct thread ids are canonical:
//! the pair is always stored sorted, so both participants derive the same id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier for a conversation
///
/// Canonical text form: `community:<uuid>` or `direct:<uuid>:<uuid>` with the
/// direct pair sorted ascending. The text form is used on the wire, in HTTP
/// paths, and as the persisted conversation reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationId {
    /// A community conversation, keyed by the community id
    Community(Uuid),

    /// A direct thread between two users (invariant: first <= second)
    Direct(Uuid, Uuid),
}

impl ConversationId {
    /// Create a community conversation id
    pub fn community(id: Uuid) -> Self {
        Self::Community(id)
    }

    /// Create a direct thread id from two participants
    ///
    /// The id is identical regardless of argument order.
    pub fn direct(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self::Direct(a, b)
        } else {
            Self::Direct(b, a)
        }
    }

    /// Whether this is a direct thread
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(_, _))
    }

    /// For a direct thread, the participant other than `user`
    ///
    /// Returns `None` for communities and for users outside the pair.
    pub fn direct_peer(&self, user: Uuid) -> Option<Uuid> {
        match self {
            Self::Direct(a, b) if *a == user => Some(*b),
            Self::Direct(a, b) if *b == user => Some(*a),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Community(id) => write!(f, "community:{}", id),
            Self::Direct(a, b) => write!(f, "direct:{}:{}", a, b),
        }
    }
}

/// Error parsing a conversation id from its text form
#[derive(Debug, thiserror::Error)]
pub enum ParseConversationIdError {
    #[error("unrecognized conversation id format")]
    Format,

    #[error("invalid uuid in conversation id: {0}")]
    InvalidUuid(#[from] uuid::Error),
}

impl FromStr for ConversationId {
    type Err = ParseConversationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("community", id)) => Ok(Self::Community(Uuid::parse_str(id)?)),
            Some(("direct", pair)) => {
                let (a, b) = pair.split_once(':').ok_or(ParseConversationIdError::Format)?;
                Ok(Self::direct(Uuid::parse_str(a)?, Uuid::parse_str(b)?))
            }
            _ => Err(ParseConversationIdError::Format),
        }
    }
}

impl Serialize for ConversationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// Stored as TEXT in the canonical form.

impl sqlx::Type<sqlx::Postgres> for ConversationId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ConversationId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.to_string(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ConversationId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_id_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(ConversationId::direct(a, b), ConversationId::direct(b, a));
    }

    #[test]
    fn test_direct_peer() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let thread = ConversationId::direct(a, b);

        assert_eq!(thread.direct_peer(a), Some(b));
        assert_eq!(thread.direct_peer(b), Some(a));
        assert_eq!(thread.direct_peer(Uuid::new_v4()), None);

        let community = ConversationId::community(Uuid::new_v4());
        assert_eq!(community.direct_peer(a), None);
    }

    #[test]
    fn test_display_parse_round_trip() {
        let community = ConversationId::community(Uuid::new_v4());
        assert_eq!(
            community.to_string().parse::<ConversationId>().unwrap(),
            community
        );

        let direct = ConversationId::direct(Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(direct.to_string().parse::<ConversationId>().unwrap(), direct);
    }

    #[test]
    fn test_parse_canonicalizes_pair_order() {
        let a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();

        let reversed = format!("direct:{}:{}", b, a);
        assert_eq!(
            reversed.parse::<ConversationId>().unwrap(),
            ConversationId::direct(a, b)
        );
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!("".parse::<ConversationId>().is_err());
        assert!("community".parse::<ConversationId>().is_err());
        assert!("community:not-a-uuid".parse::<ConversationId>().is_err());
        assert!("direct:only-one-part".parse::<ConversationId>().is_err());
        assert!("room:00000000-0000-0000-0000-000000000001"
            .parse::<ConversationId>()
            .is_err());
    }

    #[test]
    fn test_serde_uses_canonical_text_form() {
        let id = ConversationId::community(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"community:00000000-0000-0000-0000-000000000000\"");

        let parsed: ConversationId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
