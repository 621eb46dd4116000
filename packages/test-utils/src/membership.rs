//! Hand-assembled community membership directory

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use commons_api::repositories::{MembershipDirectory, StoreError};

/// Membership directory backed by in-memory sets
#[derive(Debug, Default)]
pub struct StaticMembership {
    members: Mutex<HashMap<Uuid, HashSet<Uuid>>>,
    admins: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl StaticMembership {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member to a community
    pub fn add_member(&self, community_id: Uuid, user_id: Uuid) {
        self.members
            .lock()
            .unwrap()
            .entry(community_id)
            .or_default()
            .insert(user_id);
    }

    /// Add an admin to a community (admins are members too)
    pub fn add_admin(&self, community_id: Uuid, user_id: Uuid) {
        self.add_member(community_id, user_id);
        self.admins.lock().unwrap().insert((community_id, user_id));
    }
}

#[async_trait]
impl MembershipDirectory for StaticMembership {
    async fn is_member(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&community_id)
            .map(|set| set.contains(&user_id))
            .unwrap_or(false))
    }

    async fn is_admin(&self, community_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .admins
            .lock()
            .unwrap()
            .contains(&(community_id, user_id)))
    }

    async fn members_of(&self, community_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&community_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }
}
