//! Creator-name resolution.
//!
//! Privileged callers already hold the full user set, so their names come
//! from one bulk fetch. Restricted callers may only look up the creators
//! that actually appear on their visible checks: a chunked uid-field
//! query, then a direct id lookup for stragglers, then a synthesized
//! label so the UI never renders an empty name.

use std::collections::HashMap;
use std::sync::Arc;

use paydeck_core::domain::user::{User, UserId};
use paydeck_db::repositories::UserRepository;

use crate::chunk::{fetch_by_id_batch, fetch_by_membership};
use crate::errors::EngineError;

/// Length of the id prefix used for synthesized labels.
const FALLBACK_PREFIX_LEN: usize = 8;

pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub fn fallback_label(user_id: &UserId) -> String {
        let prefix: String = user_id.0.chars().take(FALLBACK_PREFIX_LEN).collect();
        format!("User-{prefix}")
    }

    pub async fn resolve(
        &self,
        creator_ids: &[UserId],
        caller: &User,
    ) -> Result<HashMap<UserId, String>, EngineError> {
        if caller.is_admin() {
            self.resolve_from_snapshot(creator_ids).await
        } else {
            self.resolve_restricted(creator_ids).await
        }
    }

    async fn resolve_from_snapshot(
        &self,
        creator_ids: &[UserId],
    ) -> Result<HashMap<UserId, String>, EngineError> {
        let snapshot = self.users.list_all().await.map_err(EngineError::StoreRead)?;
        let by_uid: HashMap<&str, &User> =
            snapshot.iter().map(|user| (user.uid.as_str(), user)).collect();

        Ok(creator_ids
            .iter()
            .map(|id| {
                let name = by_uid
                    .get(id.0.as_str())
                    .map(|user| user.display_name())
                    .unwrap_or_else(|| "Unknown".to_string());
                (id.clone(), name)
            })
            .collect())
    }

    async fn resolve_restricted(
        &self,
        creator_ids: &[UserId],
    ) -> Result<HashMap<UserId, String>, EngineError> {
        let uids: Vec<String> = creator_ids.iter().map(|id| id.0.clone()).collect();

        let users = self.users.clone();
        let matched = fetch_by_membership(&uids, |chunk: Vec<String>| {
            let users = users.clone();
            async move { users.find_by_uids_chunk(&chunk).await }
        })
        .await
        .map_err(EngineError::StoreRead)?;

        let mut names: HashMap<UserId, String> = HashMap::new();
        for user in &matched {
            names.insert(UserId(user.uid.clone()), user.display_name());
        }

        // stragglers: records keyed directly by the auth id
        let missing: Vec<UserId> = creator_ids
            .iter()
            .filter(|id| !names.contains_key(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let users = self.users.clone();
            let direct = fetch_by_id_batch(&missing, |id: UserId| {
                let users = users.clone();
                async move { users.find_by_id(&id).await }
            })
            .await
            .map_err(EngineError::StoreRead)?;
            for user in &direct {
                names.insert(user.id.clone(), user.display_name());
            }
        }

        for id in creator_ids {
            if !names.contains_key(id) {
                names.insert(id.clone(), Self::fallback_label(id));
            }
        }

        Ok(names)
    }
}
