//! Seam to the authentication collaborator: who is acting, and a change
//! signal so visibility can be re-derived when the identity switches.

use tokio::sync::watch;

use paydeck_core::domain::user::{User, UserId};
use paydeck_db::repositories::UserRepository;

use crate::errors::EngineError;

pub trait AuthProvider: Send + Sync {
    /// The auth-layer uid of the current user, if anyone is signed in.
    fn current_user_id(&self) -> Option<UserId>;

    /// Fires whenever the identity changes, including sign-out.
    fn watch_identity(&self) -> watch::Receiver<Option<UserId>>;
}

/// Identity held in-process; enough for the CLI and for tests.
pub struct StaticAuthProvider {
    sender: watch::Sender<Option<UserId>>,
}

impl StaticAuthProvider {
    pub fn new(initial: Option<UserId>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    pub fn set_identity(&self, user_id: Option<UserId>) {
        // send_replace notifies watchers even when no receiver is alive yet
        self.sender.send_replace(user_id);
    }
}

impl AuthProvider for StaticAuthProvider {
    fn current_user_id(&self) -> Option<UserId> {
        self.sender.borrow().clone()
    }

    fn watch_identity(&self) -> watch::Receiver<Option<UserId>> {
        self.sender.subscribe()
    }
}

/// Resolves the current identity to its user record. The uid-field lookup
/// runs first; legacy records keyed directly by the auth id are found by
/// the direct lookup that follows.
pub async fn resolve_actor(
    auth: &dyn AuthProvider,
    users: &dyn UserRepository,
) -> Result<User, EngineError> {
    let user_id = auth.current_user_id().ok_or(EngineError::NotAuthenticated)?;

    let by_uid = users
        .find_by_uids_chunk(std::slice::from_ref(&user_id.0))
        .await
        .map_err(EngineError::StoreRead)?;
    if let Some(user) = by_uid.into_iter().next() {
        return Ok(user);
    }

    users
        .find_by_id(&user_id)
        .await
        .map_err(EngineError::StoreRead)?
        .ok_or_else(|| EngineError::not_found(format!("user {}", user_id.0)))
}
