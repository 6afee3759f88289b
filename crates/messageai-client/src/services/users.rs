use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use messageai_store::CachedUser;

use crate::cache::LocalCache;
use crate::remote::RemoteStore;

/// Read-through cache of user profiles.
///
/// Cached entries never expire; [`UserDirectory::refresh`] bypasses the
/// cache when fresh presence data is needed.
pub struct UserDirectory {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<LocalCache>,
}

impl UserDirectory {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<LocalCache>) -> Self {
        Self { remote, cache }
    }

    /// Cached profile if present, otherwise the remote one (which is then
    /// cached).  A remote failure yields `None`.
    pub async fn get_user(&self, uid: &str) -> Option<CachedUser> {
        if let Some(user) = self.cache.cached_user(uid) {
            return Some(user);
        }
        self.refresh(uid).await
    }

    /// Fetch the remote profile and overwrite the cached copy.
    pub async fn refresh(&self, uid: &str) -> Option<CachedUser> {
        match self.remote.get_user(uid).await {
            Ok(Some(profile)) => {
                let user = CachedUser::from_profile(profile, Utc::now());
                self.cache.cache_user(&user);
                Some(user)
            }
            Ok(None) => {
                debug!(uid, "user not found");
                None
            }
            Err(e) => {
                warn!(uid, error = %e, "failed to fetch user profile");
                None
            }
        }
    }

    /// Display name for `uid`, or the uid itself if the profile is unknown.
    pub async fn display_name(&self, uid: &str) -> String {
        match self.get_user(uid).await {
            Some(user) if !user.display_name.is_empty() => user.display_name,
            _ => uid.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use messageai_shared::protocol::UserProfile;

    use super::*;
    use crate::remote::MemoryRemote;

    fn profile(uid: &str, name: &str) -> UserProfile {
        UserProfile {
            uid: uid.into(),
            display_name: name.into(),
            email: format!("{uid}@example.com"),
            photo_url: None,
            is_online: true,
            last_seen: None,
            push_token: None,
        }
    }

    #[tokio::test]
    async fn reads_through_and_serves_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(LocalCache::open(&dir.path().join("cache.db")).unwrap());
        let remote = Arc::new(MemoryRemote::new());
        remote.put_user(profile("bob", "Bob")).await;
        let users = UserDirectory::new(remote.clone(), cache.clone());

        assert_eq!(users.get_user("bob").await.unwrap().display_name, "Bob");
        assert!(cache.cached_user("bob").is_some());

        // Served from the cache while the remote is gone.
        remote.set_reachable(false);
        assert_eq!(users.get_user("bob").await.unwrap().display_name, "Bob");
        assert!(users.refresh("bob").await.is_none());
    }

    #[tokio::test]
    async fn unknown_user_falls_back_to_uid() {
        let users = UserDirectory::new(
            Arc::new(MemoryRemote::new()),
            Arc::new(LocalCache::disabled()),
        );
        assert!(users.get_user("ghost").await.is_none());
        assert_eq!(users.display_name("ghost").await, "ghost");
    }
}
