//! Resolution of [`UserRef`] values to full user records

use crate::api::UserApi;
use crate::error::Result;
use crate::models::{User, UserRef};
use moka::future::Cache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache sizing for the directory
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub max_capacity: u64,
    pub ttl: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: 500,
            ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub hits: u64,
    pub misses: u64,
}

impl DirectoryStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = self.hits as f64 / total as f64;
            rate
        }
    }
}

/// Looks users up through the API, caching what it finds
#[derive(Clone)]
pub struct UserDirectory {
    api: Arc<dyn UserApi>,
    users: Cache<String, User>,
    stats: Arc<RwLock<DirectoryStats>>,
}

impl UserDirectory {
    #[must_use]
    pub fn new(api: Arc<dyn UserApi>, config: &DirectoryConfig) -> Self {
        let users = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.ttl)
            .build();
        Self {
            api,
            users,
            stats: Arc::new(RwLock::new(DirectoryStats::default())),
        }
    }

    #[must_use]
    pub fn with_defaults(api: Arc<dyn UserApi>) -> Self {
        Self::new(api, &DirectoryConfig::default())
    }

    /// Full record for a reference
    ///
    /// # Errors
    /// Returns `FranchiseError::UserNotFound` or a transport error from the API
    pub async fn resolve(&self, user: &UserRef) -> Result<User> {
        if let Some(cached) = self.users.get(&user.id).await {
            self.stats.write().hits += 1;
            return Ok(cached);
        }

        self.stats.write().misses += 1;
        debug!(user_id = %user.id, "Resolving user");
        let record = self.api.get_user(&user.id).await?;
        self.users.insert(user.id.clone(), record.clone()).await;
        Ok(record)
    }

    /// Resolve several references, skipping the ones that fail
    pub async fn resolve_all(&self, users: &[UserRef]) -> Vec<User> {
        let mut resolved = Vec::with_capacity(users.len());
        for user in users {
            match self.resolve(user).await {
                Ok(record) => resolved.push(record),
                Err(e) => warn!(user_id = %user.id, error = %e, "Could not resolve user"),
            }
        }
        resolved
    }

    /// Name to show for a reference
    ///
    /// Uses the embedded name when the backend sent one, then the directory,
    /// then the raw id.
    pub async fn display_name(&self, user: &UserRef) -> String {
        if let Some(name) = &user.display_name {
            return name.clone();
        }
        match self.resolve(user).await {
            Ok(record) => record.name,
            Err(_) => user.id.clone(),
        }
    }

    /// Seed the cache with a record already in hand
    pub async fn remember(&self, user: User) {
        self.users.insert(user.id.clone(), user).await;
    }

    pub async fn invalidate(&self, user_id: &str) {
        self.users.invalidate(user_id).await;
    }

    pub fn invalidate_all(&self) {
        self.users.invalidate_all();
    }

    #[must_use]
    pub fn stats(&self) -> DirectoryStats {
        *self.stats.read()
    }
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("entries", &self.users.entry_count())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FranchiseError;
    use crate::test_utils::{mock_user, MockBackend};

    fn directory(backend: &Arc<MockBackend>) -> UserDirectory {
        let api: Arc<dyn UserApi> = backend.clone();
        UserDirectory::with_defaults(api)
    }

    #[tokio::test]
    async fn test_resolve_caches_lookups() {
        let backend = Arc::new(MockBackend::new());
        backend.add_user(mock_user("u1", "Asha"));
        let users = directory(&backend);

        let first = users.resolve(&UserRef::new("u1")).await.unwrap();
        let second = users.resolve(&UserRef::new("u1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls("get_user"), 1);
        assert_eq!(users.stats(), DirectoryStats { hits: 1, misses: 1 });
    }

    #[tokio::test]
    async fn test_resolve_unknown_user() {
        let backend = Arc::new(MockBackend::new());
        let users = directory(&backend);
        assert!(matches!(
            users.resolve(&UserRef::new("ghost")).await,
            Err(FranchiseError::UserNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_all_skips_failures() {
        let backend = Arc::new(MockBackend::new());
        backend.add_user(mock_user("u1", "Asha"));
        backend.add_user(mock_user("u3", "Meera"));
        let users = directory(&backend);

        let resolved = users
            .resolve_all(&[UserRef::new("u1"), UserRef::new("u2"), UserRef::new("u3")])
            .await;
        let names: Vec<&str> = resolved.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Asha", "Meera"]);
    }

    #[tokio::test]
    async fn test_display_name_prefers_embedded_name() {
        let backend = Arc::new(MockBackend::new());
        backend.add_user(mock_user("u1", "Asha"));
        let users = directory(&backend);

        assert_eq!(
            users.display_name(&UserRef::with_name("u1", "Asha K")).await,
            "Asha K"
        );
        assert_eq!(users.display_name(&UserRef::new("u1")).await, "Asha");
        assert_eq!(users.display_name(&UserRef::new("u9")).await, "u9");
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let backend = Arc::new(MockBackend::new());
        backend.add_user(mock_user("u1", "Asha"));
        let users = directory(&backend);

        users.resolve(&UserRef::new("u1")).await.unwrap();
        users.invalidate("u1").await;
        users.resolve(&UserRef::new("u1")).await.unwrap();
        assert_eq!(backend.calls("get_user"), 2);
    }
}
