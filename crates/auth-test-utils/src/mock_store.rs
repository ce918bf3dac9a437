//! Auth map store with failure injection.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = MockAuthMap::new().with_entry(AuthKey::new(1, 2, 3), info);
//! store.fail_updates(true);
//! assert!(cache.set(key, info).await.is_err());
//! assert_eq!(store.update_calls(), 1);
//! ```

use async_trait::async_trait;
use authmap::{AuthInfo, AuthKey, AuthMapStore, StoreError, DEFAULT_MAX_ENTRIES};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockAuthMapInner {
    entries: HashMap<AuthKey, AuthInfo>,
    fail_all: bool,
    fail_updates: bool,
    fail_deletes: bool,
    failing_deletes: HashSet<AuthKey>,
    update_calls: usize,
    delete_calls: usize,
    all_calls: usize,
    delay: Option<Duration>,
}

/// In-memory [`AuthMapStore`] whose operations can be made to fail.
#[derive(Debug, Default)]
pub struct MockAuthMap {
    inner: Mutex<MockAuthMapInner>,
}

fn injected(operation: &str) -> StoreError {
    StoreError::Io(std::io::Error::other(format!("injected {operation} failure")))
}

impl MockAuthMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an entry (not counted as an update call).
    pub fn with_entry(self, key: AuthKey, info: AuthInfo) -> Self {
        self.inner.lock().unwrap().entries.insert(key, info);
        self
    }

    /// Sleep for `delay` inside every operation.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.lock().unwrap().delay = Some(delay);
        self
    }

    /// Fail every operation, including `all`.
    pub fn fail_all(&self, fail: bool) {
        self.inner.lock().unwrap().fail_all = fail;
    }

    /// Fail every `update`.
    pub fn fail_updates(&self, fail: bool) {
        self.inner.lock().unwrap().fail_updates = fail;
    }

    /// Fail every `delete`.
    pub fn fail_deletes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_deletes = fail;
    }

    /// Fail `delete` of one specific key.
    pub fn fail_delete_of(&self, key: AuthKey) {
        self.inner.lock().unwrap().failing_deletes.insert(key);
    }

    /// Current stored entry for `key`.
    pub fn get(&self, key: &AuthKey) -> Option<AuthInfo> {
        self.inner.lock().unwrap().entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn update_calls(&self) -> usize {
        self.inner.lock().unwrap().update_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.lock().unwrap().delete_calls
    }

    pub fn all_calls(&self) -> usize {
        self.inner.lock().unwrap().all_calls
    }

    async fn pause(&self) {
        let delay = self.inner.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AuthMapStore for MockAuthMap {
    async fn update(&self, key: &AuthKey, info: &AuthInfo) -> Result<(), StoreError> {
        self.pause().await;
        let mut inner = self.inner.lock().unwrap();
        inner.update_calls += 1;
        if inner.fail_all || inner.fail_updates {
            return Err(injected("update"));
        }
        inner.entries.insert(*key, *info);
        Ok(())
    }

    async fn delete(&self, key: &AuthKey) -> Result<(), StoreError> {
        self.pause().await;
        let mut inner = self.inner.lock().unwrap();
        inner.delete_calls += 1;
        if inner.fail_all || inner.fail_deletes || inner.failing_deletes.contains(key) {
            return Err(injected("delete"));
        }
        inner.entries.remove(key);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(AuthKey, AuthInfo)>, StoreError> {
        self.pause().await;
        let mut inner = self.inner.lock().unwrap();
        inner.all_calls += 1;
        if inner.fail_all {
            return Err(injected("all"));
        }
        Ok(inner.entries.iter().map(|(k, v)| (*k, *v)).collect())
    }

    fn max_entries(&self) -> usize {
        DEFAULT_MAX_ENTRIES
    }
}
