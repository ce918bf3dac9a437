//! Write-through cache of the auth map.
//!
//! The mirror is only ever updated after the store call it mirrors has
//! succeeded, so it never runs ahead of durable state. Writers (`set`,
//! `delete`) are serialized by a write gate held across the store call,
//! which keeps the mirror and store in the same order for every key.
//! Readers take the mirror lock only and are never blocked by store I/O.

use crate::observability::metrics;
use authmap::{AuthInfo, AuthKey, AuthMapStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// In-memory mirror of an [`AuthMapStore`].
pub struct AuthMapCache {
    store: Arc<dyn AuthMapStore>,
    entries: RwLock<HashMap<AuthKey, AuthInfo>>,
    write_gate: Mutex<()>,
}

impl std::fmt::Debug for AuthMapCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMapCache").finish_non_exhaustive()
    }
}

impl AuthMapCache {
    /// Create an empty cache over `store`. Call [`restore_cache`](Self::restore_cache)
    /// before serving lookups.
    #[must_use]
    pub fn new(store: Arc<dyn AuthMapStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            write_gate: Mutex::new(()),
        }
    }

    /// Replace the mirror with the store's current contents.
    ///
    /// # Errors
    ///
    /// Returns the store error if the map cannot be read; the mirror is left
    /// unchanged.
    pub async fn restore_cache(&self) -> Result<usize, StoreError> {
        let _gate = self.write_gate.lock().await;
        let restored: HashMap<AuthKey, AuthInfo> = self.store.all().await?.into_iter().collect();
        let count = restored.len();

        *self.entries.write().await = restored;
        metrics::set_map_entries(count);

        info!(
            target: "auth.cache",
            entries = count,
            capacity = self.store.max_entries(),
            "Restored auth map cache"
        );
        Ok(count)
    }

    /// Maximum number of entries the backing store can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.store.max_entries()
    }

    /// Look up an entry without touching the store.
    pub async fn get(&self, key: &AuthKey) -> Option<AuthInfo> {
        self.entries.read().await.get(key).copied()
    }

    /// Write an entry through to the store, then to the mirror.
    ///
    /// # Errors
    ///
    /// Returns the store error; the mirror is left unchanged.
    pub async fn set(&self, key: AuthKey, info: AuthInfo) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        if let Err(e) = self.store.update(&key, &info).await {
            metrics::record_store_error("update");
            return Err(e);
        }

        let mut entries = self.entries.write().await;
        entries.insert(key, info);
        metrics::set_map_entries(entries.len());
        Ok(())
    }

    /// Delete an entry from the store, then from the mirror.
    ///
    /// Deleting a key that is not present is not an error.
    ///
    /// # Errors
    ///
    /// Returns the store error; the mirror is left unchanged.
    pub async fn delete(&self, key: &AuthKey) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        if let Err(e) = self.store.delete(key).await {
            metrics::record_store_error("delete");
            return Err(e);
        }

        let mut entries = self.entries.write().await;
        entries.remove(key);
        metrics::set_map_entries(entries.len());
        Ok(())
    }

    /// Snapshot of the entries matching `predicate`.
    pub async fn entries_matching<F>(&self, predicate: F) -> Vec<(AuthKey, AuthInfo)>
    where
        F: Fn(&AuthKey, &AuthInfo) -> bool,
    {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(key, info)| predicate(key, info))
            .map(|(key, info)| (*key, *info))
            .collect()
    }

    /// Delete every entry matching `predicate`.
    ///
    /// Entries whose deletion fails are left in place and logged; the sweep
    /// continues with the remaining entries. Returns the number of entries
    /// deleted and the first error encountered, if any.
    pub async fn delete_matching<F>(&self, predicate: F) -> (usize, Option<StoreError>)
    where
        F: Fn(&AuthKey, &AuthInfo) -> bool,
    {
        let mut deleted = 0;
        let mut first_error = None;

        for (key, _) in self.entries_matching(predicate).await {
            match self.delete(&key).await {
                Ok(()) => {
                    debug!(target: "auth.cache", key = %key, "Deleted auth map entry");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(target: "auth.cache", key = %key, error = %e, "Failed to delete auth map entry");
                    first_error.get_or_insert(e);
                }
            }
        }

        (deleted, first_error)
    }

    /// Number of entries in the mirror.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the mirror is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
