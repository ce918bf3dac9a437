//! Bounded in-memory auth map.
//!
//! Holds the raw fixed-layout records, byte for byte what a datapath reader
//! sees, and enforces the same capacity limit as the datapath map.

use crate::codec::{decode_info, decode_key, put_info, put_key};
use crate::record::{AuthInfo, AuthKey};
use crate::store::{AuthMapStore, StoreError, DEFAULT_MAX_ENTRIES};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

type RawKey = [u8; AuthKey::SIZE];
type RawInfo = [u8; AuthInfo::SIZE];

/// In-memory auth map with datapath-compatible record storage.
#[derive(Debug)]
pub struct InMemoryAuthMap {
    records: RwLock<HashMap<RawKey, RawInfo>>,
    max_entries: usize,
}

impl Default for InMemoryAuthMap {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthMap {
    /// Create an empty map with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Create an empty map holding at most `max_entries` records.
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Datapath-side lookup of a single key.
    pub async fn lookup(&self, key: &AuthKey) -> Option<AuthInfo> {
        let records = self.records.read().await;
        let raw = records.get(&raw_key(key))?;
        decode_info(&mut raw.as_slice()).ok()
    }

    /// Raw value record for a key, exactly as persisted.
    pub async fn lookup_raw(&self, key: &AuthKey) -> Option<[u8; AuthInfo::SIZE]> {
        self.records.read().await.get(&raw_key(key)).copied()
    }

    /// Number of records in the map.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the map holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn raw_key(key: &AuthKey) -> RawKey {
    let mut raw = [0u8; AuthKey::SIZE];
    put_key(&mut raw.as_mut_slice(), key);
    raw
}

fn raw_info(info: &AuthInfo) -> RawInfo {
    let mut raw = [0u8; AuthInfo::SIZE];
    put_info(&mut raw.as_mut_slice(), info);
    raw
}

#[async_trait]
impl AuthMapStore for InMemoryAuthMap {
    async fn update(&self, key: &AuthKey, info: &AuthInfo) -> Result<(), StoreError> {
        let raw = raw_key(key);
        let mut records = self.records.write().await;

        if !records.contains_key(&raw) && records.len() >= self.max_entries {
            return Err(StoreError::CapacityExceeded {
                max_entries: self.max_entries,
            });
        }

        records.insert(raw, raw_info(info));
        Ok(())
    }

    async fn delete(&self, key: &AuthKey) -> Result<(), StoreError> {
        let removed = self.records.write().await.remove(&raw_key(key)).is_some();
        if !removed {
            debug!(target: "auth.map", key = %key, "Delete of absent auth map key ignored");
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(AuthKey, AuthInfo)>, StoreError> {
        let records = self.records.read().await;
        records
            .iter()
            .enumerate()
            .map(|(index, (raw_key, raw_info))| {
                let offset = index * (AuthKey::SIZE + AuthInfo::SIZE);
                let key = decode_key(&mut raw_key.as_slice())
                    .map_err(|source| StoreError::Corrupt { offset, source })?;
                let info = decode_info(&mut raw_info.as_slice())
                    .map_err(|source| StoreError::Corrupt { offset, source })?;
                Ok((key, info))
            })
            .collect()
    }

    fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn info(seconds: i64) -> AuthInfo {
        AuthInfo::new(DateTime::<Utc>::from_timestamp(seconds, 0).unwrap())
    }

    #[tokio::test]
    async fn test_update_is_visible_to_datapath_lookup() {
        let map = InMemoryAuthMap::new();
        let key = AuthKey::new(100, 200, 7);

        map.update(&key, &info(1_000)).await.unwrap();

        assert_eq!(map.lookup(&key).await, Some(info(1_000)));
        assert_eq!(
            map.lookup_raw(&key).await.unwrap(),
            1_000u64.to_le_bytes()
        );
    }

    #[tokio::test]
    async fn test_update_replaces_existing_value() {
        let map = InMemoryAuthMap::new();
        let key = AuthKey::new(1, 2, 3);

        map.update(&key, &info(10)).await.unwrap();
        map.update(&key, &info(20)).await.unwrap();

        assert_eq!(map.len().await, 1);
        assert_eq!(map.lookup(&key).await, Some(info(20)));
    }

    #[tokio::test]
    async fn test_capacity_limit_applies_to_new_keys_only() {
        let map = InMemoryAuthMap::with_max_entries(2);
        map.update(&AuthKey::new(1, 2, 0), &info(10)).await.unwrap();
        map.update(&AuthKey::new(1, 3, 0), &info(10)).await.unwrap();

        let err = map
            .update(&AuthKey::new(1, 4, 0), &info(10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { max_entries: 2 }));

        // Refreshing an existing key still succeeds when full
        map.update(&AuthKey::new(1, 2, 0), &info(30)).await.unwrap();
        assert_eq!(map.lookup(&AuthKey::new(1, 2, 0)).await, Some(info(30)));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let map = InMemoryAuthMap::new();
        map.delete(&AuthKey::new(9, 9, 9)).await.unwrap();
        assert!(map.is_empty().await);
    }

    #[tokio::test]
    async fn test_all_returns_every_entry() {
        let map = InMemoryAuthMap::new();
        map.update(&AuthKey::new(1, 2, 3), &info(10)).await.unwrap();
        map.update(&AuthKey::new(4, 5, 6), &info(20)).await.unwrap();
        map.delete(&AuthKey::new(1, 2, 3)).await.unwrap();

        let all = map.all().await.unwrap();
        assert_eq!(all, vec![(AuthKey::new(4, 5, 6), info(20))]);
    }
}
