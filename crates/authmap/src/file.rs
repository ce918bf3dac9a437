//! File-backed auth map.
//!
//! Persists the map as a flat sequence of 20-byte records (12-byte key
//! followed by 8-byte value). Every mutation writes the full map to a
//! sibling temporary file, syncs it, and renames it over the map before
//! returning, so readers of the file observe either the previous or the new
//! map, never a torn write.

use crate::codec::{decode_info, decode_key, put_info, put_key};
use crate::record::{AuthInfo, AuthKey};
use crate::store::{AuthMapStore, StoreError, DEFAULT_MAX_ENTRIES};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Size of one persisted key+value record.
pub const RECORD_SIZE: usize = AuthKey::SIZE + AuthInfo::SIZE;

/// Auth map persisted to a file.
#[derive(Debug)]
pub struct FileAuthMap {
    path: PathBuf,
    max_entries: usize,
    entries: Mutex<HashMap<AuthKey, AuthInfo>>,
}

impl FileAuthMap {
    /// Open the map at `path` with the default capacity.
    ///
    /// # Errors
    ///
    /// See [`FileAuthMap::open_with_max_entries`].
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_max_entries(path, DEFAULT_MAX_ENTRIES).await
    }

    /// Open the map at `path`, loading any records already persisted there.
    ///
    /// A missing file is an empty map.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be read and
    /// `StoreError::Corrupt` if it holds a truncated or invalid record.
    #[instrument(skip_all, name = "auth.map.open", fields(path = %path.as_ref().display()))]
    pub async fn open_with_max_entries(
        path: impl AsRef<Path>,
        max_entries: usize,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = match tokio::fs::read(&path).await {
            Ok(contents) => decode_records(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        info!(
            target: "auth.map",
            path = %path.display(),
            entries = entries.len(),
            "Opened file-backed auth map"
        );

        Ok(Self {
            path,
            max_entries,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &HashMap<AuthKey, AuthInfo>) -> Result<(), StoreError> {
        let mut buf = BytesMut::with_capacity(entries.len() * RECORD_SIZE);
        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort_by_key(|(key, _)| **key);
        for (key, info) in sorted {
            put_key(&mut buf, key);
            put_info(&mut buf, info);
        }

        let tmp_path = temp_path(&self.path);
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&buf).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

/// Sibling path the next map contents are staged in before the rename.
fn temp_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

fn decode_records(contents: &[u8]) -> Result<HashMap<AuthKey, AuthInfo>, StoreError> {
    let mut data = contents;
    let mut entries = HashMap::new();
    let mut offset = 0;

    while data.has_remaining() {
        let key = decode_key(&mut data).map_err(|source| StoreError::Corrupt { offset, source })?;
        let info = decode_info(&mut data).map_err(|source| StoreError::Corrupt { offset, source })?;
        entries.insert(key, info);
        offset += RECORD_SIZE;
    }

    Ok(entries)
}

#[async_trait]
impl AuthMapStore for FileAuthMap {
    async fn update(&self, key: &AuthKey, info: &AuthInfo) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;

        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            return Err(StoreError::CapacityExceeded {
                max_entries: self.max_entries,
            });
        }

        let mut next = entries.clone();
        next.insert(*key, *info);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn delete(&self, key: &AuthKey) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;

        if !entries.contains_key(key) {
            debug!(target: "auth.map", key = %key, "Delete of absent auth map key ignored");
            return Ok(());
        }

        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(AuthKey, AuthInfo)>, StoreError> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().map(|(k, v)| (*k, *v)).collect())
    }

    fn max_entries(&self) -> usize {
        self.max_entries
    }
}
