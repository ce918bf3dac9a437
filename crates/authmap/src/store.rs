//! Persistence boundary for the auth map.
//!
//! The datapath performs its own lookups against the same records, so every
//! successful [`AuthMapStore::update`] must be visible to the next datapath
//! read. Stores never retry; retry policy belongs to the caller.

use crate::codec::CodecError;
use crate::record::{AuthInfo, AuthKey};
use async_trait::async_trait;
use thiserror::Error;

/// Default capacity of the auth map, matching the datapath map size.
pub const DEFAULT_MAX_ENTRIES: usize = 1 << 19;

/// Errors returned by auth map stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The map is full and the key is not already present.
    #[error("Auth map is full ({max_entries} entries)")]
    CapacityExceeded { max_entries: usize },

    /// Reading or writing the backing storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be decoded.
    #[error("Corrupt auth map record at offset {offset}: {source}")]
    Corrupt {
        offset: usize,
        #[source]
        source: CodecError,
    },
}

impl StoreError {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            StoreError::CapacityExceeded { .. } => "capacity_exceeded",
            StoreError::Io(_) => "io",
            StoreError::Corrupt { .. } => "corrupt",
        }
    }
}

/// Key/value map shared with the datapath.
#[async_trait]
pub trait AuthMapStore: Send + Sync {
    /// Insert or replace the entry for `key`.
    async fn update(&self, key: &AuthKey, info: &AuthInfo) -> Result<(), StoreError>;

    /// Remove the entry for `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &AuthKey) -> Result<(), StoreError>;

    /// Return every entry currently in the map, in no particular order.
    async fn all(&self) -> Result<Vec<(AuthKey, AuthInfo)>, StoreError>;

    /// Maximum number of entries the map can hold.
    fn max_entries(&self) -> usize;
}
