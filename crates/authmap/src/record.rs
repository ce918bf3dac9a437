//! Auth map record types.

use chrono::{DateTime, Utc};
use common::{AuthType, Identity, NodeId};
use std::fmt;

/// Key of one directional authentication relationship.
///
/// Key record format (12 bytes, little-endian):
/// - Local Identity: 4 bytes
/// - Remote Identity: 4 bytes
/// - Remote Node ID: 2 bytes
/// - Reserved: 2 bytes (zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthKey {
    /// Security identity of the local endpoint
    pub local_identity: Identity,
    /// Security identity of the remote endpoint
    pub remote_identity: Identity,
    /// Node hosting the remote endpoint
    pub remote_node_id: NodeId,
}

impl AuthKey {
    /// Key record size in bytes
    pub const SIZE: usize = 12;

    /// Create a key from raw identity and node numbers.
    #[must_use]
    pub const fn new(local_identity: u32, remote_identity: u32, remote_node_id: u16) -> Self {
        Self {
            local_identity: Identity(local_identity),
            remote_identity: Identity(remote_identity),
            remote_node_id: NodeId(remote_node_id),
        }
    }

    /// Whether either side of the key is the given identity.
    #[must_use]
    pub fn references_identity(&self, identity: Identity) -> bool {
        self.local_identity == identity || self.remote_identity == identity
    }
}

impl fmt::Display for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}@{}",
            self.local_identity, self.remote_identity, self.remote_node_id
        )
    }
}

/// Value of an auth map entry.
///
/// Value record format (8 bytes, little-endian):
/// - Expiration: 8 bytes (unix seconds)
///
/// The expiration is held at whole-second precision, the same value the
/// record carries, so an in-memory copy always equals its persisted form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthInfo {
    expiration: DateTime<Utc>,
}

impl AuthInfo {
    /// Value record size in bytes
    pub const SIZE: usize = 8;

    /// Create a value expiring at the given time, truncated to whole seconds.
    #[must_use]
    pub fn new(expiration: DateTime<Utc>) -> Self {
        let expiration =
            DateTime::from_timestamp(expiration.timestamp(), 0).unwrap_or(expiration);
        Self { expiration }
    }

    /// Absolute time after which the entry must be treated as absent.
    #[must_use]
    pub const fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    /// Whether the entry is expired at `now` (expiration at or before now).
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

/// An "authentication required" signal raised by the datapath.
///
/// Signal record format (12 bytes, little-endian):
/// - Local Identity: 4 bytes
/// - Remote Identity: 4 bytes
/// - Remote Node ID: 2 bytes
/// - Auth Type: 1 byte
/// - Pad: 1 byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalAuthKey {
    /// The relationship needing a decision
    pub key: AuthKey,
    /// Auth type resolved by policy for this relationship
    pub auth_type: AuthType,
}

impl SignalAuthKey {
    /// Signal record size in bytes
    pub const SIZE: usize = 12;

    /// Create a signal for the given key and auth type.
    #[must_use]
    pub const fn new(key: AuthKey, auth_type: AuthType) -> Self {
        Self { key, auth_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_auth_info_truncates_to_whole_seconds() {
        let whole = DateTime::<Utc>::from_timestamp(1_700_000_600, 0).unwrap_or_default();
        let info = AuthInfo::new(whole + Duration::milliseconds(500));

        assert_eq!(info.expiration(), whole);
        assert_eq!(info.expiration().timestamp_subsec_nanos(), 0);
        assert_eq!(info, AuthInfo::new(whole));
    }

    #[test]
    fn test_auth_info_expired_at_boundary() {
        let whole = DateTime::<Utc>::from_timestamp(1_700_000_600, 0).unwrap_or_default();
        let info = AuthInfo::new(whole + Duration::milliseconds(900));

        assert!(info.is_expired_at(whole));
        assert!(!info.is_expired_at(whole - Duration::milliseconds(1)));
    }
}
