//! Auth service error types.
//!
//! Only [`AuthError::Restore`] is fatal, and only during startup. Every
//! other error is contained in the task that raised it, logged, and counted;
//! the datapath re-raises its signal for traffic that still lacks a valid
//! entry, so a failed request is retried by the next signal.

use authmap::{AuthKey, StoreError};
use common::{AuthType, Identity, NodeId};
use std::time::Duration;
use thiserror::Error;

/// Auth service error type.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Restoring the cache from the persisted map failed at startup.
    #[error("Failed to restore auth map cache: {0}")]
    Restore(#[source] StoreError),

    /// A store write or delete did not take effect.
    #[error("Auth map store error: {0}")]
    Store(#[from] StoreError),

    /// No handler is registered for the requested auth type.
    #[error("Unknown requested auth type: {0}")]
    UnknownAuthType(AuthType),

    /// Two handlers claim the same auth type.
    #[error("Multiple handlers for auth type: {0}")]
    DuplicateHandler(AuthType),

    /// The node id of the remote endpoint does not resolve to an address.
    #[error("Remote node IP not available for node ID {0}")]
    NodeIpUnavailable(NodeId),

    /// The handler rejected or failed the authentication.
    #[error("Failed to authenticate {key} with auth type {auth_type}: {source}")]
    Handler {
        key: AuthKey,
        auth_type: AuthType,
        #[source]
        source: HandlerError,
    },

    /// Registering with the signal source failed.
    #[error("Failed to register auth required signal handler: {0}")]
    SignalRegistration(String),
}

impl AuthError {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            AuthError::Restore(_) => "restore",
            AuthError::Store(_) => "store",
            AuthError::UnknownAuthType(_) => "unknown_auth_type",
            AuthError::DuplicateHandler(_) => "duplicate_handler",
            AuthError::NodeIpUnavailable(_) => "node_ip_unavailable",
            AuthError::Handler { source, .. } => source.error_type(),
            AuthError::SignalRegistration(_) => "signal_registration",
        }
    }
}

/// Errors reported by auth handlers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler refused to authenticate the pair.
    #[error("Authentication rejected: {0}")]
    Rejected(String),

    /// No certificate is available for the identity.
    #[error("No certificate available for identity {identity}: {reason}")]
    CertificateUnavailable { identity: Identity, reason: String },

    /// The handshake with the peer failed.
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// The handshake did not finish in time.
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The negotiated validity is already over.
    #[error("Authentication result already expired")]
    Expired,
}

impl HandlerError {
    /// Returns a bounded label for metrics.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            HandlerError::Rejected(_) => "rejected",
            HandlerError::CertificateUnavailable { .. } => "certificate_unavailable",
            HandlerError::Handshake(_) => "handshake",
            HandlerError::Timeout(_) => "timeout",
            HandlerError::Expired => "expired",
        }
    }
}

/// Errors raised by the garbage collector.
#[derive(Debug, Error)]
pub enum GcError {
    /// An identity descriptor whose name is not a numeric identity.
    #[error("Malformed identity name '{0}'")]
    MalformedIdentity(String),

    /// A node descriptor carrying an unparsable address.
    #[error("Malformed address '{address}' for node {node}")]
    MalformedAddress { node: String, address: String },

    /// Deleting matching entries failed.
    #[error("Auth map store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_mapping() {
        assert_eq!(
            AuthError::Restore(StoreError::CapacityExceeded { max_entries: 1 }).error_type(),
            "restore"
        );
        assert_eq!(
            AuthError::UnknownAuthType(AuthType::Mutual).error_type(),
            "unknown_auth_type"
        );
        assert_eq!(
            AuthError::NodeIpUnavailable(NodeId(3)).error_type(),
            "node_ip_unavailable"
        );
        assert_eq!(
            AuthError::Handler {
                key: AuthKey::new(1, 2, 3),
                auth_type: AuthType::Mutual,
                source: HandlerError::Timeout(Duration::from_secs(5)),
            }
            .error_type(),
            "timeout"
        );
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            AuthError::NodeIpUnavailable(NodeId(7)).to_string(),
            "Remote node IP not available for node ID 7"
        );
        assert_eq!(
            AuthError::Handler {
                key: AuthKey::new(100, 200, 7),
                auth_type: AuthType::AlwaysFail,
                source: HandlerError::Rejected("denied by policy".to_string()),
            }
            .to_string(),
            "Failed to authenticate 100->200@7 with auth type always-fail: Authentication rejected: denied by policy"
        );
        assert_eq!(
            GcError::MalformedAddress {
                node: "worker-1".to_string(),
                address: "10.0.0.x".to_string(),
            }
            .to_string(),
            "Malformed address '10.0.0.x' for node worker-1"
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let err: AuthError = StoreError::CapacityExceeded { max_entries: 4 }.into();
        assert!(matches!(err, AuthError::Store(_)));
        assert_eq!(err.error_type(), "store");
    }
}
