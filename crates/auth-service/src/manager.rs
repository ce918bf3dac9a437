//! Authentication orchestration.
//!
//! The manager turns "authentication required" signals into cache entries.
//! At most one authentication per key runs at a time: a key is marked
//! pending before the cache is consulted and unmarked when the attempt
//! finishes, whatever its result. Signals for a pending key are skipped;
//! the datapath re-raises them if the attempt did not produce an entry.

use crate::cache::AuthMapCache;
use crate::errors::{AuthError, HandlerError};
use crate::handlers::{AuthHandler, AuthRequest};
use crate::node::NodeIdResolver;
use crate::observability::metrics::{self, DeleteReason};
use authmap::{AuthInfo, AuthKey, SignalAuthKey};
use chrono::{DateTime, Utc};
use common::{AuthType, Clock, Identity};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of handling one authentication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Another attempt for the same key was already running.
    AlreadyPending,
    /// A live entry already existed.
    CacheHit,
    /// The handler succeeded and the entry was written.
    Authenticated { expiration: DateTime<Utc> },
}

impl AuthOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::AlreadyPending => "already_pending",
            AuthOutcome::CacheHit => "cache_hit",
            AuthOutcome::Authenticated { .. } => "authenticated",
        }
    }
}

/// Dispatches authentication requests to handlers and maintains the cache.
pub struct AuthManager {
    handlers: HashMap<AuthType, Arc<dyn AuthHandler>>,
    cache: Arc<AuthMapCache>,
    nodes: Arc<dyn NodeIdResolver>,
    clock: Arc<dyn Clock>,
    pending: Mutex<HashSet<AuthKey>>,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("auth_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Unmarks a pending key when dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashSet<AuthKey>>,
    key: AuthKey,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl AuthManager {
    /// Build a manager over the given handlers.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::DuplicateHandler` if two handlers serve the same
    /// auth type.
    pub fn new(
        handlers: Vec<Arc<dyn AuthHandler>>,
        cache: Arc<AuthMapCache>,
        nodes: Arc<dyn NodeIdResolver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let mut by_type: HashMap<AuthType, Arc<dyn AuthHandler>> = HashMap::new();
        for handler in handlers {
            let auth_type = handler.auth_type();
            if by_type.insert(auth_type, handler).is_some() {
                return Err(AuthError::DuplicateHandler(auth_type));
            }
        }

        Ok(Self {
            handlers: by_type,
            cache,
            nodes,
            clock,
            pending: Mutex::new(HashSet::new()),
        })
    }

    /// The cache this manager writes to.
    #[must_use]
    pub fn cache(&self) -> &Arc<AuthMapCache> {
        &self.cache
    }

    /// Rotation streams of every handler that exposes one.
    ///
    /// Each handler hands out its stream once, so this yields the streams
    /// only on the first call.
    #[must_use]
    pub fn rotation_streams(&self) -> Vec<(AuthType, mpsc::Receiver<Identity>)> {
        self.handlers
            .iter()
            .filter_map(|(auth_type, handler)| {
                handler
                    .subscribe_to_rotated_identities()
                    .map(|rx| (*auth_type, rx))
            })
            .collect()
    }

    fn mark_pending(&self, key: AuthKey) -> Option<PendingGuard<'_>> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(key) {
            return None;
        }
        Some(PendingGuard {
            pending: &self.pending,
            key,
        })
    }

    /// Authenticate the key carried by `signal` unless a live entry exists.
    ///
    /// # Errors
    ///
    /// Returns an error if no handler serves the auth type, the remote node
    /// has no known address, the handler fails, or the entry cannot be
    /// written. No entry is written in any of these cases.
    pub async fn handle_auth_request(
        &self,
        signal: SignalAuthKey,
    ) -> Result<AuthOutcome, AuthError> {
        let result = self.authenticate_if_needed(signal).await;
        match &result {
            Ok(outcome) => metrics::record_request(outcome.as_str()),
            Err(e) => {
                metrics::record_request("failed");
                metrics::record_failure(signal.auth_type, e.error_type());
            }
        }
        result
    }

    async fn authenticate_if_needed(
        &self,
        signal: SignalAuthKey,
    ) -> Result<AuthOutcome, AuthError> {
        let SignalAuthKey { key, auth_type } = signal;

        let Some(_guard) = self.mark_pending(key) else {
            debug!(target: "auth.manager", key = %key, "Authentication already pending, skipping");
            return Ok(AuthOutcome::AlreadyPending);
        };

        if let Some(info) = self.cache.get(&key).await {
            if !info.is_expired_at(self.clock.now()) {
                debug!(
                    target: "auth.manager",
                    key = %key,
                    expiration = %info.expiration(),
                    "Already authenticated"
                );
                return Ok(AuthOutcome::CacheHit);
            }
        }

        let handler = self
            .handlers
            .get(&auth_type)
            .ok_or(AuthError::UnknownAuthType(auth_type))?;

        let remote_node_ip = self
            .nodes
            .node_ip(key.remote_node_id)
            .ok_or(AuthError::NodeIpUnavailable(key.remote_node_id))?;

        let request = AuthRequest {
            local_identity: key.local_identity,
            remote_identity: key.remote_identity,
            remote_node_id: key.remote_node_id,
            remote_node_ip,
        };

        let started = Instant::now();
        let result = handler.authenticate(&request).await;
        metrics::record_handshake_duration(auth_type, started.elapsed());

        let handler_error = |source| AuthError::Handler {
            key,
            auth_type,
            source,
        };
        let response = result.map_err(handler_error)?;
        // Judged at stored precision; the datapath only sees whole seconds.
        let info = AuthInfo::new(response.expiration);
        if info.is_expired_at(self.clock.now()) {
            return Err(handler_error(HandlerError::Expired));
        }

        self.cache.set(key, info).await?;

        debug!(
            target: "auth.manager",
            key = %key,
            auth_type = %auth_type,
            expiration = %info.expiration(),
            "Successfully authenticated"
        );
        Ok(AuthOutcome::Authenticated {
            expiration: info.expiration(),
        })
    }

    /// Evict every entry referencing `identity`.
    ///
    /// Evicted pairs are re-authenticated when the datapath next signals
    /// them. Returns the number of evicted entries.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Store` if an entry could not be deleted; the other
    /// matching entries are still evicted.
    pub async fn handle_certificate_rotation_event(
        &self,
        identity: Identity,
    ) -> Result<usize, AuthError> {
        let (evicted, error) = self
            .cache
            .delete_matching(|key, _| key.references_identity(identity))
            .await;
        metrics::record_entries_deleted(DeleteReason::Rotation, evicted);

        info!(
            target: "auth.manager",
            identity = %identity,
            evicted,
            "Evicted auth entries after certificate rotation"
        );

        match error {
            None => Ok(evicted),
            Some(e) => {
                warn!(
                    target: "auth.manager",
                    identity = %identity,
                    error = %e,
                    "Failed to evict some auth entries after certificate rotation"
                );
                Err(AuthError::Store(e))
            }
        }
    }
}
