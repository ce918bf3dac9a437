//! Startup and shutdown of the auth subsystem.
//!
//! Startup order is fixed: the cache is restored from the store before the
//! signal channel is registered, so no request is ever processed against
//! a cache that does not reflect the persisted map. A restore failure
//! aborts startup with nothing spawned.

use crate::cache::AuthMapCache;
use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::gc::{AuthMapGarbageCollector, IdentityEvent, NodeEvent};
use crate::handlers::AuthHandler;
use crate::manager::AuthManager;
use crate::node::NodeIdResolver;
use crate::signal::{self, SignalSender, SignalSource};
use crate::tasks;
use authmap::{AuthMapStore, InMemoryAuthMap};
use common::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Collaborators and inputs of [`AuthSubsystem::start`].
pub struct AuthSubsystemParams {
    pub config: AuthConfig,
    /// Persisted map; an in-memory map sized by `config.map_max_entries` when absent.
    pub store: Option<Arc<dyn AuthMapStore>>,
    pub handlers: Vec<Arc<dyn AuthHandler>>,
    pub nodes: Arc<dyn NodeIdResolver>,
    pub signal_source: Arc<dyn SignalSource>,
    /// Identity lifecycle feed; identity GC is not started when absent.
    pub identity_events: Option<mpsc::Receiver<IdentityEvent>>,
    /// Node lifecycle feed; node GC is not started when absent.
    pub node_events: Option<mpsc::Receiver<NodeEvent>>,
    pub clock: Arc<dyn Clock>,
}

/// A running auth subsystem.
pub struct AuthSubsystem {
    manager: Arc<AuthManager>,
    gc: Arc<AuthMapGarbageCollector>,
    signal_sender: SignalSender,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
}

impl AuthSubsystem {
    /// Restore the cache, register with the signal source, and spawn every
    /// background task.
    ///
    /// # Errors
    ///
    /// - `AuthError::Restore` if the persisted map cannot be read
    /// - `AuthError::DuplicateHandler` if two handlers serve the same auth type
    /// - Any error returned by the signal source on registration
    ///
    /// No task is running when an error is returned.
    pub async fn start(params: AuthSubsystemParams) -> Result<Self, AuthError> {
        let AuthSubsystemParams {
            config,
            store,
            handlers,
            nodes,
            signal_source,
            identity_events,
            node_events,
            clock,
        } = params;

        let store = store.unwrap_or_else(|| {
            Arc::new(InMemoryAuthMap::with_max_entries(config.map_max_entries)) as Arc<dyn AuthMapStore>
        });
        if store.max_entries() != config.map_max_entries {
            warn!(
                target: "auth.subsystem",
                store_capacity = store.max_entries(),
                configured = config.map_max_entries,
                "Auth map store capacity differs from configured map size"
            );
        }
        let cache = Arc::new(AuthMapCache::new(store));
        cache.restore_cache().await.map_err(|e| {
            error!(target: "auth.subsystem", error = %e, "Failed to restore auth map cache");
            AuthError::Restore(e)
        })?;

        let manager = Arc::new(AuthManager::new(
            handlers,
            Arc::clone(&cache),
            Arc::clone(&nodes),
            Arc::clone(&clock),
        )?);
        let gc = Arc::new(AuthMapGarbageCollector::new(cache, nodes, clock));

        let (signal_sender, signal_receiver) = signal::channel(config.queue_size);
        signal_source.register_auth_required(signal_sender.clone())?;

        let cancel_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        tracker.spawn(tasks::start_auth_request_processing(
            Arc::clone(&manager),
            signal_receiver,
            config.max_concurrent_requests,
            tracker.clone(),
            cancel_token.child_token(),
        ));

        for (auth_type, rotated) in manager.rotation_streams() {
            tracker.spawn(tasks::start_reauthentication(
                Arc::clone(&manager),
                auth_type,
                rotated,
                cancel_token.child_token(),
            ));
        }

        if let Some(events) = identity_events {
            tracker.spawn(tasks::start_identity_gc(
                Arc::clone(&gc),
                events,
                cancel_token.child_token(),
            ));
        }
        if let Some(events) = node_events {
            tracker.spawn(tasks::start_node_gc(
                Arc::clone(&gc),
                events,
                cancel_token.child_token(),
            ));
        }

        tracker.spawn(tasks::start_expiration_gc(
            Arc::clone(&gc),
            config.expired_gc_interval,
            cancel_token.child_token(),
        ));

        info!(
            target: "auth.subsystem",
            queue_size = config.queue_size,
            expired_gc_interval_seconds = config.expired_gc_interval.as_secs(),
            "Auth subsystem started"
        );

        Ok(Self {
            manager,
            gc,
            signal_sender,
            cancel_token,
            tracker,
        })
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<AuthManager> {
        &self.manager
    }

    #[must_use]
    pub fn garbage_collector(&self) -> &Arc<AuthMapGarbageCollector> {
        &self.gc
    }

    /// Sender side of the signal channel registered with the signal source.
    #[must_use]
    pub fn signal_sender(&self) -> &SignalSender {
        &self.signal_sender
    }

    /// Stop every task and wait up to `deadline` for in-flight work.
    ///
    /// Returns `true` if every task finished in time. Tasks still running
    /// after the deadline are left to finish on their own.
    pub async fn shutdown(self, deadline: Duration) -> bool {
        info!(target: "auth.subsystem", "Shutting down auth subsystem");
        self.cancel_token.cancel();
        self.tracker.close();

        if tokio::time::timeout(deadline, self.tracker.wait()).await.is_ok() {
            info!(target: "auth.subsystem", "Auth subsystem stopped");
            true
        } else {
            warn!(
                target: "auth.subsystem",
                deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                in_flight = self.tracker.len(),
                "Auth subsystem did not drain before deadline"
            );
            false
        }
    }
}
