//! Expired entry sweep task.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. A sweep
//! in progress completes before the task exits.

use crate::gc::AuthMapGarbageCollector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Sweep expired entries every `interval`, first one interval after start.
#[instrument(skip_all, name = "auth.task.expiration_gc")]
pub async fn start_expiration_gc(
    gc: Arc<AuthMapGarbageCollector>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "auth.task.expiration_gc",
        interval_seconds = interval.as_secs(),
        "Starting expired auth entry GC task"
    );

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(&gc).await;
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "auth.task.expiration_gc",
                    "Expired auth entry GC task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

/// Run a single sweep.
///
/// Separated from the loop for direct testing.
pub(crate) async fn run_sweep(gc: &AuthMapGarbageCollector) {
    if let Err(e) = gc.cleanup_expired_entries().await {
        error!(
            target: "auth.task.expiration_gc",
            error = %e,
            "Failed to remove expired auth entries"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::AuthMapCache;
    use crate::node::NodeIdTable;
    use auth_test_utils::{MockAuthMap, MockClock};
    use authmap::{AuthInfo, AuthKey};
    use chrono::Duration as ChronoDuration;
    use common::Clock;

    struct Fixture {
        gc: Arc<AuthMapGarbageCollector>,
        cache: Arc<AuthMapCache>,
        store: Arc<MockAuthMap>,
        clock: Arc<MockClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(MockClock::at_unix(1_700_000_000));
        let store = Arc::new(MockAuthMap::new());
        let cache = Arc::new(AuthMapCache::new(store.clone()));
        Fixture {
            gc: Arc::new(AuthMapGarbageCollector::new(
                cache.clone(),
                Arc::new(NodeIdTable::new()),
                clock.clone(),
            )),
            cache,
            store,
            clock,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_runs_one_interval_after_start() {
        let f = fixture();
        let key = AuthKey::new(100, 200, 7);
        f.cache
            .set(key, AuthInfo::new(f.clock.now() + ChronoDuration::seconds(600)))
            .await
            .unwrap();
        f.clock.advance_secs(600);

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(start_expiration_gc(
            f.gc.clone(),
            Duration::from_secs(900),
            cancel_token.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(899)).await;
        assert!(f.cache.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(f.cache.get(&key).await.is_none());
        assert_eq!(f.store.get(&key), None);

        cancel_token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sweep_is_retried_next_interval() {
        let f = fixture();
        let key = AuthKey::new(100, 200, 7);
        f.cache
            .set(key, AuthInfo::new(f.clock.now() + ChronoDuration::seconds(1)))
            .await
            .unwrap();
        f.clock.advance_secs(1);

        f.store.fail_deletes(true);
        run_sweep(&f.gc).await;
        assert!(f.cache.get(&key).await.is_some());

        f.store.fail_deletes(false);
        run_sweep(&f.gc).await;
        assert!(f.cache.get(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exits_on_cancellation() {
        let f = fixture();
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(start_expiration_gc(
            f.gc.clone(),
            Duration::from_secs(900),
            cancel_token.clone(),
        ));

        cancel_token.cancel();
        handle.await.unwrap();
    }
}
