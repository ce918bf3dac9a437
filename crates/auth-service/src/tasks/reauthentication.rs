//! Re-authentication task driven by credential rotation.

use crate::manager::AuthManager;
use common::{AuthType, Identity};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Evict the entries of every identity received on `rotated`.
///
/// Evicted pairs are authenticated again when the datapath next signals
/// them. Returns when the token is cancelled or the handler closes its
/// stream.
#[instrument(skip_all, name = "auth.task.reauthentication", fields(auth_type = %auth_type))]
pub async fn start_reauthentication(
    manager: Arc<AuthManager>,
    auth_type: AuthType,
    mut rotated: mpsc::Receiver<Identity>,
    cancel_token: CancellationToken,
) {
    info!(
        target: "auth.task.reauthentication",
        auth_type = %auth_type,
        "Starting re-authentication task"
    );

    loop {
        tokio::select! {
            identity = rotated.recv() => {
                let Some(identity) = identity else {
                    info!(
                        target: "auth.task.reauthentication",
                        auth_type = %auth_type,
                        "Rotation stream closed, exiting"
                    );
                    break;
                };
                if let Err(e) = manager.handle_certificate_rotation_event(identity).await {
                    warn!(
                        target: "auth.task.reauthentication",
                        identity = %identity,
                        error = %e,
                        "Failed to handle certificate rotation"
                    );
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "auth.task.reauthentication",
                    auth_type = %auth_type,
                    "Re-authentication task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::AuthMapCache;
    use crate::node::NodeIdTable;
    use auth_test_utils::MockClock;
    use authmap::{AuthInfo, AuthKey, InMemoryAuthMap};
    use chrono::Duration as ChronoDuration;
    use common::Clock;
    use std::time::Duration;

    #[tokio::test]
    async fn test_rotation_evicts_until_stream_closes() {
        let clock = Arc::new(MockClock::at_unix(1_700_000_000));
        let store = Arc::new(InMemoryAuthMap::new());
        let cache = Arc::new(AuthMapCache::new(store.clone()));
        let expiration = AuthInfo::new(clock.now() + ChronoDuration::seconds(600));
        cache.set(AuthKey::new(100, 200, 7), expiration).await.unwrap();
        cache.set(AuthKey::new(300, 400, 7), expiration).await.unwrap();

        let manager = Arc::new(
            AuthManager::new(vec![], cache, Arc::new(NodeIdTable::new()), clock).unwrap(),
        );
        let (tx, rx) = mpsc::channel(4);

        let handle = tokio::spawn(start_reauthentication(
            manager,
            AuthType::Mutual,
            rx,
            CancellationToken::new(),
        ));

        tx.send(Identity(200)).await.unwrap();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task should exit when the stream closes")
            .unwrap();

        assert_eq!(store.lookup(&AuthKey::new(100, 200, 7)).await, None);
        assert_eq!(
            store.lookup(&AuthKey::new(300, 400, 7)).await,
            Some(expiration)
        );
    }

    #[tokio::test]
    async fn test_exits_on_cancellation() {
        let clock = Arc::new(MockClock::at_unix(1_700_000_000));
        let manager = Arc::new(
            AuthManager::new(
                vec![],
                Arc::new(AuthMapCache::new(Arc::new(InMemoryAuthMap::new()))),
                Arc::new(NodeIdTable::new()),
                clock,
            )
            .unwrap(),
        );
        let (_tx, rx) = mpsc::channel(4);
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(start_reauthentication(
            manager,
            AuthType::Mutual,
            rx,
            cancel_token.clone(),
        ));
        cancel_token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task should exit on cancellation")
            .unwrap();
    }
}
