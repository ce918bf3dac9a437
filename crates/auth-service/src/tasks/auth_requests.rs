//! Authentication request processing task.

use crate::manager::{AuthManager, AuthOutcome};
use crate::signal::SignalReceiver;
use authmap::SignalAuthKey;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

/// Drain `signals`, handling each request on its own task in `tracker`.
///
/// Requests for distinct keys run concurrently, at most `max_in_flight` at
/// a time; while every slot is busy the queue is not drained, so a burst
/// backs up into the bounded queue and overflows there as counted drops.
/// The manager skips a key that already has an attempt in flight. Returns
/// when the token is cancelled or every sender is gone. In-flight requests
/// keep running and are awaited through the tracker.
#[instrument(skip_all, name = "auth.task.auth_requests")]
pub async fn start_auth_request_processing(
    manager: Arc<AuthManager>,
    mut signals: SignalReceiver,
    max_in_flight: usize,
    tracker: TaskTracker,
    cancel_token: CancellationToken,
) {
    info!(
        target: "auth.task.auth_requests",
        max_in_flight,
        "Starting auth request processing task"
    );

    let slots = Arc::new(Semaphore::new(max_in_flight.max(1)));

    loop {
        let permit = tokio::select! {
            permit = Arc::clone(&slots).acquire_owned() => {
                let Ok(permit) = permit else { break };
                permit
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "auth.task.auth_requests",
                    "Auth request processing task received shutdown signal, exiting"
                );
                break;
            }
        };

        tokio::select! {
            signal = signals.recv() => {
                let Some(signal) = signal else {
                    info!(
                        target: "auth.task.auth_requests",
                        "Signal channel closed, exiting"
                    );
                    break;
                };
                let manager = Arc::clone(&manager);
                tracker.spawn(async move {
                    process_signal(&manager, signal).await;
                    drop(permit);
                });
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "auth.task.auth_requests",
                    "Auth request processing task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    signals.close();
    info!(target: "auth.task.auth_requests", "Auth request processing task stopped");
}

/// Handle one signal, logging the result.
pub(crate) async fn process_signal(manager: &AuthManager, signal: SignalAuthKey) {
    match manager.handle_auth_request(signal).await {
        Ok(AuthOutcome::Authenticated { expiration }) => {
            info!(
                target: "auth.task.auth_requests",
                local_identity = %signal.key.local_identity,
                remote_identity = %signal.key.remote_identity,
                remote_node_id = %signal.key.remote_node_id,
                auth_type = %signal.auth_type,
                expiration = %expiration,
                "Authenticated"
            );
        }
        Ok(outcome) => {
            debug!(
                target: "auth.task.auth_requests",
                key = %signal.key,
                outcome = outcome.as_str(),
                "Auth request needed no authentication"
            );
        }
        Err(e) => {
            warn!(
                target: "auth.task.auth_requests",
                local_identity = %signal.key.local_identity,
                remote_identity = %signal.key.remote_identity,
                remote_node_id = %signal.key.remote_node_id,
                auth_type = %signal.auth_type,
                error = %e,
                "Failed to handle auth request"
            );
        }
    }
}
