//! Identity and node deletion GC tasks.

use crate::gc::{AuthMapGarbageCollector, IdentityEvent, NodeEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Remove the entries of every identity deleted on `events`.
#[instrument(skip_all, name = "auth.task.identity_gc")]
pub async fn start_identity_gc(
    gc: Arc<AuthMapGarbageCollector>,
    mut events: mpsc::Receiver<IdentityEvent>,
    cancel_token: CancellationToken,
) {
    info!(target: "auth.task.identity_gc", "Starting identity GC task");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    info!(target: "auth.task.identity_gc", "Identity event stream closed, exiting");
                    break;
                };
                if let Err(e) = gc.handle_identity_event(&event).await {
                    warn!(
                        target: "auth.task.identity_gc",
                        error = %e,
                        "Failed to clean up auth entries of deleted identity"
                    );
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "auth.task.identity_gc",
                    "Identity GC task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

/// Remove the entries of every node deleted on `events`.
#[instrument(skip_all, name = "auth.task.node_gc")]
pub async fn start_node_gc(
    gc: Arc<AuthMapGarbageCollector>,
    mut events: mpsc::Receiver<NodeEvent>,
    cancel_token: CancellationToken,
) {
    info!(target: "auth.task.node_gc", "Starting node GC task");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    info!(target: "auth.task.node_gc", "Node event stream closed, exiting");
                    break;
                };
                if let Err(e) = gc.handle_node_event(&event).await {
                    warn!(
                        target: "auth.task.node_gc",
                        error = %e,
                        "Failed to clean up auth entries of deleted node"
                    );
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "auth.task.node_gc",
                    "Node GC task received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}
