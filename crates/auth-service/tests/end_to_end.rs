//! End-to-end tests of the auth subsystem.
//!
//! Signals enter through the registered signal channel exactly as the
//! datapath would raise them; results are observed in the store the
//! datapath reads. Tokio time is paused so GC intervals elapse instantly,
//! while entry expiry follows the mock wall clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use auth_service::gc::{IdentityDescriptor, IdentityEvent, NodeDescriptor, NodeEvent};
use auth_service::{
    AuthConfig, AuthHandler, AuthOutcome, AuthSubsystem, AuthSubsystemParams, HandlerError,
};
use auth_test_utils::{
    node_ip, node_table, signal, wait_until, MockAuthHandler, MockClock, MockSignalSource,
    TEST_EPOCH_SECS,
};
use authmap::{AuthInfo, AuthKey, InMemoryAuthMap};
use chrono::Duration as ChronoDuration;
use common::{AuthType, Clock, Identity};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Harness {
    subsystem: AuthSubsystem,
    source: Arc<MockSignalSource>,
    handler: Arc<MockAuthHandler>,
    store: Arc<InMemoryAuthMap>,
    clock: Arc<MockClock>,
    identity_tx: mpsc::Sender<IdentityEvent>,
    node_tx: mpsc::Sender<NodeEvent>,
    rotation_tx: mpsc::Sender<Identity>,
}

struct Options {
    queue_size: usize,
    gc_interval: Duration,
    gated: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            gc_interval: Duration::from_secs(60),
            gated: false,
        }
    }
}

async fn start(options: Options) -> (Harness, Option<Arc<tokio::sync::Semaphore>>) {
    auth_test_utils::init_test_tracing();

    let clock = Arc::new(MockClock::at_unix(TEST_EPOCH_SECS));
    let (handler, rotation_tx) = MockAuthHandler::new(AuthType::Mutual, clock.clone())
        .with_validity_secs(600)
        .with_rotation_stream(8);
    let (handler, gate) = if options.gated {
        let (handler, gate) = handler.with_gate();
        (handler, Some(gate))
    } else {
        (handler, None)
    };
    let handler = Arc::new(handler);
    let store = Arc::new(InMemoryAuthMap::new());
    let source = Arc::new(MockSignalSource::new());
    let (identity_tx, identity_rx) = mpsc::channel(8);
    let (node_tx, node_rx) = mpsc::channel(8);

    let config = AuthConfig {
        queue_size: options.queue_size,
        expired_gc_interval: options.gc_interval,
        ..AuthConfig::default()
    };

    let subsystem = AuthSubsystem::start(AuthSubsystemParams {
        config,
        store: Some(store.clone()),
        handlers: vec![handler.clone() as Arc<dyn AuthHandler>],
        nodes: node_table(&[7, 8]),
        signal_source: source.clone(),
        identity_events: Some(identity_rx),
        node_events: Some(node_rx),
        clock: clock.clone(),
    })
    .await
    .expect("subsystem should start");

    (
        Harness {
            subsystem,
            source,
            handler,
            store,
            clock,
            identity_tx,
            node_tx,
            rotation_tx,
        },
        gate,
    )
}

impl Harness {
    fn raise(&self, local: u32, remote: u32, node: u16) -> bool {
        self.source
            .sender()
            .try_send(signal(local, remote, node, AuthType::Mutual))
    }

    async fn stored(&self, local: u32, remote: u32, node: u16) -> Option<AuthInfo> {
        self.store.lookup(&AuthKey::new(local, remote, node)).await
    }

    async fn wait_stored(&self, local: u32, remote: u32, node: u16) -> AuthInfo {
        wait_until(move || async move { self.stored(local, remote, node).await.is_some() }).await;
        self.stored(local, remote, node).await.unwrap()
    }

    async fn wait_removed(&self, local: u32, remote: u32, node: u16) {
        wait_until(move || async move { self.stored(local, remote, node).await.is_none() }).await;
    }

    async fn wait_calls(&self, calls: usize) {
        wait_until(move || async move { self.handler.calls() == calls }).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_signal_authenticate_cache_expire_reauthenticate() {
    let (h, _) = start(Options::default()).await;
    assert_eq!(h.source.registrations(), 1);

    // First signal: handler called once, entry written with now + 600s.
    assert!(h.raise(100, 200, 7));
    let info = h.wait_stored(100, 200, 7).await;
    assert_eq!(info.expiration(), h.clock.now() + ChronoDuration::seconds(600));
    assert_eq!(h.handler.calls(), 1);

    let request = h.handler.requests().first().copied().unwrap();
    assert_eq!(request.local_identity, Identity(100));
    assert_eq!(request.remote_identity, Identity(200));
    assert_eq!(request.remote_node_ip, node_ip(7));

    let key = AuthKey::new(100, 200, 7);
    assert_eq!(h.subsystem.manager().cache().get(&key).await, Some(info));

    // Second signal before expiry: no handler call.
    assert!(h.raise(100, 200, 7));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.handler.calls(), 1);
    assert_eq!(
        h.subsystem
            .manager()
            .handle_auth_request(signal(100, 200, 7, AuthType::Mutual))
            .await
            .unwrap(),
        AuthOutcome::CacheHit
    );

    // After 600s the periodic sweep removes the entry.
    h.clock.advance_secs(600);
    tokio::time::sleep(Duration::from_secs(60)).await;
    h.wait_removed(100, 200, 7).await;
    assert_eq!(h.subsystem.manager().cache().get(&key).await, None);

    // Third signal authenticates again.
    assert!(h.raise(100, 200, 7));
    h.wait_calls(2).await;
    h.wait_stored(100, 200, 7).await;

    assert!(h.subsystem.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_identity_deletion_removes_entry_before_next_sweep() {
    let (h, _) = start(Options {
        gc_interval: Duration::from_secs(900),
        ..Options::default()
    })
    .await;

    assert!(h.raise(100, 200, 7));
    assert!(h.raise(100, 300, 7));
    h.wait_stored(100, 200, 7).await;
    h.wait_stored(100, 300, 7).await;

    let started = tokio::time::Instant::now();
    h.identity_tx
        .send(IdentityEvent::Delete(IdentityDescriptor {
            name: "200".to_string(),
        }))
        .await
        .unwrap();
    h.wait_removed(100, 200, 7).await;

    assert!(started.elapsed() < Duration::from_secs(900));
    assert!(h.stored(100, 300, 7).await.is_some());

    assert!(h.subsystem.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_node_deletion_removes_entries_of_that_node() {
    let (h, _) = start(Options::default()).await;

    assert!(h.raise(100, 200, 7));
    assert!(h.raise(100, 200, 8));
    h.wait_stored(100, 200, 7).await;
    h.wait_stored(100, 200, 8).await;

    // A malformed descriptor is rejected and removes nothing.
    h.node_tx
        .send(NodeEvent::Delete(NodeDescriptor {
            name: "worker-8".to_string(),
            addresses: vec![node_ip(8).to_string(), "not-an-ip".to_string()],
        }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.stored(100, 200, 8).await.is_some());

    h.node_tx
        .send(NodeEvent::Delete(NodeDescriptor {
            name: "worker-8".to_string(),
            addresses: vec![node_ip(8).to_string()],
        }))
        .await
        .unwrap();
    h.wait_removed(100, 200, 8).await;
    assert!(h.stored(100, 200, 7).await.is_some());

    assert!(h.subsystem.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_signal_burst_for_one_key_authenticates_once() {
    let (h, gate) = start(Options {
        gated: true,
        ..Options::default()
    })
    .await;
    let gate = gate.unwrap();

    for _ in 0..10 {
        assert!(h.raise(100, 200, 7));
    }
    h.wait_calls(1).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.handler.calls(), 1);

    gate.add_permits(1);
    h.wait_stored(100, 200, 7).await;

    // Signals queued behind the pending attempt now hit the cache.
    assert!(h.raise(100, 200, 7));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.handler.calls(), 1);

    assert!(h.subsystem.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_rotation_evicts_and_next_signal_reauthenticates() {
    let (h, _) = start(Options::default()).await;

    assert!(h.raise(100, 200, 7));
    assert!(h.raise(300, 400, 7));
    h.wait_stored(100, 200, 7).await;
    h.wait_stored(300, 400, 7).await;
    assert_eq!(h.handler.calls(), 2);

    h.rotation_tx.send(Identity(200)).await.unwrap();
    h.wait_removed(100, 200, 7).await;
    assert!(h.stored(300, 400, 7).await.is_some());

    // Eviction alone does not re-run the handshake.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.handler.calls(), 2);

    assert!(h.raise(100, 200, 7));
    h.wait_stored(100, 200, 7).await;
    assert_eq!(h.handler.calls(), 3);

    assert!(h.subsystem.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_handler_failure_leaves_no_entry_until_retry_succeeds() {
    let (h, _) = start(Options::default()).await;
    h.handler
        .set_error(Some(HandlerError::Handshake("connection reset".to_string())));

    assert!(h.raise(100, 200, 7));
    h.wait_calls(1).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.stored(100, 200, 7).await.is_none());

    h.handler.set_error(None);
    assert!(h.raise(100, 200, 7));
    h.wait_stored(100, 200, 7).await;
    assert_eq!(h.handler.calls(), 2);

    assert!(h.subsystem.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_drops_are_counted() {
    let (h, _) = start(Options {
        queue_size: 2,
        ..Options::default()
    })
    .await;
    let sender = h.source.sender();

    // No await between sends, so the consumer cannot drain in between.
    let accepted = (0..5_u32)
        .filter(|&i| sender.try_send(signal(100 + i, 200, 7, AuthType::Mutual)))
        .count();

    assert_eq!(accepted, 2);
    assert_eq!(sender.dropped(), 3);
    assert_eq!(h.subsystem.signal_sender().dropped(), 3);

    h.wait_stored(100, 200, 7).await;
    h.wait_stored(101, 200, 7).await;
    assert_eq!(h.handler.calls(), 2);

    assert!(h.subsystem.shutdown(Duration::from_secs(5)).await);
}
