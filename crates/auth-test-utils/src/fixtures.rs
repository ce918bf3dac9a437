//! Common test data.

use auth_service::NodeIdTable;
use authmap::{AuthKey, SignalAuthKey};
use common::{AuthType, NodeId};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

/// Unix time most tests start at.
pub const TEST_EPOCH_SECS: i64 = 1_700_000_000;

/// Address of node `node_id` in test node tables: `10.0.<hi>.<lo>`.
pub fn node_ip(node_id: u16) -> IpAddr {
    let [hi, lo] = node_id.to_be_bytes();
    IpAddr::V4(Ipv4Addr::new(10, 0, hi, lo))
}

/// Node table knowing every node in `node_ids` at [`node_ip`].
pub fn node_table(node_ids: &[u16]) -> Arc<NodeIdTable> {
    let table = Arc::new(NodeIdTable::new());
    for &id in node_ids {
        table.upsert(NodeId(id), node_ip(id));
    }
    table
}

/// Signal for `local -> remote @ node` with `auth_type`.
pub fn signal(local: u32, remote: u32, node: u16, auth_type: AuthType) -> SignalAuthKey {
    SignalAuthKey::new(AuthKey::new(local, remote, node), auth_type)
}

/// Poll `condition` until it holds, failing the test after ten seconds.
///
/// Sleeps between polls so paused-time tests auto-advance.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met within 10 seconds");
}
