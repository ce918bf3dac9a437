//! Node id to address resolution.
//!
//! The manager needs the address of the remote node to route a handshake,
//! and the garbage collector needs the reverse mapping to turn a deleted
//! node's addresses into the node ids used in auth map keys.

use common::NodeId;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

/// Resolves node ids to addresses and back.
pub trait NodeIdResolver: Send + Sync {
    /// Address of the given node, if known.
    fn node_ip(&self, node_id: NodeId) -> Option<IpAddr>;

    /// Node id allocated for the given address, if any.
    fn node_id(&self, ip: IpAddr) -> Option<NodeId>;
}

#[derive(Debug, Default)]
struct Tables {
    ips: HashMap<NodeId, IpAddr>,
    ids: HashMap<IpAddr, NodeId>,
}

/// In-memory [`NodeIdResolver`] fed by node lifecycle updates.
#[derive(Debug, Default)]
pub struct NodeIdTable {
    tables: RwLock<Tables>,
}

impl NodeIdTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `ip` to `node_id`, replacing any previous mapping of either.
    pub fn upsert(&self, node_id: NodeId, ip: IpAddr) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old_ip) = tables.ips.insert(node_id, ip) {
            if old_ip != ip {
                tables.ids.remove(&old_ip);
            }
        }
        if let Some(old_id) = tables.ids.insert(ip, node_id) {
            if old_id != node_id {
                tables.ips.remove(&old_id);
            }
        }
    }

    /// Forget the node and its address.
    pub fn remove(&self, node_id: NodeId) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(ip) = tables.ips.remove(&node_id) {
            tables.ids.remove(&ip);
        }
    }
}

impl NodeIdResolver for NodeIdTable {
    fn node_ip(&self, node_id: NodeId) -> Option<IpAddr> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.ips.get(&node_id).copied()
    }

    fn node_id(&self, ip: IpAddr) -> Option<NodeId> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.ids.get(&ip).copied()
    }
}
