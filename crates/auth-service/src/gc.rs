//! Auth map garbage collection.
//!
//! Entries are removed when they expire, when an identity on either side of
//! the key is deleted, or when the remote node is deleted. Deletions may
//! race with an in-flight authentication of the same key; whichever write
//! lands last wins, and a wrongly missing entry is restored by the next
//! signal for that key.

use crate::cache::AuthMapCache;
use crate::errors::GcError;
use crate::node::NodeIdResolver;
use crate::observability::metrics::{self, DeleteReason};
use common::{Clock, Identity, NodeId};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity resource as delivered by the lifecycle feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDescriptor {
    /// Decimal numeric identity.
    pub name: String,
}

/// Node resource as delivered by the lifecycle feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub name: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    Upsert(IdentityDescriptor),
    Delete(IdentityDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Upsert(NodeDescriptor),
    Delete(NodeDescriptor),
}

impl IdentityDescriptor {
    /// Parse the numeric identity from the resource name.
    ///
    /// # Errors
    ///
    /// Returns `GcError::MalformedIdentity` if the name is not a decimal `u32`.
    pub fn identity(&self) -> Result<Identity, GcError> {
        self.name
            .parse::<u32>()
            .map(Identity)
            .map_err(|_| GcError::MalformedIdentity(self.name.clone()))
    }
}

impl NodeDescriptor {
    /// Parse every address of the node.
    ///
    /// # Errors
    ///
    /// Returns `GcError::MalformedAddress` for the first unparsable address.
    pub fn ip_addresses(&self) -> Result<Vec<IpAddr>, GcError> {
        self.addresses
            .iter()
            .map(|address| {
                address
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| GcError::MalformedAddress {
                        node: self.name.clone(),
                        address: address.clone(),
                    })
            })
            .collect()
    }
}

/// Removes stale auth map entries.
pub struct AuthMapGarbageCollector {
    cache: Arc<AuthMapCache>,
    nodes: Arc<dyn NodeIdResolver>,
    clock: Arc<dyn Clock>,
}

impl AuthMapGarbageCollector {
    #[must_use]
    pub fn new(
        cache: Arc<AuthMapCache>,
        nodes: Arc<dyn NodeIdResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            nodes,
            clock,
        }
    }

    /// Delete every entry whose expiration is at or before now.
    ///
    /// # Errors
    ///
    /// Returns `GcError::Store` if an entry could not be deleted; every other
    /// expired entry is still deleted and the failed one is retried on the
    /// next sweep.
    pub async fn cleanup_expired_entries(&self) -> Result<usize, GcError> {
        let now = self.clock.now();
        let (deleted, error) = self
            .cache
            .delete_matching(|_, info| info.is_expired_at(now))
            .await;
        metrics::record_entries_deleted(DeleteReason::Expired, deleted);

        if deleted > 0 {
            info!(target: "auth.gc", deleted, "Removed expired auth entries");
        } else {
            debug!(target: "auth.gc", "No expired auth entries");
        }
        error.map_or(Ok(deleted), |e| Err(e.into()))
    }

    /// Delete every entry referencing `identity` on either side.
    ///
    /// # Errors
    ///
    /// Returns `GcError::Store` if an entry could not be deleted.
    pub async fn cleanup_identity(&self, identity: Identity) -> Result<usize, GcError> {
        let (deleted, error) = self
            .cache
            .delete_matching(|key, _| key.references_identity(identity))
            .await;
        metrics::record_entries_deleted(DeleteReason::IdentityDeleted, deleted);

        info!(target: "auth.gc", identity = %identity, deleted, "Removed auth entries of deleted identity");
        error.map_or(Ok(deleted), |e| Err(e.into()))
    }

    /// Delete every entry whose remote node is one of `node_ids`.
    ///
    /// The local node is never a target.
    ///
    /// # Errors
    ///
    /// Returns `GcError::Store` if an entry could not be deleted.
    pub async fn cleanup_nodes(&self, node_ids: &HashSet<NodeId>) -> Result<usize, GcError> {
        let targets: HashSet<NodeId> = node_ids
            .iter()
            .copied()
            .filter(|node_id| !node_id.is_local())
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let (deleted, error) = self
            .cache
            .delete_matching(|key, _| targets.contains(&key.remote_node_id))
            .await;
        metrics::record_entries_deleted(DeleteReason::NodeDeleted, deleted);

        info!(target: "auth.gc", nodes = ?targets, deleted, "Removed auth entries of deleted nodes");
        error.map_or(Ok(deleted), |e| Err(e.into()))
    }

    /// React to an identity lifecycle event. Upserts are ignored.
    ///
    /// # Errors
    ///
    /// Returns `GcError::MalformedIdentity` for an unparsable identity name
    /// (nothing is deleted), or `GcError::Store` if a deletion failed.
    pub async fn handle_identity_event(&self, event: &IdentityEvent) -> Result<usize, GcError> {
        match event {
            IdentityEvent::Upsert(_) => Ok(0),
            IdentityEvent::Delete(descriptor) => {
                let identity = descriptor.identity()?;
                self.cleanup_identity(identity).await
            }
        }
    }

    /// React to a node lifecycle event. Upserts are ignored.
    ///
    /// # Errors
    ///
    /// Returns `GcError::MalformedAddress` if any address of the node is
    /// unparsable (nothing is deleted), or `GcError::Store` if a deletion
    /// failed.
    pub async fn handle_node_event(&self, event: &NodeEvent) -> Result<usize, GcError> {
        match event {
            NodeEvent::Upsert(_) => Ok(0),
            NodeEvent::Delete(descriptor) => {
                let node_ids: HashSet<NodeId> = descriptor
                    .ip_addresses()?
                    .into_iter()
                    .filter_map(|ip| self.nodes.node_id(ip))
                    .collect();

                if node_ids.is_empty() {
                    warn!(
                        target: "auth.gc",
                        node = %descriptor.name,
                        "No node id known for deleted node, nothing to clean up"
                    );
                    return Ok(0);
                }
                self.cleanup_nodes(&node_ids).await
            }
        }
    }
}
