//! Authentication strategies.
//!
//! One [`AuthHandler`] serves each [`AuthType`]. The manager resolves the
//! handler from the signal's auth type and never inspects how the handler
//! reaches its decision.

mod always_fail;
mod mutual;
mod null;

pub use always_fail::AlwaysFailAuthHandler;
pub use mutual::{
    CertificateInfo, CertificateProvider, HandshakeRequest, Handshaker, MutualAuthHandler,
    PeerCertificate,
};
pub use null::NullAuthHandler;

use crate::errors::HandlerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AuthType, Identity, NodeId};
use std::net::IpAddr;
use tokio::sync::mpsc;

/// Input of one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRequest {
    pub local_identity: Identity,
    pub remote_identity: Identity,
    pub remote_node_id: NodeId,
    pub remote_node_ip: IpAddr,
}

/// Result of a successful authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResponse {
    /// Time until which the pair is considered authenticated.
    pub expiration: DateTime<Utc>,
}

/// An authentication strategy for one auth type.
#[async_trait]
pub trait AuthHandler: Send + Sync {
    /// The auth type this handler serves.
    fn auth_type(&self) -> AuthType;

    /// Authenticate the pair described by `request`.
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResponse, HandlerError>;

    /// Stream of identities whose credentials were rotated.
    ///
    /// Handlers without credentials return `None`. A handler hands its
    /// stream out at most once; later calls return `None`.
    fn subscribe_to_rotated_identities(&self) -> Option<mpsc::Receiver<Identity>> {
        None
    }
}
