//! Mutual certificate authentication.
//!
//! The handler fetches the local identity's certificate, performs a
//! handshake with the remote node's auth listener, and grants access until
//! the earliest expiry of any certificate involved. Certificate issuance
//! and the handshake protocol itself live behind [`CertificateProvider`]
//! and [`Handshaker`].

use super::{AuthHandler, AuthRequest, AuthResponse};
use crate::config::MutualAuthConfig;
use crate::errors::HandlerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AuthType, Clock, Identity};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// A certificate held for a local identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub identity: Identity,
    /// DER-encoded certificate chain, leaf first.
    pub chain: Vec<Vec<u8>>,
    pub not_after: DateTime<Utc>,
}

/// A certificate presented by the peer during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    /// Identity the certificate was issued for.
    pub identity: Identity,
    pub not_after: DateTime<Utc>,
}

/// Parameters of one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub local_certificate: CertificateInfo,
    /// The remote node's auth listener.
    pub remote_addr: SocketAddr,
    /// Name the peer is expected to present a certificate for.
    pub server_name: String,
}

/// Issues certificates for local identities.
#[async_trait]
pub trait CertificateProvider: Send + Sync {
    /// Current certificate for `identity`.
    async fn certificate_for_identity(
        &self,
        identity: Identity,
    ) -> Result<CertificateInfo, HandlerError>;

    /// Server name under which `identity` presents its certificate.
    fn sni_for_identity(&self, identity: Identity) -> String {
        format!("{identity}.spiffe.cilium")
    }

    /// Stream of identities whose certificates were rotated. Handed out at most once.
    fn subscribe_to_rotated_identities(&self) -> Option<mpsc::Receiver<Identity>> {
        None
    }
}

/// Performs the mutual handshake with a peer node.
#[async_trait]
pub trait Handshaker: Send + Sync {
    /// Run the handshake and return the peer's certificate chain, leaf first.
    async fn handshake(&self, request: &HandshakeRequest)
        -> Result<Vec<PeerCertificate>, HandlerError>;
}

/// Authenticates pairs with a mutual certificate handshake.
pub struct MutualAuthHandler {
    config: MutualAuthConfig,
    provider: Arc<dyn CertificateProvider>,
    handshaker: Arc<dyn Handshaker>,
    clock: Arc<dyn Clock>,
}

impl MutualAuthHandler {
    #[must_use]
    pub fn new(
        config: MutualAuthConfig,
        provider: Arc<dyn CertificateProvider>,
        handshaker: Arc<dyn Handshaker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            provider,
            handshaker,
            clock,
        }
    }
}

#[async_trait]
impl AuthHandler for MutualAuthHandler {
    fn auth_type(&self) -> AuthType {
        AuthType::Mutual
    }

    #[instrument(skip_all, name = "auth.handler.mutual.authenticate", fields(
        local_identity = %request.local_identity,
        remote_identity = %request.remote_identity,
        remote_node_id = %request.remote_node_id,
    ))]
    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResponse, HandlerError> {
        let local_certificate = self
            .provider
            .certificate_for_identity(request.local_identity)
            .await?;

        let handshake = HandshakeRequest {
            remote_addr: SocketAddr::new(request.remote_node_ip, self.config.listener_port),
            server_name: self.provider.sni_for_identity(request.remote_identity),
            local_certificate,
        };

        let timeout = self.config.connect_timeout;
        let peer_chain = tokio::time::timeout(timeout, self.handshaker.handshake(&handshake))
            .await
            .map_err(|_| HandlerError::Timeout(timeout))??;

        let leaf = peer_chain
            .first()
            .ok_or_else(|| HandlerError::Handshake("peer presented no certificate".to_string()))?;
        if leaf.identity != request.remote_identity {
            return Err(HandlerError::Handshake(format!(
                "peer presented certificate for identity {}, expected {}",
                leaf.identity, request.remote_identity
            )));
        }

        let expiration = peer_chain
            .iter()
            .map(|cert| cert.not_after)
            .fold(handshake.local_certificate.not_after, std::cmp::min);

        if expiration <= self.clock.now() {
            return Err(HandlerError::Expired);
        }

        debug!(
            target: "auth.handler.mutual",
            remote_addr = %handshake.remote_addr,
            expiration = %expiration,
            "Mutual authentication succeeded"
        );
        Ok(AuthResponse { expiration })
    }

    fn subscribe_to_rotated_identities(&self) -> Option<mpsc::Receiver<Identity>> {
        self.provider.subscribe_to_rotated_identities()
    }
}
