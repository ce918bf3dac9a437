//! Certificate provider and handshaker mocks for the mutual handler.

use async_trait::async_trait;
use auth_service::handlers::{
    CertificateInfo, CertificateProvider, HandshakeRequest, Handshaker, PeerCertificate,
};
use auth_service::HandlerError;
use chrono::{DateTime, Utc};
use common::Identity;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Certificate provider issuing one certificate per identity.
#[derive(Debug, Default)]
pub struct MockCertificateProvider {
    certificates: Mutex<HashMap<Identity, DateTime<Utc>>>,
    rotations: Mutex<Option<mpsc::Receiver<Identity>>>,
}

impl MockCertificateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a certificate for `identity` valid until `not_after`.
    pub fn with_certificate(self, identity: Identity, not_after: DateTime<Utc>) -> Self {
        self.set_certificate(identity, not_after);
        self
    }

    /// Expose a rotation stream fed by the returned sender.
    pub fn with_rotation_stream(self, capacity: usize) -> (Self, mpsc::Sender<Identity>) {
        let (tx, rx) = mpsc::channel(capacity);
        *self.rotations.lock().unwrap() = Some(rx);
        (self, tx)
    }

    /// Replace the certificate of `identity`.
    pub fn set_certificate(&self, identity: Identity, not_after: DateTime<Utc>) {
        self.certificates
            .lock()
            .unwrap()
            .insert(identity, not_after);
    }
}

#[async_trait]
impl CertificateProvider for MockCertificateProvider {
    async fn certificate_for_identity(
        &self,
        identity: Identity,
    ) -> Result<CertificateInfo, HandlerError> {
        let not_after = self
            .certificates
            .lock()
            .unwrap()
            .get(&identity)
            .copied()
            .ok_or_else(|| HandlerError::CertificateUnavailable {
                identity,
                reason: "no certificate issued".to_string(),
            })?;
        Ok(CertificateInfo {
            identity,
            chain: vec![identity.get().to_le_bytes().to_vec()],
            not_after,
        })
    }

    fn subscribe_to_rotated_identities(&self) -> Option<mpsc::Receiver<Identity>> {
        self.rotations.lock().unwrap().take()
    }
}

/// Handshaker answering with the certificate issued for the requested server name.
#[derive(Debug, Default)]
pub struct MockHandshaker {
    peers: Mutex<HashMap<String, PeerCertificate>>,
    requests: Mutex<Vec<HandshakeRequest>>,
}

impl MockHandshaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer handshakes for `server_name` with a certificate for `identity`.
    pub fn with_peer(
        self,
        server_name: impl Into<String>,
        identity: Identity,
        not_after: DateTime<Utc>,
    ) -> Self {
        self.peers.lock().unwrap().insert(
            server_name.into(),
            PeerCertificate {
                identity,
                not_after,
            },
        );
        self
    }

    /// Every handshake attempted so far.
    pub fn requests(&self) -> Vec<HandshakeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handshaker for MockHandshaker {
    async fn handshake(
        &self,
        request: &HandshakeRequest,
    ) -> Result<Vec<PeerCertificate>, HandlerError> {
        self.requests.lock().unwrap().push(request.clone());
        self.peers
            .lock()
            .unwrap()
            .get(&request.server_name)
            .cloned()
            .map(|peer| vec![peer])
            .ok_or_else(|| {
                HandlerError::Handshake(format!("connection refused by {}", request.remote_addr))
            })
    }
}
