//! Handler that rejects every request.

use super::{AuthHandler, AuthRequest, AuthResponse};
use crate::errors::HandlerError;
use async_trait::async_trait;
use common::AuthType;
use tracing::debug;

/// Rejects every authentication. Backs deny-by-policy configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFailAuthHandler;

#[async_trait]
impl AuthHandler for AlwaysFailAuthHandler {
    fn auth_type(&self) -> AuthType {
        AuthType::AlwaysFail
    }

    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResponse, HandlerError> {
        debug!(
            target: "auth.handler.always_fail",
            local_identity = %request.local_identity,
            remote_identity = %request.remote_identity,
            "Rejecting authentication"
        );
        Err(HandlerError::Rejected(
            "authentication configured to always fail".to_string(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::{Identity, NodeId};
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn test_always_fail_rejects() {
        let request = AuthRequest {
            local_identity: Identity(1),
            remote_identity: Identity(2),
            remote_node_id: NodeId(3),
            remote_node_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let err = AlwaysFailAuthHandler.authenticate(&request).await.unwrap_err();

        assert!(matches!(err, HandlerError::Rejected(_)));
        assert_eq!(AlwaysFailAuthHandler.auth_type(), AuthType::AlwaysFail);
    }
}
