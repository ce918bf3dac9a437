//! Handler for auth types that need no real authentication.

use super::{AuthHandler, AuthRequest, AuthResponse};
use crate::errors::HandlerError;
use async_trait::async_trait;
use chrono::Duration;
use common::{AuthType, Clock};
use std::sync::Arc;
use tracing::trace;

/// Validity granted by [`NullAuthHandler`].
pub const NULL_AUTH_VALIDITY: Duration = Duration::days(365);

/// Always succeeds with a far-future expiration.
#[derive(Debug, Clone)]
pub struct NullAuthHandler {
    clock: Arc<dyn Clock>,
}

impl NullAuthHandler {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl AuthHandler for NullAuthHandler {
    fn auth_type(&self) -> AuthType {
        AuthType::Disabled
    }

    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResponse, HandlerError> {
        trace!(
            target: "auth.handler.null",
            local_identity = %request.local_identity,
            remote_identity = %request.remote_identity,
            "Null authentication"
        );
        Ok(AuthResponse {
            expiration: self.clock.now() + NULL_AUTH_VALIDITY,
        })
    }
}
