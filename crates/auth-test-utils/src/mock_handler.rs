//! Scriptable auth handler.
//!
//! # Example
//!
//! ```rust,ignore
//! let (handler, rotations) = MockAuthHandler::new(AuthType::Mutual, clock.clone())
//!     .with_validity_secs(600)
//!     .with_rotation_stream(8);
//! let handler = Arc::new(handler);
//!
//! // ... drive the manager ...
//! assert_eq!(handler.calls(), 1);
//! rotations.send(Identity(200)).await.unwrap();
//! ```

use async_trait::async_trait;
use auth_service::{AuthHandler, AuthRequest, AuthResponse, HandlerError};
use chrono::Duration as ChronoDuration;
use common::{AuthType, Clock, Identity};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Auth handler that records its requests and returns a scripted result.
pub struct MockAuthHandler {
    auth_type: AuthType,
    clock: Arc<dyn Clock>,
    validity: Mutex<ChronoDuration>,
    error: Mutex<Option<HandlerError>>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    requests: Mutex<Vec<AuthRequest>>,
    rotations: Mutex<Option<mpsc::Receiver<Identity>>>,
}

impl MockAuthHandler {
    /// Handler for `auth_type` granting 600 seconds by default.
    pub fn new(auth_type: AuthType, clock: Arc<dyn Clock>) -> Self {
        Self {
            auth_type,
            clock,
            validity: Mutex::new(ChronoDuration::seconds(600)),
            error: Mutex::new(None),
            delay: None,
            gate: None,
            requests: Mutex::new(Vec::new()),
            rotations: Mutex::new(None),
        }
    }

    /// Grant `secs` seconds of validity from the clock's now.
    pub fn with_validity_secs(self, secs: i64) -> Self {
        *self.validity.lock().unwrap() = ChronoDuration::seconds(secs);
        self
    }

    /// Fail every request with `error`.
    pub fn with_error(self, error: HandlerError) -> Self {
        *self.error.lock().unwrap() = Some(error);
        self
    }

    /// Sleep for `delay` (tokio time) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold every request until a permit is added to the returned semaphore.
    pub fn with_gate(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Expose a rotation stream fed by the returned sender.
    pub fn with_rotation_stream(self, capacity: usize) -> (Self, mpsc::Sender<Identity>) {
        let (tx, rx) = mpsc::channel(capacity);
        *self.rotations.lock().unwrap() = Some(rx);
        (self, tx)
    }

    /// Change the scripted error at runtime; `None` makes requests succeed.
    pub fn set_error(&self, error: Option<HandlerError>) {
        *self.error.lock().unwrap() = error;
    }

    /// Number of `authenticate` calls so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<AuthRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthHandler for MockAuthHandler {
    fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    async fn authenticate(&self, request: &AuthRequest) -> Result<AuthResponse, HandlerError> {
        self.requests.lock().unwrap().push(*request);

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.error.lock().unwrap().clone() {
            return Err(error);
        }
        let validity = *self.validity.lock().unwrap();
        Ok(AuthResponse {
            expiration: self.clock.now() + validity,
        })
    }

    fn subscribe_to_rotated_identities(&self) -> Option<mpsc::Receiver<Identity>> {
        self.rotations.lock().unwrap().take()
    }
}
