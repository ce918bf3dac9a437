//! Signal source capturing the registered sender.

use auth_service::{AuthError, SignalSender, SignalSource};
use std::sync::Mutex;

/// Signal source standing in for the datapath.
#[derive(Debug, Default)]
pub struct MockSignalSource {
    sender: Mutex<Option<SignalSender>>,
    registrations: Mutex<usize>,
    reject: bool,
}

impl MockSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source that refuses registration.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// The registered sender. Panics if nothing registered.
    pub fn sender(&self) -> SignalSender {
        self.sender
            .lock()
            .unwrap()
            .clone()
            .expect("no signal channel registered")
    }

    pub fn is_registered(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }

    pub fn registrations(&self) -> usize {
        *self.registrations.lock().unwrap()
    }
}

impl SignalSource for MockSignalSource {
    fn register_auth_required(&self, sender: SignalSender) -> Result<(), AuthError> {
        *self.registrations.lock().unwrap() += 1;
        if self.reject {
            return Err(AuthError::SignalRegistration(
                "signal source unavailable".to_string(),
            ));
        }
        *self.sender.lock().unwrap() = Some(sender);
        Ok(())
    }
}
