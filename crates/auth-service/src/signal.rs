//! "Authentication required" signal channel.
//!
//! The datapath raises signals from a context that must never block, so
//! [`SignalSender::try_send`] drops a signal when the queue is full and
//! counts the drop. The datapath keeps re-raising signals for traffic that
//! still lacks a valid entry, so a dropped signal only delays the decision.

use crate::errors::AuthError;
use crate::observability::metrics;
use authmap::codec::decode_signal;
use authmap::{CodecError, SignalAuthKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Create a bounded signal channel holding at most `queue_size` signals.
#[must_use]
pub fn channel(queue_size: usize) -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::channel(queue_size.max(1));
    (
        SignalSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        SignalReceiver { rx },
    )
}

/// Producer side of the signal channel, handed to the signal source.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::Sender<SignalAuthKey>,
    dropped: Arc<AtomicU64>,
}

impl SignalSender {
    /// Enqueue a signal without waiting.
    ///
    /// Returns `false` if the signal was not enqueued, either because the
    /// queue is full (counted as a drop) or because the consumer has shut
    /// down.
    pub fn try_send(&self, signal: SignalAuthKey) -> bool {
        match self.tx.try_send(signal) {
            Ok(()) => true,
            Err(TrySendError::Full(signal)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::record_signal_dropped();
                metrics::record_request("dropped");
                warn!(
                    target: "auth.signal",
                    local_identity = %signal.key.local_identity,
                    remote_identity = %signal.key.remote_identity,
                    remote_node_id = %signal.key.remote_node_id,
                    dropped_total = total,
                    "Auth request queue full, dropping signal"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(target: "auth.signal", "Auth request queue closed, ignoring signal");
                false
            }
        }
    }

    /// Decode a raw datapath signal record and enqueue it.
    ///
    /// # Errors
    ///
    /// Returns `CodecError` if the record is malformed; nothing is enqueued.
    pub fn try_send_record(&self, mut record: &[u8]) -> Result<bool, CodecError> {
        let signal = decode_signal(&mut record)?;
        Ok(self.try_send(signal))
    }

    /// Number of signals dropped on a full queue so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the consumer side has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the signal channel.
#[derive(Debug)]
pub struct SignalReceiver {
    rx: mpsc::Receiver<SignalAuthKey>,
}

impl SignalReceiver {
    /// Wait for the next signal. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<SignalAuthKey> {
        self.rx.recv().await
    }

    /// Stop accepting new signals; already queued signals can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// External producer of "authentication required" signals.
pub trait SignalSource: Send + Sync {
    /// Hand the signal channel to the source. Called once at startup.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SignalRegistration` if the source cannot accept
    /// the channel.
    fn register_auth_required(&self, sender: SignalSender) -> Result<(), AuthError>;
}
