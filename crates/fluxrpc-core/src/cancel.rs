//! Cancellation signals: a token chain carrying an error payload.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Cancellation signal for one layered operation.
///
/// Each nested operation derives a [`child`](CancelSignal::child) signal for
/// the sub-operation currently in flight; cancelling an outer signal reaches
/// whichever descendant is pending, carrying the recorded error with it. A
/// signal cancelled before the operation starts is observed at the
/// operation's first suspension point.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    token: CancellationToken,
    reason: Arc<Mutex<Option<TransportError>>>,
}

impl CancelSignal {
    /// Create an unfired signal.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Derive a signal that fires together with `self`, but not vice versa.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            reason: Arc::clone(&self.reason),
        }
    }

    /// Record `err` (the first recorded reason wins) and fire the signal.
    pub fn cancel(&self, err: TransportError) {
        self.reason
            .lock()
            .expect("cancel mutex poisoned")
            .get_or_insert(err);
        self.token.cancel();
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// The recorded cancel reason, defaulting to
    /// [`TransportError::Aborted`].
    pub fn reason(&self) -> TransportError {
        self.reason
            .lock()
            .expect("cancel mutex poisoned")
            .clone()
            .unwrap_or(TransportError::Aborted)
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
