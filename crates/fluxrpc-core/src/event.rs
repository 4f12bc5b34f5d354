//! One-shot asynchronous event.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{TransportError, TransportResult};
use crate::guard::WorkGuard;
use crate::handler::HandlerCell;

/// One-shot signal with at most one waiter.
///
/// The event is either idle, set (terminal success), or cancelled (terminal
/// failure). Handles clone cheaply so producers may signal from any task;
/// the state sits behind a mutex because `cancel` can arrive from a thread
/// other than the session's.
#[derive(Clone, Debug, Default)]
pub struct AsyncEvent {
    inner: Arc<Mutex<EventState>>,
}

#[derive(Debug, Default)]
struct EventState {
    set: bool,
    error: Option<TransportError>,
    waiter: HandlerCell<TransportResult<()>>,
}

impl AsyncEvent {
    /// Create an idle event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the event to be set.
    ///
    /// Completes immediately if the event is already set or cancelled.
    /// Installing a second waiter while one is in flight fails with
    /// [`TransportError::WaitInProgress`].
    pub async fn wait(&self) -> TransportResult<()> {
        self.wait_guarded(Vec::new()).await
    }

    /// Like [`wait`](Self::wait), holding `guards` until the completion is
    /// delivered.
    pub async fn wait_guarded(&self, guards: Vec<WorkGuard>) -> TransportResult<()> {
        let rx = {
            let mut state = self.inner.lock().expect("event mutex poisoned");
            if let Some(err) = &state.error {
                return Err(err.clone());
            }
            if state.set {
                return Ok(());
            }
            if state.waiter.has_value() {
                return Err(TransportError::WaitInProgress);
            }
            let (tx, rx) = oneshot::channel();
            state.waiter.set(tx, guards);
            rx
        };
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Aborted),
        }
    }

    /// Mark the event as set, releasing the waiter if one is installed.
    ///
    /// Must not be called twice; setting a cancelled event has no effect on
    /// the recorded error.
    pub fn set(&self) {
        let mut state = self.inner.lock().expect("event mutex poisoned");
        debug_assert!(!state.set, "event set twice");
        state.set = true;
        if state.error.is_none() {
            state.waiter.post_completion(Ok(()));
        }
    }

    /// Move the event into the error state, failing the current wait and
    /// every future one with `err`.
    pub fn cancel(&self, err: TransportError) {
        let mut state = self.inner.lock().expect("event mutex poisoned");
        state.error = Some(err.clone());
        state.waiter.post_completion(Err(err));
    }
}
