//! Single-slot completion holder.

use tokio::sync::oneshot;

use crate::guard::WorkGuard;

/// Holds at most one pending completion.
///
/// The slot stores the waiter's channel sender together with the work guards
/// that keep the owning session alive while the completion is outstanding.
/// [`post_completion`](HandlerCell::post_completion) moves both out of the
/// slot before delivering, so the cell is observably empty during dispatch
/// and an installed waiter is completed at most once. Delivery wakes the
/// waiting task through its channel; the waiter is never resumed inline.
pub struct HandlerCell<T> {
    slot: Option<Waiter<T>>,
}

struct Waiter<T> {
    tx: oneshot::Sender<T>,
    guards: Vec<WorkGuard>,
}

impl<T> HandlerCell<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Whether a waiter is currently installed.
    pub fn has_value(&self) -> bool {
        self.slot.is_some()
    }

    /// Install a waiter. Any previous waiter must already have completed.
    pub fn set(&mut self, tx: oneshot::Sender<T>, guards: Vec<WorkGuard>) {
        debug_assert!(self.slot.is_none(), "completion slot occupied");
        self.slot = Some(Waiter { tx, guards });
    }

    /// Complete and clear the installed waiter, if any.
    ///
    /// Returns `true` if a waiter was present. A waiter whose receiver was
    /// dropped is discarded silently: the caller gave up on the result.
    pub fn post_completion(&mut self, value: T) -> bool {
        match self.slot.take() {
            Some(waiter) => {
                let _ = waiter.tx.send(value);
                drop(waiter.guards);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for HandlerCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for HandlerCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCell")
            .field("has_value", &self.slot.is_some())
            .finish()
    }
}
