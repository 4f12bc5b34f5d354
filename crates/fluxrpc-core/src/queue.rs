//! Single-consumer asynchronous FIFO.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{TransportError, TransportResult};
use crate::handler::HandlerCell;

/// The consuming end of the queue.
///
/// The consumer is move-only and pops through `&mut self`, so there can be
/// at most one pop in flight. Producers push through cloneable
/// [`QueueHandle`]s.
pub struct AsyncQueue<T> {
    shared: Arc<Mutex<QueueState<T>>>,
}

/// Producer handle: pushes values and stops the queue.
pub struct QueueHandle<T> {
    shared: Arc<Mutex<QueueState<T>>>,
}

struct QueueState<T> {
    values: VecDeque<T>,
    error: Option<TransportError>,
    waiter: HandlerCell<TransportResult<T>>,
}

impl<T: Send + 'static> AsyncQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(QueueState {
                values: VecDeque::new(),
                error: None,
                waiter: HandlerCell::new(),
            })),
        }
    }

    /// A producer handle for this queue.
    pub fn handle(&self) -> QueueHandle<T> {
        QueueHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Pop the head of the queue, waiting for a push if it is empty.
    ///
    /// Once the queue has been stopped every pop returns the recorded
    /// error.
    pub async fn pop(&mut self) -> TransportResult<T> {
        let rx = {
            let mut state = self.shared.lock().expect("queue mutex poisoned");
            if let Some(err) = &state.error {
                return Err(err.clone());
            }
            if let Some(value) = state.values.pop_front() {
                return Ok(value);
            }
            // an abandoned pop leaves a dead waiter behind; clear it first
            if state.waiter.has_value() {
                state.waiter.post_completion(Err(TransportError::Aborted));
            }
            let (tx, rx) = oneshot::channel();
            state.waiter.set(tx, Vec::new());
            rx
        };
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Aborted),
        }
    }
}

impl<T: Send + 'static> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> QueueHandle<T> {
    /// Append a value, delivering it directly to a waiting pop if one is
    /// installed. Values pushed after [`stop`](Self::stop) are discarded.
    pub fn push(&self, value: T) {
        let mut state = self.shared.lock().expect("queue mutex poisoned");
        if state.error.is_some() {
            tracing::trace!("push on stopped queue discarded");
            return;
        }
        if state.waiter.has_value() {
            debug_assert!(state.values.is_empty());
            state.waiter.post_completion(Ok(value));
        } else {
            state.values.push_back(value);
        }
    }

    /// Drain the queue and fail the current and all future pops with
    /// [`TransportError::Aborted`].
    pub fn stop(&self) {
        let mut state = self.shared.lock().expect("queue mutex poisoned");
        state.values.clear();
        let err = state
            .error
            .get_or_insert(TransportError::Aborted)
            .clone();
        state.waiter.post_completion(Err(err));
    }
}

impl<T> Clone for QueueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock().expect("queue mutex poisoned");
        f.debug_struct("AsyncQueue")
            .field("len", &state.values.len())
            .field("stopped", &state.error.is_some())
            .finish()
    }
}

impl<T> std::fmt::Debug for QueueHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn pops_values_in_push_order() {
        let mut queue = AsyncQueue::new();
        let handle = queue.handle();

        handle.push(1);
        handle.push(2);
        handle.push(3);

        assert_eq!(queue.pop().await, Ok(1));
        assert_eq!(queue.pop().await, Ok(2));
        assert_eq!(queue.pop().await, Ok(3));
    }

    #[tokio::test]
    async fn push_wakes_a_waiting_pop() {
        let mut queue = AsyncQueue::new();
        let handle = queue.handle();

        let consumer = tokio::spawn(async move { queue.pop().await });
        sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        handle.push("frame");
        assert_eq!(consumer.await.unwrap(), Ok("frame"));
    }

    #[tokio::test]
    async fn stop_fails_waiting_pop_and_is_sticky() {
        let mut queue = AsyncQueue::<u32>::new();
        let handle = queue.handle();

        let consumer = tokio::spawn(async move {
            let first = queue.pop().await;
            let second = queue.pop().await;
            (first, second)
        });
        sleep(Duration::from_millis(20)).await;

        handle.stop();
        let (first, second) = consumer.await.unwrap();
        assert_eq!(first, Err(TransportError::Aborted));
        assert_eq!(second, Err(TransportError::Aborted));
    }

    #[tokio::test]
    async fn stop_drains_queued_values() {
        let mut queue = AsyncQueue::new();
        let handle = queue.handle();

        handle.push(1);
        handle.push(2);
        handle.stop();
        handle.push(3);

        assert_eq!(queue.pop().await, Err(TransportError::Aborted));
    }
}
