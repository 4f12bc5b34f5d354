//! Work guards: scoped keep-alive handles for a session.
//!
//! A session's run loop must not finish while an operation still expects to
//! deliver a completion. Each installed waiter holds a [`WorkGuard`]; the
//! supervisor awaits [`WorkTracker::idle`] before letting go of its
//! resources.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Tracks outstanding work for one session.
#[derive(Clone, Debug, Default)]
pub struct WorkTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    count: AtomicUsize,
    notify: Notify,
}

impl WorkTracker {
    /// Create a tracker with no outstanding work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a guard. The tracker counts as busy until it is dropped.
    pub fn guard(&self) -> WorkGuard {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        WorkGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of guards currently alive.
    pub fn outstanding(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Wait until no guards remain.
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Scoped handle that marks its tracker busy.
///
/// Released on drop, on every exit path.
#[derive(Debug)]
pub struct WorkGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
