//! Join latch: releases its waiter once every event slot has been filled.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::{TransportError, TransportResult};
use crate::guard::WorkGuard;
use crate::handler::HandlerCell;

/// Tuple of optional event slots tracked by a [`JoinLatch`].
pub trait EventSet: Default + Send + 'static {
    /// Whether every slot holds a value.
    fn all_filled(&self) -> bool;
}

/// Access to slot `I` of an [`EventSet`] tuple.
pub trait Slot<const I: usize>: EventSet {
    /// The event type stored in slot `I`.
    type Event;

    /// The slot itself.
    fn slot(&mut self) -> &mut Option<Self::Event>;
}

impl<A: Send + 'static> EventSet for (Option<A>,) {
    fn all_filled(&self) -> bool {
        self.0.is_some()
    }
}

impl<A: Send + 'static> Slot<0> for (Option<A>,) {
    type Event = A;
    fn slot(&mut self) -> &mut Option<A> {
        &mut self.0
    }
}

impl<A: Send + 'static, B: Send + 'static> EventSet for (Option<A>, Option<B>) {
    fn all_filled(&self) -> bool {
        self.0.is_some() && self.1.is_some()
    }
}

impl<A: Send + 'static, B: Send + 'static> Slot<0> for (Option<A>, Option<B>) {
    type Event = A;
    fn slot(&mut self) -> &mut Option<A> {
        &mut self.0
    }
}

impl<A: Send + 'static, B: Send + 'static> Slot<1> for (Option<A>, Option<B>) {
    type Event = B;
    fn slot(&mut self) -> &mut Option<B> {
        &mut self.1
    }
}

impl<A: Send + 'static, B: Send + 'static, C: Send + 'static> EventSet
    for (Option<A>, Option<B>, Option<C>)
{
    fn all_filled(&self) -> bool {
        self.0.is_some() && self.1.is_some() && self.2.is_some()
    }
}

impl<A: Send + 'static, B: Send + 'static, C: Send + 'static> Slot<0>
    for (Option<A>, Option<B>, Option<C>)
{
    type Event = A;
    fn slot(&mut self) -> &mut Option<A> {
        &mut self.0
    }
}

impl<A: Send + 'static, B: Send + 'static, C: Send + 'static> Slot<1>
    for (Option<A>, Option<B>, Option<C>)
{
    type Event = B;
    fn slot(&mut self) -> &mut Option<B> {
        &mut self.1
    }
}

impl<A: Send + 'static, B: Send + 'static, C: Send + 'static> Slot<2>
    for (Option<A>, Option<B>, Option<C>)
{
    type Event = C;
    fn slot(&mut self) -> &mut Option<C> {
        &mut self.2
    }
}

/// A latch over one event slot.
pub type JoinLatch1<A> = JoinLatch<(Option<A>,)>;
/// A latch over two event slots.
pub type JoinLatch2<A, B> = JoinLatch<(Option<A>, Option<B>)>;
/// A latch over three event slots.
pub type JoinLatch3<A, B, C> = JoinLatch<(Option<A>, Option<B>, Option<C>)>;

/// Rendezvous point that completes once every slot has been filled, or
/// fails when cancelled.
///
/// The latch transitions on the call that fills the last slot, not lazily
/// on the next wait. At most one wait may be in flight at a time.
pub struct JoinLatch<S: EventSet> {
    inner: Arc<Mutex<LatchState<S>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaitPhase {
    NotWaiting,
    Waiting,
    Complete,
    Error,
}

struct LatchState<S> {
    slots: S,
    phase: WaitPhase,
    error: Option<TransportError>,
    waiter: HandlerCell<TransportResult<()>>,
}

impl<S: EventSet> JoinLatch<S> {
    /// Create a latch with all slots empty.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LatchState {
                slots: S::default(),
                phase: WaitPhase::NotWaiting,
                error: None,
                waiter: HandlerCell::new(),
            })),
        }
    }

    /// Wait until every slot is filled.
    ///
    /// Completes immediately if the latch has already triggered, completed,
    /// or errored. A second concurrent wait fails with
    /// [`TransportError::WaitInProgress`].
    pub async fn wait(&self) -> TransportResult<()> {
        self.wait_guarded(Vec::new()).await
    }

    /// Like [`wait`](Self::wait), holding `guards` until the completion is
    /// delivered.
    pub async fn wait_guarded(&self, guards: Vec<WorkGuard>) -> TransportResult<()> {
        let rx = {
            let mut state = self.inner.lock().expect("latch mutex poisoned");
            match state.phase {
                WaitPhase::Waiting => return Err(TransportError::WaitInProgress),
                WaitPhase::Complete => return Ok(()),
                WaitPhase::Error => {
                    return Err(state.error.clone().unwrap_or(TransportError::Aborted));
                }
                WaitPhase::NotWaiting => {
                    if state.slots.all_filled() {
                        return Ok(());
                    }
                    let (tx, rx) = oneshot::channel();
                    state.waiter.set(tx, guards);
                    state.phase = WaitPhase::Waiting;
                    rx
                }
            }
        };
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Aborted),
        }
    }

    /// Fill slot `I`. The slot must be empty.
    ///
    /// If this is the last empty slot and a waiter is installed, the latch
    /// completes and releases it.
    pub fn set<const I: usize>(&self, event: <S as Slot<I>>::Event)
    where
        S: Slot<I>,
    {
        let mut state = self.inner.lock().expect("latch mutex poisoned");
        let slot = <S as Slot<I>>::slot(&mut state.slots);
        debug_assert!(slot.is_none(), "event slot filled twice");
        *slot = Some(event);
        if state.phase == WaitPhase::Waiting && state.slots.all_filled() {
            state.phase = WaitPhase::Complete;
            state.waiter.post_completion(Ok(()));
        }
    }

    /// Clear slot `I`. The slot must be full.
    ///
    /// Does not affect a completion that has already been posted.
    pub fn unset<const I: usize>(&self)
    where
        S: Slot<I>,
    {
        let taken = self.take::<I>();
        debug_assert!(taken.is_some(), "event slot cleared while empty");
    }

    /// Move the event out of slot `I`, leaving it empty.
    ///
    /// Intended for reading the collected events once the latch has
    /// triggered.
    pub fn take<const I: usize>(&self) -> Option<<S as Slot<I>>::Event>
    where
        S: Slot<I>,
    {
        let mut state = self.inner.lock().expect("latch mutex poisoned");
        <S as Slot<I>>::slot(&mut state.slots).take()
    }

    /// Cancel the latch, failing the current wait and every future one with
    /// `err`.
    pub fn cancel(&self, err: TransportError) {
        let mut state = self.inner.lock().expect("latch mutex poisoned");
        state.error = Some(err.clone());
        let was_waiting = state.phase == WaitPhase::Waiting;
        state.phase = WaitPhase::Error;
        if was_waiting {
            state.waiter.post_completion(Err(err));
        }
    }

    /// Whether every slot currently holds a value.
    pub fn triggered(&self) -> bool {
        self.inner
            .lock()
            .expect("latch mutex poisoned")
            .slots
            .all_filled()
    }
}

impl<S: EventSet> Clone for JoinLatch<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: EventSet> Default for JoinLatch<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSet> std::fmt::Debug for JoinLatch<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock().expect("latch mutex poisoned");
        f.debug_struct("JoinLatch")
            .field("phase", &state.phase)
            .field("triggered", &state.slots.all_filled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Debug, PartialEq)]
    struct EventA;
    #[derive(Debug, PartialEq)]
    struct EventB;

    #[tokio::test]
    async fn completes_when_both_slots_fill() {
        let latch = JoinLatch2::<EventA, EventB>::new();
        let waiter = tokio::spawn({
            let latch = latch.clone();
            async move { latch.wait().await }
        });
        sleep(Duration::from_millis(20)).await;

        latch.set::<0>(EventA);
        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        latch.set::<1>(EventB);
        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(latch.take::<0>(), Some(EventA));
        assert_eq!(latch.take::<1>(), Some(EventB));
    }

    #[tokio::test]
    async fn order_of_slots_does_not_matter() {
        let latch = JoinLatch2::<EventA, EventB>::new();
        let waiter = tokio::spawn({
            let latch = latch.clone();
            async move { latch.wait().await }
        });
        sleep(Duration::from_millis(20)).await;

        latch.set::<1>(EventB);
        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        latch.set::<0>(EventA);
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn cancel_midway_fails_the_wait() {
        let latch = JoinLatch2::<EventA, EventB>::new();
        let waiter = tokio::spawn({
            let latch = latch.clone();
            async move { latch.wait().await }
        });
        sleep(Duration::from_millis(20)).await;

        latch.set::<0>(EventA);
        latch.cancel(TransportError::Aborted);
        assert_eq!(waiter.await.unwrap(), Err(TransportError::Aborted));
    }

    #[tokio::test]
    async fn cancel_before_wait_is_sticky() {
        let latch = JoinLatch1::<EventA>::new();
        latch.cancel(TransportError::ConnectionAborted);
        assert_eq!(latch.wait().await, Err(TransportError::ConnectionAborted));
    }

    #[tokio::test]
    async fn wait_on_triggered_latch_is_immediate() {
        let latch = JoinLatch1::<EventA>::new();
        latch.set::<0>(EventA);
        assert!(latch.triggered());
        assert!(latch.wait().await.is_ok());
    }

    #[tokio::test]
    async fn unset_clears_a_slot() {
        let latch = JoinLatch2::<EventA, EventB>::new();
        latch.set::<0>(EventA);
        latch.unset::<0>();
        assert!(!latch.triggered());
    }

    #[tokio::test]
    async fn second_waiter_is_rejected() {
        let latch = JoinLatch1::<EventA>::new();
        let _waiter = tokio::spawn({
            let latch = latch.clone();
            async move { latch.wait().await }
        });
        sleep(Duration::from_millis(20)).await;

        assert_eq!(latch.wait().await, Err(TransportError::WaitInProgress));
    }
}
