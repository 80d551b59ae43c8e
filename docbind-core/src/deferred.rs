//! Single-assignment deferred values.
//!
//! [`Deferred<T>`] is the completion slot underlying both signal properties
//! and store operations: a placeholder that is completed (or failed) exactly
//! once by whichever component owns it, and read by everyone else.
//!
//! The access pattern is deliberately split in two:
//!
//! - [`Deferred::wait`] suspends until the slot settles, without touching the
//!   value.
//! - [`Deferred::value`] reads the settled outcome and **never blocks**;
//!   reading before completion is a programming error and fails loudly.
//!
//! Completing a slot twice is equally loud. Both misuses surface as
//! [`DocbindError::ProtocolViolation`] rather than silent no-ops, because they
//! indicate a broken coordination contract, not a runtime condition.

use mea::latch::Latch;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{DocbindError, DocbindResult};

type Continuation<T> = Box<dyn FnOnce(&DocbindResult<T>) + Send>;

enum State<T> {
    /// Not yet settled; holds the chained continuations to run on settlement.
    Pending(Vec<Continuation<T>>),
    /// Terminal. Either a value or the error the slot was failed with.
    Settled(DocbindResult<T>),
}

struct Inner<T> {
    state: Mutex<State<T>>,
    settled: Latch,
}

/// A single-assignment placeholder for a value of type `T`.
///
/// Handles are cheap to clone and share one slot; the component that created
/// the work item keeps one handle to complete it, everyone else keeps handles
/// to await it.
///
/// # Example
///
/// ```ignore
/// let slot: Deferred<i64> = Deferred::new();
/// let reader = slot.clone();
///
/// slot.complete(42)?;
/// reader.wait().await;
/// assert_eq!(reader.value()?, 42);
/// ```
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deferred<T> {
    /// Creates a new pending slot.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Pending(Vec::new())),
                settled: Latch::new(1),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns whether the slot has settled (completed or failed).
    pub fn is_settled(&self) -> bool {
        matches!(&*self.lock(), State::Settled(_))
    }

    /// Suspends until the slot settles. Does not read the value.
    pub async fn wait(&self) {
        self.inner.settled.wait().await;
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// Completes the slot with a value.
    ///
    /// # Errors
    ///
    /// Returns [`DocbindError::ProtocolViolation`] if the slot was already
    /// settled; completion is permitted exactly once.
    pub fn complete(&self, value: T) -> DocbindResult<()> {
        self.settle(Ok(value))
    }

    /// Fails the slot with an error.
    ///
    /// # Errors
    ///
    /// Returns [`DocbindError::ProtocolViolation`] if the slot was already
    /// settled.
    pub fn fail(&self, error: DocbindError) -> DocbindResult<()> {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: DocbindResult<T>) -> DocbindResult<()> {
        let continuations = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(continuations) => {
                    let continuations = std::mem::take(continuations);
                    *state = State::Settled(outcome.clone());
                    continuations
                }
                State::Settled(_) => {
                    return Err(DocbindError::ProtocolViolation(
                        "deferred value completed twice".to_string(),
                    ));
                }
            }
        };

        self.inner.settled.count_down();

        // Continuations run outside the lock; a chained slot may itself have
        // chained readers.
        for continuation in continuations {
            continuation(&outcome);
        }

        Ok(())
    }

    /// Reads the settled outcome without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`DocbindError::ProtocolViolation`] if the slot is still
    /// pending; callers must [`wait`](Deferred::wait) first. Returns the
    /// failure error if the slot was failed.
    pub fn value(&self) -> DocbindResult<T> {
        match &*self.lock() {
            State::Pending(_) => Err(DocbindError::ProtocolViolation(
                "deferred value read before completion".to_string(),
            )),
            State::Settled(outcome) => outcome.clone(),
        }
    }

    /// Waits for settlement and reads the outcome.
    pub async fn get(&self) -> DocbindResult<T> {
        self.wait().await;
        self.value()
    }

    /// Creates a derived slot that settles automatically when this one does,
    /// applying `transform` to a completed value. Failure carries over
    /// unchanged.
    pub fn map<U, F>(&self, transform: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let derived = Deferred::<U>::new();
        let target = derived.clone();

        self.on_settled(Box::new(move |outcome| {
            // If the caller settled the derived slot out from under us there
            // is nothing sensible left to deliver.
            let _ = match outcome {
                Ok(value) => target.complete(transform(value.clone())),
                Err(error) => target.fail(error.clone()),
            };
        }));

        derived
    }

    fn on_settled(&self, continuation: Continuation<T>) {
        let run_now = {
            let mut state = self.lock();
            match &mut *state {
                State::Pending(continuations) => {
                    continuations.push(continuation);
                    None
                }
                State::Settled(outcome) => Some((continuation, outcome.clone())),
            }
        };

        if let Some((continuation, outcome)) = run_now {
            continuation(&outcome);
        }
    }
}
