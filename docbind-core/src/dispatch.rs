//! Round-based operator dispatch.
//!
//! The dispatcher routes a queue of pending [`Operation`]s through an
//! ordered list of [`Operator`]s. Each operator inspects the queue, claims
//! the operations it knows how to execute (launching their asynchronous
//! work into the current [`Round`]), and returns the remainder for the next
//! operator in line. Operations still unclaimed after a full pass are
//! cancelled with [`DocbindError::UnsupportedOperation`]: an operation
//! nobody claims is a configuration error, not a retryable condition.
//!
//! Claimed work may hand *derived* operations back through
//! [`Round::enqueue`]; once the round's launched executions settle, the
//! derived set becomes the next round's queue. The loop terminates when a
//! round ends with nothing derived and nothing left over.
//!
//! One coordinator owns the queue per submission. Executions run
//! concurrently with each other but never touch the coordinator's queues
//! directly; `Round::enqueue` is the only mutation surface exposed to them.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, join_all};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::{
    deferred::Deferred,
    error::{DocbindError, DocbindResult},
};

/// A unit of pending work with its own completion slot.
///
/// Operations are queued behind `Arc`s; queue membership is reference
/// identity, so two operations with identical parameters are still distinct
/// work items.
pub trait Operation: Send + Sync + 'static {
    /// The value delivered through the operation's deferred outcome.
    type Output: Clone + Send + 'static;

    /// The completion slot observed by the operation's submitter. Whoever
    /// claims the operation becomes solely responsible for settling it.
    fn outcome(&self) -> &Deferred<Self::Output>;

    /// Short human-readable description, used in cancellation errors.
    fn label(&self) -> String;
}

struct RoundInner<Op: Operation> {
    executions: Mutex<Vec<BoxFuture<'static, ()>>>,
    derived: Mutex<Vec<Arc<Op>>>,
}

/// The per-round context handed to operators.
///
/// Operators [`launch`](Round::launch) the asynchronous execution of the
/// operations they claim (the dispatcher drives all launched executions
/// concurrently after the claim pass), and executions may
/// [`enqueue`](Round::enqueue) derived operations for the next round.
pub struct Round<Op: Operation> {
    inner: Arc<RoundInner<Op>>,
}

impl<Op: Operation> Clone for Round<Op> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<Op: Operation> Round<Op> {
    fn new() -> Self {
        Self {
            inner: Arc::new(RoundInner {
                executions: Mutex::new(Vec::new()),
                derived: Mutex::new(Vec::new()),
            }),
        }
    }

    fn executions(&self) -> MutexGuard<'_, Vec<BoxFuture<'static, ()>>> {
        self.inner
            .executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn derived(&self) -> MutexGuard<'_, Vec<Arc<Op>>> {
        self.inner
            .derived
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the asynchronous execution of claimed work.
    ///
    /// The execution is not awaited here; the dispatcher drives every
    /// launched execution of the round concurrently once all operators have
    /// finished claiming. The execution must settle the outcome of every
    /// operation it was launched for; claiming is irreversible.
    pub fn launch<F>(&self, execution: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.executions().push(execution.boxed());
    }

    /// Hands a derived operation to the coordinator for the next round.
    pub fn enqueue(&self, operation: Arc<Op>) {
        self.derived().push(operation);
    }

    fn take_executions(&self) -> Vec<BoxFuture<'static, ()>> {
        std::mem::take(&mut *self.executions())
    }

    fn take_derived(&self) -> Vec<Arc<Op>> {
        std::mem::take(&mut *self.derived())
    }
}

/// A stateless routing rule over pending operations.
///
/// Given the current remaining queue, an operator claims zero or more
/// operations (launching their execution into `round` as a side effect)
/// and returns the subset it did **not** claim. Operators are tried in a
/// fixed, caller-supplied order every pass (first-match routing), so the
/// order of the list is itself a policy surface.
#[async_trait]
pub trait Operator<Op: Operation>: Send + Sync {
    async fn claim(&self, pending: Vec<Arc<Op>>, round: &Round<Op>) -> Vec<Arc<Op>>;
}

/// Drives rounds of operator claiming over submitted operations.
///
/// The operator list is fixed at construction; there is no global registry.
pub struct Dispatcher<Op: Operation> {
    operators: Vec<Arc<dyn Operator<Op>>>,
}

impl<Op: Operation> Dispatcher<Op> {
    /// Creates a dispatcher with the given operator chain, tried in order.
    pub fn new(operators: Vec<Arc<dyn Operator<Op>>>) -> Self {
        Self { operators }
    }

    /// Executes a batch of independent operations to completion.
    ///
    /// Results are observed through each operation's own deferred outcome;
    /// `submit` returning `Ok` means every operation has been routed:
    /// executed by some operator, or cancelled with
    /// [`DocbindError::UnsupportedOperation`]. A cancelled operation does
    /// not abort its siblings and does not fail the submission.
    ///
    /// # Errors
    ///
    /// Returns [`DocbindError::ProtocolViolation`] if an operation's outcome
    /// was settled by someone who did not own it (for example an operator
    /// that settled an operation and still returned it as unclaimed).
    pub async fn submit(&self, operations: Vec<Arc<Op>>) -> DocbindResult<()> {
        let mut queue = operations;
        let mut rounds = 0usize;

        while !queue.is_empty() {
            rounds += 1;
            let round = Round::new();
            let submitted = queue.len();

            for operator in &self.operators {
                if queue.is_empty() {
                    break;
                }
                queue = operator.claim(std::mem::take(&mut queue), &round).await;
            }

            // Everything still here survived a full pass: cancel it.
            let mut violation = None;
            if !queue.is_empty() {
                warn!(
                    leftover = queue.len(),
                    round = rounds,
                    "operations unclaimed after full pass, cancelling"
                );
            }
            for operation in queue.drain(..) {
                let cancelled = operation
                    .outcome()
                    .fail(DocbindError::UnsupportedOperation(operation.label()));
                if let Err(error) = cancelled {
                    violation.get_or_insert(error);
                }
            }

            // Block only on the aggregate condition: every launched
            // execution of this round has settled.
            join_all(round.take_executions()).await;

            if let Some(error) = violation {
                return Err(error);
            }

            queue = round.take_derived();
            debug!(
                round = rounds,
                queued = submitted,
                derived = queue.len(),
                "dispatch round finished"
            );
        }

        Ok(())
    }
}
