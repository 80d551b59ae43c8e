//! Signal batching: deferred resolution of effect-requested values.
//!
//! Schema effects frequently need values that only the database can provide
//! (a count of matching documents, a batch of referenced documents). Issuing
//! those lookups one effect at a time would turn a 100-document save into a
//! 100-round-trip save. Instead, effects *enqueue* [`Signal`]s, typed
//! requests for a value, and then [`wait`](SignalBatcher::wait). The batcher
//! collects every signal enqueued by every active scope in the current pass,
//! hands the whole batch to a [`SignalResolver`] in a single call, and only
//! then unblocks each effect with its individual answer.
//!
//! The batching guarantee is strict: one resolver invocation per drain, with
//! the union of everything enqueued since the previous drain. Identical
//! signals are *not* deduplicated; batching, not deduplication, is the
//! contract.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use mea::latch::Latch;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

use crate::{
    deferred::Deferred,
    error::{DocbindError, DocbindResult},
    query::Filter,
};

/// A typed request for an asynchronously-computed value.
///
/// The variant set is closed: resolvers match on it exhaustively, and each
/// subsystem that needs a new kind of lookup extends the enum rather than
/// registering handlers by runtime shape.
#[derive(Debug, Clone)]
pub enum Signal {
    /// Count of documents in `collection` matching `filter`.
    /// Resolves to `Bson::Int64`.
    Count {
        collection: String,
        filter: Filter,
    },
    /// The documents with the given ids in `collection`, in store order;
    /// missing ids are omitted. Resolves to `Bson::Array`.
    Fetch {
        collection: String,
        ids: Vec<Uuid>,
    },
}

/// The per-signal placeholder handed back by [`SignalBatcher::enqueue`].
///
/// Valid only after the enclosing scope's `wait()` completes.
pub type SignalProperty = Deferred<Bson>;

/// Turns a batch of signals into a batch of answers.
///
/// # Contract
///
/// `resolve` must return exactly one result per input signal, in input
/// order. A mismatched count is treated by the batcher as a fatal
/// coordination error ([`DocbindError::ProtocolViolation`]) poisoning the
/// whole pass. How the resolver groups signals into actual database round
/// trips is its own business.
#[async_trait]
pub trait SignalResolver: Send + Sync {
    async fn resolve(&self, signals: Vec<Signal>) -> DocbindResult<Vec<Bson>>;
}

/// One barrier generation: the gate blocked waiters sleep on, plus the fault
/// slot the leader fills if the drain failed.
struct Generation {
    gate: Latch,
    fault: Mutex<Option<DocbindError>>,
}

impl Generation {
    fn new() -> Self {
        Self {
            gate: Latch::new(1),
            fault: Mutex::new(None),
        }
    }

    fn outcome(&self) -> DocbindResult<()> {
        match &*self
            .fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

struct BatcherState {
    /// Scopes still participating in the pass.
    participants: usize,
    /// Scopes currently suspended in `wait()`.
    arrived: usize,
    /// Signals enqueued since the previous drain, in submission order.
    pending: Vec<(Signal, SignalProperty)>,
    generation: Arc<Generation>,
}

enum WaitRole {
    Leader,
    Follower(Arc<Generation>),
}

enum LeaveAction {
    Nothing,
    Drain,
    FailOrphans(Vec<(Signal, SignalProperty)>),
}

/// Coordinating scope for one batched-resolution pass.
///
/// Created with a fixed number of participants (one per effect scope in the
/// pass). Each participant may [`enqueue`](SignalBatcher::enqueue) any number
/// of signals, must [`wait`](SignalBatcher::wait) to observe their answers,
/// and must [`leave`](SignalBatcher::leave) exactly once when done so the
/// barrier stops counting it. Enqueue/wait cycles may repeat (multi-hop
/// dependent signals); each cycle drains into its own resolver call.
pub struct SignalBatcher {
    resolver: Arc<dyn SignalResolver>,
    state: Mutex<BatcherState>,
}

impl SignalBatcher {
    /// Creates a batcher for a pass with `participants` active scopes.
    pub fn new(resolver: Arc<dyn SignalResolver>, participants: usize) -> Self {
        Self {
            resolver,
            state: Mutex::new(BatcherState {
                participants,
                arrived: 0,
                pending: Vec::new(),
                generation: Arc::new(Generation::new()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BatcherState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a signal against the current batch and returns its
    /// placeholder immediately. Never blocks; the placeholder becomes valid
    /// only after the caller's next [`wait`](SignalBatcher::wait).
    pub fn enqueue(&self, signal: Signal) -> SignalProperty {
        let property = SignalProperty::new();
        let mut state = self.lock();
        state.pending.push((signal, property.clone()));
        trace!(pending = state.pending.len(), "signal enqueued");
        property
    }

    /// Suspends the calling scope until every active scope has either
    /// arrived at the barrier or left the pass, then drains the accumulated
    /// batch through a single resolver call and unblocks everyone.
    ///
    /// The last scope to arrive performs the drain on behalf of the pass.
    ///
    /// # Errors
    ///
    /// Returns the drain failure observed by this generation: the resolver's
    /// own error, or [`DocbindError::ProtocolViolation`] if the resolver
    /// broke the one-result-per-signal contract. Either way every property
    /// of the failed batch has been failed with the same error.
    pub async fn wait(&self) -> DocbindResult<()> {
        let role = {
            let mut state = self.lock();
            state.arrived += 1;
            if state.arrived == state.participants {
                WaitRole::Leader
            } else {
                WaitRole::Follower(state.generation.clone())
            }
        };

        match role {
            WaitRole::Leader => self.drain().await,
            WaitRole::Follower(generation) => {
                generation.gate.wait().await;
                generation.outcome()
            }
        }
    }

    /// Retires a finished scope from the pass.
    ///
    /// If the departure completes the barrier (everyone else is already
    /// suspended in `wait()`), the leaving scope performs the drain. If it
    /// was the last participant, signals that were enqueued but never
    /// awaited are failed loudly instead of dangling forever.
    pub async fn leave(&self) -> DocbindResult<()> {
        let action = {
            let mut state = self.lock();
            state.participants = state.participants.saturating_sub(1);

            if state.participants == 0 {
                LeaveAction::FailOrphans(std::mem::take(&mut state.pending))
            } else if state.arrived == state.participants {
                LeaveAction::Drain
            } else {
                LeaveAction::Nothing
            }
        };

        match action {
            LeaveAction::Nothing => Ok(()),
            LeaveAction::Drain => self.drain().await,
            LeaveAction::FailOrphans(orphaned) => {
                if orphaned.is_empty() {
                    return Ok(());
                }

                let error = DocbindError::ProtocolViolation(
                    "signal enqueued but never awaited".to_string(),
                );
                for (_, property) in orphaned {
                    let _ = property.fail(error.clone());
                }

                Err(error)
            }
        }
    }

    /// Drains the current batch: one resolver call, answers distributed in
    /// submission order, barrier generation rotated.
    async fn drain(&self) -> DocbindResult<()> {
        let (batch, generation) = {
            let mut state = self.lock();
            (std::mem::take(&mut state.pending), state.generation.clone())
        };

        let result = self.resolve_batch(batch).await;

        // Rotate the generation before opening the gate so scopes that
        // resume and enqueue again land in a fresh batch.
        {
            let mut state = self.lock();
            state.arrived = 0;
            state.generation = Arc::new(Generation::new());
        }

        if let Err(error) = &result {
            *generation
                .fault
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
        }
        generation.gate.count_down();

        result
    }

    async fn resolve_batch(&self, batch: Vec<(Signal, SignalProperty)>) -> DocbindResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let (signals, properties): (Vec<_>, Vec<_>) = batch.into_iter().unzip();
        debug!(signals = signals.len(), "draining signal batch");

        let submitted = signals.len();
        match self.resolver.resolve(signals).await {
            Ok(results) => {
                if results.len() != submitted {
                    let error = DocbindError::ProtocolViolation(format!(
                        "resolver returned {} results for {} signals",
                        results.len(),
                        submitted,
                    ));
                    for property in &properties {
                        let _ = property.fail(error.clone());
                    }
                    return Err(error);
                }

                let mut violation = None;
                for (property, result) in properties.iter().zip(results) {
                    if let Err(error) = property.complete(result) {
                        violation.get_or_insert(error);
                    }
                }

                match violation {
                    Some(error) => Err(error),
                    None => Ok(()),
                }
            }
            Err(error) => {
                for property in &properties {
                    let _ = property.fail(error.clone());
                }
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for SignalBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SignalBatcher")
            .field("participants", &state.participants)
            .field("arrived", &state.arrived)
            .field("pending", &state.pending.len())
            .finish()
    }
}
