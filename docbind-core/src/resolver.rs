//! Backend-driven signal resolution.
//!
//! [`BackendResolver`] is the stock [`SignalResolver`]: it receives one
//! drained batch of signals and turns it into as few backend round trips as
//! it can. Fetch signals are grouped per target collection: a pass where a
//! hundred scopes each fetch one referenced document costs one
//! `get_documents` call per collection, not a hundred. Count signals carry
//! distinct filters and run as concurrent queries.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::DynStoreBackend,
    error::{DocbindError, DocbindResult},
    query::{Filter, Query},
    signal::{Signal, SignalResolver},
};

/// Resolves signal batches against a type-erased storage backend.
pub struct BackendResolver {
    backend: Arc<dyn DynStoreBackend>,
}

impl BackendResolver {
    pub fn new(backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    async fn resolve_fetch_group(
        &self,
        collection: &str,
        group: &[(usize, Vec<Uuid>)],
    ) -> DocbindResult<Vec<(usize, Bson)>> {
        // Union of the group's ids, deduplicated, submission order kept.
        let mut seen = HashSet::new();
        let mut union = Vec::new();
        for (_, ids) in group {
            for id in ids {
                if seen.insert(*id) {
                    union.push(*id);
                }
            }
        }

        let documents = self
            .backend
            .get_documents(union, collection)
            .await?;

        let by_id: HashMap<Uuid, Bson> = documents
            .into_iter()
            .filter_map(|document| {
                let id = document
                    .as_document()?
                    .get("id")
                    .cloned()?;
                let id: Uuid = bson::de::deserialize_from_bson(id).ok()?;
                Some((id, document))
            })
            .collect();

        // Each signal gets its own slice of the shared answer.
        Ok(group
            .iter()
            .map(|(index, ids)| {
                let hits = ids
                    .iter()
                    .filter_map(|id| by_id.get(id).cloned())
                    .collect::<Vec<_>>();
                (*index, Bson::Array(hits))
            })
            .collect())
    }
}

#[async_trait]
impl SignalResolver for BackendResolver {
    async fn resolve(&self, signals: Vec<Signal>) -> DocbindResult<Vec<Bson>> {
        let total = signals.len();
        let mut counts: Vec<(usize, String, Filter)> = Vec::new();
        let mut fetches: HashMap<String, Vec<(usize, Vec<Uuid>)>> = HashMap::new();

        for (index, signal) in signals.into_iter().enumerate() {
            match signal {
                Signal::Count { collection, filter } => {
                    counts.push((index, collection, filter));
                }
                Signal::Fetch { collection, ids } => {
                    fetches
                        .entry(collection)
                        .or_default()
                        .push((index, ids));
                }
            }
        }

        debug!(
            signals = total,
            counts = counts.len(),
            fetch_groups = fetches.len(),
            "resolving signal batch"
        );

        let mut answers: Vec<Option<Bson>> = vec![None; total];

        for (collection, group) in &fetches {
            for (index, answer) in self
                .resolve_fetch_group(collection, group)
                .await?
            {
                answers[index] = Some(answer);
            }
        }

        let count_results = join_all(counts.into_iter().map(|(index, collection, filter)| {
            let backend = self.backend.clone();
            async move {
                let count = backend
                    .count_documents(Query::filtered(filter), &collection)
                    .await?;
                Ok::<_, DocbindError>((index, Bson::Int64(count as i64)))
            }
        }))
        .await;

        for result in count_results {
            let (index, answer) = result?;
            answers[index] = Some(answer);
        }

        answers
            .into_iter()
            .map(|answer| {
                answer.ok_or_else(|| {
                    DocbindError::ProtocolViolation(
                        "signal left unanswered by resolver planning".to_string(),
                    )
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for BackendResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendResolver").finish()
    }
}
