//! In-memory storage backend.
//!
//! Documents live as BSON values in HashMaps behind an async-aware
//! read-write lock. Queries scan the collection and evaluate filters
//! directly; there is no indexing, so the backend is meant for development,
//! tests and small datasets rather than production loads.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use async_trait::async_trait;
use bson::{Bson, Uuid};
use mea::rwlock::RwLock;
use tracing::trace;

use docbind_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocbindError, DocbindResult},
    query::{Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator, lookup_field};

type CollectionMap = HashMap<String, Bson>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document storage backend.
///
/// `MemoryBackend` is cloneable; clones share the same underlying data, so
/// a mapper and a test assertion can look at the same store.
///
/// # Example
///
/// ```ignore
/// use docbind_memory::MemoryBackend;
/// use docbind::backend::StoreBackend;
/// use bson::{Uuid, Bson, doc};
///
/// let backend = MemoryBackend::new();
/// let id = Uuid::new();
/// backend
///     .insert_documents(vec![(id, Bson::Document(doc! { "name": "Alice" }))], "users")
///     .await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct MemoryBackend {
    /// collection name -> (document id -> document)
    store: Arc<RwLock<StoreMap>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for constructing a `MemoryBackend`.
    pub fn builder() -> MemoryBackendBuilder {
        MemoryBackendBuilder::default()
    }

    fn filtered(collection: &CollectionMap, query: &Query) -> DocbindResult<Vec<Bson>> {
        match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(collection.values(), filter),
            None => Ok(collection.values().cloned().collect()),
        }
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        for (id, document) in documents {
            let key = id.to_string();

            if collection_map.contains_key(&key) {
                return Err(DocbindError::DocumentAlreadyExists(
                    key,
                    collection.to_string(),
                ));
            }

            collection_map.insert(key, document);
        }

        Ok(())
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(map) => map,
            None => return Err(DocbindError::CollectionNotFound(collection.to_string())),
        };

        for (id, document) in documents {
            let key = id.to_string();

            if !collection_map.contains_key(&key) {
                return Err(DocbindError::DocumentNotFound(key, collection.to_string()));
            }

            collection_map.insert(key, document);
        }

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()> {
        let mut store = self.store.write().await;
        let collection_map = match store.get_mut(collection) {
            Some(map) => map,
            None => return Err(DocbindError::CollectionNotFound(collection.to_string())),
        };

        for id in ids {
            let key = id.to_string();

            if collection_map.remove(&key).is_none() {
                return Err(DocbindError::DocumentNotFound(key, collection.to_string()));
            }
        }

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<Vec<Bson>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(map) => map,
            None => return Ok(vec![]),
        };

        let mut documents = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(document) = collection_map.get(&id.to_string()) {
                documents.push(document.clone());
            }
        }

        Ok(documents)
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocbindResult<Vec<Bson>> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(map) => map,
            None => return Ok(vec![]),
        };

        trace!(
            collection,
            scanned = collection_map.len(),
            "scanning collection for query"
        );

        let mut documents = Self::filtered(collection_map, &query)?;

        if let Some(sort) = &query.sort {
            documents.sort_by(|a, b| {
                let left = lookup_field(a, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = lookup_field(b, &sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        Ok(documents
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_documents(&self, query: Query, collection: &str) -> DocbindResult<u64> {
        let store = self.store.read().await;
        let collection_map = match store.get(collection) {
            Some(map) => map,
            None => return Ok(0),
        };

        Ok(Self::filtered(collection_map, &query)?.len() as u64)
    }

    async fn create_collection(&self, name: &str) -> DocbindResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(HashMap::new);

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocbindError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocbindResult<Vec<String>> {
        Ok(self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect())
    }

    async fn add_index(&self, _collection: &str, _field: &str, _unique: bool) -> DocbindResult<()> {
        // Queries scan; index maintenance is accepted and ignored.
        Ok(())
    }

    async fn drop_index(&self, _collection: &str, _field: &str) -> DocbindResult<()> {
        Ok(())
    }
}

/// Builder for [`MemoryBackend`] instances.
#[derive(Default)]
pub struct MemoryBackendBuilder;

#[async_trait]
impl StoreBackendBuilder for MemoryBackendBuilder {
    type Backend = MemoryBackend;

    /// Builds and returns a new [`MemoryBackend`]. Always succeeds.
    async fn build(self) -> DocbindResult<Self::Backend> {
        Ok(MemoryBackend::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docbind_core::query::Filter;

    fn user(name: &str, age: i32) -> (Uuid, Bson) {
        (
            Uuid::new(),
            Bson::Document(doc! { "name": name, "age": age }),
        )
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let backend = MemoryBackend::new();
        let (id, document) = user("ada", 36);

        backend
            .insert_documents(vec![(id, document.clone())], "users")
            .await
            .unwrap();

        let fetched = backend
            .get_documents(vec![id, Uuid::new()], "users")
            .await
            .unwrap();
        assert_eq!(fetched, vec![document]);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let backend = MemoryBackend::new();
        let (id, document) = user("ada", 36);

        backend
            .insert_documents(vec![(id, document.clone())], "users")
            .await
            .unwrap();

        let second = backend
            .insert_documents(vec![(id, document)], "users")
            .await;
        assert!(matches!(
            second,
            Err(DocbindError::DocumentAlreadyExists(_, _))
        ));
    }

    #[tokio::test]
    async fn update_requires_an_existing_document() {
        let backend = MemoryBackend::new();
        backend.create_collection("users").await.unwrap();

        let (id, document) = user("ada", 36);
        let missing = backend
            .update_documents(vec![(id, document)], "users")
            .await;
        assert!(matches!(missing, Err(DocbindError::DocumentNotFound(_, _))));
    }

    #[tokio::test]
    async fn query_filters_sorts_and_limits() {
        let backend = MemoryBackend::new();
        let people = vec![user("ada", 36), user("bob", 21), user("cyd", 58)];
        backend
            .insert_documents(people, "users")
            .await
            .unwrap();

        let results = backend
            .query_documents(
                Query::builder()
                    .filter(Filter::gt("age", 25))
                    .sort("age", SortDirection::Desc)
                    .limit(1)
                    .build(),
                "users",
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].as_document().unwrap().get("name"),
            Some(&Bson::String("cyd".to_string()))
        );
    }

    #[tokio::test]
    async fn count_applies_only_the_filter() {
        let backend = MemoryBackend::new();
        backend
            .insert_documents(vec![user("ada", 36), user("bob", 21)], "users")
            .await
            .unwrap();

        let count = backend
            .count_documents(
                Query::builder()
                    .filter(Filter::gte("age", 30))
                    .limit(0)
                    .build(),
                "users",
            )
            .await
            .unwrap();

        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn missing_collections_read_as_empty() {
        let backend = MemoryBackend::new();

        assert!(backend
            .get_documents(vec![Uuid::new()], "ghosts")
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            backend
                .count_documents(Query::new(), "ghosts")
                .await
                .unwrap(),
            0
        );
    }
}
