//! Storage backend abstraction.
//!
//! This module defines the narrow interface the rest of the framework uses
//! to talk to a document store: batch document operations, structured
//! queries and counts, collection administration, and index maintenance.
//! The signal resolver and the store command operators are both written
//! against this surface, so everything above it is backend-agnostic.
//!
//! # Traits
//!
//! - [`StoreBackend`]: the core trait for storage backends
//! - [`DynStoreBackend`]: object-safe mirror for dynamic dispatch
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! All implementations must be thread-safe (`Send + Sync`) and support
//! concurrent access from multiple async tasks; the exact concurrency model
//! is implementation-specific.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::{any::Any, fmt::Debug};

use crate::{error::DocbindResult, query::Query};

/// Abstract interface for document storage backends.
///
/// Every document operation is a batch operation: the framework's batching
/// engines collapse per-document work into grouped calls before they reach
/// this trait, and backends are expected to execute each call as a single
/// round trip where their engine allows it.
///
/// Operations return [`DocbindResult<T>`](crate::error::DocbindResult);
/// implementers should document which error variants each operation may
/// produce.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// The collection is created automatically if it does not exist. A
    /// document whose ID is already present is an error.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()>;

    /// Replaces existing documents in a collection.
    ///
    /// A document whose ID is not present may be treated as an error
    /// depending on the backend implementation.
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()>;

    /// Deletes documents from a collection by their IDs.
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()>;

    /// Retrieves documents from a collection by their IDs.
    ///
    /// Documents are returned in store order, not request order; missing IDs
    /// are omitted from the result.
    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<Vec<Bson>>;

    /// Queries documents in a collection using a structured query.
    ///
    /// Applies the query's filter, sort, skip and limit and returns the
    /// matching documents.
    async fn query_documents(&self, query: Query, collection: &str) -> DocbindResult<Vec<Bson>>;

    /// Counts documents matching a structured query.
    ///
    /// Only the query's filter participates; limit/skip/sort are ignored.
    async fn count_documents(&self, query: Query, collection: &str) -> DocbindResult<u64>;

    /// Creates a new collection with the specified name.
    async fn create_collection(&self, name: &str) -> DocbindResult<()>;

    /// Drops a collection and all its documents. Irreversible.
    async fn drop_collection(&self, name: &str) -> DocbindResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocbindResult<Vec<String>>;

    /// Creates an index on a field in a collection.
    ///
    /// Creating an index that already exists must be a no-op: index
    /// maintenance commands are derived from writes and may repeat.
    async fn add_index(&self, collection: &str, field: &str, unique: bool) -> DocbindResult<()>;

    /// Removes an index from a collection.
    async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends with external
    /// connections should override this.
    async fn shutdown(self) -> DocbindResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe mirror of [`StoreBackend`] for dynamic dispatch.
///
/// Automatically implemented for every `StoreBackend`; used wherever the
/// backend type must be erased (the signal resolver, the command operators,
/// dynamically-selected stores).
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()>;
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()>;
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()>;
    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<Vec<Bson>>;
    async fn query_documents(&self, query: Query, collection: &str) -> DocbindResult<Vec<Bson>>;
    async fn count_documents(&self, query: Query, collection: &str) -> DocbindResult<u64>;
    async fn create_collection(&self, name: &str) -> DocbindResult<()>;
    async fn drop_collection(&self, name: &str) -> DocbindResult<()>;
    async fn list_collections(&self) -> DocbindResult<Vec<String>>;
    async fn add_index(&self, collection: &str, field: &str, unique: bool) -> DocbindResult<()>;
    async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> DocbindResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        StoreBackend::update_documents(self, documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()> {
        StoreBackend::delete_documents(self, ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<Vec<Bson>> {
        StoreBackend::get_documents(self, ids, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocbindResult<Vec<Bson>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn count_documents(&self, query: Query, collection: &str) -> DocbindResult<u64> {
        StoreBackend::count_documents(self, query, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocbindResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> DocbindResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn add_index(&self, collection: &str, field: &str, unique: bool) -> DocbindResult<()> {
        StoreBackend::add_index(self, collection, field, unique).await
    }

    async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()> {
        StoreBackend::drop_index(self, collection, field).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocbindResult<()> {
        (*self).shutdown().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Factory trait for constructing backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocbindResult<Self::Backend>;
}
