//! Document store facades.
//!
//! [`DocumentStore`] binds a concrete backend and hands out collections, the
//! [`Mapper`] pipeline, and store administration. [`DynDocumentStore`] is
//! its type-erased sibling for runtime backend selection. The backend is
//! held behind an `Arc` so mappers and command executions can share it
//! without borrowing from the store.

use std::sync::Arc;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::{Collection, DynCollection, DynTypedCollection, TypedCollection},
    document::Document,
    error::{DocbindError, DocbindResult},
    mapper::Mapper,
};

/// A strongly-typed document store bound to a specific backend.
///
/// # Example
///
/// ```ignore
/// let store = DocumentStore::new(backend);
/// let users = store.typed_collection::<User>();
/// store.mapper().insert(vec![user]).await?;
/// ```
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: Arc<B>,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name comes from the document type's
    /// `collection_name()`.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Creates a new collection with the given name.
    pub async fn create_collection(&self, name: &str) -> DocbindResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Drops (deletes) a collection with the given name.
    pub async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocbindResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Adds an index to a field in a collection.
    pub async fn add_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> DocbindResult<()> {
        self.backend
            .add_index(collection, field, unique)
            .await
    }

    /// Removes an index from a field in a collection.
    pub async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()> {
        self.backend
            .drop_index(collection, field)
            .await
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// Requires sole ownership of the backend: mappers and dynamic stores
    /// cloned from this store must be dropped first.
    pub async fn shutdown(self) -> DocbindResult<()> {
        match Arc::into_inner(self.backend) {
            Some(backend) => backend.shutdown().await,
            None => Err(DocbindError::Backend(
                "backend is still shared; drop outstanding mappers before shutdown".to_string(),
            )),
        }
    }
}

impl<B: StoreBackend + 'static> DocumentStore<B> {
    /// Creates a mapper running the full schema pipeline over this store's
    /// backend.
    pub fn mapper(&self) -> Mapper {
        Mapper::new(self.backend.clone() as Arc<dyn DynStoreBackend>)
    }
}

/// A document store over a dynamically dispatched backend.
///
/// Backends are expected to release their resources on drop; for explicit
/// teardown keep the typed [`DocumentStore`] and call
/// [`shutdown`](DocumentStore::shutdown) there.
#[derive(Debug, Clone)]
pub struct DynDocumentStore {
    backend: Arc<dyn DynStoreBackend>,
}

impl DynDocumentStore {
    /// Creates a new dynamic document store with the given backend.
    pub fn new(backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    /// Gets a typed collection for the specified document type.
    pub fn typed_collection<'a, D: Document>(&'a self) -> DynTypedCollection<'a, D> {
        DynTypedCollection::new(D::collection_name().to_string(), &*self.backend)
    }

    /// Gets an untyped collection with the given name.
    pub fn collection<'a>(&'a self, name: &str) -> DynCollection<'a> {
        DynCollection::new(name.to_string(), &*self.backend)
    }

    /// Creates a mapper running the full schema pipeline over this store's
    /// backend.
    pub fn mapper(&self) -> Mapper {
        Mapper::new(self.backend.clone())
    }

    /// Creates a new collection with the given name.
    pub async fn create_collection(&self, name: &str) -> DocbindResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Drops (deletes) a collection with the given name.
    pub async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocbindResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Adds an index to a field in a collection.
    pub async fn add_index(
        &self,
        collection: &str,
        field: &str,
        unique: bool,
    ) -> DocbindResult<()> {
        self.backend
            .add_index(collection, field, unique)
            .await
    }

    /// Removes an index from a field in a collection.
    pub async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()> {
        self.backend
            .drop_index(collection, field)
            .await
    }
}

/// Conversion trait for erasing a store's backend type.
pub trait IntoDynDocumentStore {
    /// Converts this store into a dynamically dispatched store.
    fn into_dyn(self) -> DynDocumentStore;
}

impl<B: StoreBackend + 'static> IntoDynDocumentStore for DocumentStore<B> {
    fn into_dyn(self) -> DynDocumentStore {
        DynDocumentStore::new(self.backend)
    }
}

impl IntoDynDocumentStore for DynDocumentStore {
    fn into_dyn(self) -> DynDocumentStore {
        self
    }
}
