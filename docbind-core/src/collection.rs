//! Collection facades for raw and typed document access.
//!
//! Collections are thin handles over a backend, scoped to one collection
//! name. They bypass the mapper pipeline entirely (no effects, no command
//! dispatch), which makes them the right tool for administrative access and
//! the wrong tool for anything a schema is supposed to guard.
//!
//! # Collection types
//!
//! - [`Collection`] - raw BSON access over a statically-known backend
//! - [`TypedCollection`] - typed access for a specific document type
//! - [`DynCollection`] / [`DynTypedCollection`] - the same over a
//!   dynamically dispatched backend

use bson::{Bson, Uuid};
use std::marker::PhantomData;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    document::{Document, DocumentExt},
    error::DocbindResult,
    page::{Page, PaginationParams},
    query::Query,
};

fn count_query(query: &Query) -> Query {
    Query { filter: query.filter.clone(), ..Query::default() }
}

fn page_query(query: &Query, params: &PaginationParams) -> Query {
    let mut paged = query.clone();
    paged.skip = Some(params.offset());
    paged.limit = Some(params.per_page);
    paged
}

fn page_navigation<T>(items: Vec<T>, count: usize, params: &PaginationParams) -> Page<T> {
    let consumed = params.offset() + items.len();
    Page::builder(items)
        .with_count(count)
        .with_next_page((consumed < count).then(|| params.page + 1))
        .with_previous_page((params.page > 1).then(|| params.page - 1))
        .build()
}

/// A raw BSON collection over a statically-known backend.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts raw documents into the collection.
    pub async fn insert(&self, documents: Vec<(Uuid, Bson)>) -> DocbindResult<()> {
        self.backend
            .insert_documents(documents, self.name())
            .await
    }

    /// Replaces raw documents in the collection.
    pub async fn update(&self, documents: Vec<(Uuid, Bson)>) -> DocbindResult<()> {
        self.backend
            .update_documents(documents, self.name())
            .await
    }

    /// Deletes documents from the collection by their IDs.
    pub async fn delete<U>(&self, ids: Vec<U>) -> DocbindResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    /// Retrieves documents from the collection by their IDs.
    ///
    /// Missing IDs are omitted from the result.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocbindResult<Vec<Bson>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    /// Queries documents in the collection.
    pub async fn query(&self, query: Query) -> DocbindResult<Vec<Bson>> {
        self.backend
            .query_documents(query, self.name())
            .await
    }

    /// Counts documents matching the query's filter.
    pub async fn count(&self, query: Query) -> DocbindResult<u64> {
        self.backend
            .count_documents(count_query(&query), self.name())
            .await
    }
}

/// A typed collection over a statically-known backend.
///
/// Documents are converted through their [`DocumentExt`] BSON
/// representation on the way in and out.
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    name: String,
    backend: &'a B,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-views this collection under a different document type.
    pub fn with_type<T: Document>(&self) -> TypedCollection<'a, B, T> {
        TypedCollection {
            name: self.name.clone(),
            backend: self.backend,
            _marker: PhantomData,
        }
    }

    /// Inserts documents into the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or insertion fails.
    pub async fn insert(&self, documents: Vec<D>) -> DocbindResult<()> {
        self.backend
            .insert_documents(encode_documents(documents)?, self.name())
            .await
    }

    /// Replaces existing documents in the collection.
    pub async fn update(&self, documents: Vec<D>) -> DocbindResult<()> {
        self.backend
            .update_documents(encode_documents(documents)?, self.name())
            .await
    }

    /// Deletes documents from the collection by their IDs.
    pub async fn delete<U>(&self, ids: Vec<U>) -> DocbindResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    /// Retrieves documents by their IDs; missing IDs are omitted.
    pub async fn get<U>(&self, ids: Vec<U>) -> DocbindResult<Vec<D>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Queries documents in the collection.
    pub async fn query(&self, query: Query) -> DocbindResult<Vec<D>> {
        self.backend
            .query_documents(query, self.name())
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Counts documents matching the query's filter.
    pub async fn count(&self, query: Query) -> DocbindResult<u64> {
        self.backend
            .count_documents(count_query(&query), self.name())
            .await
    }

    /// Fetches one page of query results with navigation metadata.
    pub async fn page(&self, query: Query, params: PaginationParams) -> DocbindResult<Page<D>> {
        let count = self.count(query.clone()).await?;
        let items = self.query(page_query(&query, &params)).await?;

        Ok(page_navigation(items, count as usize, &params))
    }
}

/// A raw BSON collection over a dynamically dispatched backend.
#[derive(Debug)]
pub struct DynCollection<'a> {
    name: String,
    backend: &'a dyn DynStoreBackend,
}

impl<'a> DynCollection<'a> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert(&self, documents: Vec<(Uuid, Bson)>) -> DocbindResult<()> {
        self.backend
            .insert_documents(documents, self.name())
            .await
    }

    pub async fn update(&self, documents: Vec<(Uuid, Bson)>) -> DocbindResult<()> {
        self.backend
            .update_documents(documents, self.name())
            .await
    }

    pub async fn delete<U>(&self, ids: Vec<U>) -> DocbindResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    pub async fn get<U>(&self, ids: Vec<U>) -> DocbindResult<Vec<Bson>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    pub async fn query(&self, query: Query) -> DocbindResult<Vec<Bson>> {
        self.backend
            .query_documents(query, self.name())
            .await
    }

    pub async fn count(&self, query: Query) -> DocbindResult<u64> {
        self.backend
            .count_documents(count_query(&query), self.name())
            .await
    }
}

/// A typed collection over a dynamically dispatched backend.
#[derive(Debug)]
pub struct DynTypedCollection<'a, D: Document> {
    name: String,
    backend: &'a dyn DynStoreBackend,
    _marker: PhantomData<D>,
}

impl<'a, D: Document> DynTypedCollection<'a, D> {
    pub(crate) fn new(name: String, backend: &'a dyn DynStoreBackend) -> Self {
        Self { name, backend, _marker: PhantomData }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-views this collection under a different document type.
    pub fn with_type<T: Document>(&self) -> DynTypedCollection<'a, T> {
        DynTypedCollection {
            name: self.name.clone(),
            backend: self.backend,
            _marker: PhantomData,
        }
    }

    pub async fn insert(&self, documents: Vec<D>) -> DocbindResult<()> {
        self.backend
            .insert_documents(encode_documents(documents)?, self.name())
            .await
    }

    pub async fn update(&self, documents: Vec<D>) -> DocbindResult<()> {
        self.backend
            .update_documents(encode_documents(documents)?, self.name())
            .await
    }

    pub async fn delete<U>(&self, ids: Vec<U>) -> DocbindResult<()>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .delete_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await
    }

    pub async fn get<U>(&self, ids: Vec<U>) -> DocbindResult<Vec<D>>
    where
        U: Into<Uuid> + Send + Sync + 'static,
    {
        self.backend
            .get_documents(
                ids.into_iter()
                    .map(Into::into)
                    .collect(),
                self.name(),
            )
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    pub async fn query(&self, query: Query) -> DocbindResult<Vec<D>> {
        self.backend
            .query_documents(query, self.name())
            .await?
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    pub async fn count(&self, query: Query) -> DocbindResult<u64> {
        self.backend
            .count_documents(count_query(&query), self.name())
            .await
    }

    /// Fetches one page of query results with navigation metadata.
    pub async fn page(&self, query: Query, params: PaginationParams) -> DocbindResult<Page<D>> {
        let count = self.count(query.clone()).await?;
        let items = self.query(page_query(&query, &params)).await?;

        Ok(page_navigation(items, count as usize, &params))
    }
}

fn encode_documents<D: Document>(documents: Vec<D>) -> DocbindResult<Vec<(Uuid, Bson)>> {
    documents
        .into_iter()
        .map(|document| {
            document
                .to_bson()
                .map(|bson| (*document.id(), bson))
        })
        .collect()
}
