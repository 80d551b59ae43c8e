use async_trait::async_trait;
use bson::{Bson, Document, Uuid, doc};
use futures::{StreamExt, TryStreamExt, stream::iter};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::debug;

use docbind_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocbindError, DocbindResult},
    query::{Query, SortDirection},
};

use crate::{query::MongoFilterTranslator, sanitizer::ValueSanitizer};
use docbind_core::query::FilterVisitor;

#[derive(Debug)]
pub struct MongoBackend {
    client: Client,
    database: String,
}

impl MongoBackend {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoBackendBuilder {
        MongoBackendBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(collection_name))
    }

    fn prepare_document(&self, id: &Uuid, document: &Bson) -> DocbindResult<Document> {
        Ok(Document::from_iter(
            ValueSanitizer::sanitize_value(document)
                .as_document()
                .cloned()
                .ok_or_else(|| DocbindError::InvalidDocument("Expected document".into()))?
                .into_iter()
                .chain(vec![("_id".to_string(), id.into())]),
        ))
    }

    fn restore_document(&self, document: &Document) -> DocbindResult<Bson> {
        Ok(ValueSanitizer::restore_value(&Bson::Document(
            Document::from_iter(
                document
                    .clone()
                    .into_iter()
                    .filter(|(key, _)| key != "_id"),
            ),
        )))
    }

    fn translate_filter(&self, query: &Query) -> DocbindResult<Document> {
        match &query.filter {
            Some(filter) => MongoFilterTranslator.visit_filter(filter),
            None => Ok(doc! {}),
        }
    }

    async fn shutdown(self) -> DocbindResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoBackend {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        debug!(collection, documents = documents.len(), "insert_many");

        self.get_collection(collection)
            .insert_many(
                documents
                    .iter()
                    .map(|(id, document)| self.prepare_document(id, document))
                    .collect::<DocbindResult<Vec<Document>>>()?,
            )
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        iter(documents)
            .then(async |(id, document)| {
                self.get_collection(collection)
                    .update_one(
                        doc! { "_id": id },
                        doc! { "$set": self.prepare_document(&id, &document)? },
                    )
                    .await
                    .map_err(|e| DocbindError::Backend(e.to_string()))
            })
            .try_collect::<Vec<_>>()
            .await?;

        Ok(())
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()> {
        self.get_collection(collection)
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<Vec<Bson>> {
        Ok(self
            .get_collection(collection)
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?
            .into_iter()
            .map(|document| self.restore_document(&document))
            .collect::<DocbindResult<Vec<Bson>>>()?)
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocbindResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(limit as i64);
        }
        if let Some(skip) = query.skip {
            options.skip = Some(skip as u64);
        }
        if let Some(sort) = &query.sort {
            options.sort = Some(doc! {
                sort.field.clone(): match sort.direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                }
            })
        }

        Ok(self
            .get_collection(collection)
            .find(self.translate_filter(&query)?)
            .with_options(options)
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?
            .into_iter()
            .map(|document| self.restore_document(&document))
            .collect::<DocbindResult<Vec<Bson>>>()?)
    }

    async fn count_documents(&self, query: Query, collection: &str) -> DocbindResult<u64> {
        self.get_collection(collection)
            .count_documents(self.translate_filter(&query)?)
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))
    }

    async fn create_collection(&self, name: &str) -> DocbindResult<()> {
        self.client
            .database(&self.database)
            .create_collection(&ValueSanitizer::sanitize_string(name))
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn list_collections(&self) -> DocbindResult<Vec<String>> {
        Ok(self
            .client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?)
    }

    async fn add_index(&self, collection: &str, field: &str, unique: bool) -> DocbindResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(unique)
                            .build(),
                    )
                    .build(),
            )
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()> {
        // Single-field indexes get the driver's default name.
        self.get_collection(collection)
            .drop_index(format!("{field}_1"))
            .await
            .map_err(|e| DocbindError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn shutdown(self) -> DocbindResult<()> {
        self.shutdown().await
    }
}

pub struct MongoBackendBuilder {
    dsn: String,
    database: String,
}

impl MongoBackendBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoBackendBuilder {
    type Backend = MongoBackend;

    async fn build(self) -> DocbindResult<Self::Backend> {
        Ok(MongoBackend::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DocbindError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DocbindError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
