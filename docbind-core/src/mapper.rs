//! The document mapper: typed persistence through both engines.
//!
//! [`Mapper`] is the high-level surface most applications use. Writing runs
//! the encode-stage effect pass over the whole batch (one signal drain per
//! hop, regardless of batch size), then submits store commands to a
//! dispatcher whose operators group the writes per collection and derive
//! index maintenance from the document type's schema. Reading queries the
//! backend and runs the decode-stage pass before materializing typed
//! documents.
//!
//! Every mapper call builds its own dispatcher and effect runner from the
//! configuration at hand: separate submissions are separate coordinators
//! with disjoint queues, and there are no process-wide registries.

use bson::{Bson, Uuid};
use std::sync::Arc;

use crate::{
    backend::DynStoreBackend,
    command::{IndexOperator, StoreCommand, WriteOperator},
    dispatch::{Dispatcher, Operation, Operator},
    document::{Document, DocumentExt},
    error::DocbindResult,
    pipeline::EffectRunner,
    query::Query,
    resolver::BackendResolver,
    schema::{Schema, Stage},
};

/// Typed persistence facade over a type-erased backend.
#[derive(Clone)]
pub struct Mapper {
    backend: Arc<dyn DynStoreBackend>,
}

impl Mapper {
    /// Creates a mapper over the given backend.
    pub fn new(backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }

    fn runner(&self) -> EffectRunner {
        EffectRunner::new(Arc::new(BackendResolver::new(self.backend.clone())))
    }

    fn dispatcher(&self, collection: &str, schema: &Schema) -> Dispatcher<StoreCommand> {
        let write = WriteOperator::new(self.backend.clone())
            .with_indexes(collection, schema.indexes());

        Dispatcher::new(vec![
            Arc::new(write) as Arc<dyn Operator<StoreCommand>>,
            Arc::new(IndexOperator::new(self.backend.clone())) as Arc<dyn Operator<StoreCommand>>,
        ])
    }

    async fn encode<D: Document>(&self, documents: &[D]) -> DocbindResult<Vec<(Uuid, Bson)>> {
        let schema = D::schema();
        let ids: Vec<Uuid> = documents.iter().map(|document| *document.id()).collect();
        let mut instances = documents
            .iter()
            .map(|document| document.to_bson())
            .collect::<DocbindResult<Vec<Bson>>>()?;

        self.runner()
            .run(D::collection_name(), &schema, &mut instances, Stage::Encode)
            .await?;

        Ok(ids.into_iter().zip(instances).collect())
    }

    async fn decode<D: Document>(&self, mut instances: Vec<Bson>) -> DocbindResult<Vec<D>> {
        let schema = D::schema();
        self.runner()
            .run(D::collection_name(), &schema, &mut instances, Stage::Decode)
            .await?;

        instances
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    async fn submit(&self, collection: &str, schema: &Schema, commands: Vec<Arc<StoreCommand>>) -> DocbindResult<()> {
        self.dispatcher(collection, schema)
            .submit(commands.clone())
            .await?;

        for command in &commands {
            command.outcome().get().await?;
        }

        Ok(())
    }

    /// Inserts a batch of documents.
    ///
    /// Runs the encode-stage effects over the whole batch first (defaults
    /// filled, validations enforced, cross-document checks batched), then
    /// writes one grouped insert per collection and ensures the schema's
    /// declared indexes.
    pub async fn insert<D: Document>(&self, documents: Vec<D>) -> DocbindResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let schema = D::schema();
        let encoded = self.encode(&documents).await?;
        let commands = encoded
            .into_iter()
            .map(|(id, instance)| StoreCommand::insert(D::collection_name(), id, instance))
            .collect();

        self.submit(D::collection_name(), &schema, commands).await
    }

    /// Replaces a batch of existing documents.
    ///
    /// Same pipeline as [`insert`](Mapper::insert), minus index derivation.
    pub async fn update<D: Document>(&self, documents: Vec<D>) -> DocbindResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let schema = D::schema();
        let encoded = self.encode(&documents).await?;
        let commands = encoded
            .into_iter()
            .map(|(id, instance)| StoreCommand::update(D::collection_name(), id, instance))
            .collect();

        self.submit(D::collection_name(), &schema, commands).await
    }

    /// Deletes documents by id.
    pub async fn delete<D: Document>(&self, ids: Vec<Uuid>) -> DocbindResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let schema = D::schema();
        let commands = ids
            .into_iter()
            .map(|id| StoreCommand::delete(D::collection_name(), id))
            .collect();

        self.submit(D::collection_name(), &schema, commands).await
    }

    /// Retrieves documents by id, running the decode-stage effects before
    /// materializing them.
    pub async fn get<D: Document>(&self, ids: Vec<Uuid>) -> DocbindResult<Vec<D>> {
        let instances = self
            .backend
            .get_documents(ids, D::collection_name())
            .await?;

        self.decode(instances).await
    }

    /// Queries documents, running the decode-stage effects before
    /// materializing them.
    pub async fn find<D: Document>(&self, query: Query) -> DocbindResult<Vec<D>> {
        let instances = self
            .backend
            .query_documents(query, D::collection_name())
            .await?;

        self.decode(instances).await
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StoreBackend;
    use crate::schema::Schema;
    use async_trait::async_trait;
    use bson::doc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Minimal map-backed store: enough contract for insert/get round trips.
    /// Clones share their state so tests can keep a probe handle.
    #[derive(Debug, Default, Clone)]
    struct MapBackend {
        collections: Arc<Mutex<HashMap<String, HashMap<String, Bson>>>>,
        indexed: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl StoreBackend for MapBackend {
        async fn insert_documents(
            &self,
            documents: Vec<(Uuid, Bson)>,
            collection: &str,
        ) -> DocbindResult<()> {
            let mut collections = self.collections.lock().unwrap();
            let map = collections.entry(collection.to_string()).or_default();
            for (id, document) in documents {
                map.insert(id.to_string(), document);
            }
            Ok(())
        }

        async fn update_documents(
            &self,
            documents: Vec<(Uuid, Bson)>,
            collection: &str,
        ) -> DocbindResult<()> {
            let mut collections = self.collections.lock().unwrap();
            let map = collections.entry(collection.to_string()).or_default();
            for (id, document) in documents {
                map.insert(id.to_string(), document);
            }
            Ok(())
        }

        async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()> {
            let mut collections = self.collections.lock().unwrap();
            if let Some(map) = collections.get_mut(collection) {
                for id in ids {
                    map.remove(&id.to_string());
                }
            }
            Ok(())
        }

        async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<Vec<Bson>> {
            let collections = self.collections.lock().unwrap();
            let Some(map) = collections.get(collection) else {
                return Ok(vec![]);
            };
            Ok(ids
                .iter()
                .filter_map(|id| map.get(&id.to_string()).cloned())
                .collect())
        }

        async fn query_documents(&self, _query: Query, collection: &str) -> DocbindResult<Vec<Bson>> {
            let collections = self.collections.lock().unwrap();
            Ok(collections
                .get(collection)
                .map(|map| map.values().cloned().collect())
                .unwrap_or_default())
        }

        async fn count_documents(&self, _query: Query, _collection: &str) -> DocbindResult<u64> {
            Ok(0)
        }

        async fn create_collection(&self, name: &str) -> DocbindResult<()> {
            self.collections
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_default();
            Ok(())
        }

        async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
            self.collections.lock().unwrap().remove(name);
            Ok(())
        }

        async fn list_collections(&self) -> DocbindResult<Vec<String>> {
            Ok(self.collections.lock().unwrap().keys().cloned().collect())
        }

        async fn add_index(&self, collection: &str, field: &str, _unique: bool) -> DocbindResult<()> {
            self.indexed
                .lock()
                .unwrap()
                .push(format!("{collection}.{field}"));
            Ok(())
        }

        async fn drop_index(&self, _collection: &str, _field: &str) -> DocbindResult<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Account {
        id: Uuid,
        name: String,
        #[serde(default)]
        role: Option<String>,
    }

    impl Document for Account {
        fn id(&self) -> &Uuid {
            &self.id
        }

        fn collection_name() -> &'static str {
            "accounts"
        }

        fn schema() -> Schema {
            Schema::builder()
                .field("name", |f| f.required())
                .field("role", |f| f.default_value("member").indexed(false))
                .build()
        }
    }

    fn mapper_over(backend: &MapBackend) -> Mapper {
        Mapper::new(Arc::new(backend.clone()) as Arc<dyn DynStoreBackend>)
    }

    #[tokio::test]
    async fn insert_applies_defaults_and_persists() {
        let backend = MapBackend::default();
        let mapper = mapper_over(&backend);

        let account = Account {
            id: Uuid::new(),
            name: "ada".to_string(),
            role: None,
        };

        mapper.insert(vec![account.clone()]).await.unwrap();

        let stored: Vec<Account> = mapper.get(vec![account.id]).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].role.as_deref(), Some("member"));
    }

    #[tokio::test]
    async fn insert_ensures_declared_indexes() {
        let backend = MapBackend::default();
        let mapper = mapper_over(&backend);

        let account = Account {
            id: Uuid::new(),
            name: "ada".to_string(),
            role: Some("admin".to_string()),
        };
        mapper.insert(vec![account]).await.unwrap();

        assert_eq!(
            *backend.indexed.lock().unwrap(),
            vec!["accounts.role".to_string()]
        );
    }

    #[tokio::test]
    async fn insert_rejects_documents_failing_validation() {
        let backend = MapBackend::default();
        let mapper = mapper_over(&backend);

        let account = Account {
            id: Uuid::new(),
            name: String::new(),
            role: None,
        };
        // Present-but-empty passes `required`; drop the field entirely
        // through a raw write instead.
        let mut broken = account.to_bson().unwrap();
        broken.as_document_mut().unwrap().remove("name");

        let schema = Account::schema();
        let runner = mapper.runner();
        let mut instances = vec![broken];
        let result = runner
            .run("accounts", &schema, &mut instances, Stage::Encode)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn decode_pass_fills_missing_fields_on_read() {
        let backend = MapBackend::default();
        let mapper = mapper_over(&backend);

        // Write a legacy document missing the `role` field entirely.
        let id = Uuid::new();
        backend
            .collections
            .lock()
            .unwrap()
            .entry("accounts".to_string())
            .or_default()
            .insert(
                id.to_string(),
                Bson::Document(doc! { "id": id, "name": "old" }),
            );

        let loaded: Vec<Account> = mapper.get(vec![id]).await.unwrap();
        assert_eq!(loaded[0].role.as_deref(), Some("member"));
    }

    #[tokio::test]
    async fn delete_removes_documents() {
        let backend = MapBackend::default();
        let mapper = mapper_over(&backend);

        let account = Account {
            id: Uuid::new(),
            name: "ada".to_string(),
            role: None,
        };
        mapper.insert(vec![account.clone()]).await.unwrap();
        mapper.delete::<Account>(vec![account.id]).await.unwrap();

        let remaining: Vec<Account> = mapper.get(vec![account.id]).await.unwrap();
        assert!(remaining.is_empty());
    }
}
