//! End-to-end mapper pipeline tests against the in-memory backend.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use docbind::memory::MemoryBackend;
use docbind::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Wraps the memory backend to observe how often the pipeline actually hits
/// the store. Clones share their counters, so a test can keep one handle
/// while the store owns another.
#[derive(Debug, Clone, Default)]
struct CountingBackend {
    inner: MemoryBackend,
    gets: Arc<AtomicUsize>,
    counts: Arc<AtomicUsize>,
    index_log: Arc<Mutex<Vec<String>>>,
}

// Delegation goes through UFCS: the blanket `DynStoreBackend` impl gives the
// memory backend a second method set with the same names.
#[async_trait]
impl StoreBackend for CountingBackend {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        StoreBackend::insert_documents(&self.inner, documents, collection).await
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocbindResult<()> {
        StoreBackend::update_documents(&self.inner, documents, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()> {
        StoreBackend::delete_documents(&self.inner, ids, collection).await
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<Vec<Bson>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        StoreBackend::get_documents(&self.inner, ids, collection).await
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocbindResult<Vec<Bson>> {
        StoreBackend::query_documents(&self.inner, query, collection).await
    }

    async fn count_documents(&self, query: Query, collection: &str) -> DocbindResult<u64> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        StoreBackend::count_documents(&self.inner, query, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocbindResult<()> {
        StoreBackend::create_collection(&self.inner, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
        StoreBackend::drop_collection(&self.inner, name).await
    }

    async fn list_collections(&self) -> DocbindResult<Vec<String>> {
        StoreBackend::list_collections(&self.inner).await
    }

    async fn add_index(&self, collection: &str, field: &str, unique: bool) -> DocbindResult<()> {
        self.index_log
            .lock()
            .unwrap()
            .push(format!("{collection} {field} {unique}"));
        StoreBackend::add_index(&self.inner, collection, field, unique).await
    }

    async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()> {
        StoreBackend::drop_index(&self.inner, collection, field).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Team {
    id: Uuid,
    name: String,
}

impl docbind::document::Document for Team {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "teams"
    }

    fn schema() -> Schema {
        Schema::builder()
            .field("name", |f| f.required())
            .build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct User {
    id: Uuid,
    email: Option<String>,
    role: Option<String>,
    team_id: Option<Uuid>,
}

impl docbind::document::Document for User {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "users"
    }

    fn schema() -> Schema {
        Schema::builder()
            .field("email", |f| f.required().unique().indexed(true))
            .field("role", |f| f.default_value("member"))
            .field("team_id", |f| f.references("teams"))
            .build()
    }
}

fn team(name: &str) -> Team {
    Team { id: Uuid::new(), name: name.to_string() }
}

fn user(email: &str, team_id: Option<Uuid>) -> User {
    User {
        id: Uuid::new(),
        email: Some(email.to_string()),
        role: None,
        team_id,
    }
}

#[tokio::test]
async fn insert_runs_the_schema_pipeline() {
    let store = DocumentStore::new(MemoryBackend::new());
    let mapper = store.mapper();

    let ada = user("ada@example.com", None);
    mapper.insert(vec![ada.clone()]).await.unwrap();

    let loaded: Vec<User> = mapper.get(vec![ada.id]).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].email.as_deref(), Some("ada@example.com"));

    // The default was applied before the write, not just on read.
    let raw = store
        .collection("users")
        .get(vec![ada.id])
        .await
        .unwrap();
    assert_eq!(
        raw[0].as_document().unwrap().get("role"),
        Some(&Bson::String("member".to_string()))
    );
}

#[tokio::test]
async fn required_fields_block_the_whole_write() {
    let store = DocumentStore::new(MemoryBackend::new());
    let mapper = store.mapper();

    let mut nameless = user("ada@example.com", None);
    nameless.email = None;

    let rejected = mapper.insert(vec![nameless]).await;
    assert!(matches!(rejected, Err(DocbindError::InvalidDocument(_))));

    // Nothing was persisted.
    let count = store
        .collection("users")
        .count(Query::new())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn unique_values_reject_duplicates_but_not_resaves() {
    let store = DocumentStore::new(MemoryBackend::new());
    let mapper = store.mapper();

    let ada = user("ada@example.com", None);
    mapper.insert(vec![ada.clone()]).await.unwrap();

    let copycat = user("ada@example.com", None);
    let rejected = mapper.insert(vec![copycat]).await;
    assert!(matches!(rejected, Err(DocbindError::InvalidDocument(_))));

    // Re-saving the same document is not a collision with itself.
    let mut renamed = ada.clone();
    renamed.role = Some("admin".to_string());
    mapper.update(vec![renamed]).await.unwrap();

    let loaded: Vec<User> = mapper.get(vec![ada.id]).await.unwrap();
    assert_eq!(loaded[0].role.as_deref(), Some("admin"));
}

#[tokio::test]
async fn reference_checks_validate_against_the_target_collection() {
    let store = DocumentStore::new(MemoryBackend::new());
    let mapper = store.mapper();

    let platform = team("platform");
    mapper.insert(vec![platform.clone()]).await.unwrap();

    mapper
        .insert(vec![user("ada@example.com", Some(platform.id))])
        .await
        .unwrap();

    let dangling = mapper
        .insert(vec![user("bob@example.com", Some(Uuid::new()))])
        .await;
    assert!(matches!(dangling, Err(DocbindError::InvalidDocument(_))));
}

#[tokio::test]
async fn reference_fetches_of_a_batch_share_one_round_trip() {
    let backend = CountingBackend::default();
    let probe = backend.clone();
    let mapper = DocumentStore::new(backend).mapper();

    let platform = team("platform");
    let research = team("research");
    mapper
        .insert(vec![platform.clone(), research.clone()])
        .await
        .unwrap();

    let users = (0..10)
        .map(|i| {
            let home = if i % 2 == 0 { platform.id } else { research.id };
            user(&format!("user{i}@example.com"), Some(home))
        })
        .collect::<Vec<_>>();

    mapper.insert(users).await.unwrap();

    // Ten reference checks against one collection collapse into a single
    // get_documents call; ten uniqueness counts still reach the backend as
    // individual queries but travel in the same resolver drain.
    assert_eq!(probe.gets.load(Ordering::SeqCst), 1);
    assert_eq!(probe.counts.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn inserts_ensure_declared_indexes() {
    let backend = CountingBackend::default();
    let probe = backend.clone();
    let mapper = DocumentStore::new(backend).mapper();

    mapper
        .insert(vec![user("ada@example.com", None)])
        .await
        .unwrap();

    assert_eq!(
        *probe.index_log.lock().unwrap(),
        vec!["users email true".to_string()]
    );
}

#[tokio::test]
async fn delete_removes_documents() {
    let store = DocumentStore::new(MemoryBackend::new());
    let mapper = store.mapper();

    let ada = user("ada@example.com", None);
    mapper.insert(vec![ada.clone()]).await.unwrap();
    mapper.delete::<User>(vec![ada.id]).await.unwrap();

    let gone: Vec<User> = mapper.get(vec![ada.id]).await.unwrap();
    assert!(gone.is_empty());
}

#[tokio::test]
async fn dynamic_stores_run_the_same_pipeline() {
    let store = DocumentStore::new(MemoryBackend::new()).into_dyn();
    let mapper = store.mapper();

    let ada = user("ada@example.com", None);
    mapper.insert(vec![ada.clone()]).await.unwrap();

    let loaded = store
        .typed_collection::<User>()
        .get(vec![ada.id])
        .await
        .unwrap();
    assert_eq!(loaded.len(), 1);

    let raw_count = store
        .collection("users")
        .count(Query::new())
        .await
        .unwrap();
    assert_eq!(raw_count, 1);
}

#[tokio::test]
async fn shutdown_requires_sole_ownership_of_the_backend() {
    let store = DocumentStore::new(MemoryBackend::new());
    store.shutdown().await.unwrap();

    let store = DocumentStore::new(MemoryBackend::new());
    let _mapper = store.mapper();
    assert!(store.shutdown().await.is_err());
}
