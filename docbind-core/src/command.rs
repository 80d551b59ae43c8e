//! The store command family and its operators.
//!
//! [`StoreCommand`] is the closed operation family the mapper submits to the
//! dispatch engine: document writes plus index maintenance. Two operators
//! route it:
//!
//! - [`WriteOperator`] claims `Insert`/`Update`/`Delete`, groups claimed
//!   commands per target collection, and executes one backend call per kind
//!   per group: the internal batching step that keeps a hundred-document
//!   save at one round trip. After a group's inserts acknowledge, it derives
//!   [`CommandKind::EnsureIndex`] commands for the collection's declared
//!   indexes into the next round.
//! - [`IndexOperator`] claims the index commands.
//!
//! Both operators settle every command they claim, success or failure; a
//! failed backend call fails exactly the commands of that group.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::DynStoreBackend,
    deferred::Deferred,
    dispatch::{Operation, Operator, Round},
    error::DocbindResult,
    schema::IndexSpec,
};

/// The closed variant set of store work.
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// Insert one document into a collection.
    Insert {
        collection: String,
        document: (Uuid, Bson),
    },
    /// Replace one document in a collection.
    Update {
        collection: String,
        document: (Uuid, Bson),
    },
    /// Delete one document from a collection.
    Delete { collection: String, id: Uuid },
    /// Ensure a declared index exists on a collection.
    EnsureIndex {
        collection: String,
        index: IndexSpec,
    },
    /// Remove an index from a collection.
    RemoveIndex { collection: String, field: String },
}

impl CommandKind {
    fn verb(&self) -> &'static str {
        match self {
            CommandKind::Insert { .. } => "insert",
            CommandKind::Update { .. } => "update",
            CommandKind::Delete { .. } => "delete",
            CommandKind::EnsureIndex { .. } => "ensure-index",
            CommandKind::RemoveIndex { .. } => "remove-index",
        }
    }

    fn collection(&self) -> &str {
        match self {
            CommandKind::Insert { collection, .. }
            | CommandKind::Update { collection, .. }
            | CommandKind::Delete { collection, .. }
            | CommandKind::EnsureIndex { collection, .. }
            | CommandKind::RemoveIndex { collection, .. } => collection,
        }
    }
}

/// One pending unit of store work with its completion slot.
///
/// Commands are submitted behind `Arc`s; identity is the allocation, so two
/// inserts of the same document are two distinct work items.
#[derive(Debug)]
pub struct StoreCommand {
    kind: CommandKind,
    outcome: Deferred<()>,
}

impl StoreCommand {
    fn new(kind: CommandKind) -> Arc<Self> {
        Arc::new(Self { kind, outcome: Deferred::new() })
    }

    pub fn insert(collection: impl Into<String>, id: Uuid, document: Bson) -> Arc<Self> {
        Self::new(CommandKind::Insert {
            collection: collection.into(),
            document: (id, document),
        })
    }

    pub fn update(collection: impl Into<String>, id: Uuid, document: Bson) -> Arc<Self> {
        Self::new(CommandKind::Update {
            collection: collection.into(),
            document: (id, document),
        })
    }

    pub fn delete(collection: impl Into<String>, id: Uuid) -> Arc<Self> {
        Self::new(CommandKind::Delete { collection: collection.into(), id })
    }

    pub fn ensure_index(collection: impl Into<String>, index: IndexSpec) -> Arc<Self> {
        Self::new(CommandKind::EnsureIndex { collection: collection.into(), index })
    }

    pub fn remove_index(collection: impl Into<String>, field: impl Into<String>) -> Arc<Self> {
        Self::new(CommandKind::RemoveIndex {
            collection: collection.into(),
            field: field.into(),
        })
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }
}

impl Operation for StoreCommand {
    type Output = ();

    fn outcome(&self) -> &Deferred<()> {
        &self.outcome
    }

    fn label(&self) -> String {
        format!("{}:{}", self.kind.verb(), self.kind.collection())
    }
}

#[derive(Default)]
struct WriteGroup {
    inserts: Vec<(Uuid, Bson)>,
    updates: Vec<(Uuid, Bson)>,
    deletes: Vec<Uuid>,
    members: Vec<Arc<StoreCommand>>,
}

/// Claims document writes and executes them grouped per collection.
pub struct WriteOperator {
    backend: Arc<dyn DynStoreBackend>,
    indexes: HashMap<String, Vec<IndexSpec>>,
}

impl WriteOperator {
    pub fn new(backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { backend, indexes: HashMap::new() }
    }

    /// Declares the indexes of a collection, to be ensured after writes to
    /// that collection acknowledge.
    pub fn with_indexes(mut self, collection: impl Into<String>, indexes: Vec<IndexSpec>) -> Self {
        if !indexes.is_empty() {
            self.indexes.insert(collection.into(), indexes);
        }
        self
    }
}

#[async_trait]
impl Operator<StoreCommand> for WriteOperator {
    async fn claim(
        &self,
        pending: Vec<Arc<StoreCommand>>,
        round: &Round<StoreCommand>,
    ) -> Vec<Arc<StoreCommand>> {
        let mut rest = Vec::new();
        let mut groups: HashMap<String, WriteGroup> = HashMap::new();

        for command in pending {
            match command.kind() {
                CommandKind::Insert { collection, document } => {
                    let group = groups.entry(collection.clone()).or_default();
                    group.inserts.push(document.clone());
                    group.members.push(Arc::clone(&command));
                }
                CommandKind::Update { collection, document } => {
                    let group = groups.entry(collection.clone()).or_default();
                    group.updates.push(document.clone());
                    group.members.push(Arc::clone(&command));
                }
                CommandKind::Delete { collection, id } => {
                    let group = groups.entry(collection.clone()).or_default();
                    group.deletes.push(*id);
                    group.members.push(Arc::clone(&command));
                }
                CommandKind::EnsureIndex { .. } | CommandKind::RemoveIndex { .. } => {
                    rest.push(Arc::clone(&command));
                }
            }
        }

        for (collection, group) in groups {
            let backend = self.backend.clone();
            let indexes = self
                .indexes
                .get(&collection)
                .cloned()
                .unwrap_or_default();
            let feedback = round.clone();

            round.launch(async move {
                let WriteGroup { inserts, updates, deletes, members } = group;
                let acknowledged_inserts = !inserts.is_empty();

                debug!(
                    collection = %collection,
                    inserts = inserts.len(),
                    updates = updates.len(),
                    deletes = deletes.len(),
                    "executing write group"
                );

                let written: DocbindResult<()> = async {
                    if !inserts.is_empty() {
                        backend.insert_documents(inserts, &collection).await?;
                    }
                    if !updates.is_empty() {
                        backend.update_documents(updates, &collection).await?;
                    }
                    if !deletes.is_empty() {
                        backend.delete_documents(deletes, &collection).await?;
                    }
                    Ok(())
                }
                .await;

                match written {
                    Ok(()) => {
                        for member in &members {
                            let _ = member.outcome().complete(());
                        }
                        if acknowledged_inserts {
                            for index in indexes {
                                feedback.enqueue(StoreCommand::ensure_index(
                                    collection.clone(),
                                    index,
                                ));
                            }
                        }
                    }
                    Err(error) => {
                        for member in &members {
                            let _ = member.outcome().fail(error.clone());
                        }
                    }
                }
            });
        }

        rest
    }
}

enum IndexAction {
    Ensure(String, IndexSpec),
    Remove(String, String),
}

/// Claims and executes index maintenance commands.
pub struct IndexOperator {
    backend: Arc<dyn DynStoreBackend>,
}

impl IndexOperator {
    pub fn new(backend: Arc<dyn DynStoreBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Operator<StoreCommand> for IndexOperator {
    async fn claim(
        &self,
        pending: Vec<Arc<StoreCommand>>,
        round: &Round<StoreCommand>,
    ) -> Vec<Arc<StoreCommand>> {
        let mut rest = Vec::new();

        for command in pending {
            let action = match command.kind() {
                CommandKind::EnsureIndex { collection, index } => {
                    Some(IndexAction::Ensure(collection.clone(), index.clone()))
                }
                CommandKind::RemoveIndex { collection, field } => {
                    Some(IndexAction::Remove(collection.clone(), field.clone()))
                }
                CommandKind::Insert { .. }
                | CommandKind::Update { .. }
                | CommandKind::Delete { .. } => None,
            };

            let Some(action) = action else {
                rest.push(command);
                continue;
            };

            let backend = self.backend.clone();
            round.launch(async move {
                let result = match action {
                    IndexAction::Ensure(collection, index) => {
                        backend
                            .add_index(&collection, &index.field, index.unique)
                            .await
                    }
                    IndexAction::Remove(collection, field) => {
                        backend.drop_index(&collection, &field).await
                    }
                };

                match result {
                    Ok(()) => {
                        let _ = command.outcome().complete(());
                    }
                    Err(error) => {
                        let _ = command.outcome().fail(error);
                    }
                }
            });
        }

        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StoreBackend;
    use crate::dispatch::Dispatcher;
    use crate::error::DocbindError;
    use crate::query::Query;
    use std::sync::Mutex;

    /// Records every backend call; collections listed in `failing` reject
    /// writes.
    #[derive(Debug, Default)]
    struct RecordingBackend {
        log: Mutex<Vec<String>>,
        failing: Vec<String>,
    }

    impl RecordingBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing(collections: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                failing: collections.iter().map(|c| c.to_string()).collect(),
            })
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }

        fn check(&self, collection: &str) -> DocbindResult<()> {
            if self.failing.iter().any(|c| c == collection) {
                return Err(DocbindError::Backend(format!("{collection} unavailable")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        async fn insert_documents(
            &self,
            documents: Vec<(Uuid, Bson)>,
            collection: &str,
        ) -> DocbindResult<()> {
            self.check(collection)?;
            self.record(format!("insert {collection} {}", documents.len()));
            Ok(())
        }

        async fn update_documents(
            &self,
            documents: Vec<(Uuid, Bson)>,
            collection: &str,
        ) -> DocbindResult<()> {
            self.check(collection)?;
            self.record(format!("update {collection} {}", documents.len()));
            Ok(())
        }

        async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocbindResult<()> {
            self.check(collection)?;
            self.record(format!("delete {collection} {}", ids.len()));
            Ok(())
        }

        async fn get_documents(
            &self,
            _ids: Vec<Uuid>,
            collection: &str,
        ) -> DocbindResult<Vec<Bson>> {
            self.record(format!("get {collection}"));
            Ok(vec![])
        }

        async fn query_documents(
            &self,
            _query: Query,
            collection: &str,
        ) -> DocbindResult<Vec<Bson>> {
            self.record(format!("query {collection}"));
            Ok(vec![])
        }

        async fn count_documents(&self, _query: Query, collection: &str) -> DocbindResult<u64> {
            self.record(format!("count {collection}"));
            Ok(0)
        }

        async fn create_collection(&self, name: &str) -> DocbindResult<()> {
            self.record(format!("create {name}"));
            Ok(())
        }

        async fn drop_collection(&self, name: &str) -> DocbindResult<()> {
            self.record(format!("drop {name}"));
            Ok(())
        }

        async fn list_collections(&self) -> DocbindResult<Vec<String>> {
            Ok(vec![])
        }

        async fn add_index(&self, collection: &str, field: &str, unique: bool) -> DocbindResult<()> {
            self.record(format!("add-index {collection} {field} unique={unique}"));
            Ok(())
        }

        async fn drop_index(&self, collection: &str, field: &str) -> DocbindResult<()> {
            self.record(format!("drop-index {collection} {field}"));
            Ok(())
        }
    }

    fn doc_pair() -> (Uuid, Bson) {
        (Uuid::new(), Bson::Document(bson::doc! { "k": 1 }))
    }

    #[tokio::test]
    async fn writes_group_per_collection() {
        let backend = RecordingBackend::new();
        let dispatcher = Dispatcher::new(vec![
            Arc::new(WriteOperator::new(backend.clone())) as Arc<dyn Operator<StoreCommand>>,
        ]);

        let (id_a, doc_a) = doc_pair();
        let (id_b, doc_b) = doc_pair();
        let (id_c, doc_c) = doc_pair();

        let a = StoreCommand::insert("users", id_a, doc_a);
        let b = StoreCommand::insert("teams", id_b, doc_b);
        let c = StoreCommand::insert("users", id_c, doc_c);

        dispatcher
            .submit(vec![a.clone(), b.clone(), c.clone()])
            .await
            .unwrap();

        for command in [&a, &b, &c] {
            command.outcome().value().unwrap();
        }

        let mut log = backend.log();
        log.sort();
        assert_eq!(log, vec!["insert teams 1", "insert users 2"]);
    }

    #[tokio::test]
    async fn inserts_derive_index_maintenance() {
        let backend = RecordingBackend::new();
        let write = WriteOperator::new(backend.clone()).with_indexes(
            "users",
            vec![IndexSpec { field: "email".to_string(), unique: true }],
        );
        let dispatcher = Dispatcher::new(vec![
            Arc::new(write) as Arc<dyn Operator<StoreCommand>>,
            Arc::new(IndexOperator::new(backend.clone())) as Arc<dyn Operator<StoreCommand>>,
        ]);

        let (id, doc) = doc_pair();
        let command = StoreCommand::insert("users", id, doc);
        dispatcher.submit(vec![command.clone()]).await.unwrap();

        command.outcome().value().unwrap();
        assert_eq!(
            backend.log(),
            vec!["insert users 1", "add-index users email unique=true"]
        );
    }

    #[tokio::test]
    async fn derived_commands_cancel_without_an_index_operator() {
        let backend = RecordingBackend::new();
        let write = WriteOperator::new(backend.clone()).with_indexes(
            "users",
            vec![IndexSpec { field: "email".to_string(), unique: false }],
        );
        let dispatcher =
            Dispatcher::new(vec![Arc::new(write) as Arc<dyn Operator<StoreCommand>>]);

        let (id, doc) = doc_pair();
        let command = StoreCommand::insert("users", id, doc);
        // The write itself still succeeds; only the derived index command is
        // unroutable.
        dispatcher.submit(vec![command.clone()]).await.unwrap();
        command.outcome().value().unwrap();
        assert_eq!(backend.log(), vec!["insert users 1"]);
    }

    #[tokio::test]
    async fn backend_failure_fails_exactly_its_group() {
        let backend = RecordingBackend::failing(&["users"]);
        let dispatcher = Dispatcher::new(vec![
            Arc::new(WriteOperator::new(backend.clone())) as Arc<dyn Operator<StoreCommand>>,
        ]);

        let (id_a, doc_a) = doc_pair();
        let (id_b, doc_b) = doc_pair();
        let broken = StoreCommand::insert("users", id_a, doc_a);
        let healthy = StoreCommand::insert("teams", id_b, doc_b);

        dispatcher
            .submit(vec![broken.clone(), healthy.clone()])
            .await
            .unwrap();

        assert!(matches!(
            broken.outcome().value(),
            Err(DocbindError::Backend(_))
        ));
        healthy.outcome().value().unwrap();
    }

    #[tokio::test]
    async fn remove_index_routes_to_the_index_operator() {
        let backend = RecordingBackend::new();
        let dispatcher = Dispatcher::new(vec![
            Arc::new(WriteOperator::new(backend.clone())) as Arc<dyn Operator<StoreCommand>>,
            Arc::new(IndexOperator::new(backend.clone())) as Arc<dyn Operator<StoreCommand>>,
        ]);

        let command = StoreCommand::remove_index("users", "email");
        dispatcher.submit(vec![command.clone()]).await.unwrap();

        command.outcome().value().unwrap();
        assert_eq!(backend.log(), vec!["drop-index users email"]);
    }
}
