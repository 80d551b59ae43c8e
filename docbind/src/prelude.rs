//! Convenient re-exports of commonly used types from docbind.
//!
//! Import this prelude module to quickly access the most frequently used
//! types and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docbind::prelude::*;
//! ```

pub use docbind_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::{Collection, DynCollection, DynTypedCollection, TypedCollection},
    command::{CommandKind, IndexOperator, StoreCommand, WriteOperator},
    deferred::Deferred,
    dispatch::{Dispatcher, Operation, Operator, Round},
    document::{Document, DocumentExt},
    effect::{EffectBinding, EffectConfig, EffectScope, SchemaEffect},
    error::{DocbindError, DocbindResult},
    mapper::Mapper,
    page::{Page, PaginationParams},
    pipeline::EffectRunner,
    query::{CmpOp, Filter, FilterVisitor, Query, QueryBuilder, Sort, SortDirection},
    resolver::BackendResolver,
    schema::{FieldPath, IndexSpec, Schema, SchemaBuilder, Stage},
    signal::{Signal, SignalBatcher, SignalProperty, SignalResolver},
    store::{DocumentStore, DynDocumentStore, IntoDynDocumentStore},
};

pub use docbind_macros::Document;
