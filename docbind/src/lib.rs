//! Main docbind crate providing a unified interface for document mapping.
//!
//! This crate is the primary entry point for users of the docbind framework.
//! It re-exports the core types and functionality from the sub-crates and
//! provides convenient access to the storage backends.
//!
//! # Features
//!
//! - **Type-safe document mapping** - Define your data structures with serde
//!   and persist them through a schema-aware pipeline
//! - **Batched schema effects** - Validation, defaulting, uniqueness and
//!   reference checks whose database lookups are batched per pass instead of
//!   per document
//! - **Round-based command dispatch** - Writes grouped per collection,
//!   index maintenance derived from schema declarations
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//! - **Flexible querying** - Composable filter API with sorting and
//!   pagination
//!
//! # Quick Start
//!
//! ```ignore
//! use docbind::{prelude::*, memory::MemoryBackend};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Uuid,
//!     pub email: String,
//!     pub role: Option<String>,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &Uuid { &self.id }
//!     fn collection_name() -> &'static str { "users" }
//!
//!     fn schema() -> Schema {
//!         Schema::builder()
//!             .field("email", |f| f.required().unique().indexed(true))
//!             .field("role", |f| f.default_value("member"))
//!             .build()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocbindResult<()> {
//!     let store = DocumentStore::new(MemoryBackend::new());
//!     let mapper = store.mapper();
//!
//!     // The whole batch is validated in one effect pass: both uniqueness
//!     // checks travel in a single resolver drain.
//!     mapper
//!         .insert(vec![
//!             User { id: Uuid::new(), email: "ada@example.com".into(), role: None },
//!             User { id: Uuid::new(), email: "bob@example.com".into(), role: None },
//!         ])
//!         .await?;
//!
//!     let admins: Vec<User> = mapper
//!         .find(Query::builder().filter(Filter::eq("role", "member")).build())
//!         .await?;
//!     println!("found {}", admins.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Deriving documents
//!
//! Types without schema effects can derive the `Document` trait:
//!
//! ```ignore
//! use docbind::Document;
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! #[document(collection = "notes")]
//! pub struct Note {
//!     pub id: Uuid,
//!     pub text: String,
//! }
//! ```
//!
//! Types that declare a schema implement the trait by hand to override
//! `Document::schema`.
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docbind_core::{
    backend, collection, command, deferred, dispatch, document, effect, error, mapper, page,
    pipeline, query, resolver, schema, signal, store,
};

// The derive macro shares its name with the trait, serde-style.
pub use docbind_macros::Document;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docbind_memory::{MemoryBackend, MemoryBackendBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbind_mongodb::{MongoBackend, MongoBackendBuilder};
}
