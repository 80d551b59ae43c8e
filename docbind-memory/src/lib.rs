//! In-memory storage backend for docbind.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait. It uses async-aware read-write locks for concurrent
//! access and is the backend of choice for development and tests: the full
//! mapper pipeline (schema effects, signal batching, command dispatch)
//! runs against it unchanged.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbind::{Document, DocumentStore, memory::MemoryBackend};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Uuid,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &Uuid { &self.id }
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(MemoryBackend::new());
//!     store
//!         .mapper()
//!         .insert(vec![User { id: Uuid::new(), name: "Alice".to_string() }])
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbind_memory;

pub mod evaluator;
pub mod store;

pub use store::{MemoryBackend, MemoryBackendBuilder};
