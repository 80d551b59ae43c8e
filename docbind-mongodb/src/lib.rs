//! MongoDB backend implementation for docbind.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend`
//! trait: grouped writes become `insert_many`/`$in` batches, queries are
//! translated into native filter documents, counts use the server-side
//! `countDocuments`, and index maintenance maps onto `createIndex`/`dropIndex`.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbind = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! The backend is built from a connection string and a database name:
//!
//! ```ignore
//! use docbind::{backend::StoreBackendBuilder, mongodb::MongoBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoBackend::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbind_mongodb;

pub mod query;
pub mod sanitizer;
pub mod store;

pub use store::{MongoBackend, MongoBackendBuilder};
