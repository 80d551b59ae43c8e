//! A BSON document mapping framework built around batched deferred resolution.
//!
//! This crate is the core of the docbind project and provides:
//!
//! - **Document traits** ([`document`]) - Core traits for defining and serializing documents
//! - **Declarative schemas** ([`schema`]) - Field declarations carrying effects and indexes
//! - **Schema effects** ([`effect`]) - Validation, defaulting and cross-document checks
//! - **Deferred values** ([`deferred`]) - The single-assignment completion primitive
//! - **Signal batching** ([`signal`], [`resolver`]) - One resolver round trip per pass, not per document
//! - **Operator dispatch** ([`dispatch`], [`command`]) - Round-based routing of store commands
//! - **Effect pipeline** ([`pipeline`]) - Encode/decode passes over instance batches
//! - **Mapper** ([`mapper`]) - The typed save/load surface wiring it all together
//! - **Backend abstraction** ([`backend`]) - The narrow storage interface
//! - **Query API** ([`query`]) - Filter AST, builder and visitor
//! - **Collections and stores** ([`collection`], [`store`]) - Direct access facades
//! - **Error handling** ([`error`]) - One error enum, batch-fanout friendly
//!
//! # Example
//!
//! ```ignore
//! use docbind::{Document, Schema};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Uuid,
//!     pub email: String,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &Uuid {
//!         &self.id
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn schema() -> Schema {
//!         Schema::builder()
//!             .field("email", |f| f.required().unique().indexed(true))
//!             .build()
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbind_core;

pub mod backend;
pub mod collection;
pub mod command;
pub mod deferred;
pub mod dispatch;
pub mod document;
pub mod effect;
pub mod error;
pub mod mapper;
pub mod page;
pub mod pipeline;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod signal;
pub mod store;
