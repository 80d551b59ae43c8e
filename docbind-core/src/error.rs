//! Error types and result types for document mapping operations.
//!
//! This module provides error handling for every layer of the framework, from
//! backend round trips up to the batching engines. Use [`DocbindResult<T>`]
//! as the return type for fallible operations.
//!
//! The enum is `Clone` on purpose: a single failure (a resolver error, a
//! rejected batch) frequently has to fan out to every deferred value that was
//! waiting on the failed work.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors surfaced by the document mapping framework.
///
/// Store-level variants cover serialization, document lifecycle and backend
/// failures. The coordination variants (`ProtocolViolation`,
/// `UnsupportedOperation`, `Execution`) are produced by the batching and
/// dispatch engines and carry strict semantics:
///
/// - [`ProtocolViolation`](DocbindError::ProtocolViolation) is a programming
///   error (double completion, premature read, resolver contract breach) and
///   is never retried.
/// - [`UnsupportedOperation`](DocbindError::UnsupportedOperation) means no
///   operator claimed an operation after a full dispatch pass; it is reported
///   to that operation's caller only.
/// - [`Execution`](DocbindError::Execution) wraps a failure inside an
///   operator or resolver and is delivered to exactly the items of the
///   failed batch.
#[derive(Error, Debug, Clone)]
pub enum DocbindError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document violates schema constraints or has invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A coordination contract was broken: a deferred value was completed
    /// twice or read before completion, or a resolver returned the wrong
    /// number of results.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    /// No operator claimed the operation after a full dispatch pass.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// An operator or resolver failed while processing a claimed batch.
    #[error("Execution failed: {0}")]
    Execution(String),
}

/// A specialized `Result` type for document mapping operations.
///
/// This type alias is used throughout the crate to indicate operations that
/// may fail with a [`DocbindError`].
pub type DocbindResult<T> = Result<T, DocbindError>;

impl From<BsonError> for DocbindError {
    fn from(err: BsonError) -> Self {
        DocbindError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocbindError {
    fn from(err: SerdeJsonError) -> Self {
        DocbindError::Serialization(err.to_string())
    }
}
