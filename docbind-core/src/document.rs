//! Core traits for document representation and serialization.
//!
//! Every mapped type implements [`Document`]: a unique identifier, a home
//! collection, and (optionally) a declarative [`Schema`](crate::schema::Schema)
//! describing the effects and indexes attached to its fields. The
//! [`DocumentExt`] extension trait adds BSON/JSON conversion for free.

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::{error::DocbindResult, schema::Schema};

/// Core trait that all mapped documents must implement.
///
/// Every document has a unique identifier (UUID) and names the collection it
/// belongs to. Documents that want schema-level behavior (validation,
/// defaulting, uniqueness checks, indexes) override [`schema`](Document::schema);
/// the default is an empty schema, which makes plain serde types work
/// without ceremony.
///
/// # Example
///
/// ```ignore
/// use docbind::{Document, Schema};
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: Uuid,
///     pub email: String,
/// }
///
/// impl Document for User {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "users"
///     }
///
///     fn schema() -> Schema {
///         Schema::builder()
///             .field("email", |f| f.required().unique().indexed(true))
///             .build()
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the name of the collection this document belongs to.
    ///
    /// This should be a static, lowercase identifier (e.g., "users",
    /// "products"). The collection will be created automatically if it does
    /// not exist.
    fn collection_name() -> &'static str;

    /// Returns the declarative schema for this document type.
    ///
    /// The default is an empty schema: no effects, no indexes.
    fn schema() -> Schema {
        Schema::empty()
    }
}

/// Extension trait providing serialization utilities for documents.
///
/// Automatically implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_bson(&self) -> DocbindResult<Bson>;

    /// Creates a document from a BSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_bson(bson: Bson) -> DocbindResult<Self>;

    /// Converts this document to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> DocbindResult<Value>;

    /// Creates a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_json(value: Value) -> DocbindResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocbindResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocbindResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }

    fn to_json(&self) -> DocbindResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocbindResult<Self> {
        Ok(from_value(value)?)
    }
}
