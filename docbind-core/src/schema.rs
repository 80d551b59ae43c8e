//! Declarative schema configuration for mapped documents.
//!
//! A [`Schema`] is a plain configuration object: a list of field
//! declarations, each carrying the effects to run over that field during
//! encode/decode and an optional index declaration. Schemas are built with
//! the fluent [`SchemaBuilder`] and consumed by the effect pipeline and the
//! mapper; nothing here talks to a database.

use bson::{Bson, Document as BsonDocument};
use std::fmt;
use std::sync::Arc;

use crate::effect::SchemaEffect;

/// A dot-separated structural path into a document.
///
/// Identifies where in the document tree a field declaration applies, and
/// provides lookup/assignment into BSON instances along that path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path such as `"address.city"`.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Reads the value at this path inside `instance`, if present.
    pub fn lookup<'a>(&self, instance: &'a Bson) -> Option<&'a Bson> {
        let mut current = instance;
        for segment in &self.segments {
            current = current.as_document()?.get(segment)?;
        }
        Some(current)
    }

    /// Writes `value` at this path inside `instance`, creating intermediate
    /// documents as needed. A non-document instance is left untouched.
    pub fn assign(&self, instance: &mut Bson, value: Bson) {
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };
        let Some(mut doc) = instance.as_document_mut() else {
            return;
        };

        for segment in parents {
            if !matches!(doc.get(segment), Some(Bson::Document(_))) {
                doc.insert(segment.clone(), Bson::Document(BsonDocument::new()));
            }
            doc = match doc.get_mut(segment) {
                Some(Bson::Document(inner)) => inner,
                _ => return,
            };
        }

        doc.insert(last.clone(), value);
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::parse(path)
    }
}

/// The pipeline stage an effect participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Document is being prepared for storage.
    Encode,
    /// Document has been read from storage and is being materialized.
    Decode,
}

/// A declared index on a field.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// The (dotted) field the index covers.
    pub field: String,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// One field declaration: where the field lives, which effects run over it,
/// and whether it is indexed.
pub struct FieldDecl {
    /// Structural path of the field within the document.
    pub path: FieldPath,
    /// Effects attached to this field.
    pub effects: Vec<Arc<dyn SchemaEffect>>,
    /// Optional index declaration.
    pub index: Option<IndexSpec>,
}

impl fmt::Debug for FieldDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDecl")
            .field("path", &self.path)
            .field("effects", &self.effects.len())
            .field("index", &self.index)
            .finish()
    }
}

/// The declarative schema of a document type.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Arc<FieldDecl>>,
}

impl Schema {
    /// An empty schema: no effects, no indexes.
    pub fn empty() -> Self {
        Schema::default()
    }

    /// Creates a new schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// The field declarations of this schema.
    pub fn fields(&self) -> &[Arc<FieldDecl>] {
        &self.fields
    }

    /// Every index declared by this schema.
    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.fields
            .iter()
            .filter_map(|field| field.index.clone())
            .collect()
    }

    /// Whether any field declares an effect for the given stage.
    pub fn has_effects_for(&self, stage: Stage) -> bool {
        self.fields.iter().any(|field| {
            field
                .effects
                .iter()
                .any(|effect| effect.stages().contains(&stage))
        })
    }
}

/// Fluent builder for [`Schema`] values.
///
/// Each field is configured through a closure over a [`FieldBuilder`]:
///
/// ```ignore
/// let schema = Schema::builder()
///     .field("email", |f| f.required().unique().indexed(true))
///     .field("role", |f| f.default_value("member"))
///     .field("team_id", |f| f.references("teams"))
///     .build();
/// ```
#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<Arc<FieldDecl>>,
}

impl SchemaBuilder {
    /// Creates a new, empty schema builder.
    pub fn new() -> Self {
        SchemaBuilder::default()
    }

    /// Declares a field at `path`, configured by `configure`.
    pub fn field(
        mut self,
        path: impl Into<FieldPath>,
        configure: impl FnOnce(FieldBuilder) -> FieldBuilder,
    ) -> Self {
        let builder = configure(FieldBuilder::new(path.into()));
        self.fields.push(Arc::new(builder.build()));
        self
    }

    /// Builds and returns the final schema.
    pub fn build(self) -> Schema {
        Schema { fields: self.fields }
    }
}

/// Per-field configuration surface used inside [`SchemaBuilder::field`].
pub struct FieldBuilder {
    path: FieldPath,
    effects: Vec<Arc<dyn SchemaEffect>>,
    index: Option<IndexSpec>,
}

impl FieldBuilder {
    fn new(path: FieldPath) -> Self {
        Self {
            path,
            effects: Vec::new(),
            index: None,
        }
    }

    /// Attaches a custom effect to this field.
    pub fn effect(mut self, effect: Arc<dyn SchemaEffect>) -> Self {
        self.effects.push(effect);
        self
    }

    /// Requires the field to be present and non-null on encode.
    pub fn required(self) -> Self {
        let effect = Arc::new(crate::effect::Required);
        self.effect(effect)
    }

    /// Fills the field with `value` when missing, on both encode and decode.
    pub fn default_value(self, value: impl Into<Bson>) -> Self {
        let effect = Arc::new(crate::effect::DefaultValue::new(value));
        self.effect(effect)
    }

    /// Enforces that no other document in the collection carries the same
    /// value on encode (checked through a batched count signal).
    pub fn unique(self) -> Self {
        let effect = Arc::new(crate::effect::UniqueValue);
        self.effect(effect)
    }

    /// Requires the field to hold the id of an existing document in
    /// `collection` on encode (checked through a batched fetch signal).
    pub fn references(self, collection: impl Into<String>) -> Self {
        let effect = Arc::new(crate::effect::ReferenceCheck::new(collection));
        self.effect(effect)
    }

    /// Declares an index over this field.
    pub fn indexed(mut self, unique: bool) -> Self {
        self.index = Some(IndexSpec {
            field: self.path.to_string(),
            unique,
        });
        self
    }

    fn build(self) -> FieldDecl {
        FieldDecl {
            path: self.path,
            effects: self.effects,
            index: self.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn path_lookup_walks_nested_documents() {
        let instance = Bson::Document(doc! {
            "address": { "city": "Oslo" },
        });

        let path = FieldPath::parse("address.city");
        assert_eq!(
            path.lookup(&instance),
            Some(&Bson::String("Oslo".to_string()))
        );
        assert_eq!(FieldPath::parse("address.zip").lookup(&instance), None);
    }

    #[test]
    fn path_assign_creates_intermediate_documents() {
        let mut instance = Bson::Document(doc! {});

        FieldPath::parse("address.city").assign(&mut instance, Bson::String("Oslo".to_string()));

        assert_eq!(
            instance,
            Bson::Document(doc! { "address": { "city": "Oslo" } })
        );
    }

    #[test]
    fn builder_collects_fields_and_indexes() {
        let schema = Schema::builder()
            .field("email", |f| f.required().indexed(true))
            .field("role", |f| f.default_value("member"))
            .build();

        assert_eq!(schema.fields().len(), 2);

        let indexes = schema.indexes();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].field, "email");
        assert!(indexes[0].unique);

        assert!(schema.has_effects_for(Stage::Encode));
        assert!(schema.has_effects_for(Stage::Decode)); // default_value runs on decode too
    }
}
