//! Schema effects: units of schema-level side effects.
//!
//! An effect is a small piece of behavior attached to a field declaration
//! (validate presence, fill a default, check uniqueness, verify a reference)
//! executed by the pipeline whenever a batch of instances is encoded or
//! decoded. Effects that need database-computed inputs do not query the
//! backend themselves: they enqueue [`Signal`](crate::signal::Signal)s on the
//! pass's shared [`SignalBatcher`] and suspend at `wait()`, so a hundred
//! uniqueness checks cost one resolver drain instead of a hundred round
//! trips.
//!
//! Effects never mutate their instance directly. They accumulate changes
//! into their scope's [`EffectConfig`]; the pipeline applies all
//! accumulated mutations after the pass completes.

use async_trait::async_trait;
use bson::{Bson, Uuid};
use std::fmt;
use std::sync::Arc;

use crate::{
    error::{DocbindError, DocbindResult},
    query::Filter,
    schema::{FieldDecl, FieldPath, Schema, Stage},
    signal::{Signal, SignalBatcher},
};

/// A schema-level side-effect unit attached to a field declaration.
///
/// Implementations must be stateless with respect to individual instances:
/// per-instance state lives in the [`EffectScope`] the pipeline hands in.
/// `apply` may enqueue signals and `wait` on the batcher any number of
/// times; each wait is a suspension point shared with every other effect in
/// the pass.
#[async_trait]
pub trait SchemaEffect: Send + Sync + fmt::Debug {
    /// The pipeline stages this effect participates in.
    fn stages(&self) -> &'static [Stage] {
        &[Stage::Encode]
    }

    /// Applies the effect to one (declaration, instance) scope.
    async fn apply(&self, scope: &mut EffectScope, signals: &SignalBatcher) -> DocbindResult<()>;
}

/// Accumulated side-effect payload of one scope.
///
/// Holds the mutations an effect wants applied to its instance; the pipeline
/// replays them onto the instance once the pass has completed. Accumulation
/// survives the effect's suspensions: a resumed effect keeps writing into
/// the same configuration.
#[derive(Debug, Clone, Default)]
pub struct EffectConfig {
    mutations: Vec<(FieldPath, Bson)>,
}

impl EffectConfig {
    /// Records a value to be written at `path` after the pass.
    pub fn set(&mut self, path: FieldPath, value: impl Into<Bson>) {
        self.mutations.push((path, value.into()));
    }

    /// Whether any mutation has been recorded.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub(crate) fn into_mutations(self) -> Vec<(FieldPath, Bson)> {
        self.mutations
    }
}

/// Execution context for one effect applied to one (model, instance) pair.
///
/// Created fresh per (effect, instance) combination for a single pass and
/// discarded afterwards.
#[derive(Debug)]
pub struct EffectScope {
    collection: String,
    root: Arc<Bson>,
    value: Option<Bson>,
    decl: Arc<FieldDecl>,
    config: EffectConfig,
    instance: usize,
}

impl EffectScope {
    /// The owning model's collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The root aggregate instance the effect was scoped to.
    pub fn root(&self) -> &Bson {
        &self.root
    }

    /// The root instance's document id, if the instance carries one.
    pub fn root_id(&self) -> Option<Bson> {
        self.root
            .as_document()
            .and_then(|doc| doc.get("id"))
            .cloned()
    }

    /// The value currently in scope: the root instance narrowed to the
    /// declaration's path. `None` when the path is absent.
    pub fn value(&self) -> Option<&Bson> {
        self.value.as_ref()
    }

    /// Whether the value in scope is absent or explicitly null.
    pub fn value_is_missing(&self) -> bool {
        matches!(self.value(), None | Some(Bson::Null))
    }

    /// The field declaration this scope was derived from.
    pub fn decl(&self) -> &FieldDecl {
        &self.decl
    }

    /// The structural path the effect applies at.
    pub fn path(&self) -> &FieldPath {
        &self.decl.path
    }

    /// The mutable configuration the effect accumulates into.
    pub fn config_mut(&mut self) -> &mut EffectConfig {
        &mut self.config
    }

    /// Index of the instance within the pass's batch.
    pub fn instance(&self) -> usize {
        self.instance
    }

    pub(crate) fn into_config(self) -> (usize, EffectConfig) {
        (self.instance, self.config)
    }
}

/// The immutable (model, declaration, effect) record produced by walking a
/// schema for a batch of instances.
///
/// All bindings of a pass are collected before any execution begins; the
/// pipeline then crosses them with the instance batch, which is what makes
/// cross-instance signal batching possible.
#[derive(Debug, Clone)]
pub struct EffectBinding {
    collection: String,
    decl: Arc<FieldDecl>,
    effect: Arc<dyn SchemaEffect>,
}

impl EffectBinding {
    /// Walks `schema` and collects every binding participating in `stage`.
    pub fn collect(collection: &str, schema: &Schema, stage: Stage) -> Vec<EffectBinding> {
        schema
            .fields()
            .iter()
            .flat_map(|decl| {
                decl.effects
                    .iter()
                    .filter(|effect| effect.stages().contains(&stage))
                    .map(|effect| EffectBinding {
                        collection: collection.to_string(),
                        decl: decl.clone(),
                        effect: effect.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// The effect this binding carries.
    pub fn effect(&self) -> &Arc<dyn SchemaEffect> {
        &self.effect
    }

    /// Creates the scope binding this record to one instance of the batch.
    pub fn scope(&self, instance: usize, root: Arc<Bson>) -> EffectScope {
        let value = self.decl.path.lookup(&root).cloned();
        EffectScope {
            collection: self.collection.clone(),
            root,
            value,
            decl: self.decl.clone(),
            config: EffectConfig::default(),
            instance,
        }
    }
}

/// Requires the field to be present and non-null on encode.
#[derive(Debug)]
pub struct Required;

#[async_trait]
impl SchemaEffect for Required {
    async fn apply(&self, scope: &mut EffectScope, _signals: &SignalBatcher) -> DocbindResult<()> {
        if scope.value_is_missing() {
            return Err(DocbindError::InvalidDocument(format!(
                "missing required field `{}`",
                scope.path(),
            )));
        }

        Ok(())
    }
}

/// Fills the field with a default when it is missing, on encode and decode.
#[derive(Debug)]
pub struct DefaultValue {
    value: Bson,
}

impl DefaultValue {
    pub fn new(value: impl Into<Bson>) -> Self {
        Self { value: value.into() }
    }
}

#[async_trait]
impl SchemaEffect for DefaultValue {
    fn stages(&self) -> &'static [Stage] {
        &[Stage::Encode, Stage::Decode]
    }

    async fn apply(&self, scope: &mut EffectScope, _signals: &SignalBatcher) -> DocbindResult<()> {
        if scope.value_is_missing() {
            let path = scope.path().clone();
            scope.config_mut().set(path, self.value.clone());
        }

        Ok(())
    }
}

/// Enforces that no other document in the collection carries the same value.
///
/// The check is a single [`Signal::Count`] per instance, batched with every
/// other signal of the pass; the root instance itself is excluded by id so
/// re-saving a document does not collide with its stored copy.
#[derive(Debug)]
pub struct UniqueValue;

#[async_trait]
impl SchemaEffect for UniqueValue {
    async fn apply(&self, scope: &mut EffectScope, signals: &SignalBatcher) -> DocbindResult<()> {
        // Absent values are `required`'s concern, not a uniqueness clash.
        if scope.value_is_missing() {
            return Ok(());
        }
        let Some(value) = scope.value().cloned() else {
            return Ok(());
        };

        let mut filter = Filter::eq(scope.path().to_string(), value);
        if let Some(id) = scope.root_id() {
            filter = filter.and(Filter::ne("id", id));
        }

        let property = signals.enqueue(Signal::Count {
            collection: scope.collection().to_string(),
            filter,
        });
        signals.wait().await?;

        let taken = match property.value()? {
            Bson::Int64(count) => count,
            Bson::Int32(count) => count as i64,
            other => {
                return Err(DocbindError::ProtocolViolation(format!(
                    "count signal resolved to non-numeric value {other:?}",
                )));
            }
        };

        if taken > 0 {
            return Err(DocbindError::InvalidDocument(format!(
                "value of `{}` is already taken in collection {}",
                scope.path(),
                scope.collection(),
            )));
        }

        Ok(())
    }
}

/// Requires the field to hold the id of an existing document in another
/// collection.
///
/// Reference lookups of all instances in the pass are batched; the resolver
/// groups the fetches per target collection into single round trips.
#[derive(Debug)]
pub struct ReferenceCheck {
    collection: String,
}

impl ReferenceCheck {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into() }
    }
}

#[async_trait]
impl SchemaEffect for ReferenceCheck {
    async fn apply(&self, scope: &mut EffectScope, signals: &SignalBatcher) -> DocbindResult<()> {
        let Some(value) = scope.value().cloned() else {
            return Ok(());
        };
        if matches!(value, Bson::Null) {
            return Ok(());
        }

        let id: Uuid = bson::de::deserialize_from_bson(value).map_err(|_| {
            DocbindError::InvalidDocument(format!(
                "field `{}` does not hold a document id",
                scope.path(),
            ))
        })?;

        let property = signals.enqueue(Signal::Fetch {
            collection: self.collection.clone(),
            ids: vec![id],
        });
        signals.wait().await?;

        let found = match property.value()? {
            Bson::Array(documents) => !documents.is_empty(),
            other => {
                return Err(DocbindError::ProtocolViolation(format!(
                    "fetch signal resolved to non-array value {other:?}",
                )));
            }
        };

        if !found {
            return Err(DocbindError::InvalidDocument(format!(
                "field `{}` references missing document {} in collection {}",
                scope.path(),
                id,
                self.collection,
            )));
        }

        Ok(())
    }
}
