//! The encode/decode effect pipeline.
//!
//! [`EffectRunner`] executes one pass of schema effects over a batch of BSON
//! instances. The whole pass is prepared before anything runs: bindings are
//! collected by walking the schema once, then crossed with the instance
//! batch into scopes. All scopes execute concurrently over a single
//! [`SignalBatcher`], which is what lets one pass resolve every
//! effect-requested lookup in one resolver drain per hop.
//!
//! Mutations accumulated by effect scopes are only applied when the entire
//! pass succeeded; a failing pass leaves the instances untouched.

use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

use bson::Bson;

use crate::{
    effect::EffectBinding,
    error::{DocbindError, DocbindResult},
    schema::{Schema, Stage},
    signal::{SignalBatcher, SignalResolver},
};

/// Runs schema-effect passes over batches of instances.
pub struct EffectRunner {
    resolver: Arc<dyn SignalResolver>,
}

impl EffectRunner {
    /// Creates a runner resolving signals through `resolver`.
    pub fn new(resolver: Arc<dyn SignalResolver>) -> Self {
        Self { resolver }
    }

    /// Executes one `stage` pass of `schema` over `instances`.
    ///
    /// Every (effect, instance) pair gets its own scope; scopes run
    /// concurrently and share one signal batcher sized to the pass. On
    /// success the accumulated configuration mutations are applied to the
    /// instances in deterministic (binding, instance) order.
    ///
    /// # Errors
    ///
    /// Returns the first effect failure in (binding, instance) order. All
    /// sibling scopes still finish the pass (their signals were batched
    /// with the failing scope's), but their mutations are discarded.
    pub async fn run(
        &self,
        collection: &str,
        schema: &Schema,
        instances: &mut [Bson],
        stage: Stage,
    ) -> DocbindResult<()> {
        let bindings = EffectBinding::collect(collection, schema, stage);
        if bindings.is_empty() || instances.is_empty() {
            return Ok(());
        }

        let roots: Vec<Arc<Bson>> = instances
            .iter()
            .map(|instance| Arc::new(instance.clone()))
            .collect();

        let mut scopes = Vec::with_capacity(bindings.len() * roots.len());
        for (binding_index, binding) in bindings.iter().enumerate() {
            for (instance_index, root) in roots.iter().enumerate() {
                scopes.push((
                    binding_index,
                    binding.clone(),
                    binding.scope(instance_index, root.clone()),
                ));
            }
        }

        debug!(
            collection,
            ?stage,
            bindings = bindings.len(),
            instances = instances.len(),
            scopes = scopes.len(),
            "running effect pass"
        );

        let batcher = Arc::new(SignalBatcher::new(self.resolver.clone(), scopes.len()));

        let outcomes = join_all(scopes.into_iter().map(|(binding_index, binding, mut scope)| {
            let batcher = batcher.clone();
            async move {
                let applied = binding.effect().apply(&mut scope, &batcher).await;
                let left = batcher.leave().await;
                (binding_index, scope, applied.and(left))
            }
        }))
        .await;

        let mut failure: Option<(usize, usize, DocbindError)> = None;
        let mut mutation_sets = Vec::new();

        for (binding_index, scope, outcome) in outcomes {
            let (instance_index, config) = scope.into_config();
            match outcome {
                Ok(()) => {
                    if !config.is_empty() {
                        mutation_sets.push((binding_index, instance_index, config));
                    }
                }
                Err(error) => {
                    let candidate = (binding_index, instance_index, error);
                    match &failure {
                        Some((b, i, _)) if (*b, *i) <= (candidate.0, candidate.1) => {}
                        _ => failure = Some(candidate),
                    }
                }
            }
        }

        if let Some((_, _, error)) = failure {
            return Err(error);
        }

        mutation_sets.sort_by_key(|(binding_index, instance_index, _)| {
            (*binding_index, *instance_index)
        });
        for (_, instance_index, config) in mutation_sets {
            for (path, value) in config.into_mutations() {
                path.assign(&mut instances[instance_index], value);
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for EffectRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRunner").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use async_trait::async_trait;
    use bson::doc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every count with zero and records the batch sizes it sees.
    struct ZeroCountResolver {
        calls: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl ZeroCountResolver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                batch_sizes: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SignalResolver for ZeroCountResolver {
        async fn resolve(&self, signals: Vec<Signal>) -> DocbindResult<Vec<Bson>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(signals.len());
            Ok(vec![Bson::Int64(0); signals.len()])
        }
    }

    #[tokio::test]
    async fn applies_defaults_to_every_instance() {
        let schema = Schema::builder()
            .field("role", |f| f.default_value("member"))
            .build();
        let runner = EffectRunner::new(ZeroCountResolver::new());

        let mut instances = vec![
            Bson::Document(doc! { "name": "a" }),
            Bson::Document(doc! { "name": "b", "role": "admin" }),
        ];

        runner
            .run("users", &schema, &mut instances, Stage::Encode)
            .await
            .unwrap();

        assert_eq!(
            instances[0].as_document().unwrap().get("role"),
            Some(&Bson::String("member".to_string()))
        );
        assert_eq!(
            instances[1].as_document().unwrap().get("role"),
            Some(&Bson::String("admin".to_string()))
        );
    }

    #[tokio::test]
    async fn failing_pass_leaves_instances_untouched() {
        let schema = Schema::builder()
            .field("email", |f| f.required())
            .field("role", |f| f.default_value("member"))
            .build();
        let runner = EffectRunner::new(ZeroCountResolver::new());

        let mut instances = vec![Bson::Document(doc! { "name": "no-email" })];
        let before = instances.clone();

        let result = runner
            .run("users", &schema, &mut instances, Stage::Encode)
            .await;

        assert!(matches!(result, Err(DocbindError::InvalidDocument(_))));
        assert_eq!(instances, before);
    }

    #[tokio::test]
    async fn unique_checks_for_a_batch_drain_once() {
        let schema = Schema::builder().field("email", |f| f.unique()).build();
        let resolver = ZeroCountResolver::new();
        let runner = EffectRunner::new(resolver.clone());

        let mut instances = (0..5)
            .map(|i| {
                Bson::Document(doc! {
                    "id": bson::Uuid::new(),
                    "email": format!("user{i}@example.com"),
                })
            })
            .collect::<Vec<_>>();

        runner
            .run("users", &schema, &mut instances, Stage::Encode)
            .await
            .unwrap();

        // Five scopes, five signals, one resolver drain.
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*resolver.batch_sizes.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn decode_stage_skips_encode_only_effects() {
        let schema = Schema::builder()
            .field("email", |f| f.required())
            .field("role", |f| f.default_value("member"))
            .build();
        let runner = EffectRunner::new(ZeroCountResolver::new());

        // Missing email would fail encode, but decode only runs the default.
        let mut instances = vec![Bson::Document(doc! {})];
        runner
            .run("users", &schema, &mut instances, Stage::Decode)
            .await
            .unwrap();

        assert_eq!(
            instances[0].as_document().unwrap().get("role"),
            Some(&Bson::String("member".to_string()))
        );
    }

    #[tokio::test]
    async fn empty_schema_is_a_no_op() {
        let runner = EffectRunner::new(ZeroCountResolver::new());
        let mut instances = vec![Bson::Document(doc! { "x": 1 })];

        runner
            .run("things", &Schema::empty(), &mut instances, Stage::Encode)
            .await
            .unwrap();

        assert_eq!(instances[0], Bson::Document(doc! { "x": 1 }));
    }
}
