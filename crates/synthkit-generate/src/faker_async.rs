use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, Stream, StreamExt};
use indexmap::IndexMap;
use synthkit_core::{
    DEFAULT_RULE_SET, GeneratorOptions, MemberRegistry, RandomContext, Result, SharedRandomness,
    is_unspecified, parse_rule_sets,
};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::builder::RuleBuilder;
use crate::builder::sealed::EngineAccess;
use crate::engine::RuleEngine;

/// Creates a new instance; the returned future owns everything it needs.
pub type AsyncInstantiator<T> =
    Arc<dyn Fn(&mut RandomContext) -> BoxFuture<'static, T> + Send + Sync>;

pub type AsyncFinalizer<T> =
    Arc<dyn Fn(&mut RandomContext, T) -> BoxFuture<'static, T> + Send + Sync>;

/// Rule-based generator whose instantiation and finalization are awaited.
///
/// Rules registered through [`RuleBuilder`] still run synchronously and in
/// order; the only suspension points are the instantiator and each
/// finalizer. Instantiators and finalizers draw what they need from the
/// context before returning their future, so the future owns its data.
/// That synchronous part runs inside the domain turnstile; the turnstile is
/// never held while a future is awaited.
pub struct AsyncFaker<T> {
    engine: RuleEngine<T>,
    context: Mutex<RandomContext>,
    default_instantiator: AsyncInstantiator<T>,
    instantiators: IndexMap<String, AsyncInstantiator<T>>,
    finalizers: IndexMap<String, AsyncFinalizer<T>>,
}

impl<T: Default + Send + 'static> AsyncFaker<T> {
    pub fn new(registry: impl MemberRegistry<T> + 'static) -> Self {
        Self::with_options(registry, GeneratorOptions::default())
    }

    pub fn with_options(
        registry: impl MemberRegistry<T> + 'static,
        options: GeneratorOptions,
    ) -> Self {
        Self::with_factory(registry, options, |_: &mut RandomContext| {
            future::ready(T::default())
        })
    }
}

impl<T: Send + 'static> AsyncFaker<T> {
    pub fn with_factory<F, Fut>(
        registry: impl MemberRegistry<T> + 'static,
        options: GeneratorOptions,
        factory: F,
    ) -> Self
    where
        F: Fn(&mut RandomContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let engine = RuleEngine::new(Arc::new(registry), &options, SharedRandomness::global());
        let context = Mutex::new(engine.new_context());
        Self {
            engine,
            context,
            default_instantiator: boxed_instantiator(factory),
            instantiators: IndexMap::new(),
            finalizers: IndexMap::new(),
        }
    }

    pub fn in_domain(mut self, shared: Arc<SharedRandomness>) -> Self {
        self.engine.set_shared(shared);
        self.context = Mutex::new(self.engine.new_context());
        self
    }

    /// Uses `factory` to create instances for the current rule set.
    pub fn custom_instantiator<F, Fut>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&mut RandomContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let factory = boxed_instantiator(factory);
        let rule_set = self.engine.current_rule_set().to_string();
        if rule_set == DEFAULT_RULE_SET {
            self.default_instantiator = factory;
        } else {
            self.instantiators.insert(rule_set, factory);
        }
        self
    }

    /// Runs `finalizer` after the rules of the current rule set.
    ///
    /// The finalizer takes the populated instance and resolves to the
    /// instance handed to the next finalizer.
    pub fn finish_with<F, Fut>(&mut self, finalizer: F) -> &mut Self
    where
        F: Fn(&mut RandomContext, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let finalizer: AsyncFinalizer<T> =
            Arc::new(move |context: &mut RandomContext, instance: T| {
                finalizer(context, instance).boxed()
            });
        let rule_set = self.engine.current_rule_set().to_string();
        self.finalizers.insert(rule_set, finalizer);
        self
    }

    pub async fn generate(&self, rule_sets: Option<&str>) -> Result<T> {
        let sets = parse_rule_sets(rule_sets);
        let instantiator = self.instantiator_for(rule_sets, &sets);

        let mut guard = self.context.lock().await;
        let context = &mut *guard;

        self.engine.start_epoch(context);
        trace!(
            target_type = self.engine.type_name(),
            rule_sets = ?sets,
            index_global = context.index_global(),
            index_faker = context.index_faker(),
            "generating instance"
        );

        let pending = {
            let _turn = self.engine.shared().enter();
            instantiator(&mut *context)
        };
        let instance = pending.await;
        self.populate_with(instance, &sets, context).await
    }

    pub async fn generate_many(&self, count: usize, rule_sets: Option<&str>) -> Result<Vec<T>> {
        debug!(
            target_type = self.engine.type_name(),
            count, "bulk generation started"
        );
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.generate(rule_sets).await?);
        }
        debug!(
            target_type = self.engine.type_name(),
            count = items.len(),
            "bulk generation completed"
        );
        Ok(items)
    }

    /// Stream of `count` instances generated as they are polled.
    pub fn generate_lazy<'a>(
        &'a self,
        count: usize,
        rule_sets: Option<&str>,
    ) -> impl Stream<Item = Result<T>> + use<'a, T> {
        let rule_sets = rule_sets.map(str::to_owned);
        stream::iter(0..count).then(move |_| {
            let rule_sets = rule_sets.clone();
            async move { self.generate(rule_sets.as_deref()).await }
        })
    }

    /// Unbounded stream of generated instances.
    pub fn generate_forever<'a>(
        &'a self,
        rule_sets: Option<&str>,
    ) -> impl Stream<Item = Result<T>> + use<'a, T> {
        let rule_sets = rule_sets.map(str::to_owned);
        stream::repeat(()).then(move |()| {
            let rule_sets = rule_sets.clone();
            async move { self.generate(rule_sets.as_deref()).await }
        })
    }

    /// Applies rules, then awaits finalizers, and hands the instance back.
    pub async fn populate(&self, instance: T, rule_sets: Option<&str>) -> Result<T> {
        let sets = parse_rule_sets(rule_sets);
        let mut guard = self.context.lock().await;
        self.populate_with(instance, &sets, &mut guard).await
    }

    async fn populate_with(
        &self,
        mut instance: T,
        rule_sets: &[String],
        context: &mut RandomContext,
    ) -> Result<T> {
        self.engine.populate(&mut instance, rule_sets, context)?;
        for rule_set in rule_sets {
            if let Some(finalizer) = self.finalizers.get(rule_set) {
                let pending = {
                    let _turn = self.engine.shared().enter();
                    finalizer(&mut *context, instance)
                };
                instance = pending.await;
            }
        }
        Ok(instance)
    }

    fn instantiator_for(
        &self,
        rule_sets: Option<&str>,
        parsed: &[String],
    ) -> AsyncInstantiator<T> {
        if is_unspecified(rule_sets) {
            return Arc::clone(&self.default_instantiator);
        }
        parsed
            .first()
            .and_then(|first| self.instantiators.get(first))
            .map_or_else(|| Arc::clone(&self.default_instantiator), Arc::clone)
    }
}

fn boxed_instantiator<T, F, Fut>(factory: F) -> AsyncInstantiator<T>
where
    T: 'static,
    F: Fn(&mut RandomContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    Arc::new(move |context: &mut RandomContext| factory(context).boxed())
}

impl<T: Send + 'static> EngineAccess<T> for AsyncFaker<T> {
    fn engine(&self) -> &RuleEngine<T> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut RuleEngine<T> {
        &mut self.engine
    }

    fn context_mut(&mut self) -> &mut RandomContext {
        self.context.get_mut()
    }
}

impl<T: Send + 'static> RuleBuilder<T> for AsyncFaker<T> {}

impl<T: Send + 'static> Clone for AsyncFaker<T> {
    fn clone(&self) -> Self {
        let engine = self.engine.clone_config();
        let context = Mutex::new(engine.new_context());
        Self {
            engine,
            context,
            default_instantiator: Arc::clone(&self.default_instantiator),
            instantiators: self.instantiators.clone(),
            finalizers: self.finalizers.clone(),
        }
    }
}

impl<T> std::fmt::Debug for AsyncFaker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFaker")
            .field("engine", &self.engine)
            .field("instantiators", &self.instantiators.keys().collect::<Vec<_>>())
            .field("finalizers", &self.finalizers.keys().collect::<Vec<_>>())
            .finish()
    }
}
