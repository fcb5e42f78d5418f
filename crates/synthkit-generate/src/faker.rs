use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use synthkit_core::{
    DEFAULT_RULE_SET, GeneratorOptions, MemberRegistry, RandomContext, Result, SharedRandomness,
    is_unspecified, parse_rule_sets,
};
use tracing::{debug, trace};

use crate::builder::RuleBuilder;
use crate::builder::sealed::EngineAccess;
use crate::engine::RuleEngine;

/// Creates a new, unpopulated instance.
pub type Instantiator<T> = Arc<dyn Fn(&mut RandomContext) -> T + Send + Sync>;

/// Post-processing hook run once every requested rule set was applied.
pub type Finalizer<T> = Arc<dyn Fn(&mut RandomContext, &mut T) + Send + Sync>;

/// Synchronous rule-based generator for `T`.
///
/// ```ignore
/// let mut faker = Faker::new(registry);
/// faker
///     .rule_for("name", |_, _| "x".to_string())?
///     .rule_for("age", |ctx, _| ctx.random_range(18..90_u32))?;
/// let person = faker.generate(None)?;
/// ```
pub struct Faker<T> {
    engine: RuleEngine<T>,
    context: Mutex<RandomContext>,
    default_instantiator: Instantiator<T>,
    instantiators: IndexMap<String, Instantiator<T>>,
    finalizers: IndexMap<String, Finalizer<T>>,
}

impl<T: Default + 'static> Faker<T> {
    pub fn new(registry: impl MemberRegistry<T> + 'static) -> Self {
        Self::with_options(registry, GeneratorOptions::default())
    }

    pub fn with_options(
        registry: impl MemberRegistry<T> + 'static,
        options: GeneratorOptions,
    ) -> Self {
        Self::with_factory(registry, options, |_: &mut RandomContext| T::default())
    }
}

impl<T: 'static> Faker<T> {
    /// Generator for types without a `Default`, created through `factory`.
    pub fn with_factory<F>(
        registry: impl MemberRegistry<T> + 'static,
        options: GeneratorOptions,
        factory: F,
    ) -> Self
    where
        F: Fn(&mut RandomContext) -> T + Send + Sync + 'static,
    {
        let engine = RuleEngine::new(Arc::new(registry), &options, SharedRandomness::global());
        let context = Mutex::new(engine.new_context());
        Self {
            engine,
            context,
            default_instantiator: Arc::new(factory),
            instantiators: IndexMap::new(),
            finalizers: IndexMap::new(),
        }
    }

    /// Moves this generator into another randomness domain.
    pub fn in_domain(mut self, shared: Arc<SharedRandomness>) -> Self {
        self.engine.set_shared(shared);
        self.context = Mutex::new(self.engine.new_context());
        self
    }

    /// Uses `factory` to create instances for the current rule set.
    pub fn custom_instantiator<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&mut RandomContext) -> T + Send + Sync + 'static,
    {
        let factory: Instantiator<T> = Arc::new(factory);
        let rule_set = self.engine.current_rule_set().to_string();
        if rule_set == DEFAULT_RULE_SET {
            self.default_instantiator = factory;
        } else {
            self.instantiators.insert(rule_set, factory);
        }
        self
    }

    /// Runs `finalizer` after the rules of the current rule set.
    pub fn finish_with<F>(&mut self, finalizer: F) -> &mut Self
    where
        F: Fn(&mut RandomContext, &mut T) + Send + Sync + 'static,
    {
        let rule_set = self.engine.current_rule_set().to_string();
        self.finalizers.insert(rule_set, Arc::new(finalizer));
        self
    }

    /// Creates and populates one instance.
    ///
    /// `rule_sets` is a comma separated list; `None` or a blank list runs
    /// only `default`. The instantiator of the first listed rule set is used
    /// when one was registered.
    pub fn generate(&self, rule_sets: Option<&str>) -> Result<T> {
        let sets = parse_rule_sets(rule_sets);
        let instantiator = self.instantiator_for(rule_sets, &sets);

        let shared = Arc::clone(self.engine.shared());
        let _turn = shared.enter();
        let mut guard = self.lock_context();
        let context = &mut *guard;

        self.engine.start_epoch(context);
        trace!(
            target_type = self.engine.type_name(),
            rule_sets = ?sets,
            index_global = context.index_global(),
            index_faker = context.index_faker(),
            "generating instance"
        );

        let mut instance = instantiator(&mut *context);
        self.populate_with(&mut instance, &sets, context)?;
        Ok(instance)
    }

    /// Generates exactly `count` instances, one epoch after another.
    pub fn generate_many(&self, count: usize, rule_sets: Option<&str>) -> Result<Vec<T>> {
        debug!(
            target_type = self.engine.type_name(),
            count, "bulk generation started"
        );
        let items = self
            .generate_lazy(count, rule_sets)
            .collect::<Result<Vec<_>>>()?;
        debug!(
            target_type = self.engine.type_name(),
            count = items.len(),
            "bulk generation completed"
        );
        Ok(items)
    }

    /// Deferred generation of `count` instances.
    ///
    /// Each pull runs a full generate cycle; the sequence is reproducible
    /// only when consumed in order without other use of this generator.
    pub fn generate_lazy<'a>(
        &'a self,
        count: usize,
        rule_sets: Option<&str>,
    ) -> impl Iterator<Item = Result<T>> + use<'a, T> {
        let rule_sets = rule_sets.map(str::to_owned);
        (0..count).map(move |_| self.generate(rule_sets.as_deref()))
    }

    /// Unbounded sequence; every pull generates a new instance.
    pub fn generate_forever<'a>(
        &'a self,
        rule_sets: Option<&str>,
    ) -> impl Iterator<Item = Result<T>> + use<'a, T> {
        let rule_sets = rule_sets.map(str::to_owned);
        std::iter::repeat_with(move || self.generate(rule_sets.as_deref()))
    }

    /// Applies rules and finalizers to an existing instance.
    ///
    /// Starts an epoch only if this generator never started one.
    pub fn populate(&self, instance: &mut T, rule_sets: Option<&str>) -> Result<()> {
        let sets = parse_rule_sets(rule_sets);
        let shared = Arc::clone(self.engine.shared());
        let _turn = shared.enter();
        let mut guard = self.lock_context();
        self.populate_with(instance, &sets, &mut guard)
    }

    fn populate_with(
        &self,
        instance: &mut T,
        rule_sets: &[String],
        context: &mut RandomContext,
    ) -> Result<()> {
        self.engine.populate(instance, rule_sets, context)?;
        for rule_set in rule_sets {
            if let Some(finalizer) = self.finalizers.get(rule_set) {
                finalizer(&mut *context, &mut *instance);
            }
        }
        Ok(())
    }

    fn instantiator_for(&self, rule_sets: Option<&str>, parsed: &[String]) -> Instantiator<T> {
        if is_unspecified(rule_sets) {
            return Arc::clone(&self.default_instantiator);
        }
        parsed
            .first()
            .and_then(|first| self.instantiators.get(first))
            .map_or_else(|| Arc::clone(&self.default_instantiator), Arc::clone)
    }

    fn lock_context(&self) -> MutexGuard<'_, RandomContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: 'static> EngineAccess<T> for Faker<T> {
    fn engine(&self) -> &RuleEngine<T> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut RuleEngine<T> {
        &mut self.engine
    }

    fn context_mut(&mut self) -> &mut RandomContext {
        self.context.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: 'static> RuleBuilder<T> for Faker<T> {}

/// Copies rules, strict modes, instantiators and finalizers.
///
/// The copy re-applies the local seed to a fresh stream and starts without
/// cached setters, cached validity or epoch progress, so both generators
/// evolve independently.
impl<T: 'static> Clone for Faker<T> {
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

impl<T> std::fmt::Debug for Faker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Faker")
            .field("engine", &self.engine)
            .field("instantiators", &self.instantiators.keys().collect::<Vec<_>>())
            .field("finalizers", &self.finalizers.keys().collect::<Vec<_>>())
            .finish()
    }
}
