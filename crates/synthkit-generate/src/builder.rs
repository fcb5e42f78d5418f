use std::any::Any;
use std::sync::Arc;

use synthkit_core::{BoxedValue, RandomContext, Result};

use crate::engine::RuleEngine;
use crate::rules::{RuleBlock, ValueProducer};
use crate::validation::ValidationResult;

pub(crate) mod sealed {
    use super::{RandomContext, RuleEngine};

    /// Access to the state behind [`RuleBuilder`](super::RuleBuilder).
    pub trait EngineAccess<T> {
        fn engine(&self) -> &RuleEngine<T>;

        fn engine_mut(&mut self) -> &mut RuleEngine<T>;

        /// Random context owned by this generator.
        fn context_mut(&mut self) -> &mut RandomContext;
    }
}

/// Fluent rule registration shared by [`Faker`](crate::Faker) and
/// [`AsyncFaker`](crate::AsyncFaker).
///
/// Rules land in the rule set currently open through [`rule_set`], or in
/// `default` otherwise. Registration methods that name a member fail
/// immediately when the member is unknown or has another type.
///
/// The trait is sealed; only the generators of this crate implement it.
///
/// [`rule_set`]: RuleBuilder::rule_set
pub trait RuleBuilder<T: 'static>: sealed::EngineAccess<T> + Sized {
    /// Registers a producer for `member`.
    ///
    /// The producer sees the instance as populated by earlier rules.
    fn rule_for<V, F>(&mut self, member: &str, producer: F) -> Result<&mut Self>
    where
        V: Any + Send,
        F: Fn(&mut RandomContext, &T) -> V + Send + Sync + 'static,
    {
        let engine = self.engine_mut();
        engine.check_member::<V>(member)?;
        let producer: ValueProducer<T> =
            Arc::new(move |context: &mut RandomContext, instance: &T| -> BoxedValue {
                Box::new(producer(context, instance))
            });
        engine.register_producer(member, producer);
        Ok(self)
    }

    /// Registers a constant; each instance receives its own clone.
    fn rule_for_value<V>(&mut self, member: &str, value: V) -> Result<&mut Self>
    where
        V: Any + Clone + Send + Sync,
    {
        self.rule_for(member, move |_, _| value.clone())
    }

    /// Registers `producer` for every member declared with type `V`.
    fn rule_for_type<V, F>(&mut self, producer: F) -> &mut Self
    where
        V: Any + Send,
        F: Fn(&mut RandomContext) -> V + Send + Sync + 'static,
    {
        let producer = Arc::new(producer);
        let engine = self.engine_mut();
        let targets: Vec<String> = engine
            .members()
            .filter(|info| info.accepts::<V>())
            .map(|info| info.name.clone())
            .collect();

        for member in targets {
            let producer = Arc::clone(&producer);
            let erased: ValueProducer<T> =
                Arc::new(move |context: &mut RandomContext, _: &T| -> BoxedValue {
                    Box::new(producer(context))
                });
            engine.register_producer(&member, erased);
        }
        self
    }

    /// Registers a freeform block that may assign several members at once.
    ///
    /// Blocks are opaque to validation, so a strict rule set holding one
    /// never validates.
    fn rules<F>(&mut self, block: F) -> &mut Self
    where
        F: Fn(&mut RandomContext, &mut T) + Send + Sync + 'static,
    {
        let block: RuleBlock<T> = Arc::new(block);
        self.engine_mut().register_block(block);
        self
    }

    /// Marks `member` as intentionally left alone.
    fn ignore(&mut self, member: &str) -> Result<&mut Self> {
        let engine = self.engine_mut();
        engine.member(member)?;
        engine.register_ignore(member);
        Ok(self)
    }

    /// Requires a rule or ignore for every member of the current rule set.
    fn strict_mode(&mut self, strict: bool) -> &mut Self {
        self.engine_mut().set_strict_mode(strict);
        self
    }

    /// Opens rule set `name` for the duration of `build`.
    ///
    /// Rule sets cannot nest.
    fn rule_set<F>(&mut self, name: &str, build: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.engine_mut().begin_rule_set(name)?;
        let outcome = build(&mut *self);
        self.engine_mut().end_rule_set();
        outcome?;
        Ok(self)
    }

    /// Gives this generator a private, seeded random stream.
    fn use_seed(&mut self, seed: u64) -> &mut Self {
        self.engine_mut().set_local_seed(seed);
        self.context_mut().use_seed(seed);
        self
    }

    fn locale(&self) -> &str {
        self.engine().locale()
    }

    /// Names of every rule set holding at least one rule.
    fn rule_set_names(&self) -> Vec<String> {
        self.engine().store().rule_set_names()
    }

    /// Full validation outcome for `rule_sets`; `None` checks every rule set.
    fn validation_result(&self, rule_sets: Option<&str>) -> ValidationResult {
        let engine = self.engine();
        engine.validate(&engine.validation_sets(rule_sets))
    }

    fn validate(&self, rule_sets: Option<&str>) -> bool {
        self.validation_result(rule_sets).is_valid
    }

    /// Fails with the missing-rule report when validation does not pass.
    fn assert_configuration_is_valid(&self, rule_sets: Option<&str>) -> Result<()> {
        let engine = self.engine();
        engine.assert_valid(&engine.validation_sets(rule_sets))
    }
}
