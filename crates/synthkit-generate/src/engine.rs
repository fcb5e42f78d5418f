//! Effect-agnostic core shared by [`Faker`](crate::Faker) and
//! [`AsyncFaker`](crate::AsyncFaker).
//!
//! The engine owns the rule store, strict mode table, setter cache and
//! cached validity flag. It resolves rules, validates them and applies
//! them to an instance; instantiation and finalization belong to the two
//! generator flavors.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use indexmap::IndexMap;
use synthkit_core::{
    DEFAULT_RULE_SET, FakerError, GeneratorOptions, MemberInfo, MemberRegistry, MemberSetter,
    RandomContext, Result, SharedRandomness, normalize_rule_set, parse_rule_sets,
};
use tracing::{debug, warn};

use crate::rules::{Rule, RuleAction, RuleBlock, RuleStore, ValueProducer};
use crate::validation::{StrictModeTable, ValidationResult, validate_rule_sets};

/// Lazily bound member setters, shared by every population call.
struct SetterCache<T> {
    setters: RwLock<HashMap<String, MemberSetter<T>>>,
}

impl<T> SetterCache<T> {
    fn new() -> Self {
        Self {
            setters: RwLock::new(HashMap::new()),
        }
    }

    fn resolve(&self, member: &str, registry: &dyn MemberRegistry<T>) -> Option<MemberSetter<T>> {
        {
            let setters = self.setters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(setter) = setters.get(member) {
                return Some(Arc::clone(setter));
            }
        }

        let mut setters = self.setters.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(setter) = setters.get(member) {
            return Some(Arc::clone(setter));
        }
        let setter = registry.setter(member)?;
        setters.insert(member.to_string(), Arc::clone(&setter));
        Some(setter)
    }

    fn len(&self) -> usize {
        self.setters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Rule configuration and population logic for one target type.
pub struct RuleEngine<T> {
    type_name: &'static str,
    registry: Arc<dyn MemberRegistry<T>>,
    members: IndexMap<String, MemberInfo>,
    store: RuleStore<T>,
    strict_modes: StrictModeTable,
    open_rule_set: Option<String>,
    local_seed: Option<u64>,
    locale: String,
    shared: Arc<SharedRandomness>,
    setters: SetterCache<T>,
    validity: OnceLock<bool>,
}

impl<T: 'static> RuleEngine<T> {
    pub(crate) fn new(
        registry: Arc<dyn MemberRegistry<T>>,
        options: &GeneratorOptions,
        shared: Arc<SharedRandomness>,
    ) -> Self {
        let members: IndexMap<String, MemberInfo> = registry
            .members()
            .into_iter()
            .map(|info| (info.name.clone(), info))
            .collect();
        let type_name = std::any::type_name::<T>();

        debug!(
            target_type = type_name,
            members = members.len(),
            locale = %options.locale,
            strict = options.strict_mode,
            "generator created"
        );

        Self {
            type_name,
            registry,
            members,
            store: RuleStore::new(),
            strict_modes: StrictModeTable::new(options.strict_mode),
            open_rule_set: None,
            local_seed: options.seed,
            locale: options.locale.clone(),
            shared,
            setters: SetterCache::new(),
            validity: OnceLock::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn shared(&self) -> &Arc<SharedRandomness> {
        &self.shared
    }

    pub fn store(&self) -> &RuleStore<T> {
        &self.store
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberInfo> {
        self.members.values()
    }

    pub fn local_seed(&self) -> Option<u64> {
        self.local_seed
    }

    /// Fresh random context bound to this engine's domain and seed.
    pub fn new_context(&self) -> RandomContext {
        let mut context = RandomContext::new(Arc::clone(&self.shared), self.locale.clone());
        if let Some(seed) = self.local_seed {
            context.use_seed(seed);
        }
        context
    }

    pub(crate) fn set_shared(&mut self, shared: Arc<SharedRandomness>) {
        self.shared = shared;
    }

    pub(crate) fn set_local_seed(&mut self, seed: u64) {
        self.local_seed = Some(seed);
    }

    /// Rule set new rules are registered into.
    pub fn current_rule_set(&self) -> &str {
        self.open_rule_set.as_deref().unwrap_or(DEFAULT_RULE_SET)
    }

    pub(crate) fn begin_rule_set(&mut self, name: &str) -> Result<()> {
        if let Some(outer) = &self.open_rule_set {
            return Err(FakerError::NestedRuleSet {
                outer: outer.clone(),
                inner: name.to_string(),
            });
        }
        self.open_rule_set = Some(normalize_rule_set(name));
        Ok(())
    }

    pub(crate) fn end_rule_set(&mut self) {
        self.open_rule_set = None;
    }

    pub fn member(&self, name: &str) -> Result<&MemberInfo> {
        self.members
            .get(name)
            .ok_or_else(|| FakerError::UnknownMember {
                type_name: self.type_name.to_string(),
                member: name.to_string(),
            })
    }

    /// Checks that `name` exists and stores values of type `V`.
    pub fn check_member<V: Any>(&self, name: &str) -> Result<()> {
        let info = self.member(name)?;
        if !info.accepts::<V>() {
            return Err(FakerError::TypeMismatch {
                type_name: self.type_name.to_string(),
                member: name.to_string(),
                expected: info.type_name,
                actual: std::any::type_name::<V>(),
            });
        }
        Ok(())
    }

    pub(crate) fn register_producer(&mut self, member: &str, producer: ValueProducer<T>) {
        let rule = Rule::produce(self.current_rule_set(), member, producer);
        self.store.add_rule(rule);
    }

    pub(crate) fn register_ignore(&mut self, member: &str) {
        let rule = Rule::ignore(self.current_rule_set(), member);
        self.store.add_rule(rule);
    }

    pub(crate) fn register_block(&mut self, block: RuleBlock<T>) {
        let rule = Rule::block(self.current_rule_set(), block);
        self.store.add_rule(rule);
    }

    pub(crate) fn set_strict_mode(&mut self, strict: bool) {
        let rule_set = self.current_rule_set().to_string();
        self.strict_modes.set(&rule_set, strict);
    }

    pub fn strict_modes(&self) -> &StrictModeTable {
        &self.strict_modes
    }

    /// Rule sets checked by explicit validation calls.
    ///
    /// Without an argument every rule set holding at least one rule is
    /// checked; otherwise the list is parsed like a generation request.
    pub fn validation_sets(&self, rule_sets: Option<&str>) -> Vec<String> {
        match rule_sets {
            None => self.store.rule_set_names(),
            Some(value) => parse_rule_sets(Some(value)),
        }
    }

    pub fn validate(&self, rule_sets: &[String]) -> ValidationResult {
        validate_rule_sets(
            rule_sets,
            &self.store,
            &self.strict_modes,
            &self.members,
            self.type_name,
        )
    }

    pub fn assert_valid(&self, rule_sets: &[String]) -> Result<()> {
        let result = self.validate(rule_sets);
        if result.is_valid {
            return Ok(());
        }
        Err(result.into_failure(self.type_name).into())
    }

    /// Validity flag cached by the first population; `None` before that.
    pub fn cached_validity(&self) -> Option<bool> {
        self.validity.get().copied()
    }

    /// Starts a new epoch on `context` inside the randomness turnstile.
    pub(crate) fn start_epoch(&self, context: &mut RandomContext) {
        let _turn = self.shared.enter();
        context.new_context();
    }

    /// Applies the rules of each rule set, in order, to `instance`.
    ///
    /// Validation runs once per engine and its outcome is cached; later rule
    /// changes do not reset it.
    pub(crate) fn populate(
        &self,
        instance: &mut T,
        rule_sets: &[String],
        context: &mut RandomContext,
    ) -> Result<()> {
        self.ensure_valid(rule_sets)?;

        let _turn = self.shared.enter();
        if !context.has_context() {
            context.new_context();
        }

        for rule_set in rule_sets {
            for rule in self.store.rules(rule_set) {
                self.apply_rule(instance, rule, context);
            }
        }
        Ok(())
    }

    fn ensure_valid(&self, rule_sets: &[String]) -> Result<()> {
        let valid = *self
            .validity
            .get_or_init(|| self.validate(rule_sets).is_valid);
        if valid {
            return Ok(());
        }

        let failure = self.validate(rule_sets).into_failure(self.type_name);
        warn!(
            target_type = self.type_name,
            missing = ?failure.missing_members,
            diagnostics = failure.diagnostics.len(),
            "strict mode validation failed"
        );
        Err(failure.into())
    }

    fn apply_rule(&self, instance: &mut T, rule: &Rule<T>, context: &mut RandomContext) {
        match &rule.action {
            RuleAction::Ignore => {}
            RuleAction::Block(block) => block(context, instance),
            RuleAction::Produce(producer) => {
                let value = producer(context, instance);
                let Some(setter) = self.setters.resolve(&rule.member, self.registry.as_ref())
                else {
                    debug!(
                        target_type = self.type_name,
                        member = %rule.member,
                        "member not reported by registry; rule skipped"
                    );
                    return;
                };
                if setter(instance, value).is_err() {
                    warn!(
                        target_type = self.type_name,
                        member = %rule.member,
                        "setter rejected produced value"
                    );
                }
            }
        }
    }

    /// Number of setters bound so far.
    pub fn cached_setters(&self) -> usize {
        self.setters.len()
    }

    /// Copies rule configuration; caches and epoch progress start fresh.
    pub fn clone_config(&self) -> Self {
        Self {
            type_name: self.type_name,
            registry: Arc::clone(&self.registry),
            members: self.members.clone(),
            store: self.store.clone(),
            strict_modes: self.strict_modes.clone(),
            open_rule_set: None,
            local_seed: self.local_seed,
            locale: self.locale.clone(),
            shared: Arc::clone(&self.shared),
            setters: SetterCache::new(),
            validity: OnceLock::new(),
        }
    }
}

impl<T> std::fmt::Debug for RuleEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("type_name", &self.type_name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("store", &self.store)
            .field("strict_modes", &self.strict_modes)
            .field("local_seed", &self.local_seed)
            .field("locale", &self.locale)
            .field("validity", &self.validity.get())
            .finish()
    }
}
