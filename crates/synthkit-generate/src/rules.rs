use std::sync::Arc;

use indexmap::IndexMap;
use synthkit_core::{BoxedValue, RandomContext};

/// Produces the value for one member from the context and the instance so far.
pub type ValueProducer<T> = Arc<dyn Fn(&mut RandomContext, &T) -> BoxedValue + Send + Sync>;

/// Freeform block that may touch any number of members.
pub type RuleBlock<T> = Arc<dyn Fn(&mut RandomContext, &mut T) + Send + Sync>;

/// What a rule does when it is applied.
pub enum RuleAction<T> {
    /// Produce a value and assign it to the rule's member.
    Produce(ValueProducer<T>),
    /// Run a freeform block against the instance.
    Block(RuleBlock<T>),
    /// Leave the member untouched.
    Ignore,
}

impl<T> Clone for RuleAction<T> {
    fn clone(&self) -> Self {
        match self {
            RuleAction::Produce(producer) => RuleAction::Produce(Arc::clone(producer)),
            RuleAction::Block(block) => RuleAction::Block(Arc::clone(block)),
            RuleAction::Ignore => RuleAction::Ignore,
        }
    }
}

/// A registered rule for one member within one rule set.
pub struct Rule<T> {
    pub rule_set: String,
    pub member: String,
    pub action: RuleAction<T>,
    pub prohibited_in_strict_mode: bool,
}

impl<T> Rule<T> {
    pub fn produce(rule_set: &str, member: &str, producer: ValueProducer<T>) -> Self {
        Self {
            rule_set: rule_set.to_string(),
            member: member.to_string(),
            action: RuleAction::Produce(producer),
            prohibited_in_strict_mode: false,
        }
    }

    pub fn ignore(rule_set: &str, member: &str) -> Self {
        Self {
            rule_set: rule_set.to_string(),
            member: member.to_string(),
            action: RuleAction::Ignore,
            prohibited_in_strict_mode: false,
        }
    }

    /// Freeform block keyed by a generated name so it never collides with a member.
    pub fn block(rule_set: &str, block: RuleBlock<T>) -> Self {
        Self {
            rule_set: rule_set.to_string(),
            member: format!("rules:{}", uuid::Uuid::new_v4()),
            action: RuleAction::Block(block),
            prohibited_in_strict_mode: true,
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self.action, RuleAction::Ignore)
    }
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Self {
            rule_set: self.rule_set.clone(),
            member: self.member.clone(),
            action: self.action.clone(),
            prohibited_in_strict_mode: self.prohibited_in_strict_mode,
        }
    }
}

impl<T> std::fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self.action {
            RuleAction::Produce(_) => "produce",
            RuleAction::Block(_) => "block",
            RuleAction::Ignore => "ignore",
        };
        f.debug_struct("Rule")
            .field("rule_set", &self.rule_set)
            .field("member", &self.member)
            .field("action", &action)
            .field("prohibited_in_strict_mode", &self.prohibited_in_strict_mode)
            .finish()
    }
}

/// Rules keyed by rule set, then member, in registration order.
///
/// Re-registering a member within a rule set replaces the rule but keeps its
/// original position. Member existence is checked by the caller.
pub struct RuleStore<T> {
    sets: IndexMap<String, IndexMap<String, Rule<T>>>,
}

impl<T> RuleStore<T> {
    pub fn new() -> Self {
        Self {
            sets: IndexMap::new(),
        }
    }

    pub fn add_rule(&mut self, rule: Rule<T>) {
        self.sets
            .entry(rule.rule_set.clone())
            .or_default()
            .insert(rule.member.clone(), rule);
    }

    /// Rules of `rule_set` in application order; empty for unknown sets.
    pub fn rules<'a>(
        &'a self,
        rule_set: &str,
    ) -> impl Iterator<Item = &'a Rule<T>> + use<'a, T> {
        self.sets
            .get(rule_set)
            .into_iter()
            .flat_map(|rules| rules.values())
    }

    pub fn rule(&self, rule_set: &str, member: &str) -> Option<&Rule<T>> {
        self.sets.get(rule_set).and_then(|rules| rules.get(member))
    }

    pub fn rule_set_names(&self) -> Vec<String> {
        self.sets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sets.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for RuleStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RuleStore<T> {
    fn clone(&self) -> Self {
        Self {
            sets: self.sets.clone(),
        }
    }
}

impl<T> std::fmt::Debug for RuleStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.sets
                    .iter()
                    .map(|(name, rules)| (name, rules.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}
