use indexmap::{IndexMap, IndexSet};
use synthkit_core::{MemberInfo, ValidationFailure};

use crate::rules::RuleStore;

/// Per-rule-set strict mode overrides on top of a generator-wide default.
#[derive(Debug, Clone, Default)]
pub struct StrictModeTable {
    overrides: IndexMap<String, bool>,
    default: bool,
}

impl StrictModeTable {
    pub fn new(default: bool) -> Self {
        Self {
            overrides: IndexMap::new(),
            default,
        }
    }

    pub fn set(&mut self, rule_set: &str, strict: bool) {
        self.overrides.insert(rule_set.to_string(), strict);
    }

    /// Explicit override for `rule_set`, if any.
    pub fn get(&self, rule_set: &str) -> Option<bool> {
        self.overrides.get(rule_set).copied()
    }

    pub fn is_strict(&self, rule_set: &str) -> bool {
        self.get(rule_set).unwrap_or(self.default)
    }

    pub fn default_strict(&self) -> bool {
        self.default
    }
}

/// Outcome of a strict-mode completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub missing_members: IndexSet<String>,
    pub diagnostics: Vec<String>,
}

impl ValidationResult {
    fn valid() -> Self {
        Self {
            is_valid: true,
            missing_members: IndexSet::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn into_failure(self, type_name: &str) -> ValidationFailure {
        ValidationFailure::new(
            type_name,
            self.missing_members.into_iter().collect(),
            self.diagnostics,
        )
    }
}

/// Checks that every member has a rule in each strict rule set requested.
///
/// Rule sets that are not strict are skipped. Within a strict set, members
/// without a rule are reported missing, and freeform blocks make the set
/// invalid because they cannot prove which members they cover.
pub fn validate_rule_sets<T>(
    rule_sets: &[String],
    store: &RuleStore<T>,
    strict_modes: &StrictModeTable,
    members: &IndexMap<String, MemberInfo>,
    type_name: &str,
) -> ValidationResult {
    let mut result = ValidationResult::valid();

    for rule_set in rule_sets {
        if !strict_modes.is_strict(rule_set) {
            continue;
        }

        for member in members.keys() {
            if store.rule(rule_set, member).is_none() {
                result.missing_members.insert(member.clone());
                result.is_valid = false;
            }
        }

        for rule in store.rules(rule_set) {
            if members.contains_key(&rule.member) || !rule.prohibited_in_strict_mode {
                continue;
            }
            result.diagnostics.push(format!(
                "Rule set '{rule_set}' is strict, but a freeform rules block on {type_name} \
                 cannot prove which members it assigns. Register each member with rule_for \
                 or ignore, or turn strict mode off for this rule set."
            ));
            result.is_valid = false;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use synthkit_core::{BoxedValue, RandomContext};

    use super::*;
    use crate::rules::Rule;

    struct Person;

    fn members(names: &[&str]) -> IndexMap<String, MemberInfo> {
        names
            .iter()
            .map(|name| (name.to_string(), MemberInfo::of::<String>(*name)))
            .collect()
    }

    fn produce(rule_set: &str, member: &str) -> Rule<Person> {
        Rule::produce(
            rule_set,
            member,
            Arc::new(|_: &mut RandomContext, _: &Person| -> BoxedValue { Box::new(String::new()) }),
        )
    }

    fn sets(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn non_strict_sets_are_always_valid() {
        let store = RuleStore::<Person>::new();
        let result = validate_rule_sets(
            &sets(&["default"]),
            &store,
            &StrictModeTable::new(false),
            &members(&["name", "age"]),
            "Person",
        );
        assert!(result.is_valid);
    }

    #[test]
    fn strict_set_reports_members_without_rules() {
        let mut store = RuleStore::new();
        store.add_rule(produce("default", "name"));
        let result = validate_rule_sets(
            &sets(&["default"]),
            &store,
            &StrictModeTable::new(true),
            &members(&["name", "age", "email"]),
            "Person",
        );

        assert!(!result.is_valid);
        let missing: Vec<&str> = result.missing_members.iter().map(String::as_str).collect();
        assert_eq!(missing, vec!["age", "email"]);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn ignore_satisfies_strict_mode() {
        let mut store = RuleStore::new();
        store.add_rule(produce("default", "name"));
        store.add_rule(Rule::ignore("default", "age"));
        let result = validate_rule_sets(
            &sets(&["default"]),
            &store,
            &StrictModeTable::new(true),
            &members(&["name", "age"]),
            "Person",
        );
        assert!(result.is_valid);
    }

    #[test]
    fn freeform_block_invalidates_strict_set_with_diagnostic() {
        let mut store = RuleStore::new();
        store.add_rule(produce("default", "name"));
        store.add_rule(Rule::block(
            "default",
            Arc::new(|_: &mut RandomContext, _: &mut Person| {}),
        ));
        let result = validate_rule_sets(
            &sets(&["default"]),
            &store,
            &StrictModeTable::new(true),
            &members(&["name"]),
            "Person",
        );

        assert!(!result.is_valid);
        assert!(result.missing_members.is_empty());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn override_beats_default_per_rule_set() {
        let mut strict = StrictModeTable::new(false);
        strict.set("audit", true);
        let store = RuleStore::<Person>::new();

        let default_only = validate_rule_sets(
            &sets(&["default"]),
            &store,
            &strict,
            &members(&["name"]),
            "Person",
        );
        let audit = validate_rule_sets(
            &sets(&["default", "audit"]),
            &store,
            &strict,
            &members(&["name"]),
            "Person",
        );

        assert!(default_only.is_valid);
        assert!(!audit.is_valid);
        assert!(strict.is_strict("audit"));
        assert!(!strict.default_strict());
    }

    #[test]
    fn failure_carries_missing_members() {
        let mut store = RuleStore::new();
        store.add_rule(produce("default", "name"));
        let failure = validate_rule_sets(
            &sets(&["default"]),
            &store,
            &StrictModeTable::new(true),
            &members(&["name", "age"]),
            "Person",
        )
        .into_failure("Person");

        assert_eq!(failure.missing_members, vec!["age".to_string()]);
        assert!(failure.report().contains("age"));
    }
}
