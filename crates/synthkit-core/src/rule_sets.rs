//! Rule-set name handling.

/// Name of the rule set that holds rules declared outside any named set.
pub const DEFAULT_RULE_SET: &str = "default";

/// Canonical form of a rule-set name: trimmed and lower-cased.
pub fn normalize_rule_set(name: &str) -> String {
    name.trim().to_lowercase()
}

/// True when a caller supplied no rule-set names at all.
pub fn is_unspecified(rule_sets: Option<&str>) -> bool {
    rule_sets.is_none_or(|value| value.trim().is_empty())
}

/// Parses a comma separated rule-set list.
///
/// Names are normalized and duplicates dropped, keeping the first
/// occurrence. A missing, blank or comma-only list yields `["default"]`.
/// Default rules only run next to named sets when `default` is listed.
pub fn parse_rule_sets(rule_sets: Option<&str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in rule_sets.unwrap_or_default().split(',') {
        let name = normalize_rule_set(token);
        if name.is_empty() || names.contains(&name) {
            continue;
        }
        names.push(name);
    }

    if names.is_empty() {
        names.push(DEFAULT_RULE_SET.to_string());
    }
    names
}
