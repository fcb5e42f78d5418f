use thiserror::Error;

/// Core error type shared across synthkit crates.
#[derive(Debug, Error)]
pub enum FakerError {
    /// A rule names a member the registry does not know about.
    #[error(
        "member '{member}' was not found on {type_name}; cannot register a rule for it. \
         Expose the member through the MemberRegistry used by this generator."
    )]
    UnknownMember { type_name: String, member: String },
    /// The rule's value type does not match the member's declared type.
    #[error("member '{member}' on {type_name} is declared as {expected} but the rule produces {actual}")]
    TypeMismatch {
        type_name: String,
        member: String,
        expected: &'static str,
        actual: &'static str,
    },
    /// A rule set was opened while another one was still open.
    #[error("cannot create rule set '{inner}' within rule set '{outer}'")]
    NestedRuleSet { outer: String, inner: String },
    /// Strict mode found members without rules.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    /// Generator options could not be parsed.
    #[error("invalid generator options: {0}")]
    Config(#[from] toml::de::Error),
    /// Generator options could not be encoded.
    #[error("cannot encode generator options: {0}")]
    ConfigEncode(#[from] toml::ser::Error),
}

/// Strict-mode validation failure with the full missing-rule report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{report}")]
pub struct ValidationFailure {
    pub type_name: String,
    pub missing_members: Vec<String>,
    pub diagnostics: Vec<String>,
    report: String,
}

impl ValidationFailure {
    pub fn new(
        type_name: impl Into<String>,
        missing_members: Vec<String>,
        diagnostics: Vec<String>,
    ) -> Self {
        let type_name = type_name.into();
        let report = format_report(&type_name, &missing_members, &diagnostics);
        Self {
            type_name,
            missing_members,
            diagnostics,
            report,
        }
    }

    /// Formatted, human readable report.
    pub fn report(&self) -> &str {
        &self.report
    }
}

fn format_report(type_name: &str, missing: &[String], diagnostics: &[String]) -> String {
    let mut report = String::new();
    for message in diagnostics {
        report.push_str(message);
        report.push_str("\n\n");
    }

    report.push_str("Strict mode requires a rule for every member.\n");
    report.push_str(&format!("Rules are missing for members of '{type_name}'.\n"));
    report.push_str("----------- missing rules -----------\n");
    for member in missing {
        report.push_str(member);
        report.push('\n');
    }

    report.trim().to_string()
}

/// Convenience alias for results returned by synthkit crates.
pub type Result<T> = std::result::Result<T, FakerError>;
