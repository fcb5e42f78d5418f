//! Core contracts for synthkit.
//!
//! This crate defines the error taxonomy, the member registry capability,
//! the shared randomness domain and the option types used by the
//! generation engine.

pub mod error;
pub mod member;
pub mod options;
pub mod random;
pub mod rule_sets;

pub use error::{FakerError, Result, ValidationFailure};
pub use member::{BoxedValue, MemberInfo, MemberRegistry, MemberSetter, MemberTable};
pub use options::GeneratorOptions;
pub use random::{RandomContext, SharedRandomness, TurnstileGuard};
pub use rule_sets::{DEFAULT_RULE_SET, is_unspecified, normalize_rule_set, parse_rule_sets};
