//! Rule-based object generation for synthkit.
//!
//! Register per-member rules against a target type, optionally grouped into
//! named rule sets, then instantiate and populate objects through the
//! synchronous [`Faker`] or the asynchronous [`AsyncFaker`]. Generation is
//! reproducible from a seed and safe to run from many threads.

pub mod builder;
pub mod engine;
pub mod faker;
pub mod faker_async;
pub mod logging;
pub mod rules;
pub mod validation;

pub use builder::RuleBuilder;
pub use engine::RuleEngine;
pub use faker::{Faker, Finalizer, Instantiator};
pub use faker_async::{AsyncFaker, AsyncFinalizer, AsyncInstantiator};
pub use logging::{LoggingError, init_file_logging, init_stderr_logging};
pub use rules::{Rule, RuleAction, RuleBlock, RuleStore, ValueProducer};
pub use validation::{StrictModeTable, ValidationResult};

pub use rand::Rng;
pub use synthkit_core::{
    FakerError, GeneratorOptions, MemberInfo, MemberRegistry, MemberTable, RandomContext, Result,
    SharedRandomness,
};
