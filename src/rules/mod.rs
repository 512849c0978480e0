//! Pattern rules: record types, the line matcher, project fingerprinting, and the
//! on-disk rule-set store.

pub mod detect;
pub mod engine;
pub mod matcher;
pub mod model;
pub mod store;

pub use engine::{RuleCheckResult, RuleOptions, check_rules, run_rules};
pub use model::{PatternKind, Rule, RulePatch, RuleSet, Severity, Violation};
pub use store::{RuleSource, RuleStore};
