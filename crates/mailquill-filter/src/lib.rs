//! # mailquill-filter
//!
//! The mail filter-rule engine: an ordered list of predicate parts per
//! rule, validated and compiled into an S-expression string consumed by
//! an external filtering evaluator, with lossless XML persistence.
//!
//! This crate provides:
//! - [`FilterPart`]: a named predicate template with typed element
//!   values and `${name}` code substitution
//! - [`FilterRule`]: grouping (all/any), threading modes, validation,
//!   code generation with the body-search restructuring, change
//!   notification with batch suppression
//! - [`RuleContext`]: the part-template registry and persisted rule
//!   list, with system/user file merging and source-scoped ranking
//! - [`EditSession`]: clone-edit-commit editing so a stored rule is
//!   never mutated until the edit is accepted

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod alert;
mod context;
mod edit;
mod element;
mod error;
mod part;
mod rule;

pub use alert::Alert;
pub use context::RuleContext;
pub use edit::EditSession;
pub use element::{Element, ElementValue};
pub use error::{Error, Result};
pub use part::FilterPart;
pub use rule::{CodeGenOptions, FilterRule, RuleGrouping, RuleThreading};
