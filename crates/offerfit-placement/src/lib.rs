//! offerfit placement — decides where a pod may land.
//!
//! Rules are pure filters over `(offer, pod instance, launched tasks)`. They
//! never add resources: an accepted offer comes back unchanged, a rejected
//! one comes back with no resources.
//!
//! # Components
//!
//! - **`matcher`** — exact, anchored-regex and wildcard string matchers
//! - **`rule`** — the serializable rule tree and its evaluation
//! - **`utils`** — builders for agent and pod-type avoid/colocate trees
//! - **`constraint`** — Marathon-style constraint string parser

pub mod constraint;
mod grouping;
pub mod matcher;
mod max_per;
mod round_robin;
pub mod rule;
mod task_type;
pub mod utils;

pub use constraint::{ConstraintError, ConstraintResult};
pub use matcher::StringMatcher;
pub use rule::{PlacementContext, PlacementRule, RuleOutcome, TaskTypeBehavior, Verdict};
pub use utils::{agent_rule, task_type_rule};
