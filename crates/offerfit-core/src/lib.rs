//! offerfit-core — shared domain types for offer evaluation.
//!
//! - [`value`]: scalar/range/set arithmetic used for every resource quantity
//! - [`resource`], [`offer`], [`attribute`]: what an agent offers
//! - [`task`], [`labels`]: launched-task records and their durable labels
//! - [`config`]: evaluator settings from `offerfit.toml`

pub mod attribute;
pub mod config;
pub mod labels;
pub mod offer;
pub mod resource;
pub mod task;
pub mod value;

pub use attribute::{Attribute, AttributeString, AttributeValue};
pub use config::EvaluatorConfig;
pub use labels::Labels;
pub use offer::{DomainInfo, Offer};
pub use resource::{ANY_ROLE, DiskInfo, DiskSource, Reservation, Resource};
pub use task::{
    CheckInfo, ContainerVolume, DiscoveryInfo, DiscoveryPort, ExecutorInfo, PodInstance,
    TaskInfo, TaskState,
};
pub use value::{Range, Ranges, Value, ValueError, ValueResult, ValueType};
