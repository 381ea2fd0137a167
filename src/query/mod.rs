//! Typed query filter model and its SQL evaluation.

pub mod builder;
pub mod filter;

pub use builder::{InstanceIdentifier, QueryService, TagValuePredicateBuilder};
pub use filter::{QueryFilterCondition, QueryFilterVisitor, RangeValueMatch, SingleValueMatch};
