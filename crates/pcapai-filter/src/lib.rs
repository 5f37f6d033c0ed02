//! Filter engine for pcapai.
//!
//! Pure functions from a record sequence and typed parameters to the
//! matching subsequence, in original order. Predicates compose by
//! conjunction only; disjunction is expressed by issuing several queries.

pub mod predicate;
pub mod query;
pub mod summary;

pub use predicate::{HostDirection, Predicate};
pub use query::{
    by_field_contains, by_field_equals, by_host, by_index, by_index_range, by_operation,
    by_protocol, by_time_range, Query,
};
pub use summary::{CaptureSummary, LengthStats};
