//! The map-reduce engine.
//!
//! Each request is decoded, mapped to key-value pairs, grouped by key and
//! reduced per key concurrently. The per-request output lands in a
//! [`BatchStore`] that is folded into final [`crate::Record`]s once the
//! run has drained.

mod engine;
mod reduce;
mod store;

pub use engine::{map_reduce, MapReduceProcessor};
pub use reduce::{group_by_key, reduce_groups, reduce_groups_partial};
pub use store::BatchStore;
