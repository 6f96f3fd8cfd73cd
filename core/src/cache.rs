//! The chunk cache: a bounded, concurrent map of chunk key to chunk resources,
//! populated on demand with at most one populate in flight per key.

/// The log category for chunk caching.
static LOG: &'static str = "chunk-cache";

mod builder;
pub use builder::*;

mod chunk_ref;
pub use chunk_ref::*;

mod cache;
pub use cache::*;

mod slot;
use slot::*;

mod eviction;

mod read_only;
pub use read_only::*;

mod stats;
pub use stats::*;

#[cfg(test)]
pub(crate) mod testing;
