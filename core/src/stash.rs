//! Pooling of chunk resources, so that caches do not allocate a new buffer for every chunk they populate.

mod stash;
pub use stash::*;

mod leased;
pub use leased::*;
