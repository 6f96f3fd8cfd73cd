//! Voxel Stages provides the chunk plumbing for worlds which are generated in stages:
//! each stage reads the chunks of the stage before it and writes chunks of its own.
//!
//! - [`cache`] keeps a bounded number of chunks resident, populating missing chunks
//! at most once no matter how many callers ask for them, and evicting the least recently used.
//! - [`stash`] pools the (often large) resources chunks are made of, so evicted chunks are reused.
//! - [`populator`] and [`store`] describe where chunk contents come from and where they are persisted.
//! - [`completion`] finishes every cache of a stage so the next stage only reads persisted chunks.
//! - [`mesh`] builds meshes out of atomic groups of triangles which can be recombined and split
//! to fit vertex limits.
//! - [`convert`] registers conversions between arbitrary pairs of types.

pub mod cache;
pub mod completion;
pub mod convert;
pub mod index;
pub mod mesh;
pub mod persist;
pub mod populator;
pub mod resources;
pub mod stash;
pub mod store;

mod error;
pub use error::*;
