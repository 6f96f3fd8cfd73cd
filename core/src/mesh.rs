//! Triangle meshes which can be combined and re-split without breaking apart any triangle group.
//!
//! A divisible mesh is made of three parallel arrays: vertices, local offsets (the index of each vertex within its group),
//! and the groups themselves. Groups are atomic, splitting a mesh only ever cuts between groups.
//! This allows meshes from many chunks to be packed into buffers with a vertex limit,
//! while keeping whatever per-group meaning the groups carry.

/// The number of vertices (and offsets) that make up one triangle.
pub const VERTICES_PER_TRIANGLE: usize = 3;

mod group;
pub use group::*;

mod builder;
pub use builder::*;

mod divisible;
pub use divisible::*;

mod split;
pub use split::*;
