//! Integer coordinates of chunks in a stage grid, and the finite bounds of a stage.

mod key;
pub use key::*;

mod bounds;
pub use bounds::*;
