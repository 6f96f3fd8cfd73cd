use super::VERTICES_PER_TRIANGLE;

/// The sizes of one atomic group within a divisible mesh.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct GroupInfo {
	/// The number of entries this group occupies in the offsets array.
	pub offsets: usize,
	/// The number of entries this group occupies in the vertices array.
	pub vertices: usize,
	pub triangles: usize,
}

impl GroupInfo {
	/// A group holding exactly one triangle.
	pub const TRIANGLE: Self = Self::with_triangles(1);

	pub const fn with_triangles(triangles: usize) -> Self {
		Self {
			offsets: triangles * VERTICES_PER_TRIANGLE,
			vertices: triangles * VERTICES_PER_TRIANGLE,
			triangles,
		}
	}
}
