use super::{DivisibleMesh, DivisibleMeshData, GroupInfo, VERTICES_PER_TRIANGLE};
use crate::{Error, Result};

/// Builds up the groups of a [`DivisibleMesh`] one triangle (or group) at a time.
#[derive(Clone, PartialEq, Debug)]
pub struct MutableDivisibleMesh<T> {
	pub(super) groups: Vec<GroupInfo>,
	pub(super) offsets: Vec<u32>,
	pub(super) vertices: Vec<T>,
}

impl<T> Default for MutableDivisibleMesh<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> MutableDivisibleMesh<T> {
	pub fn new() -> Self {
		Self {
			groups: Vec::new(),
			offsets: Vec::new(),
			vertices: Vec::new(),
		}
	}

	pub fn with_capacity(triangles: usize) -> Self {
		Self {
			groups: Vec::with_capacity(triangles),
			offsets: Vec::with_capacity(triangles * VERTICES_PER_TRIANGLE),
			vertices: Vec::with_capacity(triangles * VERTICES_PER_TRIANGLE),
		}
	}

	/// Appends a new group holding the single triangle `a, b, c`.
	pub fn add_triangle(&mut self, a: T, b: T, c: T) {
		self.vertices.push(a);
		self.vertices.push(b);
		self.vertices.push(c);
		self.offsets.extend_from_slice(&[0, 1, 2]);
		self.groups.push(GroupInfo::TRIANGLE);
	}

	/// Appends a group made of several whole triangles.
	///
	/// `offsets` index into `vertices` (local to the group), three per triangle.
	pub fn add_group(&mut self, vertices: Vec<T>, offsets: Vec<u32>) -> Result<()> {
		if vertices.is_empty() || vertices.len() % VERTICES_PER_TRIANGLE != 0 {
			return Err(Error::InvalidArgument(format!(
				"a group must hold whole triangles, but has {} vertices",
				vertices.len()
			)));
		}
		if offsets.len() != vertices.len() {
			return Err(Error::InvalidArgument(format!(
				"a group with {} vertices must have as many offsets, but has {}",
				vertices.len(),
				offsets.len()
			)));
		}
		if let Some(offset) = offsets.iter().find(|offset| **offset as usize >= vertices.len()) {
			return Err(Error::InvalidArgument(format!(
				"group offset {} is out of range for {} vertices",
				offset,
				vertices.len()
			)));
		}
		self.groups
			.push(GroupInfo::with_triangles(vertices.len() / VERTICES_PER_TRIANGLE));
		self.offsets.extend(offsets);
		self.vertices.extend(vertices);
		Ok(())
	}

	pub fn is_empty(&self) -> bool {
		self.groups.is_empty()
	}

	pub fn clear(&mut self) {
		self.groups.clear();
		self.offsets.clear();
		self.vertices.clear();
	}

	/// Freezes the builder into an immutable mesh without copying its contents.
	pub fn freeze(self) -> DivisibleMesh<T>
	where
		T: Send + Sync + 'static,
	{
		if self.is_empty() {
			return DivisibleMesh::empty();
		}
		DivisibleMesh::from_parts(self.groups, self.offsets, self.vertices)
	}
}

impl<T> DivisibleMeshData<T> for MutableDivisibleMesh<T> {
	fn groups(&self) -> &[GroupInfo] {
		&self.groups
	}

	fn offsets(&self) -> &[u32] {
		&self.offsets
	}

	fn vertices(&self) -> &[T] {
		&self.vertices
	}
}
