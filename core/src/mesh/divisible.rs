use super::{GroupInfo, Split};
use crate::Result;
use std::{
	any::{Any, TypeId},
	collections::HashMap,
	sync::{Arc, Mutex, OnceLock, PoisonError},
};

/// Read access to the three parallel arrays of a divisible mesh.
pub trait DivisibleMeshData<T> {
	fn groups(&self) -> &[GroupInfo];
	fn offsets(&self) -> &[u32];
	fn vertices(&self) -> &[T];

	fn group_count(&self) -> usize {
		self.groups().len()
	}

	fn vertex_count(&self) -> usize {
		self.vertices().len()
	}

	fn triangle_count(&self) -> usize {
		self.groups().iter().map(|group| group.triangles).sum()
	}

	/// Iterates over each group alongside its slice of offsets and vertices.
	fn iter_groups(&self) -> GroupSlices<'_, T> {
		GroupSlices {
			groups: self.groups().iter(),
			offsets: self.offsets(),
			vertices: self.vertices(),
		}
	}
}

impl<T, M> DivisibleMeshData<T> for &M
where
	M: DivisibleMeshData<T> + ?Sized,
{
	fn groups(&self) -> &[GroupInfo] {
		(**self).groups()
	}

	fn offsets(&self) -> &[u32] {
		(**self).offsets()
	}

	fn vertices(&self) -> &[T] {
		(**self).vertices()
	}
}

pub struct GroupSlices<'a, T> {
	groups: std::slice::Iter<'a, GroupInfo>,
	offsets: &'a [u32],
	vertices: &'a [T],
}

impl<'a, T> Iterator for GroupSlices<'a, T> {
	type Item = (GroupInfo, &'a [u32], &'a [T]);

	fn next(&mut self) -> Option<Self::Item> {
		let group = *self.groups.next()?;
		let (offsets, remaining_offsets) = self.offsets.split_at(group.offsets);
		let (vertices, remaining_vertices) = self.vertices.split_at(group.vertices);
		self.offsets = remaining_offsets;
		self.vertices = remaining_vertices;
		Some((group, offsets, vertices))
	}
}

/// An immutable divisible mesh. Cloning is cheap, the arrays are shared.
pub struct DivisibleMesh<T> {
	data: Arc<MeshData<T>>,
}

#[derive(PartialEq, Debug)]
struct MeshData<T> {
	groups: Vec<GroupInfo>,
	offsets: Vec<u32>,
	vertices: Vec<T>,
}

/// The shared empty meshes, one per vertex type.
static EMPTY_MESHES: OnceLock<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>> =
	OnceLock::new();

impl<T> DivisibleMesh<T> {
	pub(super) fn from_parts(groups: Vec<GroupInfo>, offsets: Vec<u32>, vertices: Vec<T>) -> Self {
		debug_assert_eq!(offsets.len(), vertices.len());
		debug_assert_eq!(
			groups.iter().map(|group| group.vertices).sum::<usize>(),
			vertices.len()
		);
		Self {
			data: Arc::new(MeshData {
				groups,
				offsets,
				vertices,
			}),
		}
	}

	/// Returns true if both meshes share the same underlying arrays.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.data, &b.data)
	}

	pub fn is_empty(&self) -> bool {
		self.data.groups.is_empty()
	}
}

impl<T> DivisibleMesh<T>
where
	T: Send + Sync + 'static,
{
	/// The process-wide empty mesh for vertices of type `T`.
	/// Every call returns a handle to the same instance.
	pub fn empty() -> Self {
		let registry = EMPTY_MESHES.get_or_init(|| Mutex::new(HashMap::new()));
		let mut meshes = registry.lock().unwrap_or_else(PoisonError::into_inner);
		let entry = meshes
			.entry(TypeId::of::<T>())
			.or_insert_with(|| Box::new(Self::from_parts(Vec::new(), Vec::new(), Vec::new())));
		match entry.downcast_ref::<Self>() {
			Some(mesh) => mesh.clone(),
			None => unreachable!("empty meshes are keyed by their vertex type"),
		}
	}
}

impl<T> DivisibleMesh<T>
where
	T: Clone + Send + Sync + 'static,
{
	/// Concatenates the groups, offsets and vertices of every mesh, in order.
	/// Combining nothing (or only empty meshes) results in the [`empty`](Self::empty) mesh.
	#[profiling::function]
	pub fn combine<'a, M, I>(meshes: I) -> Self
	where
		I: IntoIterator<Item = &'a M>,
		M: DivisibleMeshData<T> + ?Sized + 'a,
	{
		let meshes = meshes.into_iter().collect::<Vec<_>>();
		let group_count = meshes.iter().map(|mesh| mesh.groups().len()).sum::<usize>();
		if group_count == 0 {
			return Self::empty();
		}
		let vertex_count = meshes.iter().map(|mesh| mesh.vertices().len()).sum::<usize>();

		let mut groups = Vec::with_capacity(group_count);
		let mut offsets = Vec::with_capacity(vertex_count);
		let mut vertices = Vec::with_capacity(vertex_count);
		for mesh in meshes {
			groups.extend_from_slice(mesh.groups());
			offsets.extend_from_slice(mesh.offsets());
			vertices.extend_from_slice(mesh.vertices());
		}
		Self::from_parts(groups, offsets, vertices)
	}

	/// Combines the meshes and then partitions the result into consecutive meshes
	/// holding at most `max_vertices_per_mesh` vertices each.
	///
	/// Groups are never divided between two meshes. A single group that is larger than
	/// the maximum is yielded alone in its own (oversized) mesh rather than being dropped.
	pub fn split<'a, M, I>(max_vertices_per_mesh: usize, meshes: I) -> Result<Split<'a, T, M>>
	where
		I: IntoIterator<Item = &'a M>,
		M: DivisibleMeshData<T> + ?Sized + 'a,
	{
		Split::new(max_vertices_per_mesh, meshes.into_iter().collect())
	}

	/// Equivalent to `split(max, [combine(builders)])`, without materializing the combined mesh.
	pub fn combine_and_split<'a, M, I>(
		max_vertices_per_mesh: usize,
		builders: I,
	) -> Result<Split<'a, T, M>>
	where
		I: IntoIterator<Item = &'a M>,
		M: DivisibleMeshData<T> + ?Sized + 'a,
	{
		Self::split(max_vertices_per_mesh, builders)
	}
}

impl<T> DivisibleMeshData<T> for DivisibleMesh<T> {
	fn groups(&self) -> &[GroupInfo] {
		&self.data.groups
	}

	fn offsets(&self) -> &[u32] {
		&self.data.offsets
	}

	fn vertices(&self) -> &[T] {
		&self.data.vertices
	}
}

impl<T> Clone for DivisibleMesh<T> {
	fn clone(&self) -> Self {
		Self {
			data: self.data.clone(),
		}
	}
}

impl<T> PartialEq for DivisibleMesh<T>
where
	T: PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		Self::ptr_eq(self, other) || self.data == other.data
	}
}

impl<T> std::fmt::Debug for DivisibleMesh<T>
where
	T: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DivisibleMesh")
			.field("groups", &self.data.groups)
			.field("offsets", &self.data.offsets)
			.field("vertices", &self.data.vertices)
			.finish()
	}
}
