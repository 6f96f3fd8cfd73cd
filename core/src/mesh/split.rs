use super::{DivisibleMesh, DivisibleMeshData, GroupInfo};
use crate::{Error, Result};

/// Lazily partitions a sequence of meshes into [`DivisibleMesh`]es of bounded size.
///
/// Created by [`DivisibleMesh::split`] and [`DivisibleMesh::combine_and_split`].
/// Each mesh yielded holds as many consecutive whole groups as fit within the maximum.
pub struct Split<'a, T, M: ?Sized> {
	sources: Vec<&'a M>,
	max_vertices: usize,
	cursor: Cursor,
	_marker: std::marker::PhantomData<fn() -> T>,
}

#[derive(Default, Clone, Copy, Debug)]
struct Cursor {
	source: usize,
	group: usize,
	offset: usize,
	vertex: usize,
}

impl<'a, T, M> Split<'a, T, M>
where
	M: DivisibleMeshData<T> + ?Sized + 'a,
{
	pub(super) fn new(max_vertices: usize, sources: Vec<&'a M>) -> Result<Self> {
		if max_vertices == 0 {
			return Err(Error::InvalidArgument(
				"the maximum vertices per mesh must be greater than zero".to_owned(),
			));
		}
		Ok(Self {
			sources,
			max_vertices,
			cursor: Cursor::default(),
			_marker: Default::default(),
		})
	}

	pub fn max_vertices_per_mesh(&self) -> usize {
		self.max_vertices
	}

	/// Moves the cursor past any sources which have no groups left.
	fn skip_exhausted(&mut self) {
		while let Some(source) = self.sources.get(self.cursor.source) {
			if self.cursor.group < source.groups().len() {
				break;
			}
			self.cursor = Cursor {
				source: self.cursor.source + 1,
				..Default::default()
			};
		}
	}

	fn peek_group(&mut self) -> Option<(&'a M, GroupInfo)> {
		self.skip_exhausted();
		let source = *self.sources.get(self.cursor.source)?;
		Some((source, source.groups()[self.cursor.group]))
	}
}

impl<'a, T, M> Iterator for Split<'a, T, M>
where
	T: Clone + Send + Sync + 'static,
	M: DivisibleMeshData<T> + ?Sized + 'a,
{
	type Item = DivisibleMesh<T>;

	#[profiling::function]
	fn next(&mut self) -> Option<Self::Item> {
		let mut groups = Vec::new();
		let mut offsets = Vec::new();
		let mut vertices = Vec::new();
		while let Some((source, group)) = self.peek_group() {
			// An oversized group is yielded on its own rather than dropped.
			let fits = vertices.len() + group.vertices <= self.max_vertices;
			if !fits && !groups.is_empty() {
				break;
			}
			let cursor = &mut self.cursor;
			groups.push(group);
			offsets.extend_from_slice(&source.offsets()[cursor.offset..cursor.offset + group.offsets]);
			vertices.extend_from_slice(&source.vertices()[cursor.vertex..cursor.vertex + group.vertices]);
			cursor.group += 1;
			cursor.offset += group.offsets;
			cursor.vertex += group.vertices;
			if !fits {
				break;
			}
		}
		if groups.is_empty() {
			return None;
		}
		Some(DivisibleMesh::from_parts(groups, offsets, vertices))
	}
}

impl<'a, T, M> std::iter::FusedIterator for Split<'a, T, M>
where
	T: Clone + Send + Sync + 'static,
	M: DivisibleMeshData<T> + ?Sized + 'a,
{
}
