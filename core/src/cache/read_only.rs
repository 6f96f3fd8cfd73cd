use super::{ChunkCache, ChunkRef};
use crate::{
	index::{ChunkKey, StageBounds},
	Result,
};
use tokio_util::sync::CancellationToken;

/// A view of a [`ChunkCache`] which can read (and populate) chunks, but not modify, flush or evict them.
///
/// Handed to consumers of a stage, such as mesh generation, which only read chunks produced by an earlier phase.
pub struct ReadOnlyChunkCache<T, const D: usize = 3> {
	cache: ChunkCache<T, D>,
}

impl<T, const D: usize> Clone for ReadOnlyChunkCache<T, D> {
	fn clone(&self) -> Self {
		Self {
			cache: self.cache.clone(),
		}
	}
}

impl<T, const D: usize> ReadOnlyChunkCache<T, D>
where
	T: Send + Sync + 'static,
{
	pub(super) fn new(cache: ChunkCache<T, D>) -> Self {
		Self { cache }
	}

	pub fn bounds(&self) -> &StageBounds<D> {
		self.cache.bounds()
	}

	pub fn exterior_value(&self) -> &ChunkRef<T> {
		self.cache.exterior_value()
	}

	pub async fn get(&self, key: ChunkKey<D>) -> Result<ChunkRef<T>> {
		self.cache.get(key).await
	}

	pub async fn get_with_cancellation(
		&self,
		key: ChunkKey<D>,
		cancellation: CancellationToken,
	) -> Result<ChunkRef<T>> {
		self.cache.get_with_cancellation(key, cancellation).await
	}
}

#[cfg(test)]
mod read_only_chunk_cache {
	use super::*;
	use crate::{cache::testing::cache, index::ChunkKey3D};

	#[tokio::test]
	async fn shares_entries_with_cache() {
		let (cache, populator) = cache(4);
		let view = cache.as_read_only();
		let key = ChunkKey3D::new(3, 1, 2);
		let through_view = view.get(key).await.unwrap();
		let through_cache = cache.get(key).await.unwrap();
		assert!(ChunkRef::ptr_eq(&through_view, &through_cache));
		assert_eq!(populator.populates(), 1);
		assert_eq!(view.bounds(), cache.bounds());
	}

	#[tokio::test]
	async fn reads_exterior() {
		let (cache, _populator) = cache(4);
		let view = cache.as_read_only();
		let chunk = view.get(ChunkKey3D::new(0, 9, 0)).await.unwrap();
		assert!(ChunkRef::ptr_eq(&chunk, view.exterior_value()));
	}
}
