use super::ChunkPopulator;
use crate::index::ChunkKey;
use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

/// Fills every chunk with a copy of the same value.
///
/// Typically the fallback of a [`ChunkStorePopulator`](super::ChunkStorePopulator)
/// for stages whose chunks start out uniform (all air, all unexplored, ...).
#[derive(Clone, Debug)]
pub struct ExteriorPopulator<T> {
	value: T,
}

impl<T> ExteriorPopulator<T> {
	pub fn new(value: T) -> Self {
		Self { value }
	}

	pub fn value(&self) -> &T {
		&self.value
	}
}

impl<T, const D: usize> ChunkPopulator<T, D> for ExteriorPopulator<T>
where
	T: Clone + Send + Sync + 'static,
{
	fn populate<'a>(
		&'a self,
		_key: ChunkKey<D>,
		resources: &'a mut T,
		_cancellation: CancellationToken,
	) -> BoxFuture<'a, anyhow::Result<()>> {
		resources.clone_from(&self.value);
		async { Ok(()) }.boxed()
	}
}
