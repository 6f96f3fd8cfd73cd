use super::ChunkPopulator;
use crate::{index::ChunkKey, Error};
use futures::future::{BoxFuture, FutureExt};
use std::{
	panic::{self, AssertUnwindSafe},
	sync::Arc,
};
use tokio_util::sync::CancellationToken;

/// Runs a synchronous generator on tokio's blocking thread pool,
/// so cpu-heavy generation does not stall the async workers.
///
/// The resources are moved onto the blocking thread while the generator runs,
/// which is why they must implement [`Default`]. They are moved back once the generator returns
/// (or panics), cancellation does not interrupt a generator which has already started.
pub struct BlockingPopulator<F> {
	generate: Arc<F>,
}

impl<F> BlockingPopulator<F> {
	pub fn new(generate: F) -> Self {
		Self {
			generate: Arc::new(generate),
		}
	}
}

impl<T, const D: usize, F> ChunkPopulator<T, D> for BlockingPopulator<F>
where
	T: Default + Send + Sync + 'static,
	F: Fn(ChunkKey<D>, &mut T) -> anyhow::Result<()> + Send + Sync + 'static,
{
	fn populate<'a>(
		&'a self,
		key: ChunkKey<D>,
		resources: &'a mut T,
		cancellation: CancellationToken,
	) -> BoxFuture<'a, anyhow::Result<()>> {
		async move {
			if cancellation.is_cancelled() {
				return Err(Error::Canceled.into());
			}
			let generate = self.generate.clone();
			let mut owned = std::mem::take(resources);
			let (owned, result) = tokio::task::spawn_blocking(move || {
				profiling::scope!("generate-chunk");
				let result = panic::catch_unwind(AssertUnwindSafe(|| generate(key, &mut owned)));
				(owned, result)
			})
			.await?;
			*resources = owned;
			match result {
				Ok(result) => result,
				Err(_panic) => Err(anyhow::anyhow!("generator panicked while generating chunk {}", key)),
			}
		}
		.boxed()
	}
}
