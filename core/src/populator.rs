//! Producers of chunk resources, consumed by a [`ChunkCache`](crate::cache::ChunkCache) on a miss.

use crate::index::ChunkKey;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod store;
pub use store::*;

mod exterior;
pub use exterior::*;

mod blocking;
pub use blocking::*;

/// Fills the resources of a chunk, and optionally writes modified resources back out.
///
/// Must be safe to call concurrently for distinct keys.
pub trait ChunkPopulator<T, const D: usize>: Send + Sync + 'static {
	/// Fills `resources` (a leased, reset instance) with the contents of the chunk at `key`.
	///
	/// The cache polls every populate to completion, so `resources` always come back to its stash.
	/// Long running populators should observe `cancellation` and return early once it fires,
	/// leaving `resources` whole (any error will do, the result of a canceled populate is discarded).
	fn populate<'a>(
		&'a self,
		key: ChunkKey<D>,
		resources: &'a mut T,
		cancellation: CancellationToken,
	) -> BoxFuture<'a, anyhow::Result<()>>;

	/// Saves modified resources. Populators without a backing store have nothing to do.
	fn persist<'a>(&'a self, _key: ChunkKey<D>, _resources: &'a T) -> BoxFuture<'a, anyhow::Result<()>> {
		async { Ok(()) }.boxed()
	}
}

impl<T, const D: usize, P> ChunkPopulator<T, D> for Arc<P>
where
	P: ChunkPopulator<T, D> + ?Sized,
{
	fn populate<'a>(
		&'a self,
		key: ChunkKey<D>,
		resources: &'a mut T,
		cancellation: CancellationToken,
	) -> BoxFuture<'a, anyhow::Result<()>> {
		(**self).populate(key, resources, cancellation)
	}

	fn persist<'a>(&'a self, key: ChunkKey<D>, resources: &'a T) -> BoxFuture<'a, anyhow::Result<()>> {
		(**self).persist(key, resources)
	}
}
