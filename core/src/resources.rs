/// The payload of one chunk, as held by a [`ChunkCache`](crate::cache::ChunkCache).
///
/// Resources are pooled by a [`ResourceStash`](crate::stash::ResourceStash),
/// so an instance is reused for many chunks over the lifetime of a cache.
pub trait ChunkResources: Send + Sync + 'static {
	/// The approximate memory footprint of one instance,
	/// used to derive how many chunks fit in a memory budget.
	fn size_in_bytes(&self) -> usize;

	/// Returns the instance to a state in which it can be leased for another chunk.
	fn reset(&mut self);
}

impl<T> ChunkResources for Vec<T>
where
	T: Default + Clone + Send + Sync + 'static,
{
	fn size_in_bytes(&self) -> usize {
		std::mem::size_of::<Self>() + self.capacity() * std::mem::size_of::<T>()
	}

	/// Keeps the length (and allocation), so a reset grid is still a full grid.
	fn reset(&mut self) {
		self.fill(T::default());
	}
}
