use super::{ChunkCache, LOG};
use crate::{
	index::StageBounds,
	populator::ChunkPopulator,
	resources::ChunkResources,
	stash::ResourceStash,
	Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How [`ChunkCacheBuilder::with_standard_resource_stash`] sizes the stash.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkCacheBuilderOptions {
	/// How many resources the stash may pool, relative to how many chunks the cache holds.
	/// Spares cover resources pinned by consumers and populates in flight.
	pub stash_capacity_multiplier: f64,
	/// Constructs every resource the stash may hold up front.
	pub eager_fill_pool: bool,
}

impl Default for ChunkCacheBuilderOptions {
	fn default() -> Self {
		Self {
			stash_capacity_multiplier: 2.0,
			eager_fill_pool: false,
		}
	}
}

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

struct FiniteBounds<T, const D: usize> {
	bounds: StageBounds<D>,
	exterior_value: T,
	modifying_throws: bool,
}

/// Configures and creates a [`ChunkCache`].
///
/// Finite bounds, a populator and a resource stash are required.
pub struct ChunkCacheBuilder<T, const D: usize = 3> {
	factory: Option<Factory<T>>,
	finite_bounds: Option<FiniteBounds<T, D>>,
	populator: Option<Arc<dyn ChunkPopulator<T, D>>>,
	stash: Option<(ResourceStash<T>, usize)>,
}

impl<T, const D: usize> Default for ChunkCacheBuilder<T, D> {
	fn default() -> Self {
		Self {
			factory: None,
			finite_bounds: None,
			populator: None,
			stash: None,
		}
	}
}

impl<T, const D: usize> ChunkCacheBuilder<T, D>
where
	T: Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::default()
	}

	/// Constructs new (blank) resources for the standard resource stash.
	pub fn with_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn() -> T + Send + Sync + 'static,
	{
		self.factory = Some(Arc::new(factory));
		self
	}

	/// Limits the cache to the keys within `bounds`.
	///
	/// Every key outside of the bounds reads as `exterior_value`.
	/// Modifying such a key fails if `modifying_throws` is set, and is ignored otherwise.
	pub fn with_finite_bounds(
		mut self,
		bounds: StageBounds<D>,
		exterior_value: T,
		modifying_throws: bool,
	) -> Self {
		self.finite_bounds = Some(FiniteBounds {
			bounds,
			exterior_value,
			modifying_throws,
		});
		self
	}

	pub fn with_populator<P>(mut self, populator: P) -> Self
	where
		P: ChunkPopulator<T, D>,
	{
		self.populator = Some(Arc::new(populator));
		self
	}

	/// Uses a stash created by the caller. The cache holds at most `cache_capacity` unpinned chunks.
	pub fn with_resource_stash(mut self, stash: ResourceStash<T>, cache_capacity: usize) -> Result<Self> {
		if cache_capacity == 0 {
			return Err(Error::InvalidArgument(
				"cache capacity must be greater than zero".to_owned(),
			));
		}
		self.stash = Some((stash, cache_capacity));
		Ok(self)
	}

	/// Creates a stash sized to a memory budget.
	///
	/// The cache holds as many chunks as fit in `size_in_bytes`, measured by the footprint of
	/// one resource from the factory (see [`with_factory`](Self::with_factory)),
	/// and the stash pools that many resources times the options' multiplier.
	#[profiling::function]
	pub fn with_standard_resource_stash(
		mut self,
		size_in_bytes: usize,
		options: ChunkCacheBuilderOptions,
	) -> Result<Self>
	where
		T: ChunkResources,
	{
		let factory = self.factory.clone().ok_or_else(|| {
			Error::InvalidOperation(
				"a resource factory must be assigned before creating the standard resource stash"
					.to_owned(),
			)
		})?;
		let multiplier = options.stash_capacity_multiplier;
		if !multiplier.is_finite() || multiplier < 1.0 {
			return Err(Error::InvalidArgument(format!(
				"stash capacity multiplier must be at least 1, but is {}",
				multiplier
			)));
		}

		let footprint = factory().size_in_bytes().max(1);
		let cache_capacity = size_in_bytes / footprint;
		if cache_capacity == 0 {
			return Err(Error::InvalidArgument(format!(
				"{} bytes cannot hold a single chunk of {} bytes",
				size_in_bytes, footprint
			)));
		}
		let stash_capacity = (cache_capacity as f64 * multiplier).ceil() as usize;
		let stash = ResourceStash::new(stash_capacity, move || factory(), T::reset)?;
		if options.eager_fill_pool {
			stash.eager_fill(stash_capacity);
		}
		log::debug!(
			target: LOG,
			"Created resource stash of {} for {} chunks of {} bytes",
			stash_capacity,
			cache_capacity,
			footprint
		);

		self.stash = Some((stash, cache_capacity));
		Ok(self)
	}

	pub fn build(self) -> Result<ChunkCache<T, D>> {
		let FiniteBounds {
			bounds,
			exterior_value,
			modifying_throws,
		} = self.finite_bounds.ok_or_else(|| {
			Error::InvalidOperation("finite bounds must be assigned before building".to_owned())
		})?;
		let populator = self.populator.ok_or_else(|| {
			Error::InvalidOperation("a populator must be assigned before building".to_owned())
		})?;
		let (stash, capacity) = self.stash.ok_or_else(|| {
			Error::InvalidOperation("a resource stash must be assigned before building".to_owned())
		})?;
		Ok(ChunkCache::new(
			bounds,
			exterior_value,
			modifying_throws,
			populator,
			stash,
			capacity,
		))
	}
}
