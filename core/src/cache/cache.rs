use super::{
	CacheStats, ChunkRef, Counters, Flight, Lookup, PopulateFuture, ReadOnlyChunkCache, Resident,
	Slot, LOG,
};
use crate::{
	completion::AsyncCompletable,
	index::{ChunkKey, StageBounds},
	populator::ChunkPopulator,
	stash::{Leased, ResourceStash},
	Error, Result,
};
use futures::future::{BoxFuture, FutureExt};
use std::{
	collections::{
		hash_map::{Entry, RandomState},
		HashMap,
	},
	hash::BuildHasher,
	panic::AssertUnwindSafe,
	sync::{
		atomic::{AtomicU64, AtomicUsize, Ordering},
		Arc, Mutex, MutexGuard, PoisonError,
	},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// The number of independently locked partitions of the entry map.
const SHARD_COUNT: usize = 16;

type Shard<T, const D: usize> = Mutex<HashMap<ChunkKey<D>, Slot<T>>>;

/// A bounded, concurrent cache of chunk resources within (finite) stage bounds.
///
/// Getting a chunk which is not resident populates it through the cache's [`ChunkPopulator`],
/// with resources leased from the cache's [`ResourceStash`].
/// Concurrent requests for the same key share a single populate.
/// Keys outside of the bounds always yield the exterior value, without populating.
///
/// Cloning a cache is cheap, all clones share the same entries.
/// Build one with a [`ChunkCacheBuilder`](super::ChunkCacheBuilder).
pub struct ChunkCache<T, const D: usize = 3> {
	pub(super) inner: Arc<Inner<T, D>>,
}

pub(super) struct Inner<T, const D: usize> {
	pub bounds: StageBounds<D>,
	pub exterior: ChunkRef<T>,
	pub modifying_throws: bool,
	pub populator: Arc<dyn ChunkPopulator<T, D>>,
	pub stash: ResourceStash<T>,
	/// The number of resident chunks above which chunks are evicted.
	pub capacity: usize,
	shards: Vec<Shard<T, D>>,
	hasher: RandomState,
	/// Source of access ordinals for least-recently-used eviction.
	clock: AtomicU64,
	next_populate_id: AtomicU64,
	pub resident: AtomicUsize,
	/// Tracks populate tasks, closed when the cache completes.
	tracker: TaskTracker,
	pub counters: Counters,
}

impl<T, const D: usize> Clone for ChunkCache<T, D> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T, const D: usize> std::fmt::Debug for ChunkCache<T, D> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChunkCache")
			.field("bounds", &self.inner.bounds)
			.field("capacity", &self.inner.capacity)
			.field("resident", &self.inner.resident.load(Ordering::Relaxed))
			.field("stash", &self.inner.stash)
			.finish()
	}
}

impl<T, const D: usize> ChunkCache<T, D>
where
	T: Send + Sync + 'static,
{
	pub(super) fn new(
		bounds: StageBounds<D>,
		exterior_value: T,
		modifying_throws: bool,
		populator: Arc<dyn ChunkPopulator<T, D>>,
		stash: ResourceStash<T>,
		capacity: usize,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				bounds,
				exterior: ChunkRef::new(Leased::unpooled(exterior_value)),
				modifying_throws,
				populator,
				stash,
				capacity,
				shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
				hasher: RandomState::new(),
				clock: AtomicU64::new(0),
				next_populate_id: AtomicU64::new(0),
				resident: AtomicUsize::new(0),
				tracker: TaskTracker::new(),
				counters: Counters::default(),
			}),
		}
	}

	pub fn bounds(&self) -> &StageBounds<D> {
		&self.inner.bounds
	}

	/// The handle yielded for every key outside of the bounds.
	pub fn exterior_value(&self) -> &ChunkRef<T> {
		&self.inner.exterior
	}

	pub fn capacity(&self) -> usize {
		self.inner.capacity
	}

	pub fn stash(&self) -> &ResourceStash<T> {
		&self.inner.stash
	}

	/// A view of this cache which can only read chunks.
	pub fn as_read_only(&self) -> ReadOnlyChunkCache<T, D> {
		ReadOnlyChunkCache::new(self.clone())
	}

	pub async fn get(&self, key: ChunkKey<D>) -> Result<ChunkRef<T>> {
		self.get_with_cancellation(key, CancellationToken::new()).await
	}

	/// Gets the chunk at `key`, populating it if it is not resident.
	///
	/// Canceling only stops this caller's wait (resulting in [`Error::Canceled`]).
	/// The populate itself is canceled once every caller waiting on it has canceled or been dropped.
	/// A canceled populate still runs until its populator returns, and the key becomes absent once it has.
	/// Getting the key before then starts a new populate which waits for the canceled one to finish.
	pub async fn get_with_cancellation(
		&self,
		key: ChunkKey<D>,
		cancellation: CancellationToken,
	) -> Result<ChunkRef<T>> {
		if !self.inner.bounds.contains(&key) {
			return Ok(self.inner.exterior.clone());
		}
		if cancellation.is_cancelled() {
			return Err(Error::Canceled);
		}
		let (id, future) = match self.lookup_or_populate(key)? {
			Lookup::Resident(chunk) => return Ok(chunk),
			Lookup::Populating { id, future } => (id, future),
		};
		let _waiter = Waiter {
			inner: &self.inner,
			key,
			id,
		};
		tokio::select! {
			biased;
			_ = cancellation.cancelled() => Err(Error::Canceled),
			result = future => result,
		}
	}

	/// Finds the chunk if it is resident, or joins (or starts) its populate.
	fn lookup_or_populate(&self, key: ChunkKey<D>) -> Result<Lookup<T>> {
		let mut shard = self.inner.shard(&key);
		match shard.entry(key) {
			Entry::Occupied(mut entry) => match entry.get_mut() {
				Slot::Resident(resident) => {
					resident.last_access = self.inner.tick();
					Counters::increment(&self.inner.counters.hits);
					log::trace!(target: LOG, "Chunk {} is resident", key);
					Ok(Lookup::Resident(resident.chunk.clone()))
				}
				Slot::Populating(flight) if flight.cancellation.is_cancelled() => {
					self.ensure_open(&key)?;
					Counters::increment(&self.inner.counters.misses);
					*flight = self.start_populate(key, Some(flight.future.clone()));
					Ok(Lookup::Populating {
						id: flight.id,
						future: flight.future.clone(),
					})
				}
				Slot::Populating(flight) => {
					flight.waiters += 1;
					Ok(Lookup::Populating {
						id: flight.id,
						future: flight.future.clone(),
					})
				}
			},
			Entry::Vacant(entry) => {
				self.ensure_open(&key)?;
				Counters::increment(&self.inner.counters.misses);
				let flight = self.start_populate(key, None);
				let lookup = Lookup::Populating {
					id: flight.id,
					future: flight.future.clone(),
				};
				entry.insert(Slot::Populating(flight));
				Ok(lookup)
			}
		}
	}

	fn ensure_open(&self, key: &ChunkKey<D>) -> Result<()> {
		if self.inner.tracker.is_closed() {
			return Err(Error::InvalidOperation(format!(
				"cannot populate chunk {} after the cache has completed",
				key
			)));
		}
		Ok(())
	}

	/// Spawns the populate task for a key. Called with the key's shard locked,
	/// so the task cannot complete before its slot is inserted.
	///
	/// `previous` is the canceled populate of the same key which is still running.
	/// The new populate does not start until it has finished.
	fn start_populate(&self, key: ChunkKey<D>, previous: Option<PopulateFuture<T>>) -> Flight<T> {
		let id = self.inner.next_populate_id.fetch_add(1, Ordering::Relaxed);
		let cancellation = CancellationToken::new();
		let task = self.inner.tracker.spawn({
			let cache = self.clone();
			let cancellation = cancellation.clone();
			async move { cache.populate(key, id, cancellation, previous).await }
		});
		let future = task
			.map(move |joined| match joined {
				Ok(result) => result,
				Err(error) => Err(Error::population(
					key,
					anyhow::anyhow!("populate task failed: {}", error),
				)),
			})
			.boxed()
			.shared();
		Flight {
			id,
			future,
			waiters: 1,
			cancellation,
		}
	}

	/// Runs the populator to completion, even once canceled,
	/// so the leased resources always come back from it whole.
	async fn populate(
		self,
		key: ChunkKey<D>,
		id: u64,
		cancellation: CancellationToken,
		previous: Option<PopulateFuture<T>>,
	) -> Result<ChunkRef<T>> {
		if let Some(previous) = previous {
			// Only ever resolves to the canceled populate's error.
			let _ = previous.await;
		}
		let outcome = match cancellation.is_cancelled() {
			true => Err(Error::Canceled),
			false => {
				log::debug!(target: LOG, "Populating chunk {}", key);
				let mut resources = self.inner.stash.lease();
				let result = AssertUnwindSafe(self.inner.populator.populate(
					key,
					&mut *resources,
					cancellation.clone(),
				))
				.catch_unwind()
				.await;
				match result {
					Ok(Ok(())) => Ok(resources),
					Ok(Err(error)) => Err(Error::population(key, error)),
					Err(_panic) => Err(Error::population(key, anyhow::anyhow!("populator panicked"))),
				}
			}
		};
		let chunk = self.inner.finish_populate(key, id, outcome)?;
		self.evict_excess().await;
		Ok(chunk)
	}

	/// Applies `mutator` to the chunk at `key` (populating it first if needed) and marks it dirty.
	///
	/// Keys outside of the bounds fail with [`Error::InvalidOperation`] if the cache was built
	/// to throw on exterior modifications, and are otherwise left untouched.
	pub async fn modify<F>(&self, key: ChunkKey<D>, mutator: F) -> Result<()>
	where
		F: FnOnce(&mut T) + Send,
	{
		self.modify_with_cancellation(key, CancellationToken::new(), mutator)
			.await
	}

	pub async fn modify_with_cancellation<F>(
		&self,
		key: ChunkKey<D>,
		cancellation: CancellationToken,
		mutator: F,
	) -> Result<()>
	where
		F: FnOnce(&mut T) + Send,
	{
		if !self.inner.bounds.contains(&key) {
			if self.inner.modifying_throws {
				return Err(Error::InvalidOperation(format!(
					"cannot modify chunk {}, it is outside of the stage bounds",
					key
				)));
			}
			log::trace!(target: LOG, "Ignoring modification of exterior chunk {}", key);
			return Ok(());
		}
		let chunk = self.get_with_cancellation(key, cancellation).await?;
		let mut resources = chunk.write().await;
		mutator(&mut *resources);
		self.inner.mark_dirty(&key, &chunk)
	}

	/// Persists every dirty chunk through the populator.
	///
	/// Chunks which were not modified again while being persisted become clean.
	/// Every dirty chunk is attempted, the first failure is returned.
	pub async fn flush(&self) -> Result<()> {
		let dirty = self.inner.dirty_chunks();
		let count = dirty.len();
		let mut first_error = None;
		for (key, chunk, version) in dirty {
			match self.persist_chunk(key, &chunk).await {
				Ok(()) => self.inner.mark_clean(&key, version),
				Err(error) => {
					log::warn!(target: LOG, "Failed to flush chunk {}: {:?}", key, error);
					first_error.get_or_insert(error);
				}
			}
		}
		if count > 0 {
			log::debug!(target: LOG, "Flushed {} dirty chunks", count);
		}
		first_error.map_or(Ok(()), Err)
	}

	pub(super) async fn persist_chunk(&self, key: ChunkKey<D>, chunk: &ChunkRef<T>) -> Result<()> {
		let resources = chunk.read().await;
		self.inner
			.populator
			.persist(key, &*resources)
			.await
			.map_err(|error| Error::persistence(key, error))
	}

	/// Drops the resident chunk at `key`, discarding any unflushed modifications.
	/// Its resources return to the stash once no handle pins them.
	///
	/// Returns false if the key was not resident (populating chunks are left alone).
	pub fn remove(&self, key: &ChunkKey<D>) -> bool {
		let mut shard = self.inner.shard(key);
		if !matches!(shard.get(key), Some(Slot::Resident(_))) {
			return false;
		}
		shard.remove(key);
		self.inner.resident.fetch_sub(1, Ordering::Relaxed);
		true
	}

	/// Removes every resident chunk which is not dirty, returning how many were removed.
	pub fn clear(&self) -> usize {
		let mut removed = 0;
		for shard in self.inner.shards.iter() {
			let mut slots = lock(shard);
			let before = slots.len();
			slots.retain(|_, slot| !matches!(slot, Slot::Resident(resident) if !resident.dirty));
			removed += before - slots.len();
		}
		self.inner.resident.fetch_sub(removed, Ordering::Relaxed);
		log::debug!(target: LOG, "Cleared {} chunks", removed);
		removed
	}

	pub fn stats(&self) -> CacheStats {
		let mut stats = CacheStats::default();
		for shard in self.inner.shards.iter() {
			for slot in lock(shard).values() {
				match slot {
					Slot::Populating(_) => stats.populating += 1,
					Slot::Resident(resident) => {
						stats.resident += 1;
						if resident.dirty {
							stats.dirty += 1;
						}
					}
				}
			}
		}
		self.inner.counters.fill(&mut stats);
		stats
	}

	/// Finishes the cache: no new populates may start, in flight populates are awaited,
	/// dirty chunks are flushed and the stash releases its pooled resources.
	///
	/// Resident chunks can still be read afterwards. Completing again only re-flushes.
	pub async fn complete_and_await(&self) -> Result<()> {
		self.inner.tracker.close();
		self.inner.tracker.wait().await;
		self.flush().await?;
		self.inner.stash.clear();
		log::debug!(target: LOG, "Completed chunk cache");
		Ok(())
	}
}

impl<T, const D: usize> AsyncCompletable for ChunkCache<T, D>
where
	T: Send + Sync + 'static,
{
	fn complete_and_await(&self) -> BoxFuture<'_, Result<()>> {
		ChunkCache::complete_and_await(self).boxed()
	}
}

fn lock<S>(shard: &Mutex<S>) -> MutexGuard<'_, S> {
	// Slots are only ever replaced whole, a panic elsewhere cannot leave a shard half-updated.
	shard.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, const D: usize> Inner<T, D> {
	pub fn shard(&self, key: &ChunkKey<D>) -> MutexGuard<'_, HashMap<ChunkKey<D>, Slot<T>>> {
		let index = (self.hasher.hash_one(key) as usize) % SHARD_COUNT;
		lock(&self.shards[index])
	}

	pub fn shards(&self) -> impl Iterator<Item = MutexGuard<'_, HashMap<ChunkKey<D>, Slot<T>>>> {
		self.shards.iter().map(lock)
	}

	pub fn tick(&self) -> u64 {
		self.clock.fetch_add(1, Ordering::Relaxed)
	}

	/// Makes the populated chunk resident, or forgets the key if the populate failed.
	/// If the populate was canceled in the meantime, its result is discarded.
	fn finish_populate(
		&self,
		key: ChunkKey<D>,
		id: u64,
		outcome: Result<Leased<T>>,
	) -> Result<ChunkRef<T>> {
		let mut shard = self.shard(&key);
		let canceled = match shard.get(&key) {
			Some(Slot::Populating(flight)) if flight.id == id => flight.cancellation.is_cancelled(),
			// A newer populate of the key replaced this one, it owns the slot now.
			_ => {
				log::debug!(target: LOG, "Discarding replaced populate of chunk {}", key);
				return Err(Error::Canceled);
			}
		};
		if canceled {
			shard.remove(&key);
			log::debug!(target: LOG, "Discarding canceled populate of chunk {}", key);
			return Err(Error::Canceled);
		}
		match outcome {
			Ok(resources) => {
				let chunk = ChunkRef::new(resources);
				let resident = Resident::new(chunk.clone(), self.tick());
				shard.insert(key, Slot::Resident(resident));
				self.resident.fetch_add(1, Ordering::Relaxed);
				Counters::increment(&self.counters.populations);
				log::debug!(target: LOG, "Populated chunk {}", key);
				Ok(chunk)
			}
			Err(error) => {
				shard.remove(&key);
				log::debug!(target: LOG, "Failed to populate chunk {}: {:?}", key, error);
				Err(error)
			}
		}
	}

	/// Called when a waiter stops waiting on a populate, for any reason.
	fn leave(&self, key: &ChunkKey<D>, id: u64) {
		let mut shard = self.shard(key);
		let Some(Slot::Populating(flight)) = shard.get_mut(key) else {
			return;
		};
		if flight.id != id {
			return;
		}
		flight.waiters -= 1;
		if flight.waiters == 0 {
			// The slot stays until the populate task finishes, so no second populate of the key can overlap it.
			flight.cancellation.cancel();
			log::debug!(target: LOG, "Canceled populate of chunk {}, nothing is waiting on it", key);
		}
	}

	fn mark_dirty(&self, key: &ChunkKey<D>, chunk: &ChunkRef<T>) -> Result<()> {
		let tick = self.tick();
		let mut shard = self.shard(key);
		match shard.get_mut(key) {
			Some(Slot::Resident(resident)) if ChunkRef::ptr_eq(&resident.chunk, chunk) => {
				resident.version += 1;
				resident.dirty = true;
				resident.last_access = tick;
				Ok(())
			}
			_ => Err(Error::InvalidOperation(format!(
				"chunk {} was removed while it was being modified",
				key
			))),
		}
	}

	pub fn mark_clean(&self, key: &ChunkKey<D>, version: u64) {
		let mut shard = self.shard(key);
		if let Some(Slot::Resident(resident)) = shard.get_mut(key) {
			if resident.version == version {
				resident.dirty = false;
			}
		}
	}

	fn dirty_chunks(&self) -> Vec<(ChunkKey<D>, ChunkRef<T>, u64)> {
		let mut dirty = Vec::new();
		for slots in self.shards() {
			for (key, slot) in slots.iter() {
				if let Slot::Resident(resident) = slot {
					if resident.dirty {
						dirty.push((*key, resident.chunk.clone(), resident.version));
					}
				}
			}
		}
		dirty.sort_by_key(|(key, _, _)| *key);
		dirty
	}
}

/// Leaves the populate a caller was waiting on, whether it finished, canceled or was dropped.
struct Waiter<'a, T, const D: usize> {
	inner: &'a Inner<T, D>,
	key: ChunkKey<D>,
	id: u64,
}

impl<'a, T, const D: usize> Drop for Waiter<'a, T, D> {
	fn drop(&mut self) {
		self.inner.leave(&self.key, self.id);
	}
}
