use super::{ChunkCache, ChunkRef, Counters, Slot, LOG};
use crate::index::ChunkKey;
use std::sync::atomic::Ordering;

/// The least recently used chunk which may be evicted.
struct Victim<T, const D: usize> {
	key: ChunkKey<D>,
	/// Only held for dirty chunks, which must be persisted before they are evicted.
	chunk: Option<ChunkRef<T>>,
	version: u64,
	last_access: u64,
}

impl<T, const D: usize> ChunkCache<T, D>
where
	T: Send + Sync + 'static,
{
	/// Evicts least recently used chunks until no more than `capacity` chunks are resident.
	///
	/// Pinned and populating chunks are never evicted. Clean chunks are evicted before dirty ones,
	/// and a dirty chunk is persisted before it is evicted. If that persist fails,
	/// the chunk stays resident and dirty, and eviction stops until the next populate.
	pub(super) async fn evict_excess(&self) {
		let mut attempts = self.inner.resident.load(Ordering::Relaxed);
		while self.inner.resident.load(Ordering::Relaxed) > self.inner.capacity && attempts > 0 {
			attempts -= 1;
			let Some(victim) = self.find_victim() else {
				log::trace!(target: LOG, "Cache is over capacity, but every resident chunk is pinned");
				break;
			};
			if let Some(chunk) = victim.chunk {
				if let Err(error) = self.persist_chunk(victim.key, &chunk).await {
					Counters::increment(&self.inner.counters.eviction_failures);
					log::warn!(
						target: LOG,
						"Failed to persist chunk {} for eviction, keeping it resident: {:?}",
						victim.key,
						error
					);
					break;
				}
				// Saved even if the chunk gets pinned (and so kept) before it can be evicted.
				self.inner.mark_clean(&victim.key, victim.version);
			}
			self.try_evict(&victim.key, victim.version);
		}
	}

	fn find_victim(&self) -> Option<Victim<T, D>> {
		profiling::scope!("find-eviction-victim");
		let mut clean: Option<Victim<T, D>> = None;
		let mut dirty: Option<Victim<T, D>> = None;
		for slots in self.inner.shards() {
			for (key, slot) in slots.iter() {
				let Slot::Resident(resident) = slot else {
					continue;
				};
				if resident.chunk.is_pinned() {
					continue;
				}
				let best = if resident.dirty { &mut dirty } else { &mut clean };
				let older = best
					.as_ref()
					.map_or(true, |victim| resident.last_access < victim.last_access);
				if older {
					*best = Some(Victim {
						key: *key,
						chunk: resident.dirty.then(|| resident.chunk.clone()),
						version: resident.version,
						last_access: resident.last_access,
					});
				}
			}
		}
		clean.or(dirty)
	}

	/// Removes the chunk if it is still unpinned and unmodified since it was chosen.
	fn try_evict(&self, key: &ChunkKey<D>, version: u64) -> bool {
		let mut shard = self.inner.shard(key);
		let evictable = matches!(
			shard.get(key),
			Some(Slot::Resident(resident)) if resident.version == version && !resident.chunk.is_pinned()
		);
		if !evictable {
			return false;
		}
		shard.remove(key);
		self.inner.resident.fetch_sub(1, Ordering::Relaxed);
		Counters::increment(&self.inner.counters.evictions);
		log::debug!(target: LOG, "Evicted chunk {}", key);
		true
	}
}
