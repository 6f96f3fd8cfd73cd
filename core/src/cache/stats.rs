use std::sync::atomic::{AtomicU64, Ordering};

/// A point-in-time summary of a [`ChunkCache`](super::ChunkCache).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CacheStats {
	/// Chunks held in memory, including dirty ones.
	pub resident: usize,
	/// Resident chunks modified since they were last persisted.
	pub dirty: usize,
	pub populating: usize,
	pub hits: u64,
	pub misses: u64,
	/// Populates which completed and became resident.
	pub populations: u64,
	pub evictions: u64,
	/// Evictions aborted because persisting a dirty chunk failed.
	pub eviction_failures: u64,
}

#[derive(Default)]
pub(super) struct Counters {
	pub hits: AtomicU64,
	pub misses: AtomicU64,
	pub populations: AtomicU64,
	pub evictions: AtomicU64,
	pub eviction_failures: AtomicU64,
}

impl Counters {
	pub fn increment(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub fn fill(&self, stats: &mut CacheStats) {
		stats.hits = self.hits.load(Ordering::Relaxed);
		stats.misses = self.misses.load(Ordering::Relaxed);
		stats.populations = self.populations.load(Ordering::Relaxed);
		stats.evictions = self.evictions.load(Ordering::Relaxed);
		stats.eviction_failures = self.eviction_failures.load(Ordering::Relaxed);
	}
}
