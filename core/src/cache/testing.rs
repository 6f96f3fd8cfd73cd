use super::{ChunkCache, ChunkCacheBuilder};
use crate::{
	index::{ChunkKey3D, StageBounds},
	populator::ChunkPopulator,
	resources::ChunkResources,
	stash::ResourceStash,
};
use futures::future::{BoxFuture, FutureExt};
use std::{
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};
use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;

/// Fills each 4 byte grid with the x component of its key, and records what was asked of it.
pub struct TestPopulator {
	populates: AtomicUsize,
	/// When set, every populate waits for a permit before doing anything.
	gate: Option<Semaphore>,
	failures: AtomicUsize,
	panics: AtomicBool,
	fail_persists: AtomicBool,
	/// When set, every persist waits for a permit from `persist_gate`.
	hold_persists: AtomicBool,
	persist_gate: Semaphore,
	persist_started: Notify,
	persisted: Mutex<Vec<ChunkKey3D>>,
}

impl TestPopulator {
	fn new(gate: Option<Semaphore>) -> Self {
		Self {
			populates: AtomicUsize::new(0),
			gate,
			failures: AtomicUsize::new(0),
			panics: AtomicBool::new(false),
			fail_persists: AtomicBool::new(false),
			hold_persists: AtomicBool::new(false),
			persist_gate: Semaphore::new(0),
			persist_started: Notify::new(),
			persisted: Mutex::new(Vec::new()),
		}
	}

	/// Lets `count` more gated populates through.
	pub fn open(&self, count: usize) {
		if let Some(gate) = &self.gate {
			gate.add_permits(count);
		}
	}

	pub fn populates(&self) -> usize {
		self.populates.load(Ordering::SeqCst)
	}

	pub fn persisted(&self) -> Vec<ChunkKey3D> {
		self.persisted.lock().unwrap().clone()
	}

	/// Makes the next `count` populates fail.
	pub fn fail_populates(&self, count: usize) {
		self.failures.store(count, Ordering::SeqCst);
	}

	pub fn panic_populates(&self, panics: bool) {
		self.panics.store(panics, Ordering::SeqCst);
	}

	pub fn fail_persists(&self, fail: bool) {
		self.fail_persists.store(fail, Ordering::SeqCst);
	}

	/// Makes persists wait until [`release_persists`](Self::release_persists) lets them through.
	pub fn hold_persists(&self) {
		self.hold_persists.store(true, Ordering::SeqCst);
	}

	pub fn release_persists(&self, count: usize) {
		self.persist_gate.add_permits(count);
	}

	/// Resolves once a held persist has started.
	pub async fn persist_started(&self) {
		self.persist_started.notified().await;
	}
}

impl ChunkPopulator<Vec<u8>, 3> for TestPopulator {
	fn populate<'a>(
		&'a self,
		key: ChunkKey3D,
		resources: &'a mut Vec<u8>,
		cancellation: CancellationToken,
	) -> BoxFuture<'a, anyhow::Result<()>> {
		async move {
			self.populates.fetch_add(1, Ordering::SeqCst);
			if let Some(gate) = &self.gate {
				tokio::select! {
					_ = cancellation.cancelled() => anyhow::bail!("generating {} was canceled", key),
					permit = gate.acquire() => permit?.forget(),
				}
			}
			if self.panics.load(Ordering::SeqCst) {
				panic!("populator exploded while generating {}", key);
			}
			let failing = self
				.failures
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1));
			if failing.is_ok() {
				anyhow::bail!("generating {} failed", key);
			}
			resources.fill(key.x() as u8);
			Ok(())
		}
		.boxed()
	}

	fn persist<'a>(&'a self, key: ChunkKey3D, _resources: &'a Vec<u8>) -> BoxFuture<'a, anyhow::Result<()>> {
		async move {
			if self.hold_persists.load(Ordering::SeqCst) {
				self.persist_started.notify_one();
				self.persist_gate.acquire().await?.forget();
			}
			if self.fail_persists.load(Ordering::SeqCst) {
				anyhow::bail!("store is unavailable");
			}
			self.persisted.lock().unwrap().push(key);
			Ok(())
		}
		.boxed()
	}
}

fn build(capacity: usize, populator: TestPopulator) -> (ChunkCache<Vec<u8>>, Arc<TestPopulator>) {
	let populator = Arc::new(populator);
	let stash = ResourceStash::new(capacity * 2, || vec![0u8; 4], |grid: &mut Vec<u8>| grid.reset()).unwrap();
	let bounds = StageBounds::new(ChunkKey3D::zero(), ChunkKey3D::splat(4)).unwrap();
	let cache = ChunkCacheBuilder::new()
		.with_finite_bounds(bounds, vec![u8::MAX; 4], true)
		.with_populator(populator.clone())
		.with_resource_stash(stash, capacity)
		.unwrap()
		.build()
		.unwrap();
	(cache, populator)
}

/// A 4x4x4 stage cache holding up to `capacity` chunks.
pub fn cache(capacity: usize) -> (ChunkCache<Vec<u8>>, Arc<TestPopulator>) {
	build(capacity, TestPopulator::new(None))
}

/// Like [`cache`], but populates wait until [`TestPopulator::open`] lets them through.
pub fn gated_cache(capacity: usize) -> (ChunkCache<Vec<u8>>, Arc<TestPopulator>) {
	build(capacity, TestPopulator::new(Some(Semaphore::new(0))))
}

/// Waits until no populate of the cache is in flight, including canceled ones which are still winding down.
pub async fn settled(cache: &ChunkCache<Vec<u8>>) {
	let settling = async {
		while cache.stats().populating > 0 {
			tokio::task::yield_now().await;
		}
	};
	if tokio::time::timeout(Duration::from_secs(5), settling).await.is_err() {
		panic!("populates did not settle: {:?}", cache.stats());
	}
}
