use super::Leased;
use crate::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// The log category for resource pooling.
static LOG: &'static str = "resource-stash";

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
type Reset<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// A capacity-bounded pool of pre-constructed resources.
///
/// Resources are [`leased`](ResourceStash::lease) out and come back to the stash
/// when the [`Leased`] handle is dropped (or via [`give_back`](ResourceStash::give_back)).
/// The stash never holds more than `capacity` instances; any surplus returned is dropped.
///
/// Cloning a stash is cheap, all clones share the same pool.
pub struct ResourceStash<T> {
	pool: Arc<Pool<T>>,
}

pub(super) struct Pool<T> {
	items: Mutex<Vec<T>>,
	capacity: usize,
	factory: Factory<T>,
	/// Returns an item to a reusable state before it is pooled.
	reset: Reset<T>,
}

impl<T> Clone for ResourceStash<T> {
	fn clone(&self) -> Self {
		Self {
			pool: self.pool.clone(),
		}
	}
}

impl<T> std::fmt::Debug for ResourceStash<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"ResourceStash(pooled={}, capacity={})",
			self.pooled_count(),
			self.capacity()
		)
	}
}

impl<T> ResourceStash<T>
where
	T: Send + 'static,
{
	pub fn new<F, R>(capacity: usize, factory: F, reset: R) -> Result<Self>
	where
		F: Fn() -> T + Send + Sync + 'static,
		R: Fn(&mut T) + Send + Sync + 'static,
	{
		if capacity == 0 {
			return Err(Error::InvalidArgument(
				"resource stash capacity must be greater than zero".to_owned(),
			));
		}
		Ok(Self {
			pool: Arc::new(Pool {
				items: Mutex::new(Vec::with_capacity(capacity)),
				capacity,
				factory: Box::new(factory),
				reset: Box::new(reset),
			}),
		})
	}

	/// Takes an item out of the pool, or constructs a new one if the pool is empty.
	pub fn lease(&self) -> Leased<T> {
		let pooled = self.pool.items().pop();
		let item = match pooled {
			Some(item) => item,
			None => (self.pool.factory)(),
		};
		Leased::new(item, Arc::downgrade(&self.pool))
	}

	/// Resets the item and puts it back in the pool, or drops it if the pool is already full.
	pub fn give_back(&self, item: T) {
		self.pool.give_back(item);
	}

	/// Fills the pool with newly constructed items until it holds `min(count, capacity)` items.
	#[profiling::function]
	pub fn eager_fill(&self, count: usize) {
		let target = count.min(self.pool.capacity);
		let missing = target.saturating_sub(self.pooled_count());
		if missing == 0 {
			return;
		}
		// Construct outside of the lock, factories can be slow.
		let mut fresh = (0..missing).map(|_| (self.pool.factory)()).collect::<Vec<_>>();
		let mut items = self.pool.items();
		let room = target.saturating_sub(items.len());
		fresh.truncate(room);
		items.append(&mut fresh);
		log::debug!(target: LOG, "Eagerly filled stash to {} items", items.len());
	}

	/// Drops every pooled item.
	pub fn clear(&self) {
		let drained = std::mem::take(&mut *self.pool.items());
		log::debug!(target: LOG, "Released {} pooled items", drained.len());
	}
}

impl<T> ResourceStash<T> {
	pub fn pooled_count(&self) -> usize {
		self.pool.items().len()
	}

	pub fn capacity(&self) -> usize {
		self.pool.capacity
	}
}

impl<T> Pool<T> {
	fn items(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
		// The pool only ever pushes or pops whole items, so a panic elsewhere cannot leave it inconsistent.
		self.items.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub(super) fn give_back(&self, mut item: T) {
		(self.reset)(&mut item);
		let mut items = self.items();
		if items.len() < self.capacity {
			items.push(item);
		} else {
			drop(items);
			log::trace!(target: LOG, "Stash is full, discarding returned item");
		}
	}
}

#[cfg(test)]
mod resource_stash {
	use super::*;

	fn stash(capacity: usize) -> ResourceStash<Vec<u8>> {
		ResourceStash::new(capacity, || Vec::with_capacity(16), |buffer| buffer.clear()).unwrap()
	}

	#[test]
	fn zero_capacity_is_rejected() {
		let result = ResourceStash::new(0, || 0u8, |_| {});
		assert!(matches!(result, Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn lease_constructs_when_empty() {
		let stash = stash(2);
		let leased = stash.lease();
		assert!(leased.is_empty());
		assert_eq!(stash.pooled_count(), 0);
	}

	#[test]
	fn dropping_lease_returns_reset_item() {
		let stash = stash(2);
		{
			let mut leased = stash.lease();
			leased.extend_from_slice(&[1, 2, 3]);
		}
		assert_eq!(stash.pooled_count(), 1);
		let leased = stash.lease();
		assert!(leased.is_empty());
		assert!(leased.capacity() >= 16);
		assert_eq!(stash.pooled_count(), 0);
	}

	#[test]
	fn pool_never_exceeds_capacity() {
		let stash = stash(3);
		let leases = (0..10).map(|_| stash.lease()).collect::<Vec<_>>();
		drop(leases);
		assert_eq!(stash.pooled_count(), 3);
		for _ in 0..5 {
			stash.give_back(vec![9]);
			assert!(stash.pooled_count() <= stash.capacity());
		}
	}

	#[test]
	fn eager_fill_is_capped() {
		let stash = stash(4);
		stash.eager_fill(2);
		assert_eq!(stash.pooled_count(), 2);
		stash.eager_fill(100);
		assert_eq!(stash.pooled_count(), 4);
		stash.clear();
		assert_eq!(stash.pooled_count(), 0);
	}

	#[test]
	fn detached_items_are_not_returned() {
		let stash = stash(4);
		let item = stash.lease().detach();
		assert!(item.is_empty());
		assert_eq!(stash.pooled_count(), 0);
	}

	#[test]
	fn lease_outliving_stash_drops_quietly() {
		let stash = stash(1);
		let leased = stash.lease();
		drop(stash);
		drop(leased);
	}

	#[test]
	fn concurrent_leases_respect_capacity() {
		let stash = stash(8);
		let threads = (0..4)
			.map(|_| {
				let stash = stash.clone();
				std::thread::spawn(move || {
					for _ in 0..100 {
						let mut leased = stash.lease();
						leased.push(1);
					}
				})
			})
			.collect::<Vec<_>>();
		for thread in threads {
			thread.join().unwrap();
		}
		assert!(stash.pooled_count() <= stash.capacity());
		assert!(stash.pooled_count() > 0);
	}
}
