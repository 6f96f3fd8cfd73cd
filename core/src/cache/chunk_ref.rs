use crate::stash::Leased;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockMappedWriteGuard, RwLockReadGuard, RwLockWriteGuard};

/// A shared handle to the resources of one chunk.
///
/// Every waiter of a populate receives a clone of the same handle.
/// While any handle (other than the cache's own) exists, the chunk is pinned and will not be evicted.
/// Once the chunk has left the cache and the last handle is dropped,
/// the resources go back to the stash they were leased from.
pub struct ChunkRef<T> {
	lock: Arc<RwLock<Leased<T>>>,
}

impl<T> Clone for ChunkRef<T> {
	fn clone(&self) -> Self {
		Self {
			lock: self.lock.clone(),
		}
	}
}

impl<T> ChunkRef<T> {
	pub(crate) fn new(resources: Leased<T>) -> Self {
		Self {
			lock: Arc::new(RwLock::new(resources)),
		}
	}

	/// Returns true if both handles refer to the same chunk resources.
	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.lock, &b.lock)
	}

	pub async fn read(&self) -> RwLockReadGuard<'_, T> {
		RwLockReadGuard::map(self.lock.read().await, |leased| &**leased)
	}

	/// Reads the resources if no modification is in progress.
	pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
		let guard = self.lock.try_read().ok()?;
		Some(RwLockReadGuard::map(guard, |leased| &**leased))
	}

	pub(crate) async fn write(&self) -> RwLockMappedWriteGuard<'_, T> {
		RwLockWriteGuard::map(self.lock.write().await, |leased| &mut **leased)
	}

	/// True when a handle other than `self` exists.
	pub(crate) fn is_pinned(&self) -> bool {
		Arc::strong_count(&self.lock) > 1
	}
}

impl<T> std::fmt::Debug for ChunkRef<T>
where
	T: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.lock.try_read() {
			Ok(leased) => write!(f, "ChunkRef({:?})", &**leased),
			Err(_) => write!(f, "ChunkRef(<locked>)"),
		}
	}
}

#[cfg(test)]
mod chunk_ref {
	use super::*;
	use crate::stash::ResourceStash;

	#[tokio::test]
	async fn last_handle_returns_to_stash() {
		let stash = ResourceStash::new(2, || vec![0u8; 4], |grid| grid.fill(0)).unwrap();
		let chunk = ChunkRef::new(stash.lease());
		let other = chunk.clone();
		assert!(ChunkRef::ptr_eq(&chunk, &other));
		assert!(chunk.is_pinned());

		chunk.write().await[0] = 9;
		assert_eq!(other.read().await[0], 9);

		drop(other);
		assert!(!chunk.is_pinned());
		assert_eq!(stash.pooled_count(), 0);
		drop(chunk);
		assert_eq!(stash.pooled_count(), 1);
		assert_eq!(*stash.lease(), vec![0u8; 4]);
	}

	#[tokio::test]
	async fn try_read_fails_while_writing() {
		let chunk = ChunkRef::new(Leased::unpooled(5u32));
		let guard = chunk.write().await;
		assert!(chunk.try_read().is_none());
		drop(guard);
		assert_eq!(chunk.try_read().map(|value| *value), Some(5));
	}
}
