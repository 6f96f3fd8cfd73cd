use super::stash::Pool;
use std::{
	ops::{Deref, DerefMut},
	sync::Weak,
};

/// An item leased out of a [`ResourceStash`](super::ResourceStash).
///
/// Dropping the lease gives the item back to its stash (if the stash still exists).
pub struct Leased<T> {
	item: Option<T>,
	pool: Weak<Pool<T>>,
}

impl<T> Leased<T> {
	pub(super) fn new(item: T, pool: Weak<Pool<T>>) -> Self {
		Self {
			item: Some(item),
			pool,
		}
	}

	/// Wraps a value which does not belong to any stash. Dropping it drops the value.
	pub fn unpooled(item: T) -> Self {
		Self {
			item: Some(item),
			pool: Weak::new(),
		}
	}

	/// Takes the item out of the lease without returning it to the stash.
	pub fn detach(mut self) -> T {
		match self.item.take() {
			Some(item) => item,
			None => unreachable!("lease is only emptied when detached or dropped"),
		}
	}

	pub fn is_pooled(&self) -> bool {
		self.pool.strong_count() > 0
	}
}

impl<T> Deref for Leased<T> {
	type Target = T;
	fn deref(&self) -> &Self::Target {
		match self.item.as_ref() {
			Some(item) => item,
			None => unreachable!("lease is only emptied when detached or dropped"),
		}
	}
}

impl<T> DerefMut for Leased<T> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		match self.item.as_mut() {
			Some(item) => item,
			None => unreachable!("lease is only emptied when detached or dropped"),
		}
	}
}

impl<T> std::fmt::Debug for Leased<T>
where
	T: std::fmt::Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Leased")
			.field("item", &self.item)
			.field("pooled", &self.is_pooled())
			.finish()
	}
}

impl<T> Drop for Leased<T> {
	fn drop(&mut self) {
		if let (Some(item), Some(pool)) = (self.item.take(), self.pool.upgrade()) {
			pool.give_back(item);
		}
	}
}
