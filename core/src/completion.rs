//! Completion of the caches used by a generation phase, so the next phase only reads persisted chunks.

use crate::Result;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::sync::Arc;

/// Something which can be finished: no new work is accepted,
/// outstanding work is awaited and pending writes are flushed.
pub trait AsyncCompletable: Send + Sync {
	/// Completes and waits until everything outstanding is done. Completing twice is harmless.
	fn complete_and_await(&self) -> BoxFuture<'_, Result<()>>;
}

impl<C> AsyncCompletable for Arc<C>
where
	C: AsyncCompletable + ?Sized,
{
	fn complete_and_await(&self) -> BoxFuture<'_, Result<()>> {
		(**self).complete_and_await()
	}
}

/// Completes many completables (typically every cache of a stage) at once.
#[derive(Default)]
pub struct AggregateCompletable {
	members: Vec<Box<dyn AsyncCompletable>>,
}

impl AggregateCompletable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with<C>(mut self, member: C) -> Self
	where
		C: AsyncCompletable + 'static,
	{
		self.push(member);
		self
	}

	pub fn push<C>(&mut self, member: C)
	where
		C: AsyncCompletable + 'static,
	{
		self.members.push(Box::new(member));
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

impl<C> FromIterator<C> for AggregateCompletable
where
	C: AsyncCompletable + 'static,
{
	fn from_iter<I: IntoIterator<Item = C>>(members: I) -> Self {
		let mut aggregate = Self::new();
		for member in members {
			aggregate.push(member);
		}
		aggregate
	}
}

impl AsyncCompletable for AggregateCompletable {
	/// Completes every member concurrently. All members are awaited even if one fails,
	/// the first failure (in member order) is returned.
	fn complete_and_await(&self) -> BoxFuture<'_, Result<()>> {
		async move {
			let results = join_all(self.members.iter().map(|member| member.complete_and_await())).await;
			results.into_iter().collect::<Result<Vec<()>>>()?;
			Ok(())
		}
		.boxed()
	}
}
