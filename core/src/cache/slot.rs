use super::ChunkRef;
use crate::Result;
use futures::future::{BoxFuture, Shared};
use tokio_util::sync::CancellationToken;

/// The outcome of one populate, shared by every waiter coalesced on it.
pub(super) type PopulateFuture<T> = Shared<BoxFuture<'static, Result<ChunkRef<T>>>>;

/// The state of a key which has an entry in the cache.
/// Keys without an entry are absent.
pub(super) enum Slot<T> {
	Populating(Flight<T>),
	Resident(Resident<T>),
}

/// A populate in flight.
pub(super) struct Flight<T> {
	/// Distinguishes this populate from any later populate of the same key.
	pub id: u64,
	pub future: PopulateFuture<T>,
	/// The number of callers awaiting `future`. The populate is canceled when this reaches zero.
	pub waiters: usize,
	pub cancellation: CancellationToken,
}

pub(super) struct Resident<T> {
	pub chunk: ChunkRef<T>,
	pub dirty: bool,
	/// Incremented by every modification, so a persist can tell if it saved the latest contents.
	pub version: u64,
	pub last_access: u64,
}

impl<T> Resident<T> {
	pub fn new(chunk: ChunkRef<T>, last_access: u64) -> Self {
		Self {
			chunk,
			dirty: false,
			version: 0,
			last_access,
		}
	}
}

/// What a lookup found (or started) for a key.
pub(super) enum Lookup<T> {
	Resident(ChunkRef<T>),
	Populating { id: u64, future: PopulateFuture<T> },
}
