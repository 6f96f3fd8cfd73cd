//! Conversion of chunk resources to and from the bytes kept in a [`ChunkStore`](crate::store::ChunkStore).

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Turns chunk resources into bytes and back. Round trips must be exact.
pub trait Persister<T>: Send + Sync + 'static {
	fn serialize(&self, resources: &T) -> Result<Vec<u8>>;

	fn deserialize(&self, bytes: &[u8]) -> Result<T>;

	/// Deserializes into an existing (leased) instance, so its allocations may be reused.
	fn deserialize_into(&self, bytes: &[u8], resources: &mut T) -> Result<()> {
		*resources = self.deserialize(bytes)?;
		Ok(())
	}
}

/// Persists any serde-compatible resource with `bincode`.
pub struct BincodePersister<T> {
	_marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for BincodePersister<T> {
	fn default() -> Self {
		Self {
			_marker: Default::default(),
		}
	}
}

impl<T> BincodePersister<T> {
	pub fn new() -> Self {
		Self::default()
	}
}

impl<T> Persister<T> for BincodePersister<T>
where
	T: Serialize + DeserializeOwned + 'static,
{
	fn serialize(&self, resources: &T) -> Result<Vec<u8>> {
		Ok(bincode::serialize(resources)?)
	}

	fn deserialize(&self, bytes: &[u8]) -> Result<T> {
		Ok(bincode::deserialize(bytes)?)
	}
}
