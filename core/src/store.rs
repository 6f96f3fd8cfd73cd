//! Persistent storage of serialized chunks.

use crate::index::ChunkKey;
use futures::future::BoxFuture;

/// The log category for chunk stores.
static LOG: &'static str = "chunk-store";

mod entity;
pub use entity::*;

mod memory;
pub use memory::*;

mod directory;
pub use directory::*;

/// A keyed store of serialized chunks.
///
/// Must be safe to call concurrently for distinct keys.
pub trait ChunkStore<const D: usize>: Send + Sync + 'static {
	/// Returns the stored entity for the key, or None if nothing has been stored for it.
	fn get(&self, key: ChunkKey<D>) -> BoxFuture<'_, anyhow::Result<Option<ChunkEntity<D>>>>;

	fn add_or_update(&self, entity: ChunkEntity<D>) -> BoxFuture<'_, anyhow::Result<()>>;

	/// Returns true if there was an entity to remove.
	fn remove(&self, key: ChunkKey<D>) -> BoxFuture<'_, anyhow::Result<bool>>;
}
