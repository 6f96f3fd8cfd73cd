use super::{ChunkEntity, ChunkStore, LOG};
use crate::index::ChunkKey;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Keeps serialized chunks in memory. Useful for tests and for stages that are never saved.
pub struct MemoryStore<const D: usize> {
	entities: RwLock<HashMap<ChunkKey<D>, Vec<u8>>>,
}

impl<const D: usize> Default for MemoryStore<D> {
	fn default() -> Self {
		Self {
			entities: RwLock::new(HashMap::new()),
		}
	}
}

impl<const D: usize> MemoryStore<D> {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.entities.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entities.read().await.is_empty()
	}

	pub async fn contains(&self, key: &ChunkKey<D>) -> bool {
		self.entities.read().await.contains_key(key)
	}
}

impl<const D: usize> ChunkStore<D> for MemoryStore<D> {
	fn get(&self, key: ChunkKey<D>) -> BoxFuture<'_, anyhow::Result<Option<ChunkEntity<D>>>> {
		async move {
			let entities = self.entities.read().await;
			Ok(entities
				.get(&key)
				.map(|data| ChunkEntity::new(key, data.clone())))
		}
		.boxed()
	}

	fn add_or_update(&self, entity: ChunkEntity<D>) -> BoxFuture<'_, anyhow::Result<()>> {
		async move {
			log::trace!(target: LOG, "Storing chunk {} in memory", entity.key);
			self.entities.write().await.insert(entity.key, entity.data);
			Ok(())
		}
		.boxed()
	}

	fn remove(&self, key: ChunkKey<D>) -> BoxFuture<'_, anyhow::Result<bool>> {
		async move { Ok(self.entities.write().await.remove(&key).is_some()) }.boxed()
	}
}

#[cfg(test)]
mod memory_store {
	use super::*;
	use crate::index::ChunkKey3D;

	#[tokio::test]
	async fn add_get_remove() -> anyhow::Result<()> {
		let store = MemoryStore::new();
		let key = ChunkKey3D::new(1, 2, 3);
		assert_eq!(store.get(key).await?, None);

		store.add_or_update(ChunkEntity::new(key, vec![1, 2])).await?;
		store.add_or_update(ChunkEntity::new(key, vec![3])).await?;
		assert_eq!(store.get(key).await?, Some(ChunkEntity::new(key, vec![3])));
		assert_eq!(store.len().await, 1);

		assert!(store.remove(key).await?);
		assert!(!store.remove(key).await?);
		assert!(store.is_empty().await);
		Ok(())
	}
}
