use super::ChunkPopulator;
use crate::{
	index::ChunkKey,
	persist::Persister,
	store::{ChunkEntity, ChunkStore},
};
use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The log category for chunk stores.
static LOG: &'static str = "chunk-store";

/// Loads chunks from a [`ChunkStore`], falling back to another populator for chunks that were never stored.
///
/// Chunks produced by the fallback are written back to the store (unless disabled via
/// [`with_persist_generated`](Self::with_persist_generated)), so the next populate of that key is a load.
/// Persisting modified chunks goes through the same persister and store.
pub struct ChunkStorePopulator<S, P, F> {
	store: Arc<S>,
	persister: P,
	fallback: F,
	persist_generated: bool,
}

impl<S, P, F> ChunkStorePopulator<S, P, F> {
	pub fn new(store: Arc<S>, persister: P, fallback: F) -> Self {
		Self {
			store,
			persister,
			fallback,
			persist_generated: true,
		}
	}

	pub fn with_persist_generated(mut self, persist_generated: bool) -> Self {
		self.persist_generated = persist_generated;
		self
	}

	pub fn store(&self) -> &Arc<S> {
		&self.store
	}
}

impl<T, const D: usize, S, P, F> ChunkPopulator<T, D> for ChunkStorePopulator<S, P, F>
where
	T: Send + Sync + 'static,
	S: ChunkStore<D>,
	P: Persister<T>,
	F: ChunkPopulator<T, D>,
{
	fn populate<'a>(
		&'a self,
		key: ChunkKey<D>,
		resources: &'a mut T,
		cancellation: CancellationToken,
	) -> BoxFuture<'a, anyhow::Result<()>> {
		async move {
			if let Some(entity) = self.store.get(key).await? {
				log::trace!(target: LOG, "Loading chunk {} from store", key);
				self.persister
					.deserialize_into(&entity.data, resources)
					.with_context(|| format!("stored chunk {} is corrupt", key))?;
				return Ok(());
			}

			self.fallback
				.populate(key, &mut *resources, cancellation)
				.await?;
			if self.persist_generated {
				let data = self.persister.serialize(resources)?;
				self.store.add_or_update(ChunkEntity::new(key, data)).await?;
			}
			Ok(())
		}
		.boxed()
	}

	fn persist<'a>(&'a self, key: ChunkKey<D>, resources: &'a T) -> BoxFuture<'a, anyhow::Result<()>> {
		async move {
			let data = self.persister.serialize(resources)?;
			self.store.add_or_update(ChunkEntity::new(key, data)).await
		}
		.boxed()
	}
}

#[cfg(test)]
mod chunk_store_populator {
	use super::*;
	use crate::{
		index::ChunkKey3D,
		persist::BincodePersister,
		populator::ExteriorPopulator,
		store::MemoryStore,
	};
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct CountingFallback {
		calls: AtomicUsize,
	}

	impl ChunkPopulator<Vec<u16>, 3> for CountingFallback {
		fn populate<'a>(
			&'a self,
			key: ChunkKey3D,
			resources: &'a mut Vec<u16>,
			_cancellation: CancellationToken,
		) -> BoxFuture<'a, anyhow::Result<()>> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			resources.clear();
			resources.push(key.x() as u16);
			async { Ok(()) }.boxed()
		}
	}

	fn populator(
		store: &Arc<MemoryStore<3>>,
	) -> ChunkStorePopulator<MemoryStore<3>, BincodePersister<Vec<u16>>, CountingFallback> {
		ChunkStorePopulator::new(
			store.clone(),
			BincodePersister::new(),
			CountingFallback {
				calls: AtomicUsize::new(0),
			},
		)
	}

	#[tokio::test]
	async fn miss_falls_back_and_writes_back() -> anyhow::Result<()> {
		let store = Arc::new(MemoryStore::new());
		let populator = populator(&store);
		let key = ChunkKey3D::new(4, 0, 0);

		let mut resources: Vec<u16> = Vec::new();
		populator
			.populate(key, &mut resources, CancellationToken::new())
			.await?;
		assert_eq!(resources, vec![4]);
		assert_eq!(populator.fallback.calls.load(Ordering::SeqCst), 1);
		assert!(store.contains(&key).await);

		let mut reloaded: Vec<u16> = Vec::new();
		populator
			.populate(key, &mut reloaded, CancellationToken::new())
			.await?;
		assert_eq!(reloaded, vec![4]);
		assert_eq!(populator.fallback.calls.load(Ordering::SeqCst), 1);
		Ok(())
	}

	#[tokio::test]
	async fn hit_deserializes_stored_bytes() -> anyhow::Result<()> {
		let store = Arc::new(MemoryStore::new());
		let key = ChunkKey3D::new(1, 1, 1);
		let bytes = BincodePersister::<Vec<u16>>::new().serialize(&vec![7, 8, 9])?;
		store.add_or_update(ChunkEntity::new(key, bytes)).await?;

		let populator = populator(&store);
		let mut resources: Vec<u16> = Vec::new();
		populator
			.populate(key, &mut resources, CancellationToken::new())
			.await?;
		assert_eq!(resources, vec![7, 8, 9]);
		assert_eq!(populator.fallback.calls.load(Ordering::SeqCst), 0);
		Ok(())
	}

	#[tokio::test]
	async fn generated_chunks_can_skip_the_store() -> anyhow::Result<()> {
		let store = Arc::new(MemoryStore::<3>::new());
		let populator = ChunkStorePopulator::new(
			store.clone(),
			BincodePersister::<Vec<u16>>::new(),
			ExteriorPopulator::new(vec![0u16; 4]),
		)
		.with_persist_generated(false);
		let key = ChunkKey3D::new(0, 2, 0);

		let mut resources: Vec<u16> = Vec::new();
		populator
			.populate(key, &mut resources, CancellationToken::new())
			.await?;
		assert_eq!(resources, vec![0; 4]);
		assert!(store.is_empty().await);

		resources[0] = 5;
		populator.persist(key, &resources).await?;
		assert!(store.contains(&key).await);
		Ok(())
	}

	#[tokio::test]
	async fn corrupt_entity_fails() {
		let store = Arc::new(MemoryStore::new());
		let key = ChunkKey3D::new(2, 2, 2);
		store
			.add_or_update(ChunkEntity::new(key, vec![0xff]))
			.await
			.unwrap();
		let populator = populator(&store);
		let mut resources: Vec<u16> = Vec::new();
		let result = populator
			.populate(key, &mut resources, CancellationToken::new())
			.await;
		assert!(result.is_err());
	}
}
