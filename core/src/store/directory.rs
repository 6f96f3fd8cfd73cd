use super::{ChunkEntity, ChunkStore, LOG};
use crate::index::ChunkKey;
use anyhow::Context;
use futures::future::{BoxFuture, FutureExt};
use std::{
	io::ErrorKind,
	path::{Path, PathBuf},
	sync::atomic::{AtomicU64, Ordering},
};

/// Stores each chunk as its own file.
///
/// Data is saved to disk at `<root>/chunks/x.y.z.chunk` (one component per axis).
pub struct DirectoryStore {
	root: PathBuf,
	/// Numbers the staging file of each write, so concurrent writes of one chunk never share one.
	next_staging: AtomicU64,
}

impl DirectoryStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			next_staging: AtomicU64::new(0),
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn path_for<const D: usize>(&self, key: &ChunkKey<D>) -> PathBuf {
		let mut path = self.root.join("chunks");
		let name = key
			.components()
			.iter()
			.map(|component| component.to_string())
			.collect::<Vec<_>>()
			.join(".");
		path.push(format!("{}.chunk", name));
		path
	}

	fn staging_path_for(&self, path: &Path) -> PathBuf {
		let write = self.next_staging.fetch_add(1, Ordering::Relaxed);
		path.with_extension(format!("chunk.{}-{}.tmp", std::process::id(), write))
	}
}

impl<const D: usize> ChunkStore<D> for DirectoryStore {
	fn get(&self, key: ChunkKey<D>) -> BoxFuture<'_, anyhow::Result<Option<ChunkEntity<D>>>> {
		async move {
			let path = self.path_for(&key);
			match tokio::fs::read(&path).await {
				Ok(data) => Ok(Some(ChunkEntity::new(key, data))),
				Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
				Err(error) => {
					Err(error).with_context(|| format!("failed to read chunk file {}", path.display()))
				}
			}
		}
		.boxed()
	}

	fn add_or_update(&self, entity: ChunkEntity<D>) -> BoxFuture<'_, anyhow::Result<()>> {
		async move {
			let path = self.path_for(&entity.key);
			if let Some(parent) = path.parent() {
				tokio::fs::create_dir_all(parent).await?;
			}
			// Write next to the destination and rename, so a reader never sees a partial chunk.
			let staging = self.staging_path_for(&path);
			tokio::fs::write(&staging, &entity.data)
				.await
				.with_context(|| format!("failed to write chunk file {}", staging.display()))?;
			if let Err(error) = tokio::fs::rename(&staging, &path).await {
				let _ = tokio::fs::remove_file(&staging).await;
				return Err(error)
					.with_context(|| format!("failed to replace chunk file {}", path.display()));
			}
			log::trace!(target: LOG, "Saved chunk {} to {}", entity.key, path.display());
			Ok(())
		}
		.boxed()
	}

	fn remove(&self, key: ChunkKey<D>) -> BoxFuture<'_, anyhow::Result<bool>> {
		async move {
			let path = self.path_for(&key);
			match tokio::fs::remove_file(&path).await {
				Ok(()) => Ok(true),
				Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
				Err(error) => Err(error.into()),
			}
		}
		.boxed()
	}
}

#[cfg(test)]
mod directory_store {
	use super::*;
	use crate::index::{ChunkKey2D, ChunkKey3D};

	#[test]
	fn path_layout() {
		let store = DirectoryStore::new("/worlds/alpha");
		assert_eq!(
			store.path_for(&ChunkKey3D::new(1, -2, 3)),
			PathBuf::from("/worlds/alpha/chunks/1.-2.3.chunk")
		);
		assert_eq!(
			store.path_for(&ChunkKey2D::new(0, 4)),
			PathBuf::from("/worlds/alpha/chunks/0.4.chunk")
		);
	}

	#[tokio::test]
	async fn round_trips_bytes_on_disk() -> anyhow::Result<()> {
		let root = tempfile::tempdir()?;
		let store = DirectoryStore::new(root.path());
		let key = ChunkKey3D::new(-1, 0, 7);
		assert_eq!(store.get(key).await?, None);

		store.add_or_update(ChunkEntity::new(key, vec![5, 6, 7])).await?;
		assert!(store.path_for(&key).exists());
		assert_eq!(store.get(key).await?, Some(ChunkEntity::new(key, vec![5, 6, 7])));

		store.add_or_update(ChunkEntity::new(key, vec![8])).await?;
		assert_eq!(store.get(key).await?.map(|entity| entity.data), Some(vec![8]));

		assert!(ChunkStore::<3>::remove(&store, key).await?);
		assert!(!ChunkStore::<3>::remove(&store, key).await?);
		assert_eq!(store.get(key).await?, None);
		Ok(())
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_writes_of_one_chunk() -> anyhow::Result<()> {
		let root = tempfile::tempdir()?;
		let store = DirectoryStore::new(root.path());
		let key = ChunkKey3D::new(2, 2, 2);
		let writes = (0..16u8).map(|value| store.add_or_update(ChunkEntity::new(key, vec![value; 512])));
		for result in futures::future::join_all(writes).await {
			result?;
		}

		let data = store.get(key).await?.map(|entity| entity.data).unwrap_or_default();
		assert_eq!(data.len(), 512);
		assert!(data.iter().all(|value| *value == data[0]));
		let leftovers = std::fs::read_dir(root.path().join("chunks"))?.count();
		assert_eq!(leftovers, 1);
		Ok(())
	}
}
