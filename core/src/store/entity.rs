use crate::index::ChunkKey;

/// The serialized form of one chunk, as kept by a [`ChunkStore`](super::ChunkStore).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChunkEntity<const D: usize> {
	pub key: ChunkKey<D>,
	pub data: Vec<u8>,
}

impl<const D: usize> ChunkEntity<D> {
	pub fn new(key: ChunkKey<D>, data: Vec<u8>) -> Self {
		Self { key, data }
	}
}
