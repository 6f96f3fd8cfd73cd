use super::ChunkKey;
use crate::{Error, Result};

/// The finite region of chunk keys which make up a stage.
///
/// A key is in bounds iff each of its components lies within `[origin, origin + dimensions)`.
/// The exclusive upper bound must itself be representable, so `origin + dimensions` never exceeds `i32::MAX`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StageBounds<const D: usize> {
	origin: ChunkKey<D>,
	dimensions: ChunkKey<D>,
}

impl<const D: usize> StageBounds<D> {
	pub fn new(origin: ChunkKey<D>, dimensions: ChunkKey<D>) -> Result<Self> {
		if dimensions.components().iter().any(|length| *length < 0) {
			return Err(Error::InvalidArgument(format!(
				"stage dimensions {} must not be negative",
				dimensions
			)));
		}
		let overflows = (0..D)
			.any(|axis| origin[axis].checked_add(dimensions[axis]).is_none());
		if overflows {
			return Err(Error::InvalidArgument(format!(
				"stage bounds from {} with dimensions {} extend past the largest chunk key",
				origin, dimensions
			)));
		}
		Ok(Self { origin, dimensions })
	}

	pub fn origin(&self) -> &ChunkKey<D> {
		&self.origin
	}

	pub fn dimensions(&self) -> &ChunkKey<D> {
		&self.dimensions
	}

	/// The first key past the bounds on every axis (exclusive).
	pub fn upper_bounds(&self) -> ChunkKey<D> {
		self.origin + self.dimensions
	}

	pub fn contains(&self, key: &ChunkKey<D>) -> bool {
		(0..D).all(|axis| {
			let offset = i64::from(key[axis]) - i64::from(self.origin[axis]);
			offset >= 0 && offset < i64::from(self.dimensions[axis])
		})
	}

	/// The number of keys within the bounds, saturating at `usize::MAX` for bounds too large to count.
	pub fn len(&self) -> usize {
		if self.is_empty() {
			return 0;
		}
		self.dimensions
			.components()
			.iter()
			.try_fold(1usize, |count, length| count.checked_mul(*length as usize))
			.unwrap_or(usize::MAX)
	}

	pub fn is_empty(&self) -> bool {
		self.dimensions.components().iter().any(|length| *length == 0)
	}

	/// Iterates over every key in the bounds, in ascending key order.
	pub fn keys(&self) -> Keys<D> {
		Keys {
			bounds: *self,
			next: (!self.is_empty()).then(|| self.origin),
		}
	}
}

/// Iterator over the keys of a [`StageBounds`], see [`StageBounds::keys`].
#[derive(Clone, Debug)]
pub struct Keys<const D: usize> {
	bounds: StageBounds<D>,
	next: Option<ChunkKey<D>>,
}

impl<const D: usize> Iterator for Keys<D> {
	type Item = ChunkKey<D>;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.next?;
		let upper = self.bounds.upper_bounds();
		let mut components = *current.components();
		// Odometer increment, the last axis is the least significant.
		let mut axis = D;
		self.next = loop {
			if axis == 0 {
				break None;
			}
			axis -= 1;
			components[axis] += 1;
			if components[axis] < upper[axis] {
				break Some(ChunkKey::from_components(components));
			}
			components[axis] = self.bounds.origin[axis];
		};
		Some(current)
	}
}

#[cfg(test)]
mod stage_bounds {
	use super::*;
	use crate::index::{ChunkKey1D, ChunkKey2D, ChunkKey3D};

	#[test]
	fn negative_dimensions_are_rejected() {
		let result = StageBounds::new(ChunkKey3D::zero(), ChunkKey3D::new(4, -1, 4));
		assert!(matches!(result, Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn contains_is_half_open() {
		let bounds = StageBounds::new(ChunkKey3D::new(-2, 0, 0), ChunkKey3D::new(4, 4, 4)).unwrap();
		assert!(bounds.contains(&ChunkKey3D::new(-2, 0, 0)));
		assert!(bounds.contains(&ChunkKey3D::new(1, 3, 3)));
		assert!(!bounds.contains(&ChunkKey3D::new(2, 0, 0)));
		assert!(!bounds.contains(&ChunkKey3D::new(-3, 0, 0)));
		assert!(!bounds.contains(&ChunkKey3D::new(0, 4, 0)));
		assert!(!bounds.contains(&ChunkKey3D::new(0, 0, -1)));
	}

	#[test]
	fn empty_bounds_contain_nothing() {
		let bounds = StageBounds::new(ChunkKey2D::zero(), ChunkKey2D::new(3, 0)).unwrap();
		assert!(bounds.is_empty());
		assert!(!bounds.contains(&ChunkKey2D::zero()));
		assert_eq!(bounds.keys().count(), 0);
	}

	#[test]
	fn keys_are_ordered_and_complete() {
		let bounds = StageBounds::new(ChunkKey2D::new(1, -1), ChunkKey2D::new(2, 3)).unwrap();
		let keys = bounds.keys().collect::<Vec<_>>();
		assert_eq!(
			keys,
			vec![
				ChunkKey2D::new(1, -1),
				ChunkKey2D::new(1, 0),
				ChunkKey2D::new(1, 1),
				ChunkKey2D::new(2, -1),
				ChunkKey2D::new(2, 0),
				ChunkKey2D::new(2, 1),
			]
		);
		assert_eq!(keys.len(), bounds.len());
		assert!(keys.iter().all(|key| bounds.contains(key)));
	}

	#[test]
	fn bounds_past_largest_key_are_rejected() {
		let result = StageBounds::new(ChunkKey3D::splat(10), ChunkKey3D::new(1, 1, i32::MAX));
		assert!(matches!(result, Err(Error::InvalidArgument(_))));

		let widest = StageBounds::new(ChunkKey1D::new(i32::MIN), ChunkKey1D::new(i32::MAX)).unwrap();
		assert_eq!(widest.upper_bounds(), ChunkKey1D::new(-1));
	}

	#[test]
	fn huge_bounds_do_not_overflow() {
		let bounds = StageBounds::new(ChunkKey3D::zero(), ChunkKey3D::splat(i32::MAX)).unwrap();
		assert!(!bounds.is_empty());
		assert_eq!(bounds.len(), usize::MAX);
		assert_eq!(bounds.upper_bounds(), ChunkKey3D::splat(i32::MAX));
		assert_eq!(
			bounds.keys().take(2).collect::<Vec<_>>(),
			vec![ChunkKey3D::zero(), ChunkKey3D::new(0, 0, 1)]
		);
		assert!(bounds.contains(&ChunkKey3D::splat(i32::MAX - 1)));

		let edge = StageBounds::new(ChunkKey1D::new(i32::MAX - 2), ChunkKey1D::new(2)).unwrap();
		assert_eq!(
			edge.keys().collect::<Vec<_>>(),
			vec![ChunkKey1D::new(i32::MAX - 2), ChunkKey1D::new(i32::MAX - 1)]
		);
	}
}
