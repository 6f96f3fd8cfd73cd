use nalgebra::Point;
use std::ops::{Add, Index, Sub};

pub type ChunkKey1D = ChunkKey<1>;
pub type ChunkKey2D = ChunkKey<2>;
pub type ChunkKey3D = ChunkKey<3>;
pub type ChunkKey4D = ChunkKey<4>;

/// The position of a chunk in a regular grid of `D` dimensions.
///
/// Keys compare lexicographically, with axis 0 being the most significant,
/// so that sorting or scanning keys is deterministic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey<const D: usize>([i32; D]);

impl<const D: usize> ChunkKey<D> {
	pub const fn from_components(components: [i32; D]) -> Self {
		Self(components)
	}

	pub const fn zero() -> Self {
		Self([0; D])
	}

	/// Creates a key with every component set to `value`.
	pub const fn splat(value: i32) -> Self {
		Self([value; D])
	}

	pub const fn components(&self) -> &[i32; D] {
		&self.0
	}

	pub const fn dimensions() -> usize {
		D
	}

	pub fn map<F>(&self, mut f: F) -> Self
	where
		F: FnMut(i32) -> i32,
	{
		Self(std::array::from_fn(|axis| f(self.0[axis])))
	}

	pub fn zip_map<F>(&self, other: &Self, mut f: F) -> Self
	where
		F: FnMut(i32, i32) -> i32,
	{
		Self(std::array::from_fn(|axis| f(self.0[axis], other.0[axis])))
	}
}

impl ChunkKey<1> {
	pub const fn new(x: i32) -> Self {
		Self([x])
	}

	pub const fn x(&self) -> i32 {
		self.0[0]
	}
}

impl ChunkKey<2> {
	pub const fn new(x: i32, y: i32) -> Self {
		Self([x, y])
	}

	pub const fn x(&self) -> i32 {
		self.0[0]
	}

	pub const fn y(&self) -> i32 {
		self.0[1]
	}
}

impl ChunkKey<3> {
	pub const fn new(x: i32, y: i32, z: i32) -> Self {
		Self([x, y, z])
	}

	pub const fn x(&self) -> i32 {
		self.0[0]
	}

	pub const fn y(&self) -> i32 {
		self.0[1]
	}

	pub const fn z(&self) -> i32 {
		self.0[2]
	}
}

impl ChunkKey<4> {
	pub const fn new(x: i32, y: i32, z: i32, w: i32) -> Self {
		Self([x, y, z, w])
	}

	pub const fn x(&self) -> i32 {
		self.0[0]
	}

	pub const fn y(&self) -> i32 {
		self.0[1]
	}

	pub const fn z(&self) -> i32 {
		self.0[2]
	}

	pub const fn w(&self) -> i32 {
		self.0[3]
	}
}

impl<const D: usize> std::fmt::Display for ChunkKey<D> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "<")?;
		for (axis, component) in self.0.iter().enumerate() {
			if axis > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{}", component)?;
		}
		write!(f, ">")
	}
}

impl<const D: usize> std::fmt::Debug for ChunkKey<D> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "ChunkKey{}", self)
	}
}

impl<const D: usize> Index<usize> for ChunkKey<D> {
	type Output = i32;
	fn index(&self, axis: usize) -> &Self::Output {
		&self.0[axis]
	}
}

impl<const D: usize> Add for ChunkKey<D> {
	type Output = Self;
	fn add(self, rhs: Self) -> Self::Output {
		self.zip_map(&rhs, |a, b| a + b)
	}
}

impl<const D: usize> Sub for ChunkKey<D> {
	type Output = Self;
	fn sub(self, rhs: Self) -> Self::Output {
		self.zip_map(&rhs, |a, b| a - b)
	}
}

impl<const D: usize> From<[i32; D]> for ChunkKey<D> {
	fn from(components: [i32; D]) -> Self {
		Self(components)
	}
}

impl<const D: usize> From<ChunkKey<D>> for [i32; D] {
	fn from(key: ChunkKey<D>) -> Self {
		key.0
	}
}

impl<const D: usize> From<Point<i32, D>> for ChunkKey<D> {
	fn from(point: Point<i32, D>) -> Self {
		Self(point.coords.into())
	}
}

impl<const D: usize> From<ChunkKey<D>> for Point<i32, D> {
	fn from(key: ChunkKey<D>) -> Self {
		Point::from(key.0)
	}
}
