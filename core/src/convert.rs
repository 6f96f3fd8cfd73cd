//! A registry of conversions between arbitrary types, looked up by the pair of types involved.

use std::{
	any::{type_name, Any, TypeId},
	collections::HashMap,
	sync::Arc,
};

type Erased = Box<dyn Any + Send>;
type ErasedFn = dyn Fn(Erased) -> anyhow::Result<Erased> + Send + Sync;

/// Identifies a conversion by its source and target types.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionPair {
	from: TypeId,
	to: TypeId,
	from_name: &'static str,
	to_name: &'static str,
}

impl ConversionPair {
	pub fn of<From: 'static, To: 'static>() -> Self {
		Self {
			from: TypeId::of::<From>(),
			to: TypeId::of::<To>(),
			from_name: type_name::<From>(),
			to_name: type_name::<To>(),
		}
	}

	pub fn from_type(&self) -> TypeId {
		self.from
	}

	pub fn to_type(&self) -> TypeId {
		self.to
	}
}

impl std::fmt::Debug for ConversionPair {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} -> {}", self.from_name, self.to_name)
	}
}

/// A registered conversion with its types erased. Cloning shares the same conversion.
#[derive(Clone)]
pub struct ErasedConverter {
	pair: ConversionPair,
	convert: Arc<ErasedFn>,
}

impl ErasedConverter {
	pub fn new<From, To, F>(convert: F) -> Self
	where
		From: Send + 'static,
		To: Send + 'static,
		F: Fn(From) -> anyhow::Result<To> + Send + Sync + 'static,
	{
		let pair = ConversionPair::of::<From, To>();
		Self {
			pair,
			convert: Arc::new(move |value: Erased| {
				let value = value
					.downcast::<From>()
					.map_err(|_| anyhow::anyhow!("value is not the source type of {:?}", pair))?;
				Ok(Box::new(convert(*value)?) as Erased)
			}),
		}
	}

	pub fn pair(&self) -> ConversionPair {
		self.pair
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Arc::ptr_eq(&a.convert, &b.convert)
	}

	pub fn convert(&self, value: Erased) -> Conversion<Erased> {
		match (self.convert)(value) {
			Ok(converted) => Conversion::Success(converted),
			Err(error) => Conversion::Failed(error),
		}
	}
}

impl std::fmt::Debug for ErasedConverter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "ErasedConverter({:?})", self.pair)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ConversionStatus {
	Success,
	NoConverterFound,
	Failed,
}

/// The outcome of a conversion attempt.
#[derive(Debug)]
pub enum Conversion<T> {
	Success(T),
	NoConverterFound,
	Failed(anyhow::Error),
}

impl<T> Conversion<T> {
	pub fn status(&self) -> ConversionStatus {
		match self {
			Self::Success(_) => ConversionStatus::Success,
			Self::NoConverterFound => ConversionStatus::NoConverterFound,
			Self::Failed(_) => ConversionStatus::Failed,
		}
	}

	pub fn ok(self) -> Option<T> {
		match self {
			Self::Success(value) => Some(value),
			_ => None,
		}
	}
}

/// Converts values between any registered pair of types.
///
/// At most one converter is registered per pair.
#[derive(Default, Clone)]
pub struct MultiTypeConverter {
	converters: HashMap<ConversionPair, ErasedConverter>,
}

impl MultiTypeConverter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a fallible conversion. Returns false if the pair already has a converter.
	pub fn add_converter<From, To, F>(&mut self, convert: F) -> bool
	where
		From: Send + 'static,
		To: Send + 'static,
		F: Fn(From) -> anyhow::Result<To> + Send + Sync + 'static,
	{
		self.add_erased_converter(ErasedConverter::new(convert))
	}

	/// Registers a conversion which cannot fail. Returns false if the pair already has a converter.
	pub fn add_function<From, To, F>(&mut self, convert: F) -> bool
	where
		From: Send + 'static,
		To: Send + 'static,
		F: Fn(From) -> To + Send + Sync + 'static,
	{
		self.add_converter(move |value: From| Ok(convert(value)))
	}

	pub fn add_erased_converter(&mut self, converter: ErasedConverter) -> bool {
		match self.converters.entry(converter.pair()) {
			std::collections::hash_map::Entry::Occupied(_) => false,
			std::collections::hash_map::Entry::Vacant(entry) => {
				entry.insert(converter);
				true
			}
		}
	}

	pub fn contains_converter<From: 'static, To: 'static>(&self) -> bool {
		self.contains_pair(&ConversionPair::of::<From, To>())
	}

	pub fn contains_pair(&self, pair: &ConversionPair) -> bool {
		self.converters.contains_key(pair)
	}

	pub fn get_converter<From: 'static, To: 'static>(&self) -> Option<&ErasedConverter> {
		self.converters.get(&ConversionPair::of::<From, To>())
	}

	pub fn try_convert<From, To>(&self, value: From) -> Conversion<To>
	where
		From: Send + 'static,
		To: 'static,
	{
		match self.try_convert_erased(&ConversionPair::of::<From, To>(), Box::new(value)) {
			Conversion::Success(converted) => match converted.downcast::<To>() {
				Ok(converted) => Conversion::Success(*converted),
				Err(_) => unreachable!("converters are keyed by their target type"),
			},
			Conversion::NoConverterFound => Conversion::NoConverterFound,
			Conversion::Failed(error) => Conversion::Failed(error),
		}
	}

	/// Converts a value whose types are only known at runtime.
	/// A value which is not of the pair's source type fails to convert.
	pub fn try_convert_erased(&self, pair: &ConversionPair, value: Erased) -> Conversion<Erased> {
		match self.converters.get(pair) {
			Some(converter) => converter.convert(value),
			None => Conversion::NoConverterFound,
		}
	}
}

#[cfg(test)]
mod multi_type_converter {
	use super::*;

	fn to_text(number: i32) -> String {
		number.to_string()
	}

	#[test]
	fn add_converter() {
		let mut subject = MultiTypeConverter::new();
		assert!(subject.add_converter(|number: i32| Ok(number.to_string())));
		assert!(subject.contains_converter::<i32, String>());
		assert!(subject.contains_pair(&ConversionPair::of::<i32, String>()));
		assert!(!subject.contains_converter::<String, i32>());
	}

	#[test]
	fn add_function() {
		let mut subject = MultiTypeConverter::new();
		assert!(subject.add_function(to_text));
		assert!(subject.contains_converter::<i32, String>());
	}

	#[test]
	fn duplicate_pairs_are_rejected() {
		let mut subject = MultiTypeConverter::new();
		assert!(subject.add_function(to_text));
		assert!(!subject.add_function(to_text));
		assert!(!subject.add_converter(|number: i32| Ok(format!("#{}", number))));
		assert!(matches!(subject.try_convert::<i32, String>(4).ok().as_deref(), Some("4")));
	}

	#[test]
	fn get_converter_returns_registered() {
		let mut subject = MultiTypeConverter::new();
		assert!(subject.get_converter::<i32, String>().is_none());
		let added = ErasedConverter::new(|number: i32| Ok(number.to_string()));
		subject.add_erased_converter(added.clone());
		let retrieved = subject.get_converter::<i32, String>().unwrap();
		assert!(ErasedConverter::ptr_eq(&added, retrieved));
	}

	#[test]
	fn try_convert_success() {
		let mut subject = MultiTypeConverter::new();
		subject.add_function(to_text);
		match subject.try_convert::<i32, String>(1) {
			Conversion::Success(text) => assert_eq!(text, "1"),
			other => panic!("unexpected {:?}", other),
		}

		let erased = subject.try_convert_erased(&ConversionPair::of::<i32, String>(), Box::new(1i32));
		let text = erased.ok().and_then(|text| text.downcast::<String>().ok());
		assert_eq!(text.as_deref().map(String::as_str), Some("1"));
	}

	#[test]
	fn try_convert_without_converter() {
		let subject = MultiTypeConverter::new();
		let conversion = subject.try_convert::<i32, String>(1);
		assert_eq!(conversion.status(), ConversionStatus::NoConverterFound);
		let erased = subject.try_convert_erased(&ConversionPair::of::<i32, String>(), Box::new(1i32));
		assert_eq!(erased.status(), ConversionStatus::NoConverterFound);
	}

	#[test]
	fn try_convert_failure() {
		let mut subject = MultiTypeConverter::new();
		subject.add_converter(|_: i32| -> anyhow::Result<String> { anyhow::bail!("not a valid number") });
		match subject.try_convert::<i32, String>(1) {
			Conversion::Failed(error) => assert_eq!(error.to_string(), "not a valid number"),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn erased_value_of_wrong_type_fails() {
		let mut subject = MultiTypeConverter::new();
		subject.add_function(to_text);
		let erased = subject.try_convert_erased(&ConversionPair::of::<i32, String>(), Box::new(1u8));
		assert_eq!(erased.status(), ConversionStatus::Failed);
	}
}
