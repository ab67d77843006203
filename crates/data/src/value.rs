use std::fmt;

use crate::{Closure, Opaque, Record};

/// Dynamic value exchanged with module code.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
	#[default]
	Nothing,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	List(Vec<Value>),
	Record(Record),
	/// Module namespace. Stored and returned as-is, never wrapped as a default export.
	Namespace(Record),
	Closure(Closure),
	Opaque(Opaque),
}

impl Value {
	pub fn get_type(&self) -> ValueType {
		match self {
			Self::Nothing => ValueType::Nothing,
			Self::Bool(_) => ValueType::Bool,
			Self::Int(_) => ValueType::Int,
			Self::Float(_) => ValueType::Float,
			Self::String(_) => ValueType::String,
			Self::List(_) => ValueType::List,
			Self::Record(_) => ValueType::Record,
			Self::Namespace(_) => ValueType::Namespace,
			Self::Closure(_) => ValueType::Closure,
			Self::Opaque(_) => ValueType::Opaque,
		}
	}

	pub fn is_nothing(&self) -> bool {
		matches!(self, Self::Nothing)
	}

	pub fn as_bool(&self) -> Result<bool, ValueTypeError> {
		match self {
			Self::Bool(val) => Ok(*val),
			other => Err(ValueTypeError::new("bool", other.get_type())),
		}
	}

	pub fn as_int(&self) -> Result<i64, ValueTypeError> {
		match self {
			Self::Int(val) => Ok(*val),
			other => Err(ValueTypeError::new("int", other.get_type())),
		}
	}

	pub fn as_str(&self) -> Result<&str, ValueTypeError> {
		match self {
			Self::String(val) => Ok(val),
			other => Err(ValueTypeError::new("string", other.get_type())),
		}
	}

	/// Borrows the record behind a plain record or a module namespace.
	pub fn as_record(&self) -> Result<&Record, ValueTypeError> {
		match self {
			Self::Record(val) | Self::Namespace(val) => Ok(val),
			other => Err(ValueTypeError::new("record", other.get_type())),
		}
	}

	pub fn as_closure(&self) -> Result<&Closure, ValueTypeError> {
		match self {
			Self::Closure(val) => Ok(val),
			other => Err(ValueTypeError::new("closure", other.get_type())),
		}
	}

	/// Looks up `key` on a record or namespace; `None` for any other value.
	pub fn get(&self, key: &str) -> Option<Value> {
		self.as_record().ok().and_then(|record| record.get(key))
	}
}

impl From<bool> for Value {
	fn from(val: bool) -> Self {
		Self::Bool(val)
	}
}

impl From<i64> for Value {
	fn from(val: i64) -> Self {
		Self::Int(val)
	}
}

impl From<i32> for Value {
	fn from(val: i32) -> Self {
		Self::Int(val.into())
	}
}

impl From<f64> for Value {
	fn from(val: f64) -> Self {
		Self::Float(val)
	}
}

impl From<&str> for Value {
	fn from(val: &str) -> Self {
		Self::String(val.to_string())
	}
}

impl From<String> for Value {
	fn from(val: String) -> Self {
		Self::String(val)
	}
}

impl From<Vec<Value>> for Value {
	fn from(vals: Vec<Value>) -> Self {
		Self::List(vals)
	}
}

impl From<Record> for Value {
	fn from(val: Record) -> Self {
		Self::Record(val)
	}
}

impl From<Closure> for Value {
	fn from(val: Closure) -> Self {
		Self::Closure(val)
	}
}

impl From<Opaque> for Value {
	fn from(val: Opaque) -> Self {
		Self::Opaque(val)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(val: Option<T>) -> Self {
		val.map_or(Self::Nothing, Into::into)
	}
}

/// Coarse value type used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
	Nothing,
	Bool,
	Int,
	Float,
	String,
	List,
	Record,
	Namespace,
	Closure,
	Opaque,
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Nothing => "nothing",
			Self::Bool => "bool",
			Self::Int => "int",
			Self::Float => "float",
			Self::String => "string",
			Self::List => "list",
			Self::Record => "record",
			Self::Namespace => "namespace",
			Self::Closure => "closure",
			Self::Opaque => "opaque",
		};
		f.write_str(name)
	}
}

/// Error returned by typed accessors like [`Value::as_record`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, got {got}")]
pub struct ValueTypeError {
	expected: &'static str,
	got: ValueType,
}

impl ValueTypeError {
	pub fn new(expected: &'static str, got: ValueType) -> Self {
		Self { expected, got }
	}

	pub fn got(&self) -> ValueType {
		self.got
	}
}
