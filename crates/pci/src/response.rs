//! QTI response payloads as exchanged with interactions.
//!
//! A response has one of three cardinalities: a single base value
//! (`{"base": {"string": "x"}}`), a list of values of one base type
//! (`{"list": {"integer": [1, 2]}}`), or a record of named fields
//! (`{"record": [{"name": "a", "base": ...}]}`).

use qti_data::{Error, Result, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
	/// Multiple or ordered cardinality.
	Multiple { list: ListValue },
	Record { record: Vec<RecordEntry> },
	/// Single cardinality; `None` is the QTI null value.
	Single { base: Option<BaseValue> },
}

/// One base-typed value, keyed by its base type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseValue {
	Boolean(bool),
	Integer(i64),
	Float(f64),
	String(String),
	Point([i64; 2]),
	Pair([String; 2]),
	DirectedPair([String; 2]),
	Duration(String),
	File(FileValue),
	Uri(String),
	Identifier(String),
	IntOrIdentifier(IntOrIdentifier),
}

/// Homogeneous list of base-typed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListValue {
	Boolean(Vec<bool>),
	Integer(Vec<i64>),
	Float(Vec<f64>),
	String(Vec<String>),
	Point(Vec<[i64; 2]>),
	Pair(Vec<[String; 2]>),
	DirectedPair(Vec<[String; 2]>),
	Duration(Vec<String>),
	File(Vec<FileValue>),
	Uri(Vec<String>),
	Identifier(Vec<String>),
	IntOrIdentifier(Vec<IntOrIdentifier>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValue {
	pub data: String,
	pub mime: String,
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrIdentifier {
	Int(i64),
	Identifier(String),
}

/// Field of a record response. A field with no name is the null record entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub base: Option<BaseValue>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub list: Option<ListValue>,
}

impl Response {
	pub fn single(base: BaseValue) -> Self {
		Self::Single { base: Some(base) }
	}

	pub fn null() -> Self {
		Self::Single { base: None }
	}

	/// Reads a response handed over by interaction code.
	pub fn from_value(value: &Value) -> Result<Self> {
		let json = value.to_json().ok_or_else(|| Error::Format("Invalid response".to_string()))?;
		serde_json::from_value(json).map_err(|err| Error::Format(format!("Invalid response: {err}")))
	}

	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).map(Value::from).unwrap_or_default()
	}
}
