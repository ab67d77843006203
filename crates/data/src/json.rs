//! Conversion between [`Value`] and JSON, used for configuration properties
//! and response payloads handed to widget code.

use serde_json::{Map, Number};

use crate::{Record, Value};

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Self::Nothing,
			serde_json::Value::Bool(val) => Self::Bool(val),
			serde_json::Value::Number(n) => match n.as_i64() {
				Some(int) => Self::Int(int),
				None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
			},
			serde_json::Value::String(val) => Self::String(val),
			serde_json::Value::Array(vals) => Self::List(vals.into_iter().map(Into::into).collect()),
			serde_json::Value::Object(map) => Self::Record(map.into_iter().collect::<Record>()),
		}
	}
}

impl Value {
	/// Converts to JSON. Returns `None` for values with no JSON form:
	/// closures, opaque handles and non-finite floats.
	pub fn to_json(&self) -> Option<serde_json::Value> {
		Some(match self {
			Self::Nothing => serde_json::Value::Null,
			Self::Bool(val) => serde_json::Value::Bool(*val),
			Self::Int(val) => serde_json::Value::Number((*val).into()),
			Self::Float(val) => serde_json::Value::Number(Number::from_f64(*val)?),
			Self::String(val) => serde_json::Value::String(val.clone()),
			Self::List(vals) => serde_json::Value::Array(vals.iter().map(Value::to_json).collect::<Option<_>>()?),
			Self::Record(record) | Self::Namespace(record) => {
				let mut map = Map::new();
				for (key, value) in record.entries() {
					map.insert(key, value.to_json()?);
				}
				serde_json::Value::Object(map)
			}
			Self::Closure(_) | Self::Opaque(_) => return None,
		})
	}
}
