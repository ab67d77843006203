use qti_data::{Error, Fault, Record, Result, Value};

use crate::response::Response;

pub const GET_RESPONSE: &str = "getResponse";
pub const GET_STATE: &str = "getState";
pub const ONCOMPLETED: &str = "oncompleted";

/// A rendered widget instance, as handed to `onready`.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction(Record);

impl Interaction {
	pub fn new(record: Record) -> Self {
		Self(record)
	}

	pub fn from_value(value: &Value) -> Result<Self> {
		value
			.as_record()
			.map(|record| Self(record.clone()))
			.map_err(|err| Error::Format(format!("Invalid interaction instance: {err}")))
	}

	/// Invokes one of the instance's methods.
	pub fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>> {
		let not_a_function = || Error::from(Fault::new(format!("interaction.{method} is not a function")));
		let callee = self.0.get(method).ok_or_else(not_a_function)?;
		let callee = callee.as_closure().map_err(|_| not_a_function())?;
		callee.call(args)
	}

	/// The candidate's current response. `None` when the widget has nothing to report.
	pub fn get_response(&self) -> Result<Option<Response>> {
		match self.call(GET_RESPONSE, &[])? {
			Some(value) if !value.is_nothing() => Response::from_value(&value).map(Some),
			_ => Ok(None),
		}
	}

	/// Opaque state to persist and hand back to a later `getInstance`.
	pub fn get_state(&self) -> Result<Value> {
		Ok(self.call(GET_STATE, &[])?.unwrap_or_default())
	}

	/// Tells the widget the attempt is over so it can release its resources.
	pub fn oncompleted(&self) -> Result<()> {
		self.call(ONCOMPLETED, &[]).map(|_| ())
	}
}

impl From<Interaction> for Value {
	fn from(interaction: Interaction) -> Self {
		Value::Record(interaction.0)
	}
}
