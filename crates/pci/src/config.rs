use std::time::Duration;

use qti_data::{Closure, Error, Record, Result, Value};
use serde::{Deserialize, Serialize};

use crate::response::Response;

/// Default budget for loading a widget runtime and rendering an instance.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 30_000;

/// Options shared by [`PciLoader::load`](crate::PciLoader::load) and
/// [`PciLoader::get_instance`](crate::PciLoader::get_instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
	/// Overall budget in milliseconds. Zero waits indefinitely.
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
	DEFAULT_LOAD_TIMEOUT_MS
}

impl Default for LoadOptions {
	fn default() -> Self {
		Self {
			timeout_ms: default_timeout_ms(),
		}
	}
}

impl LoadOptions {
	pub fn with_timeout(timeout: Duration) -> Self {
		Self {
			timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
		}
	}

	pub fn without_timeout() -> Self {
		Self { timeout_ms: 0 }
	}

	/// The budget, or `None` when the caller waits indefinitely.
	pub fn timeout(&self) -> Option<Duration> {
		(self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
	}
}

pub const PROPERTIES: &str = "properties";
pub const TEMPLATE_VARIABLES: &str = "templateVariables";
pub const BOUND_TO: &str = "boundTo";
pub const ONREADY: &str = "onready";
pub const ONDONE: &str = "ondone";
pub const STATUS: &str = "status";

/// Configuration handed to a widget's `getInstance`.
///
/// `onready(interaction, state)` must be called by the widget once it has
/// rendered. `ondone(interaction, response, state, status)` is called when
/// the candidate ends the attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
	pub properties: Record,
	pub template_variables: Option<Record>,
	/// Responses the widget starts from, by response identifier.
	pub bound_to: Option<Record>,
	pub onready: Option<Closure>,
	pub ondone: Option<Closure>,
	pub status: Option<String>,
}

impl Config {
	pub fn new(properties: Record) -> Self {
		Self {
			properties,
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_template_variables(mut self, variables: Record) -> Self {
		self.template_variables = Some(variables);
		self
	}

	#[must_use]
	pub fn with_bound_to(mut self, bound_to: Record) -> Self {
		self.bound_to = Some(bound_to);
		self
	}

	#[must_use]
	pub fn with_onready(mut self, onready: Closure) -> Self {
		self.onready = Some(onready);
		self
	}

	#[must_use]
	pub fn with_ondone(mut self, ondone: Closure) -> Self {
		self.ondone = Some(ondone);
		self
	}

	#[must_use]
	pub fn with_status(mut self, status: impl Into<String>) -> Self {
		self.status = Some(status.into());
		self
	}

	/// Reads a configuration as seen from the widget side.
	pub fn from_value(value: &Value) -> Result<Self> {
		let record = value
			.as_record()
			.map_err(|err| Error::Format(format!("Invalid configuration: {err}")))?;
		let field = |key: &str| record.get(key).filter(|value| !value.is_nothing());
		let records = |key: &str| field(key).map(|value| value.as_record().cloned()).transpose();
		let closures = |key: &str| field(key).map(|value| value.as_closure().cloned()).transpose();

		Ok(Self {
			properties: records(PROPERTIES)?.unwrap_or_default(),
			template_variables: records(TEMPLATE_VARIABLES)?,
			bound_to: records(BOUND_TO)?,
			onready: closures(ONREADY)?,
			ondone: closures(ONDONE)?,
			status: field(STATUS).map(|value| value.as_str().map(str::to_string)).transpose()?,
		})
	}

	/// The response bound to `identifier`, if any.
	pub fn bound_response(&self, identifier: &str) -> Result<Option<Response>> {
		self.bound_to
			.as_ref()
			.and_then(|bound| bound.get(identifier))
			.map(|value| Response::from_value(&value))
			.transpose()
	}
}

impl From<Config> for Value {
	fn from(config: Config) -> Self {
		let record = Record::new();
		record.insert(PROPERTIES, config.properties);
		if let Some(variables) = config.template_variables {
			record.insert(TEMPLATE_VARIABLES, variables);
		}
		if let Some(bound_to) = config.bound_to {
			record.insert(BOUND_TO, bound_to);
		}
		if let Some(onready) = config.onready {
			record.insert(ONREADY, onready);
		}
		if let Some(ondone) = config.ondone {
			record.insert(ONDONE, ondone);
		}
		if let Some(status) = config.status {
			record.insert(STATUS, status);
		}
		Value::Record(record)
	}
}
