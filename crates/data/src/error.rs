use qti_primitives::TimeoutError;
use thiserror::Error;

use crate::ValueTypeError;

/// Where an opaque fault was raised, when known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FaultOrigin {
	/// No origin was attached; correlation falls back to the message text.
	#[default]
	Unknown,
	/// Raised by the resolution engine itself.
	Engine,
	/// Raised while evaluating the module at this location.
	Module(String),
}

/// Opaque fault raised by module code, widget code or the resolution engine.
///
/// Faults are passed through unchanged; the origin tag only serves to decide
/// which pending load a fault reported on the uncaught channel belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Fault {
	message: String,
	origin: FaultOrigin,
}

impl Fault {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			origin: FaultOrigin::Unknown,
		}
	}

	/// Creates a fault tagged as coming from the resolution engine.
	pub fn engine(message: impl Into<String>) -> Self {
		Self::new(message).with_origin(FaultOrigin::Engine)
	}

	/// Creates a fault tagged with the module location that raised it.
	pub fn module(location: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(message).with_origin(FaultOrigin::Module(location.into()))
	}

	#[must_use]
	pub fn with_origin(mut self, origin: FaultOrigin) -> Self {
		self.origin = origin;
		self
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn origin(&self) -> &FaultOrigin {
		&self.origin
	}
}

/// Errors surfaced by module loading, widget registration and rendering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// Malformed definition call or malformed widget descriptor.
	#[error("{0}")]
	Format(String),
	/// A widget runtime declared another type identifier than expected.
	#[error("Expected PCI '{expected}', got '{actual}' instead")]
	NameMismatch { expected: String, actual: String },
	/// No widget is registered under the requested type identifier.
	#[error("Interaction \"{0}\" not found")]
	NotFound(String),
	/// An operation lost its race against a deadline.
	#[error(transparent)]
	Timeout(#[from] TimeoutError),
	/// The pseudo-dependency `require` was invoked.
	#[error("{0}")]
	Unsupported(String),
	/// Opaque fault, rethrown unchanged.
	#[error(transparent)]
	Fault(#[from] Fault),
}

impl Error {
	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Timeout(_))
	}

	/// Tags an untagged opaque fault with the module location it was raised in.
	#[must_use]
	pub fn located_at(self, location: &str) -> Self {
		match self {
			Self::Fault(fault) if *fault.origin() == FaultOrigin::Unknown => Self::Fault(fault.with_origin(FaultOrigin::Module(location.to_string()))),
			other => other,
		}
	}
}

/// Module code reading a value of the wrong type raises an opaque fault.
impl From<ValueTypeError> for Error {
	fn from(err: ValueTypeError) -> Self {
		Self::Fault(Fault::new(err.to_string()))
	}
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, Error>;
