use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{Result, Value};

type ClosureFn = dyn Fn(&[Value]) -> Result<Option<Value>> + Send + Sync;

/// Shared callable exchanged with module code.
///
/// A closure returns `Ok(None)` when it produces nothing, which lets callers
/// tell "returned nothing" apart from "returned [`Value::Nothing`]".
/// Equality is identity.
#[derive(Clone)]
pub struct Closure(Arc<ClosureFn>);

impl Closure {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&[Value]) -> Result<Option<Value>> + Send + Sync + 'static,
	{
		Self(Arc::new(f))
	}

	pub fn call(&self, args: &[Value]) -> Result<Option<Value>> {
		(self.0)(args)
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl PartialEq for Closure {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for Closure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Closure({:p})", Arc::as_ptr(&self.0).cast::<()>())
	}
}

/// Host object carried through module code by identity, e.g. a render target.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
	pub fn new<T: Any + Send + Sync>(value: T) -> Self {
		Self(Arc::new(value))
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

impl PartialEq for Opaque {
	fn eq(&self, other: &Self) -> bool {
		self.ptr_eq(other)
	}
}

impl fmt::Debug for Opaque {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Opaque({:p})", Arc::as_ptr(&self.0).cast::<()>())
	}
}
