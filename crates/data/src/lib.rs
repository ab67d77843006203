//! Data boundary between loaded module code and the host.
//!
//! Module factories, bridging capabilities and widget callbacks all exchange
//! [`Value`]s. The model is deliberately small: scalars, lists, shared mutable
//! records, callables and opaque host handles. Records and closures are
//! reference types, so a record handed to module code and later mutated there
//! is observed by every holder.

mod closure;
mod error;
mod json;
mod record;
mod value;

pub use closure::{Closure, Opaque};
pub use error::{Error, Fault, FaultOrigin, Result};
pub use record::Record;
pub use value::{Value, ValueType, ValueTypeError};
