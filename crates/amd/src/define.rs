//! Adapter from legacy `define(...)` calls to engine registrations.
//!
//! Three call shapes are accepted, each with an optional leading name:
//!
//! - `define(name?, [deps...], factory)`
//! - `define(name?, resource)` where `resource` is a record or host object
//! - `define(name?, factory)` with the implicit deps `require`, `module`, `exports`
//!
//! The pseudo-dependencies `require`, `module` and `exports` are satisfied
//! locally and never reach the engine.

use std::sync::Arc;

use parking_lot::Mutex;
use qti_data::{Closure, Error, Record, Result, Value};

use crate::engine::{Declaration, Exporter, ModuleContext, Registration, Setter};

pub const REQUIRE: &str = "require";
pub const MODULE: &str = "module";
pub const EXPORTS: &str = "exports";

/// Key holding the real exports inside a default-only wrapper.
pub const DEFAULT_KEY: &str = "default";
/// Tag marking a namespace as a default-only wrapper.
pub const USE_DEFAULT_KEY: &str = "__useDefault";

const INVALID_DEFINE: &str = "Invalid call to define()";
const REQUIRE_UNSUPPORTED: &str = "AMD require not supported";

/// Wraps `value` as `{default: value, __useDefault: true}`.
pub fn wrap_default(value: Value) -> Value {
	let wrapper = Record::new();
	wrapper.insert(DEFAULT_KEY, value);
	wrapper.insert(USE_DEFAULT_KEY, true);
	Value::Namespace(wrapper)
}

/// Returns the wrapped value of a default-only wrapper, or `value` itself.
pub fn unwrap_default(value: &Value) -> Value {
	if value.get(USE_DEFAULT_KEY) == Some(Value::Bool(true)) {
		return value.get(DEFAULT_KEY).unwrap_or_default();
	}
	value.clone()
}

/// Parsed shape of a `define(...)` call.
#[derive(Debug, Clone, PartialEq)]
pub enum DefineShape {
	WithDeps {
		name: Option<String>,
		deps: Vec<String>,
		factory: Closure,
	},
	Resource {
		name: Option<String>,
		resource: Value,
	},
	Factory {
		name: Option<String>,
		factory: Closure,
	},
}

impl DefineShape {
	pub fn parse(args: &[Value]) -> Result<Self> {
		let (name, rest) = match args {
			[Value::String(name), rest @ ..] => (Some(name.clone()), rest),
			_ => (None, args),
		};

		match rest {
			[Value::List(deps), Value::Closure(factory), ..] => {
				let deps = deps
					.iter()
					.map(|dep| dep.as_str().map(str::to_string))
					.collect::<std::result::Result<Vec<_>, _>>()
					.map_err(|_| invalid())?;
				Ok(Self::WithDeps {
					name,
					deps,
					factory: factory.clone(),
				})
			}
			[resource @ (Value::Record(_) | Value::Namespace(_) | Value::Opaque(_)), ..] => Ok(Self::Resource {
				name,
				resource: resource.clone(),
			}),
			[Value::Closure(factory), ..] => Ok(Self::Factory {
				name,
				factory: factory.clone(),
			}),
			_ => Err(invalid()),
		}
	}
}

fn invalid() -> Error {
	Error::Format(INVALID_DEFINE.to_string())
}

/// Canonical `(deps, factory)` form of a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
	pub name: Option<String>,
	pub deps: Vec<String>,
	pub factory: Closure,
}

impl From<DefineShape> for Definition {
	fn from(shape: DefineShape) -> Self {
		match shape {
			DefineShape::WithDeps { name, deps, factory } => Self { name, deps, factory },
			DefineShape::Resource { name, resource } => Self {
				name,
				deps: Vec::new(),
				factory: Closure::new(move |_| Ok(Some(resource.clone()))),
			},
			DefineShape::Factory { name, factory } => Self {
				name,
				deps: vec![REQUIRE.to_string(), MODULE.to_string(), EXPORTS.to_string()],
				factory,
			},
		}
	}
}

impl Definition {
	pub fn parse(args: &[Value]) -> Result<Self> {
		DefineShape::parse(args).map(Self::from)
	}

	/// Compiles into an engine registration, keyed by the optional name.
	pub fn into_registration(self) -> (Option<String>, Registration) {
		let Self { name, deps, factory } = self;
		let external: Vec<String> = deps.iter().filter(|dep| !is_pseudo(dep)).cloned().collect();
		let registration = Registration::new(external, move |export, context| declare(&deps, &factory, export, context));
		(name, registration)
	}
}

fn is_pseudo(dep: &str) -> bool {
	matches!(dep, REQUIRE | MODULE | EXPORTS)
}

fn require_stub() -> Closure {
	Closure::new(|_| Err(Error::Unsupported(REQUIRE_UNSUPPORTED.to_string())))
}

fn declare(deps: &[String], factory: &Closure, export: Exporter, context: &ModuleContext) -> Declaration {
	let exports = Record::new();
	let module = Record::new();
	module.insert(EXPORTS, exports.clone());

	let slots = Arc::new(Mutex::new(vec![Value::Nothing; deps.len()]));
	let mut setters: Vec<Setter> = Vec::new();
	{
		let mut positional = slots.lock();
		for (index, dep) in deps.iter().enumerate() {
			match dep.as_str() {
				REQUIRE => positional[index] = Value::Closure(require_stub()),
				MODULE => positional[index] = Value::Record(module.clone()),
				EXPORTS => positional[index] = Value::Record(exports.clone()),
				_ => {
					let slots = Arc::clone(&slots);
					setters.push(Box::new(move |resolved: &Value| {
						slots.lock()[index] = unwrap_default(resolved);
					}));
				}
			}
		}
	}

	// Placeholder so cyclic importers can link against the exports record early.
	export(wrap_default(Value::Record(exports)));

	let url = context.url.clone();
	let factory = factory.clone();
	Declaration {
		setters,
		execute: Box::new(move || {
			module.insert("uri", url);
			let args = slots.lock().clone();
			if let Some(returned) = factory.call(&args)? {
				module.insert(EXPORTS, returned);
			}
			export(wrap_default(module.get(EXPORTS).unwrap_or_default()));
			Ok(())
		}),
	}
}
