//! Seam to the module resolution engine shared by every loader.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use qti_data::{Result, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical module name to resolution target (a URL or a synthetic identifier).
///
/// Serializes as the usual import-map JSON shape, `{"imports": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
	#[serde(default)]
	pub imports: IndexMap<String, String>,
}

impl ImportMap {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.imports.get(name).map(String::as_str)
	}

	pub fn insert(&mut self, name: impl Into<String>, target: impl Into<String>) -> Option<String> {
		self.imports.insert(name.into(), target.into())
	}

	pub fn remove(&mut self, name: &str) -> Option<String> {
		self.imports.shift_remove(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.imports.contains_key(name)
	}

	pub fn is_empty(&self) -> bool {
		self.imports.is_empty()
	}
}

/// Publishes a module's current exports.
pub type Exporter = Arc<dyn Fn(Value) + Send + Sync>;

/// Receives the exports of one resolved dependency.
pub type Setter = Box<dyn Fn(&Value) + Send + Sync>;

type Declare = dyn Fn(Exporter, &ModuleContext) -> Declaration + Send + Sync;

/// Context handed to a registration when the engine instantiates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContext {
	/// Resolved location of the module being instantiated.
	pub url: String,
}

/// Result of declaring one module instance.
pub struct Declaration {
	/// One setter per entry of [`Registration::deps`], in order.
	pub setters: Vec<Setter>,
	/// Runs the module body once every setter has been fed.
	pub execute: Box<dyn FnOnce() -> Result<()> + Send>,
}

/// Engine-compatible module registration.
///
/// `declare` may be called any number of times; each call yields an
/// independent module instance.
#[derive(Clone)]
pub struct Registration {
	pub deps: Vec<String>,
	pub declare: Arc<Declare>,
}

impl Registration {
	pub fn new<F>(deps: Vec<String>, declare: F) -> Self
	where
		F: Fn(Exporter, &ModuleContext) -> Declaration + Send + Sync + 'static,
	{
		Self {
			deps,
			declare: Arc::new(declare),
		}
	}

	pub fn declare(&self, export: Exporter, context: &ModuleContext) -> Declaration {
		(self.declare)(export, context)
	}
}

impl fmt::Debug for Registration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registration").field("deps", &self.deps).finish_non_exhaustive()
	}
}

/// The module resolution engine.
///
/// One instance is shared by every loader of a process. Each loader works in
/// its own scope: the import map and the named registrations of one scope are
/// invisible to every other, while stored records are keyed by identifiers
/// that are already unique. While evaluating fetched code the engine is
/// expected to route `define(...)` calls through
/// [`Host::define`](crate::Host::define), and to report evaluation faults on
/// [`Host::report_uncaught`](crate::Host::report_uncaught).
#[async_trait]
pub trait ResolutionEngine: Send + Sync {
	/// Installs `map` as the import map of `scope`, replacing the previous one.
	fn install_import_map(&self, scope: Uuid, map: &ImportMap) -> Result<()>;

	/// Stores an in-memory module record under `id`.
	fn set(&self, id: &str, module: Value);

	/// Forgets the record or the named registration of `scope` stored under
	/// `id`, returning whether one existed.
	fn delete(&self, scope: Uuid, id: &str) -> bool;

	fn has(&self, scope: Uuid, id: &str) -> bool;

	/// Records a registration made while evaluating code for `scope`.
	/// Anonymous registrations define the module currently being evaluated.
	fn register(&self, scope: Uuid, name: Option<&str>, registration: Registration);

	/// Resolves, instantiates and links `specifier` within `scope`, returning
	/// its exports.
	async fn import(&self, scope: Uuid, specifier: &str) -> Result<Value>;

	/// Drops the import map and named registrations of `scope`.
	fn release(&self, scope: Uuid);
}
