//! In-memory resolution engine.
//!
//! Scripts are Rust closures standing in for fetched code: evaluating one
//! calls `define(...)` on the [`Host`] like a real bundle would. Every import
//! links a fresh set of instances, so the same script can serve any number
//! of loaders. Import maps and named registrations live per scope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use qti_data::{Fault, Result, Value};
use uuid::Uuid;

use crate::engine::{ImportMap, ModuleContext, Registration, ResolutionEngine};
use crate::host::Host;

/// Body of a script, evaluated against the host's global scope.
pub type ScriptBody = Arc<dyn Fn(&Host) -> Result<()> + Send + Sync>;

#[derive(Clone)]
struct Script {
	body: ScriptBody,
	latency: Duration,
}

#[derive(Default)]
struct ScopeState {
	import_map: ImportMap,
	named: HashMap<String, Registration>,
}

#[derive(Default)]
struct EngineState {
	records: HashMap<String, Value>,
	scripts: HashMap<String, Script>,
	scopes: HashMap<Uuid, ScopeState>,
	pending: Vec<(Uuid, Option<String>, Registration)>,
}

impl EngineState {
	fn resolve_id(&self, scope: Uuid, specifier: &str) -> String {
		self.scopes
			.get(&scope)
			.and_then(|state| state.import_map.get(specifier))
			.unwrap_or(specifier)
			.to_string()
	}

	fn named(&self, scope: Uuid, id: &str) -> Option<&Registration> {
		self.scopes.get(&scope).and_then(|state| state.named.get(id))
	}
}

enum Found {
	Record(Value),
	Named(Registration),
	Script(ScriptBody),
	Missing,
}

/// Instances linked during one import, by resolved id.
struct Session {
	scope: Uuid,
	instances: HashMap<String, Arc<Mutex<Value>>>,
}

pub struct MemoryEngine {
	host: Arc<Host>,
	state: Mutex<EngineState>,
}

impl std::fmt::Debug for MemoryEngine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("MemoryEngine")
			.field("records", &state.records.len())
			.field("scripts", &state.scripts.len())
			.field("scopes", &state.scopes.len())
			.finish_non_exhaustive()
	}
}

impl MemoryEngine {
	pub fn new(host: Arc<Host>) -> Self {
		Self {
			host,
			state: Mutex::new(EngineState::default()),
		}
	}

	pub fn host(&self) -> &Arc<Host> {
		&self.host
	}

	/// Serves `url` by evaluating `body`.
	pub fn add_script<F>(&self, url: impl Into<String>, body: F)
	where
		F: Fn(&Host) -> Result<()> + Send + Sync + 'static,
	{
		self.add_script_with_latency(url, Duration::ZERO, body);
	}

	/// Serves `url` by evaluating `body` after a simulated fetch delay.
	pub fn add_script_with_latency<F>(&self, url: impl Into<String>, latency: Duration, body: F)
	where
		F: Fn(&Host) -> Result<()> + Send + Sync + 'static,
	{
		let script = Script {
			body: Arc::new(body),
			latency,
		};
		self.state.lock().scripts.insert(url.into(), script);
	}

	/// Snapshot of the import map installed for `scope`.
	pub fn import_map(&self, scope: Uuid) -> Option<ImportMap> {
		self.state.lock().scopes.get(&scope).map(|state| state.import_map.clone())
	}

	/// Number of scopes holding an import map or named registrations.
	pub fn scope_count(&self) -> usize {
		self.state.lock().scopes.len()
	}

	fn lookup(&self, scope: Uuid, id: &str) -> Found {
		let state = self.state.lock();
		if let Some(record) = state.records.get(id) {
			Found::Record(record.clone())
		} else if let Some(registration) = state.named(scope, id) {
			Found::Named(registration.clone())
		} else if let Some(script) = state.scripts.get(id) {
			Found::Script(Arc::clone(&script.body))
		} else {
			Found::Missing
		}
	}

	fn resolve(&self, session: &mut Session, specifier: &str) -> Result<Value> {
		let id = self.state.lock().resolve_id(session.scope, specifier);
		if let Some(cell) = session.instances.get(&id) {
			// Already linking (a cycle) or linked during this import.
			return Ok(cell.lock().clone());
		}

		match self.lookup(session.scope, &id) {
			Found::Record(record) => Ok(record),
			Found::Named(registration) => self.instantiate(session, &id, &registration),
			Found::Script(body) => {
				let registration = self.evaluate(&id, &body)?;
				self.instantiate(session, &id, &registration)
			}
			Found::Missing => Err(Fault::engine(format!("Unable to resolve specifier '{specifier}'")).into()),
		}
	}

	/// Runs a script and returns the registration defining its own module.
	fn evaluate(&self, url: &str, body: &ScriptBody) -> Result<Registration> {
		tracing::trace!(url, "memory.evaluate");
		if let Err(err) = body(&self.host) {
			self.host.report_uncaught(err.located_at(url));
		}

		let pending = std::mem::take(&mut self.state.lock().pending);
		let mut anonymous = None;
		let mut last_named = None;
		{
			let mut state = self.state.lock();
			for (scope, name, registration) in pending {
				match name {
					Some(name) => {
						state.scopes.entry(scope).or_default().named.insert(name, registration.clone());
						last_named = Some(registration);
					}
					None => anonymous = Some(registration),
				}
			}
		}

		anonymous
			.or(last_named)
			.ok_or_else(|| Fault::engine(format!("Resolution Error: {url} did not instantiate")).into())
	}

	fn instantiate(&self, session: &mut Session, id: &str, registration: &Registration) -> Result<Value> {
		let cell = Arc::new(Mutex::new(Value::Nothing));
		session.instances.insert(id.to_string(), Arc::clone(&cell));

		let sink = Arc::clone(&cell);
		let declaration = registration.declare(Arc::new(move |exports| *sink.lock() = exports), &ModuleContext { url: id.to_string() });
		for (dep, setter) in registration.deps.iter().zip(&declaration.setters) {
			let resolved = self.resolve(session, dep)?;
			setter(&resolved);
		}
		(declaration.execute)()?;

		let exports = cell.lock().clone();
		Ok(exports)
	}
}

#[async_trait]
impl ResolutionEngine for MemoryEngine {
	fn install_import_map(&self, scope: Uuid, map: &ImportMap) -> Result<()> {
		self.state.lock().scopes.entry(scope).or_default().import_map = map.clone();
		Ok(())
	}

	fn set(&self, id: &str, module: Value) {
		self.state.lock().records.insert(id.to_string(), module);
	}

	fn delete(&self, scope: Uuid, id: &str) -> bool {
		let mut state = self.state.lock();
		let record = state.records.remove(id).is_some();
		let named = state.scopes.get_mut(&scope).is_some_and(|scoped| scoped.named.remove(id).is_some());
		record || named
	}

	fn has(&self, scope: Uuid, id: &str) -> bool {
		let state = self.state.lock();
		state.records.contains_key(id) || state.named(scope, id).is_some()
	}

	fn register(&self, scope: Uuid, name: Option<&str>, registration: Registration) {
		self.state.lock().pending.push((scope, name.map(str::to_string), registration));
	}

	async fn import(&self, scope: Uuid, specifier: &str) -> Result<Value> {
		let latency = {
			let state = self.state.lock();
			let id = state.resolve_id(scope, specifier);
			state.scripts.get(&id).map(|script| script.latency)
		};
		if let Some(latency) = latency.filter(|latency| !latency.is_zero()) {
			tokio::time::sleep(latency).await;
		}

		let mut session = Session {
			scope,
			instances: HashMap::new(),
		};
		self.resolve(&mut session, specifier)
	}

	fn release(&self, scope: Uuid) {
		self.state.lock().scopes.remove(&scope);
	}
}
