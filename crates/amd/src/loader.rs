use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::{Mutex, RwLock};
use qti_data::{Error, Fault, FaultOrigin, Result, Value};
use qti_worker::TaskClass;
use tokio::sync::oneshot;
use tracing::Instrument;
use uuid::Uuid;

use crate::define::{Definition, unwrap_default, wrap_default};
use crate::engine::{ImportMap, ResolutionEngine};
use crate::flow::FlowTicket;
use crate::host::{DefineHook, Disposition, FaultObserver, Host};

/// Text that marks an untagged fault as raised by the resolution engine.
pub const ENGINE_FAULT_MARKER: &str = "Resolution Error";

/// Resolution target of a logical module name.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
	/// Location handed to the engine as-is.
	Url(String),
	/// In-memory module stored in the engine under a synthetic identifier.
	Module(Value),
}

impl From<&str> for Target {
	fn from(url: &str) -> Self {
		Self::Url(url.to_string())
	}
}

impl From<String> for Target {
	fn from(url: String) -> Self {
		Self::Url(url)
	}
}

impl From<Value> for Target {
	fn from(value: Value) -> Self {
		match value {
			Value::String(url) => Self::Url(url),
			module => Self::Module(module),
		}
	}
}

impl From<qti_data::Record> for Target {
	fn from(record: qti_data::Record) -> Self {
		Self::Module(Value::Record(record))
	}
}

/// Module loader with a private import map over the shared engine.
///
/// Names defined on one loader are only visible to loads made through it,
/// and `define(...)` calls evaluated during its loads register into the
/// engine under this loader's scope only. Cloning shares the loader; the
/// scope is released from the engine when the last clone drops.
#[derive(Clone)]
pub struct ScopedLoader {
	inner: Arc<LoaderInner>,
}

struct LoaderInner {
	scope: Uuid,
	host: Arc<Host>,
	engine: Arc<dyn ResolutionEngine>,
	import_map: RwLock<ImportMap>,
}

impl std::fmt::Debug for ScopedLoader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScopedLoader")
			.field("scope", &self.inner.scope)
			.field("import_map", &*self.inner.import_map.read())
			.finish_non_exhaustive()
	}
}

impl ScopedLoader {
	pub fn new(host: Arc<Host>, engine: Arc<dyn ResolutionEngine>) -> Self {
		Self {
			inner: Arc::new(LoaderInner {
				scope: Uuid::new_v4(),
				host,
				engine,
				import_map: RwLock::new(ImportMap::new()),
			}),
		}
	}

	pub fn scope(&self) -> Uuid {
		self.inner.scope
	}

	/// Snapshot of the names defined on this loader.
	pub fn import_map(&self) -> ImportMap {
		self.inner.import_map.read().clone()
	}

	/// Maps `name` to a location, or stores an in-memory module for it.
	///
	/// In-memory modules are wrapped as default-only exports unless they are
	/// already a [`Value::Namespace`].
	pub fn define(&self, name: &str, target: impl Into<Target>) {
		self.inner.define(name, target.into(), false);
	}

	/// Stores `module` as a multi-export namespace, without wrapping.
	pub fn define_esm(&self, name: &str, module: Value) {
		self.inner.define(name, Target::Module(module), true);
	}

	/// Forgets `name`. Returns whether anything was removed.
	pub fn undefine(&self, name: &str) -> bool {
		let target = self.inner.import_map.write().remove(name);
		match target {
			Some(target) if target.starts_with(&self.inner.synthetic_prefix()) => {
				self.inner.engine.delete(self.inner.scope, &target);
				true
			}
			Some(_) => {
				self.inner.engine.delete(self.inner.scope, name);
				true
			}
			None => self.inner.engine.delete(self.inner.scope, name),
		}
	}

	pub fn defined(&self, name: &str) -> bool {
		let mapped = self.inner.import_map.read().contains(name);
		mapped || self.inner.engine.has(self.inner.scope, name)
	}

	/// Loads `module_path` and resolves to its exports.
	///
	/// The queue position is taken immediately; the load itself runs in its
	/// own window once every earlier load of any loader sharing the host has
	/// settled. Dropping the handle does not cancel the load.
	pub fn load(&self, module_path: impl Into<String>) -> LoadHandle {
		let module_path = module_path.into();
		let ticket = self.inner.host.flow().enqueue();
		let (tx, rx) = oneshot::channel();
		let settle = Settle::new(tx);

		let inner = Arc::clone(&self.inner);
		let span = tracing::debug_span!("amd.load", scope = %inner.scope, module = %module_path);
		qti_worker::spawn(
			TaskClass::ImportWindow,
			async move { inner.run_window(ticket, &module_path, settle).await }.instrument(span),
		);

		LoadHandle { rx }
	}
}

impl LoaderInner {
	fn synthetic_prefix(&self) -> String {
		format!("app:{}/", self.scope)
	}

	fn define(&self, name: &str, target: Target, esm: bool) {
		let id = match target {
			Target::Url(url) => url,
			Target::Module(module) => {
				let id = format!("{}{name}", self.synthetic_prefix());
				let stored = match module {
					Value::Record(record) if esm => Value::Namespace(record),
					module @ Value::Namespace(_) => module,
					module if esm => module,
					module => wrap_default(module),
				};
				self.engine.set(&id, stored);
				id
			}
		};
		tracing::trace!(scope = %self.scope, name, target = %id, "amd.define_target");
		self.import_map.write().insert(name, id);
	}

	async fn run_window(&self, ticket: FlowTicket, module_path: &str, settle: Settle) {
		let _turn = ticket.turn().await;
		tracing::debug!("amd.load.begin");

		let map = self.import_map.read().clone();
		if let Err(err) = self.engine.install_import_map(self.scope, &map) {
			tracing::debug!(error = %err, "amd.load.import_map_failed");
			settle.send(Err(err));
			return;
		}

		let _hook = self.host.swap_define_hook(self.capture_hook());
		let _observer = self.host.observe(fault_observer(module_path, settle.clone()));

		let result = self.engine.import(self.scope, module_path).await.map(|module| unwrap_default(&module));
		match &result {
			Ok(_) => tracing::debug!("amd.load.done"),
			Err(err) => tracing::debug!(error = %err, "amd.load.failed"),
		}
		settle.send(result);
	}

	fn capture_hook(&self) -> DefineHook {
		let engine = Arc::clone(&self.engine);
		let scope = self.scope;
		Arc::new(move |args: &[Value]| {
			let (name, registration) = Definition::parse(args)?.into_registration();
			tracing::trace!(%scope, name = name.as_deref().unwrap_or("<anonymous>"), deps = ?registration.deps, "amd.register");
			engine.register(scope, name.as_deref(), registration);
			Ok(())
		})
	}
}

impl Drop for LoaderInner {
	fn drop(&mut self) {
		let prefix = self.synthetic_prefix();
		let map = std::mem::take(self.import_map.get_mut());
		for target in map.imports.values().filter(|target| target.starts_with(&prefix)) {
			self.engine.delete(self.scope, target);
		}
		self.engine.release(self.scope);
		tracing::trace!(scope = %self.scope, "amd.scope.released");
	}
}

fn fault_observer(module_path: &str, settle: Settle) -> FaultObserver {
	let module_path = module_path.to_string();
	Arc::new(move |err: &Error| {
		if !correlates(err, &module_path) {
			return Disposition::Ignored;
		}
		settle.send(Err(err.clone()));
		Disposition::Handled
	})
}

/// Whether an uncaught fault belongs to the load of `module_path`.
fn correlates(err: &Error, module_path: &str) -> bool {
	match err {
		Error::Format(_) | Error::Unsupported(_) => true,
		Error::Fault(fault) => match fault.origin() {
			FaultOrigin::Engine => true,
			FaultOrigin::Module(location) => location == module_path,
			FaultOrigin::Unknown => fault.message().contains(ENGINE_FAULT_MARKER) || fault.message().contains(module_path),
		},
		Error::NameMismatch { .. } | Error::NotFound(_) | Error::Timeout(_) => false,
	}
}

/// First-wins settlement shared by a window and its fault observer.
#[derive(Clone)]
struct Settle(Arc<Mutex<Option<oneshot::Sender<Result<Value>>>>>);

impl Settle {
	fn new(tx: oneshot::Sender<Result<Value>>) -> Self {
		Self(Arc::new(Mutex::new(Some(tx))))
	}

	fn send(&self, result: Result<Value>) -> bool {
		let tx = self.0.lock().take();
		match tx {
			Some(tx) => tx.send(result).is_ok(),
			None => false,
		}
	}
}

/// Pending result of [`ScopedLoader::load`].
#[derive(Debug)]
#[must_use = "dropping the handle discards the load result"]
pub struct LoadHandle {
	rx: oneshot::Receiver<Result<Value>>,
}

impl Future for LoadHandle {
	type Output = Result<Value>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(|settled| settled.unwrap_or_else(|_| Err(Fault::engine("module load abandoned before settling").into())))
	}
}
