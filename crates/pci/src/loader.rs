//! Loading one widget runtime and rendering instances of it.
//!
//! A runtime bundle depends on `qtiCustomInteractionContext` and calls its
//! `register(descriptor)` while it evaluates. [`PciLoader`] hands each load
//! attempt a private context through a [`ScopedLoader`], so runtimes loaded
//! side by side never see each other's registrations.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use qti_amd::{Host, ResolutionEngine, ScopedLoader};
use qti_data::{Closure, Error, Fault, Record, Result, Value};
use qti_primitives::{TimedOptions, race};
use qti_worker::TaskClass;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;

use crate::config::{Config, LoadOptions};
use crate::interaction::Interaction;
use crate::registry::{Descriptor, PciRegistry, RegistryGetter};

/// Name under which runtimes find their registration context.
pub const CONTEXT_NAME: &str = "qtiCustomInteractionContext";
pub const REGISTER: &str = "register";

pub const LOAD_TIMEOUT_MESSAGE: &str = "Loading PCI timed out";
pub const RENDER_TIMEOUT_MESSAGE: &str = "Getting PCI instance timed out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderStatus {
	#[default]
	Initial,
	Loading,
	Loaded,
	Error,
}

impl LoaderStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Initial => "initial",
			Self::Loading => "loading",
			Self::Loaded => "loaded",
			Self::Error => "error",
		}
	}
}

impl fmt::Display for LoaderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

type Settled = Option<Result<RegistryGetter>>;

/// One load attempt. Every caller joining it waits on the same channel.
struct InFlightLoad {
	tx: watch::Sender<Settled>,
	rx: watch::Receiver<Settled>,
}

impl InFlightLoad {
	fn new() -> Arc<Self> {
		let (tx, rx) = watch::channel(None);
		Arc::new(Self { tx, rx })
	}

	fn settled(&self) -> Settled {
		self.rx.borrow().clone()
	}
}

struct PciInner {
	url: String,
	name: RwLock<Option<String>>,
	status: RwLock<LoaderStatus>,
	host: Arc<Host>,
	engine: Arc<dyn ResolutionEngine>,
	attempt: Mutex<Option<Arc<InFlightLoad>>>,
}

impl PciInner {
	fn set_status(&self, status: LoaderStatus) {
		*self.status.write() = status;
	}

	/// Validates a registration and builds the registry it resolves to.
	fn accept(&self, descriptor: &Value) -> Result<RegistryGetter> {
		let actual = Descriptor::from_value(descriptor)?.type_identifier().to_string();
		let mut name = self.name.write();
		match name.as_deref() {
			None => *name = Some(actual),
			Some(expected) if expected != actual => {
				return Err(Error::NameMismatch {
					expected: expected.to_string(),
					actual,
				});
			}
			Some(_) => {}
		}
		drop(name);

		let registry = PciRegistry::new();
		registry.register(descriptor)?;
		Ok(RegistryGetter::new(registry))
	}

	/// Settles `attempt` unless it already is. The status moves together
	/// with the settlement so waiters never observe a stale one.
	fn settle(&self, attempt: &InFlightLoad, result: Result<RegistryGetter>) -> bool {
		let failure = result.as_ref().err().map(ToString::to_string);
		let status = if failure.is_some() { LoaderStatus::Error } else { LoaderStatus::Loaded };
		let settled = attempt.tx.send_if_modified(|slot| {
			if slot.is_some() {
				return false;
			}
			self.set_status(status);
			*slot = Some(result);
			true
		});

		if settled {
			match failure {
				Some(error) => tracing::warn!(url = %self.url, %status, %error, "pci.attempt.settled"),
				None => tracing::debug!(url = %self.url, %status, "pci.attempt.settled"),
			}
		}
		settled
	}
}

/// Loads the widget runtime at one URL and renders instances of it.
///
/// Clones share state. Concurrent and repeated loads join the same attempt;
/// an attempt that failed is replaced by a fresh one on the next call.
#[derive(Clone)]
pub struct PciLoader {
	inner: Arc<PciInner>,
}

impl fmt::Debug for PciLoader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PciLoader")
			.field("url", &self.inner.url)
			.field("name", &*self.inner.name.read())
			.field("status", &*self.inner.status.read())
			.finish_non_exhaustive()
	}
}

impl PciLoader {
	/// Creates a loader for the runtime at `url`.
	///
	/// With `name` set, the runtime must register exactly that type
	/// identifier; otherwise the first registered identifier is adopted.
	pub fn new(host: Arc<Host>, engine: Arc<dyn ResolutionEngine>, url: impl Into<String>, name: Option<&str>) -> Self {
		Self {
			inner: Arc::new(PciInner {
				url: url.into(),
				name: RwLock::new(name.map(str::to_string)),
				status: RwLock::new(LoaderStatus::Initial),
				host,
				engine,
				attempt: Mutex::new(None),
			}),
		}
	}

	pub fn url(&self) -> &str {
		&self.inner.url
	}

	pub fn name(&self) -> Option<String> {
		self.inner.name.read().clone()
	}

	pub fn status(&self) -> LoaderStatus {
		*self.inner.status.read()
	}

	/// Loads the runtime and resolves to the registry it registered into.
	///
	/// A timeout marks the loader as errored without cancelling the attempt,
	/// which a later call joins.
	pub async fn load(&self, options: LoadOptions) -> Result<RegistryGetter> {
		let attempt = self.attempt();
		let wait = wait_settled(attempt.rx.clone());
		let result = match options.timeout() {
			Some(timeout) => race(wait, TimedOptions::new(timeout, LOAD_TIMEOUT_MESSAGE)).await,
			None => wait.await,
		};

		if let Err(err) = &result {
			if err.is_timeout() {
				tracing::warn!(url = %self.inner.url, timeout_ms = options.timeout_ms, "pci.load.timeout");
				self.inner.set_status(LoaderStatus::Error);
			}
		}
		result
	}

	/// Renders a widget instance.
	///
	/// Resolves once the widget calls `onready(interaction, state)`. The
	/// caller's own `onready`, if any, runs first. Loading and rendering share
	/// one budget: rendering only gets what loading left over.
	pub async fn get_instance(&self, container: Value, config: Config, state: Value, options: LoadOptions) -> Result<(Interaction, Value)> {
		let started = Instant::now();
		let registry = self.load(options).await?;
		let name = self.name().unwrap_or_default();

		let (ready, rendered) = oneshot::channel();
		let onready = ready_callback(config.onready.clone(), ready);
		let configuration = Value::from(config.with_onready(onready));
		registry.get_instance(&name, container, configuration, state)?;

		let rendered = async move {
			match rendered.await {
				Ok(result) => result,
				Err(_) => Err(Fault::new(format!("PCI \"{name}\" released onready without calling it")).into()),
			}
		};
		match options.timeout() {
			Some(timeout) => {
				let remaining = timeout.saturating_sub(started.elapsed());
				race(rendered, TimedOptions::new(remaining, RENDER_TIMEOUT_MESSAGE)).await
			}
			None => rendered.await,
		}
	}

	/// The pending or successful attempt, or a fresh one.
	fn attempt(&self) -> Arc<InFlightLoad> {
		let mut slot = self.inner.attempt.lock();
		if let Some(attempt) = slot.as_ref() {
			match attempt.settled() {
				None => {
					self.inner.set_status(LoaderStatus::Loading);
					return Arc::clone(attempt);
				}
				Some(Ok(_)) => return Arc::clone(attempt),
				Some(Err(_)) => {}
			}
		}

		let attempt = self.start();
		*slot = Some(Arc::clone(&attempt));
		attempt
	}

	fn start(&self) -> Arc<InFlightLoad> {
		let attempt = InFlightLoad::new();
		let loader = ScopedLoader::new(Arc::clone(&self.inner.host), Arc::clone(&self.inner.engine));
		loader.define(CONTEXT_NAME, context(Arc::downgrade(&self.inner), Arc::clone(&attempt)));
		self.inner.set_status(LoaderStatus::Loading);
		tracing::debug!(url = %self.inner.url, scope = %loader.scope(), "pci.attempt.start");

		let pending = loader.load(self.inner.url.clone());
		let inner = Arc::downgrade(&self.inner);
		let settling = Arc::clone(&attempt);
		qti_worker::spawn(TaskClass::WidgetLoad, async move {
			let result = pending.await;
			loader.undefine(CONTEXT_NAME);
			// A runtime that loads without registering leaves the attempt pending.
			if let (Err(err), Some(inner)) = (result, inner.upgrade()) {
				inner.settle(&settling, Err(err));
			}
		});
		attempt
	}
}

/// The `qtiCustomInteractionContext` one attempt exposes to its runtime.
fn context(inner: Weak<PciInner>, attempt: Arc<InFlightLoad>) -> Record {
	let register = Closure::new(move |args| {
		let Some(inner) = inner.upgrade() else {
			return Ok(None);
		};
		if attempt.settled().is_some() {
			tracing::debug!(url = %inner.url, "pci.register.ignored");
			return Ok(None);
		}
		let descriptor = args.first().cloned().unwrap_or_default();
		let result = inner.accept(&descriptor);
		inner.settle(&attempt, result);
		Ok(None)
	});
	Record::from_iter([(REGISTER, register)])
}

/// Wraps the caller's `onready` so the first call also settles `ready`.
fn ready_callback(caller: Option<Closure>, ready: oneshot::Sender<Result<(Interaction, Value)>>) -> Closure {
	let ready = Mutex::new(Some(ready));
	Closure::new(move |args| {
		let interaction = args.first().cloned().unwrap_or_default();
		let state = args.get(1).cloned().unwrap_or_default();
		let outcome = match &caller {
			Some(onready) => onready.call(args).map(|_| ()),
			None => Ok(()),
		};

		let result = outcome.clone().and_then(|()| Ok((Interaction::from_value(&interaction)?, state)));
		if let Some(ready) = ready.lock().take() {
			let _ = ready.send(result);
		}
		outcome.map(|()| None)
	})
}

async fn wait_settled(mut rx: watch::Receiver<Settled>) -> Result<RegistryGetter> {
	loop {
		let settled = rx.borrow_and_update().clone();
		if let Some(result) = settled {
			return result;
		}
		if rx.changed().await.is_err() {
			return Err(Fault::new("PCI load attempt abandoned").into());
		}
	}
}
