//! Process-wide state shared by every scoped loader.
//!
//! A [`Host`] stands in for the global scope legacy module code runs in: it
//! owns the single definition hook that `define(...)` calls reach, the
//! uncaught fault channel, and the [`ImportFlow`] that serializes access to
//! both. Loaders share one host through an `Arc`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use qti_data::{Error, Fault, Result, Value};

use crate::flow::ImportFlow;

/// Receiver of `define(...)` calls made by evaluated module code.
pub type DefineHook = Arc<dyn Fn(&[Value]) -> Result<()> + Send + Sync>;

/// Transient listener on the uncaught fault channel.
pub type FaultObserver = Arc<dyn Fn(&Error) -> Disposition + Send + Sync>;

/// Final receiver of faults no observer claimed.
pub type UncaughtHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Whether an observer claimed a fault reported on the uncaught channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
	/// The fault was consumed; later observers and the default handler skip it.
	Handled,
	/// The fault is passed on untouched.
	Ignored,
}

pub struct Host {
	define: RwLock<Option<DefineHook>>,
	observers: Mutex<Vec<(u64, FaultObserver)>>,
	next_observer: AtomicU64,
	uncaught: UncaughtHandler,
	flow: ImportFlow,
}

impl Default for Host {
	fn default() -> Self {
		Self::with_uncaught_handler(Arc::new(|err: &Error| {
			tracing::error!(error = %err, "host.uncaught");
		}))
	}
}

impl std::fmt::Debug for Host {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Host")
			.field("define_installed", &self.define.read().is_some())
			.field("observers", &self.observers.lock().len())
			.finish_non_exhaustive()
	}
}

impl Host {
	/// Creates a host whose unclaimed faults are logged at error level.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a host routing unclaimed faults to `handler`.
	pub fn with_uncaught_handler(handler: UncaughtHandler) -> Self {
		Self {
			define: RwLock::new(None),
			observers: Mutex::new(Vec::new()),
			next_observer: AtomicU64::new(0),
			uncaught: handler,
			flow: ImportFlow::new(),
		}
	}

	/// The process-wide `define(...)` entry point used by module code.
	pub fn define(&self, args: &[Value]) -> Result<()> {
		// Cloned out so the hook may itself touch the slot.
		let hook = self.define.read().clone();
		match hook {
			Some(hook) => hook(args),
			None => Err(Fault::new("define is not defined").into()),
		}
	}

	pub fn define_hook(&self) -> Option<DefineHook> {
		self.define.read().clone()
	}

	/// Replaces the definition hook, returning the previous one.
	pub fn set_define_hook(&self, hook: Option<DefineHook>) -> Option<DefineHook> {
		std::mem::replace(&mut *self.define.write(), hook)
	}

	/// Installs `hook` until the returned guard drops, then restores the prior hook.
	pub fn swap_define_hook(&self, hook: DefineHook) -> HookGuard<'_> {
		let previous = self.set_define_hook(Some(hook));
		HookGuard { host: self, previous }
	}

	/// Adds a transient observer to the uncaught fault channel.
	///
	/// Observers run in installation order; the first to return
	/// [`Disposition::Handled`] consumes the fault.
	pub fn observe(&self, observer: FaultObserver) -> ObserverGuard<'_> {
		let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
		self.observers.lock().push((id, observer));
		ObserverGuard { host: self, id }
	}

	/// Reports a fault raised outside any awaited call, e.g. while evaluating
	/// module code.
	pub fn report_uncaught(&self, err: Error) -> Disposition {
		let observers: Vec<FaultObserver> = self.observers.lock().iter().map(|(_, o)| Arc::clone(o)).collect();
		for observer in observers {
			if observer(&err) == Disposition::Handled {
				tracing::debug!(error = %err, "host.uncaught.claimed");
				return Disposition::Handled;
			}
		}
		(self.uncaught)(&err);
		Disposition::Ignored
	}

	pub fn flow(&self) -> &ImportFlow {
		&self.flow
	}
}

/// Restores the previous definition hook on drop.
#[must_use = "the previous hook is restored as soon as the guard drops"]
pub struct HookGuard<'a> {
	host: &'a Host,
	previous: Option<DefineHook>,
}

impl Drop for HookGuard<'_> {
	fn drop(&mut self) {
		self.host.set_define_hook(self.previous.take());
	}
}

/// Removes a fault observer on drop.
#[must_use = "the observer is removed as soon as the guard drops"]
pub struct ObserverGuard<'a> {
	host: &'a Host,
	id: u64,
}

impl Drop for ObserverGuard<'_> {
	fn drop(&mut self) {
		self.host.observers.lock().retain(|(id, _)| *id != self.id);
	}
}
