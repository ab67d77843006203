#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use qti_amd::{Host, MemoryEngine, ResolutionEngine};
use qti_data::{Closure, Error, Fault, Record, Result, Value};
use qti_pci::{CONTEXT_NAME, Config, GET_INSTANCE, GET_RESPONSE, GET_STATE, ONCOMPLETED, PciLoader, REGISTER, TYPE_IDENTIFIER};

pub const SAMPLES: &str = "http://files.test";
pub const FAILURE: &str = "A failure occurred";

pub fn sample(name: &str) -> String {
	format!("{SAMPLES}/{name}.js")
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub struct Fixture {
	pub host: Arc<Host>,
	pub engine: Arc<MemoryEngine>,
	pub uncaught: Arc<Mutex<Vec<Error>>>,
}

impl Fixture {
	pub fn new() -> Self {
		init_tracing();
		let uncaught = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&uncaught);
		let host = Arc::new(Host::with_uncaught_handler(Arc::new(move |err: &Error| sink.lock().push(err.clone()))));
		let engine = Arc::new(MemoryEngine::new(Arc::clone(&host)));
		Self { host, engine, uncaught }
	}

	pub fn pci(&self, url: impl Into<String>, name: Option<&str>) -> PciLoader {
		let engine: Arc<dyn ResolutionEngine> = self.engine.clone();
		PciLoader::new(Arc::clone(&self.host), engine, url, name)
	}
}

pub fn returning(value: impl Into<Value>) -> Value {
	let value = value.into();
	Closure::new(move |_| Ok(Some(value.clone()))).into()
}

pub fn deps(names: &[&str]) -> Value {
	Value::List(names.iter().map(|name| Value::from(*name)).collect())
}

/// Behaviour of a sample widget's `getInstance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Render {
	/// Calls `onready` before returning.
	Ready,
	/// Calls `onready` from a task after a delay.
	After(Duration),
	/// Fails without calling `onready`.
	Fail,
	/// Returns without calling or keeping `onready`.
	Forget,
}

/// An interaction echoing back the state it was created with.
fn interaction(config: &Config, state: Value) -> Result<Value> {
	let response = config.bound_response("RESPONSE")?.map(|response| response.to_value()).unwrap_or_default();
	let completed = Arc::new(AtomicUsize::new(0));
	Ok(Record::from_iter([
		(GET_RESPONSE, returning(response)),
		(GET_STATE, returning(state)),
		(
			ONCOMPLETED,
			Closure::new(move |_| {
				completed.fetch_add(1, Ordering::SeqCst);
				Ok(None)
			})
			.into(),
		),
	])
	.into())
}

/// A widget descriptor registering `type_identifier`.
pub fn widget(type_identifier: &str, render: Render) -> Value {
	let get_instance = Closure::new(move |args| {
		let [_container, config, state] = args else {
			return Err(Fault::new("getInstance expects three arguments").into());
		};
		let config = Config::from_value(config)?;
		let onready = config.onready.clone().ok_or_else(|| Fault::new("onready is missing"))?;
		match render {
			Render::Ready => {
				let instance = interaction(&config, state.clone())?;
				onready.call(&[instance, state.clone()])?;
			}
			Render::After(delay) => {
				let instance = interaction(&config, state.clone())?;
				let state = state.clone();
				tokio::spawn(async move {
					tokio::time::sleep(delay).await;
					let _ = onready.call(&[instance, state]);
				});
			}
			Render::Fail => return Err(Fault::new(FAILURE).into()),
			Render::Forget => {}
		}
		Ok(None)
	});
	Record::from_iter([(TYPE_IDENTIFIER, Value::from(type_identifier)), (GET_INSTANCE, get_instance.into())]).into()
}

/// A bundle laid out like a typical PCI: a few helper modules, the runtime
/// registering its widget, then the anonymous entry module.
pub fn add_pci(engine: &MemoryEngine, url: &str, type_identifier: &'static str, render: Render, latency: Duration) -> Arc<AtomicUsize> {
	let evaluations = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&evaluations);
	engine.add_script_with_latency(url, latency, move |host| {
		counter.fetch_add(1, Ordering::SeqCst);
		host.define(&["my/hello".into(), deps(&[]), returning("hello")])?;
		host.define(&["my/style".into(), deps(&[]), returning("style")])?;
		host.define(&["css!my/PCI/styles".into(), deps(&[]), Closure::new(|_| Ok(None)).into()])?;
		let runtime = Closure::new(move |args| {
			let context = args[0].as_record()?;
			let register = context.get(REGISTER).ok_or_else(|| Fault::new("register is missing"))?;
			register.as_closure()?.call(&[widget(type_identifier, render)])?;
			Ok(Some(Record::new().into()))
		});
		host.define(&[
			"my/PCI/runtime".into(),
			deps(&[CONTEXT_NAME, "my/hello", "my/style", "css!my/PCI/styles"]),
			runtime.into(),
		])?;
		host.define(&[deps(&["my/PCI/runtime"]), returning(Record::from_iter([("name", "IMSPCI")]))])
	});
	evaluations
}

/// A runtime whose factory throws before registering anything.
pub fn add_load_failure(engine: &MemoryEngine, url: &str) {
	engine.add_script(url, |host| {
		let runtime = Closure::new(|_| Err(Fault::new(FAILURE).into()));
		host.define(&[deps(&[CONTEXT_NAME]), runtime.into()])
	});
}

/// A runtime failing on its first evaluation only.
pub fn add_flaky(engine: &MemoryEngine, url: &str, type_identifier: &'static str) {
	let attempts = Arc::new(AtomicUsize::new(0));
	engine.add_script(url, move |host| {
		let first = attempts.fetch_add(1, Ordering::SeqCst) == 0;
		let runtime = Closure::new(move |args| {
			if first {
				return Err(Fault::new(FAILURE).into());
			}
			let register = args[0].get(REGISTER).unwrap_or_default();
			register.as_closure()?.call(&[widget(type_identifier, Render::Ready)])?;
			Ok(None)
		});
		host.define(&[deps(&[CONTEXT_NAME]), runtime.into()])
	});
}

/// A runtime registering a descriptor without any entry point.
pub fn add_invalid(engine: &MemoryEngine, url: &str, type_identifier: &'static str) {
	engine.add_script(url, move |host| {
		let runtime = Closure::new(move |args| {
			let register = args[0].get(REGISTER).unwrap_or_default();
			register.as_closure()?.call(&[Record::from_iter([(TYPE_IDENTIFIER, type_identifier)]).into()])?;
			Ok(None)
		});
		host.define(&[deps(&[CONTEXT_NAME]), runtime.into()])
	});
}
