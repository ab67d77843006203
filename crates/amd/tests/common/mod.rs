#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use qti_amd::{Host, MemoryEngine, ResolutionEngine, ScopedLoader};
use qti_data::{Closure, Error, Fault, Record, Result, Value};

pub const SAMPLES: &str = "http://files.test";

pub fn sample(name: &str) -> String {
	format!("{SAMPLES}/{name}.js")
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Shared host and engine serving the sample scripts, recording every fault
/// that reaches the default uncaught handler.
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
		add_samples(&engine);
		Self { host, engine, uncaught }
	}

	pub fn loader(&self) -> ScopedLoader {
		let engine: Arc<dyn ResolutionEngine> = self.engine.clone();
		ScopedLoader::new(Arc::clone(&self.host), engine)
	}

	pub fn uncaught(&self) -> Vec<String> {
		self.uncaught.lock().iter().map(ToString::to_string).collect()
	}
}

pub fn record<const N: usize>(entries: [(&str, Value); N]) -> Record {
	entries.into_iter().collect()
}

pub fn returning(value: impl Into<Value>) -> Value {
	let value = value.into();
	Closure::new(move |_| Ok(Some(value.clone()))).into()
}

pub fn deps(names: &[&str]) -> Value {
	Value::List(names.iter().map(|name| Value::from(*name)).collect())
}

fn add_samples(engine: &MemoryEngine) {
	engine.add_script(sample("resource"), |host| host.define(&[record([("foo", "bar".into())]).into()]));

	engine.add_script(sample("exports"), |host| {
		let factory = Closure::new(|args| {
			let [require, module, exports] = args else {
				return Err(Fault::new("unexpected arity").into());
			};
			let exports = exports.as_record()?;
			exports.insert("foo", "bar");
			exports.insert("require", require.clone());
			exports.insert("module", module.clone());
			Ok(None)
		});
		host.define(&[deps(&["require", "module", "exports"]), factory.into()])
	});

	engine.add_script(sample("bundle"), |host| {
		host.define(&["external".into(), deps(&[]), returning(Closure::new(|_| Ok(Some("external".into()))))])?;
		host.define(&["resource".into(), deps(&[]), returning(Closure::new(|_| Ok(Some("resource".into()))))])?;
		let internal = Closure::new(|args| {
			let external = args[0].as_closure()?.clone();
			let resource = args[1].as_closure()?.clone();
			let compose = Closure::new(move |args| {
				let message = args.first().map(Value::as_str).transpose()?.unwrap_or_default();
				let external = external.call(&[])?.unwrap_or_default();
				let resource = resource.call(&[])?.unwrap_or_default();
				Ok(Some(format!("{message} from compose with {} and {}", external.as_str()?, resource.as_str()?).into()))
			});
			Ok(Some(record([("compose", compose.into())]).into()))
		});
		host.define(&["internal".into(), deps(&["external", "resource"]), internal.into()])
	});

	engine.add_script(sample("invalid"), |host| host.define(&["invalid".into()]));

	engine.add_script(sample("error"), |_| {
		Err(Fault::new("Cannot read properties of undefined (reading 'foo')").into())
	});

	// Stand-ins for faults raised by unrelated code while a script evaluates.
	engine.add_script(sample("unrelated"), |host| {
		host.report_uncaught(Fault::new("Unrelated error").into());
		host.define(&[record([("foo", "bar".into())]).into()])
	});
	engine.add_script(sample("uncaught-invalid"), |host| {
		host.report_uncaught(Error::Format("Invalid call to define()".into()));
		Ok(())
	});
}

/// Serves `url` after `latency`, logging `label` into `order` on evaluation.
pub fn add_recorded(engine: &MemoryEngine, url: &str, label: &'static str, latency: Duration, order: &Arc<Mutex<Vec<&'static str>>>) {
	let order = Arc::clone(order);
	engine.add_script_with_latency(url, latency, move |host| {
		order.lock().push(label);
		host.define(&[returning(label)])
	});
}
