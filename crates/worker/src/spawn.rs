use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::TaskClass;

const FALLBACK_THREAD: &str = "qti-loader";

/// Runtime for loads started outside of any tokio context.
///
/// Import windows already run one at a time and widget loads only wait on
/// registration callbacks, so one driver thread is enough.
fn fallback_handle() -> Handle {
	static FALLBACK: OnceLock<Handle> = OnceLock::new();
	FALLBACK
		.get_or_init(|| {
			let start = || -> std::io::Result<Handle> {
				let runtime = Builder::new_current_thread().enable_all().build()?;
				let handle = runtime.handle().clone();
				std::thread::Builder::new()
					.name(FALLBACK_THREAD.into())
					.spawn(move || runtime.block_on(std::future::pending::<()>()))?;
				Ok(handle)
			};
			start().expect("failed to start the loader fallback runtime")
		})
		.clone()
}

/// Spawns loader work tagged with its execution class.
///
/// Runs on the ambient runtime when there is one, so a host driving its own
/// runtime keeps loads on it. Otherwise the task goes to the fallback driver.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	let span = tracing::trace_span!("worker.task", worker_class = class.as_str());
	let handle = Handle::try_current().unwrap_or_else(|_| {
		tracing::debug!(worker_class = class.as_str(), "worker.spawn.fallback");
		fallback_handle()
	});
	handle.spawn(fut.instrument(span))
}
