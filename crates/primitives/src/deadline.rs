use std::future::Future;
use std::time::Duration;

/// Deadline applied when callers do not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Message carried by a [`TimeoutError`] when callers do not pick one.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "Timeout!";

/// Raised when an operation loses the race against its deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TimeoutError {
	message: String,
}

impl TimeoutError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}

	pub fn message(&self) -> &str {
		&self.message
	}
}

/// Deadline and message used by [`timed`] and [`race`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedOptions {
	pub timeout: Duration,
	pub message: String,
}

impl Default for TimedOptions {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			message: DEFAULT_TIMEOUT_MESSAGE.to_string(),
		}
	}
}

impl TimedOptions {
	pub fn new(timeout: Duration, message: impl Into<String>) -> Self {
		Self {
			timeout,
			message: message.into(),
		}
	}

	#[must_use]
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	#[must_use]
	pub fn message(mut self, message: impl Into<String>) -> Self {
		self.message = message.into();
		self
	}
}

/// Waits for `operation` or the deadline, whichever comes first.
///
/// The operation is polled before the timer, so an operation that is already
/// complete wins even against a zero deadline. A losing operation future is
/// dropped. Work that has to keep running past the deadline must live on its
/// own task, with `operation` awaiting only its handle.
pub async fn timed<F>(operation: F, options: TimedOptions) -> Result<F::Output, TimeoutError>
where
	F: Future,
{
	tokio::time::timeout(options.timeout, operation)
		.await
		.map_err(|_| TimeoutError::new(options.message))
}

/// Like [`timed`] for fallible operations, folding the deadline fault into the
/// operation's own error type.
pub async fn race<T, E, F>(operation: F, options: TimedOptions) -> Result<T, E>
where
	F: Future<Output = Result<T, E>>,
	E: From<TimeoutError>,
{
	match timed(operation, options).await {
		Ok(result) => result,
		Err(elapsed) => Err(elapsed.into()),
	}
}
