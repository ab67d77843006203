//! FIFO serialization of interception windows.
//!
//! Each window holds a [`FlowTurn`]; the next window opens once the previous
//! turn is dropped, whatever the outcome of the work done under it. Queue
//! positions are taken synchronously by [`ImportFlow::enqueue`], so windows
//! open in call order even when the tasks running them are polled out of
//! order.

use parking_lot::Mutex;
use qti_worker::TaskClass;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
pub struct ImportFlow {
	tail: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ImportFlow {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reserves the next position in the queue.
	pub fn enqueue(&self) -> FlowTicket {
		let (release, next) = oneshot::channel();
		let prev = self.tail.lock().replace(next);
		FlowTicket {
			prev,
			release: Some(release),
		}
	}
}

/// A reserved queue position.
///
/// Dropping a ticket before its turn keeps the queue ordered: its successor
/// still waits for the predecessor.
#[derive(Debug)]
pub struct FlowTicket {
	prev: Option<oneshot::Receiver<()>>,
	release: Option<oneshot::Sender<()>>,
}

impl FlowTicket {
	/// Waits until every earlier window has closed.
	pub async fn turn(mut self) -> FlowTurn {
		if let Some(prev) = self.prev.as_mut() {
			// A dropped sender is a closed window too.
			let _ = prev.await;
		}
		self.prev = None;
		FlowTurn { _release: self.release.take() }
	}
}

impl Drop for FlowTicket {
	fn drop(&mut self) {
		if let (Some(prev), Some(release)) = (self.prev.take(), self.release.take()) {
			qti_worker::spawn(TaskClass::ImportWindow, async move {
				let _ = prev.await;
				drop(release);
			});
		}
	}
}

/// An open window. The next window opens when this drops.
#[derive(Debug)]
#[must_use = "the window closes as soon as the turn drops"]
pub struct FlowTurn {
	_release: Option<oneshot::Sender<()>>,
}
