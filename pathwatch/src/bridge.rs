use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
		Arc,
	},
	thread,
	time::Duration,
};

use log::{debug, trace};

use crate::{error::Error, event::Event};

/// How many events may sit between the producing backend and the
/// callback before the producer blocks. Delivery is ordered and
/// non-dropping: a full buffer applies back-pressure, it never sheds.
pub const PENDING_EVENT_DEPTH: usize = 1024;

/// Moves events from a backend's thread onto a dedicated delivery
/// thread that invokes the watch callback.
///
/// Sending an `Event` transfers ownership of it to the bridge; the
/// delivery thread owns it until the callback returns, after which it
/// is released. Per-handle order is the backend's production order.
///
/// Teardown is discard: once `begin_close` runs, queued events are
/// drained without invoking the callback, and `wait_quiescent` does not
/// return `Ok` until the delivery thread is gone.
pub struct Bridge {
	sender: Option<SyncSender<Event>>,
	closing: Arc<AtomicBool>,
	done: Receiver<()>,
	thread: Option<thread::JoinHandle<()>>,
}

impl Bridge {
	/// Spawns the delivery thread. The returned sender is the producer
	/// handle for the backend; the bridge keeps its own copy alive until
	/// `wait_quiescent`.
	pub fn start<F>(callback: F) -> (Self, SyncSender<Event>)
	where
		F: Fn(Event) + Send + 'static,
	{
		let (sender, receiver) = mpsc::sync_channel::<Event>(PENDING_EVENT_DEPTH);
		let (done_sender, done) = mpsc::channel();
		let closing = Arc::new(AtomicBool::new(false));
		let closing_flag = closing.clone();

		let thread = thread::spawn(move || {
			// Dropped on exit; its disconnect is the quiescence signal.
			let _done = done_sender;
			let mut last_time: i64 = 0;
			while let Ok(mut event) = receiver.recv() {
				if closing_flag.load(Ordering::Acquire) {
					trace!("Discarding `{}` during teardown", event.path_name.display());
					continue;
				}
				if event.effect_time < last_time {
					event.effect_time = last_time;
				} else {
					last_time = event.effect_time;
				}
				callback(event);
			}
			debug!("Delivery thread finished");
		});

		let producer = sender.clone();
		let bridge = Self {
			sender: Some(sender),
			closing,
			done,
			thread: Some(thread),
		};
		(bridge, producer)
	}

	/// Marks teardown. Events still queued (or still arriving) are
	/// drained and discarded instead of reaching the callback.
	pub fn begin_close(&self) {
		self.closing.store(true, Ordering::Release);
	}

	/// Blocks until the delivery thread has exited, bounded by
	/// `timeout`. The backend must already have been stopped, since the
	/// thread only exits once the last producer handle is gone.
	pub fn wait_quiescent(&mut self, timeout: Duration) -> Result<(), Error> {
		self.sender.take();
		match self.done.recv_timeout(timeout) {
			Ok(()) | Err(RecvTimeoutError::Disconnected) => {
				if let Some(thread) = self.thread.take() {
					let _ = thread.join();
				}
				Ok(())
			}
			Err(RecvTimeoutError::Timeout) => Err(Error::ShutdownTimeout(timeout)),
		}
	}
}

impl Drop for Bridge {
	fn drop(&mut self) {
		// Without an explicit close the thread is left to drain and
		// exit on its own once the producers disconnect.
		self.closing.store(true, Ordering::Release);
		self.sender.take();
	}
}
