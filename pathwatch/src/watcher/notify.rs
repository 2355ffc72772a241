use std::{path::Path, sync::mpsc::SyncSender};

use log::{debug, error, warn};
use notify::{Config, ErrorKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::Backend;
use crate::{error::Error, event::Event};

/// Native backend: the platform notification API (inotify, FSEvents,
/// ReadDirectoryChangesW, kqueue) through `notify`, watching the whole
/// tree recursively.
pub struct NotifyBackend {
	watcher: Option<RecommendedWatcher>,
}

impl NotifyBackend {
	pub fn new() -> Self {
		Self { watcher: None }
	}
}

impl Backend for NotifyBackend {
	fn start(&mut self, path: &Path, events: SyncSender<Event>) -> Result<(), Error> {
		let root = path.to_path_buf();

		let mut watcher = RecommendedWatcher::new(
			move |result: Result<notify::Event, notify::Error>| match result {
				Ok(raw) => {
					if let Some(event) = Event::from_raw(&raw) {
						if events.send(event).is_err() {
							debug!("Delivery channel closed; dropping backend event");
						}
					}
				}
				Err(e) => {
					if is_fatal(&e) {
						error!("Watch on `{}` invalidated: {}", root.display(), e);
						let _ = events.send(Event::watcher_fault(&root));
					} else {
						warn!("Ignoring malformed notification: {}", e);
					}
				}
			},
			Config::default(),
		)
		.map_err(|e| Error::BackendUnavailable(e.to_string()))?;

		watcher
			.watch(path, RecursiveMode::Recursive)
			.map_err(|e| start_error(path, e))?;

		self.watcher = Some(watcher);
		Ok(())
	}

	fn stop(&mut self) -> Result<(), Error> {
		// Dropping the watcher deregisters the OS handles and joins the
		// notify event loop; after that its closure can no longer run.
		self.watcher.take();
		Ok(())
	}
}

/// An error that invalidates the whole watch, as opposed to one corrupt
/// notification.
fn is_fatal(error: &notify::Error) -> bool {
	matches!(
		error.kind,
		ErrorKind::WatchNotFound | ErrorKind::PathNotFound | ErrorKind::MaxFilesWatch
	)
}

fn start_error(path: &Path, error: notify::Error) -> Error {
	match error.kind {
		ErrorKind::PathNotFound => Error::InvalidPath {
			path: path.to_path_buf(),
			reason: error.to_string(),
		},
		_ => Error::StartFailed {
			path: path.to_path_buf(),
			reason: error.to_string(),
		},
	}
}
