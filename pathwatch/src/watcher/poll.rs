use std::{
	collections::HashMap,
	path::{Path, PathBuf},
	sync::{
		atomic::{AtomicBool, Ordering},
		mpsc::SyncSender,
		Arc,
	},
	thread,
	time::{Duration, SystemTime},
};

use log::{debug, trace, warn};
use walkdir::WalkDir;

use super::Backend;
use crate::{
	error::Error,
	event::{EffectType, Event, PathType},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Portable backend: re-walks the whole tree every interval and diffs
/// mtime snapshots. New subtrees are picked up on the next scan, so the
/// coverage race for a freshly created directory is bounded by one
/// interval.
pub struct PollBackend {
	interval: Duration,
	stop_flag: Arc<AtomicBool>,
	thread: Option<thread::JoinHandle<()>>,
}

#[derive(Clone, PartialEq, Eq)]
struct Stamp {
	modified: Option<SystemTime>,
	is_dir: bool,
}

impl PollBackend {
	pub fn new(interval: Duration) -> Self {
		Self {
			interval,
			stop_flag: Arc::new(AtomicBool::new(false)),
			thread: None,
		}
	}
}

impl Backend for PollBackend {
	fn start(&mut self, path: &Path, events: SyncSender<Event>) -> Result<(), Error> {
		if !path.exists() {
			return Err(Error::InvalidPath {
				path: path.to_path_buf(),
				reason: "path does not exist".to_string(),
			});
		}

		let root = path.to_path_buf();
		let interval = self.interval;
		let stop_flag = self.stop_flag.clone();

		// The first snapshot is the baseline; pre-existing entries do
		// not produce events.
		let mut previous = scan(&root);

		self.thread = Some(thread::spawn(move || {
			while !stop_flag.load(Ordering::Acquire) {
				thread::sleep(interval);
				if stop_flag.load(Ordering::Acquire) {
					break;
				}
				let current = scan(&root);
				if !emit_changes(&previous, &current, &events) {
					debug!("Delivery channel closed; poller for `{}` finishing", root.display());
					break;
				}
				previous = current;
			}
			trace!("Poller for `{}` stopped", root.display());
		}));

		Ok(())
	}

	fn stop(&mut self) -> Result<(), Error> {
		self.stop_flag.store(true, Ordering::Release);
		if let Some(thread) = self.thread.take() {
			if thread.join().is_err() {
				warn!("Poll thread panicked during shutdown");
			}
		}
		Ok(())
	}
}

fn scan(root: &Path) -> HashMap<PathBuf, Stamp> {
	let mut snapshot = HashMap::new();
	for entry in WalkDir::new(root).follow_links(false) {
		match entry {
			Ok(entry) => {
				let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
				snapshot.insert(
					entry.path().to_path_buf(),
					Stamp {
						modified,
						is_dir: entry.file_type().is_dir(),
					},
				);
			}
			Err(e) => trace!("Skipping unreadable entry under `{}`: {}", root.display(), e),
		}
	}
	snapshot
}

/// Diffs two snapshots into events. Returns false once the delivery
/// channel is gone.
fn emit_changes(
	previous: &HashMap<PathBuf, Stamp>,
	current: &HashMap<PathBuf, Stamp>,
	events: &SyncSender<Event>,
) -> bool {
	for (path, stamp) in current {
		let event = match previous.get(path) {
			None => Some(Event::new(path.clone(), EffectType::Create, kind_of(stamp))),
			Some(known) if known.modified != stamp.modified => {
				Some(Event::new(path.clone(), EffectType::Modify, kind_of(stamp)))
			}
			Some(_) => None,
		};
		if let Some(event) = event {
			if events.send(event).is_err() {
				return false;
			}
		}
	}
	for (path, stamp) in previous {
		if !current.contains_key(path) {
			let event = Event::new(path.clone(), EffectType::Destroy, kind_of(stamp));
			if events.send(event).is_err() {
				return false;
			}
		}
	}
	true
}

fn kind_of(stamp: &Stamp) -> PathType {
	if stamp.is_dir {
		PathType::Dir
	} else {
		PathType::File
	}
}
