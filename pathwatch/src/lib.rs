//! Filesystem watching with a start/stop lifecycle.
//!
//! `watch` points a callback at a file or directory tree; every change
//! under it arrives as one normalized [`Event`]. `die` stops the watch
//! and returns only once no further callback invocation can occur.
//!
//! ```no_run
//! let ok = pathwatch::watch("/some/tree", |event| {
//! 	println!("{} {}", event.effect_type, event.path_name.display());
//! });
//! assert!(ok);
//! // ... later ...
//! assert!(pathwatch::die("/some/tree"));
//! ```
//!
//! Callbacks run on a per-watch delivery thread, never on the caller's
//! own. Embedders wanting error details or private bookkeeping use
//! [`Registry`] directly; these crate-level functions share one
//! process-wide registry and fold errors into booleans.

pub mod bridge;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod registry;
pub mod watcher;

use std::{path::Path, sync::OnceLock};

use log::{debug, error};

pub use crate::{
	dispatch::BackendKind,
	error::Error,
	event::{EffectType, Event, PathType},
	registry::{Registry, WatchConfig},
};

fn global() -> &'static Registry {
	static REGISTRY: OnceLock<Registry> = OnceLock::new();
	REGISTRY.get_or_init(Registry::new)
}

/// Starts watching `path`, feeding every event to `callback`.
/// Returns true iff the watch started.
pub fn watch<P, F>(path: P, callback: F) -> bool
where
	P: AsRef<Path>,
	F: Fn(Event) + Send + 'static,
{
	match global().watch(path.as_ref(), callback) {
		Ok(()) => true,
		Err(e) => {
			error!("{}", e);
			false
		}
	}
}

/// Stops the watch on `path`. Returns true iff a live watch was found
/// and cleanly stopped; by the time it returns, its callback is silent.
pub fn die<P: AsRef<Path>>(path: P) -> bool {
	die_with(path, |_event| {})
}

/// Like `die`, handing `callback` one final teardown event.
pub fn die_with<P, F>(path: P, callback: F) -> bool
where
	P: AsRef<Path>,
	F: FnOnce(Event),
{
	match global().die_with(path.as_ref(), callback) {
		Ok(()) => true,
		Err(Error::NotWatching(path)) => {
			debug!("No live watch on `{}`", path.display());
			false
		}
		Err(e) => {
			error!("{}", e);
			false
		}
	}
}
