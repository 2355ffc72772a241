use std::{path::Path, sync::mpsc::SyncSender};

use crate::{error::Error, event::Event};

pub mod notify;
pub mod poll;

/// A change-detection backend driving one watch.
///
/// Between `start` and `stop` the backend owns its OS resources and is
/// the sole producer on `events`. Backends are single-use: a new watch
/// always constructs a fresh instance.
pub trait Backend: Send {
	/// Registers `path` and begins producing events. Production happens
	/// on a backend-owned thread; a blocked send is the back-pressure
	/// contract, not an error.
	fn start(&mut self, path: &Path, events: SyncSender<Event>) -> Result<(), Error>;

	/// Stops the backend. Returns only once no further send can occur
	/// for this instance.
	fn stop(&mut self) -> Result<(), Error>;
}
