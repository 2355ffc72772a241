use std::{
	collections::HashMap,
	fs,
	path::{Path, PathBuf},
	sync::{Mutex, MutexGuard},
	time::Duration,
};

use log::{debug, info, warn};

use crate::{
	bridge::Bridge,
	dispatch::{self, BackendFactory, BackendKind},
	error::Error,
	event::Event,
	watcher::{poll::DEFAULT_POLL_INTERVAL, Backend},
};

/// Settings shared by every watch a `Registry` starts.
#[derive(Debug, Clone)]
pub struct WatchConfig {
	/// Forces a backend instead of probing the host.
	pub backend: Option<BackendKind>,
	/// Scan interval for the polling backend.
	pub poll_interval: Duration,
	/// Watchdog bound on teardown quiescence.
	pub stop_timeout: Duration,
}

impl Default for WatchConfig {
	fn default() -> Self {
		Self {
			backend: None,
			poll_interval: DEFAULT_POLL_INTERVAL,
			stop_timeout: Duration::from_secs(5),
		}
	}
}

enum WatchState {
	/// Reserved in the registry, backend not yet registered.
	Unstarted,
	Live,
	Dying,
	Dead,
}

struct WatchEntry {
	state: WatchState,
	live: Option<LiveWatch>,
}

struct LiveWatch {
	backend: Box<dyn Backend>,
	bridge: Bridge,
}

/// The process's watch bookkeeping: one live watch per path, one lock.
///
/// The map is the only shared mutable state in the crate; every insert,
/// lookup and removal happens under its mutex, and the lock is never
/// held across backend registration or teardown.
pub struct Registry {
	config: WatchConfig,
	factory: Option<BackendFactory>,
	watches: Mutex<HashMap<PathBuf, WatchEntry>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::with_config(WatchConfig::default())
	}

	pub fn with_config(config: WatchConfig) -> Self {
		Self {
			config,
			factory: None,
			watches: Mutex::new(HashMap::new()),
		}
	}

	/// Bypasses dispatch, constructing every backend through `factory`.
	pub fn with_factory(factory: BackendFactory) -> Self {
		Self {
			config: WatchConfig::default(),
			factory: Some(factory),
			watches: Mutex::new(HashMap::new()),
		}
	}

	fn make_backend(&self) -> Box<dyn Backend> {
		match &self.factory {
			Some(factory) => factory(),
			None => {
				let kind = self.config.backend.unwrap_or_else(dispatch::select_backend);
				debug!("Dispatching {:?} backend", kind);
				dispatch::create_backend(kind, self.config.poll_interval)
			}
		}
	}

	/// Starts a watch on `path`, delivering every event to `callback`
	/// until `die`. Fails without side effects if `path` is invalid,
	/// already watched, or the backend refuses it.
	pub fn watch<P, F>(&self, path: P, callback: F) -> Result<(), Error>
	where
		P: AsRef<Path>,
		F: Fn(Event) + Send + 'static,
	{
		let key = normalize(path.as_ref())?;

		// Reserve the key first so the lock is not held while the OS
		// registration runs; a concurrent watch on the same path sees
		// the reservation and fails.
		{
			let mut watches = lock(&self.watches);
			if watches.contains_key(&key) {
				return Err(Error::AlreadyWatching(key));
			}
			watches.insert(
				key.clone(),
				WatchEntry {
					state: WatchState::Unstarted,
					live: None,
				},
			);
		}

		let mut backend = self.make_backend();
		let (bridge, events) = Bridge::start(callback);

		if let Err(e) = backend.start(&key, events.clone()) {
			// The handle never reaches Live.
			lock(&self.watches).remove(&key);
			return Err(e);
		}

		if events.send(Event::watcher_live(&key)).is_err() {
			debug!("Delivery thread gone before liveness event");
		}

		let mut watches = lock(&self.watches);
		if let Some(entry) = watches.get_mut(&key) {
			entry.state = WatchState::Live;
			entry.live = Some(LiveWatch { backend, bridge });
		}
		info!("Watch live on `{}`", key.display());
		Ok(())
	}

	/// Stops the live watch on `path`. Returns only once no further
	/// callback invocation for it can occur.
	pub fn die<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
		self.die_with(path, |_event| {})
	}

	/// Like `die`, handing the shutdown callback one final synthetic
	/// teardown event before the backend stops.
	pub fn die_with<P, F>(&self, path: P, callback: F) -> Result<(), Error>
	where
		P: AsRef<Path>,
		F: FnOnce(Event),
	{
		let key = normalize_lossy(path.as_ref());

		let mut live = {
			let mut watches = lock(&self.watches);
			match watches.get_mut(&key) {
				Some(entry) if matches!(entry.state, WatchState::Live) => {
					entry.state = WatchState::Dying;
					match entry.live.take() {
						Some(live) => live,
						None => return Err(Error::NotWatching(key)),
					}
				}
				// Absent, still starting up, or already tearing down;
				// this call owns nothing.
				_ => return Err(Error::NotWatching(key)),
			}
		};

		live.bridge.begin_close();
		callback(Event::watcher_die(&key));
		if let Err(e) = live.backend.stop() {
			warn!("Backend for `{}` did not stop cleanly: {}", key.display(), e);
		}
		let quiesced = live.bridge.wait_quiescent(self.config.stop_timeout);

		{
			let mut watches = lock(&self.watches);
			if let Some(entry) = watches.get_mut(&key) {
				entry.state = WatchState::Dead;
			}
			watches.remove(&key);
		}
		info!("Watch on `{}` is dead", key.display());
		quiesced
	}

	pub fn is_watching<P: AsRef<Path>>(&self, path: P) -> bool {
		let key = normalize_lossy(path.as_ref());
		let watches = lock(&self.watches);
		matches!(
			watches.get(&key),
			Some(WatchEntry {
				state: WatchState::Live,
				..
			})
		)
	}

	pub fn watched_paths(&self) -> Vec<PathBuf> {
		let watches = lock(&self.watches);
		watches
			.iter()
			.filter(|(_path, entry)| matches!(entry.state, WatchState::Live))
			.map(|(path, _entry)| path.clone())
			.collect()
	}
}

impl Drop for Registry {
	fn drop(&mut self) {
		for path in self.watched_paths() {
			if let Err(e) = self.die(&path) {
				warn!("Leaking watch on `{}`: {}", path.display(), e);
			}
		}
	}
}

/// Watch keys are canonical so `watch("./x")` and `die("x")` meet.
fn normalize(path: &Path) -> Result<PathBuf, Error> {
	fs::canonicalize(path).map_err(|e| Error::InvalidPath {
		path: path.to_path_buf(),
		reason: e.to_string(),
	})
}

/// `die` must find keys whose path has since vanished from disk, so a
/// failed canonicalization falls back to the path as given.
fn normalize_lossy(path: &Path) -> PathBuf {
	fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
	match mutex.lock() {
		Ok(guard) => guard,
		Err(poisoned) => poisoned.into_inner(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		mpsc::SyncSender,
		Arc,
	};

	use crate::event::{EffectType, PathType};

	/// Scripted in-memory backend for lifecycle tests.
	struct FakeBackend {
		fail_start: bool,
		started: Arc<AtomicUsize>,
		stopped: Arc<AtomicUsize>,
		events: Option<SyncSender<Event>>,
	}

	impl FakeBackend {
		fn new(fail_start: bool, started: Arc<AtomicUsize>, stopped: Arc<AtomicUsize>) -> Self {
			Self {
				fail_start,
				started,
				stopped,
				events: None,
			}
		}
	}

	impl Backend for FakeBackend {
		fn start(&mut self, path: &Path, events: SyncSender<Event>) -> Result<(), Error> {
			if self.fail_start {
				return Err(Error::StartFailed {
					path: path.to_path_buf(),
					reason: "scripted failure".to_string(),
				});
			}
			self.started.fetch_add(1, Ordering::SeqCst);
			self.events = Some(events);
			Ok(())
		}

		fn stop(&mut self) -> Result<(), Error> {
			self.stopped.fetch_add(1, Ordering::SeqCst);
			self.events.take();
			Ok(())
		}
	}

	fn fake_registry(
		fail_start: bool,
	) -> (Registry, Arc<AtomicUsize>, Arc<AtomicUsize>) {
		let started = Arc::new(AtomicUsize::new(0));
		let stopped = Arc::new(AtomicUsize::new(0));
		let started_handle = started.clone();
		let stopped_handle = stopped.clone();
		let registry = Registry::with_factory(Box::new(move || {
			Box::new(FakeBackend::new(
				fail_start,
				started_handle.clone(),
				stopped_handle.clone(),
			))
		}));
		(registry, started, stopped)
	}

	fn poll_registry() -> Registry {
		Registry::with_config(WatchConfig {
			backend: Some(BackendKind::Poll),
			poll_interval: Duration::from_millis(20),
			..WatchConfig::default()
		})
	}

	#[test]
	fn watch_then_die_runs_the_full_lifecycle() {
		let dir = tempfile::tempdir().unwrap();
		let registry = poll_registry();

		registry.watch(dir.path(), |_event| {}).unwrap();
		assert!(registry.is_watching(dir.path()));
		assert_eq!(registry.watched_paths().len(), 1);

		registry.die(dir.path()).unwrap();
		assert!(!registry.is_watching(dir.path()));
		assert!(registry.watched_paths().is_empty());
	}

	#[test]
	fn second_watch_on_a_live_path_is_refused() {
		let dir = tempfile::tempdir().unwrap();
		let registry = poll_registry();

		registry.watch(dir.path(), |_event| {}).unwrap();
		assert!(matches!(
			registry.watch(dir.path(), |_event| {}),
			Err(Error::AlreadyWatching(_))
		));
		registry.die(dir.path()).unwrap();
	}

	#[test]
	fn die_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let registry = poll_registry();

		registry.watch(dir.path(), |_event| {}).unwrap();
		registry.die(dir.path()).unwrap();
		assert!(matches!(
			registry.die(dir.path()),
			Err(Error::NotWatching(_))
		));
	}

	#[test]
	fn die_without_watch_reports_not_watching() {
		let dir = tempfile::tempdir().unwrap();
		let registry = poll_registry();
		assert!(matches!(
			registry.die(dir.path()),
			Err(Error::NotWatching(_))
		));
	}

	#[test]
	fn watch_rejects_a_missing_path() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("nope");
		let registry = poll_registry();
		assert!(matches!(
			registry.watch(&missing, |_event| {}),
			Err(Error::InvalidPath { .. })
		));
		assert!(registry.watched_paths().is_empty());
	}

	#[test]
	fn shutdown_callback_sees_the_teardown_event() {
		let dir = tempfile::tempdir().unwrap();
		let registry = poll_registry();
		registry.watch(dir.path(), |_event| {}).unwrap();

		let seen = Arc::new(Mutex::new(None));
		let slot = seen.clone();
		registry
			.die_with(dir.path(), move |event| {
				*slot.lock().unwrap() = Some(event);
			})
			.unwrap();

		let event = seen.lock().unwrap().take().unwrap();
		assert_eq!(event.effect_type, EffectType::Destroy);
		assert_eq!(event.path_type, PathType::Watcher);
	}

	#[test]
	fn liveness_event_opens_the_stream() {
		let dir = tempfile::tempdir().unwrap();
		let registry = poll_registry();

		let first = Arc::new(Mutex::new(Vec::new()));
		let sink = first.clone();
		registry
			.watch(dir.path(), move |event| sink.lock().unwrap().push(event))
			.unwrap();

		let deadline = std::time::Instant::now() + Duration::from_secs(5);
		while first.lock().unwrap().is_empty() && std::time::Instant::now() < deadline {
			std::thread::sleep(Duration::from_millis(10));
		}
		registry.die(dir.path()).unwrap();

		let events = first.lock().unwrap();
		assert_eq!(events[0].path_type, PathType::Watcher);
		assert_eq!(events[0].effect_type, EffectType::Create);
	}

	#[test]
	fn failed_start_leaves_no_entry_behind() {
		let dir = tempfile::tempdir().unwrap();
		let (registry, started, stopped) = fake_registry(true);

		assert!(matches!(
			registry.watch(dir.path(), |_event| {}),
			Err(Error::StartFailed { .. })
		));
		assert!(!registry.is_watching(dir.path()));
		assert!(registry.watched_paths().is_empty());
		assert_eq!(started.load(Ordering::SeqCst), 0);
		assert_eq!(stopped.load(Ordering::SeqCst), 0);

		// The key is free again after the failure.
		assert!(matches!(
			registry.die(dir.path()),
			Err(Error::NotWatching(_))
		));
	}

	#[test]
	fn backend_stops_exactly_once_per_lifecycle() {
		let dir = tempfile::tempdir().unwrap();
		let (registry, started, stopped) = fake_registry(false);

		registry.watch(dir.path(), |_event| {}).unwrap();
		registry.die(dir.path()).unwrap();
		let _ = registry.die(dir.path());

		assert_eq!(started.load(Ordering::SeqCst), 1);
		assert_eq!(stopped.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn each_watch_gets_a_fresh_backend_instance() {
		let dir = tempfile::tempdir().unwrap();
		let (registry, started, _stopped) = fake_registry(false);

		registry.watch(dir.path(), |_event| {}).unwrap();
		registry.die(dir.path()).unwrap();
		registry.watch(dir.path(), |_event| {}).unwrap();
		registry.die(dir.path()).unwrap();

		assert_eq!(started.load(Ordering::SeqCst), 2);
	}
}
