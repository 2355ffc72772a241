use std::{fs, path::Path};

use serde::Deserialize;

use crate::cli::WatcherChoice;

/// Optional settings file:
///
/// ```toml
/// [watcher]
/// backend = "poll"
/// poll_interval_ms = 250
/// json = true
/// ```
#[derive(Deserialize, Default)]
pub struct Config {
	watcher: Option<Watcher>,
}

#[derive(Deserialize)]
struct Watcher {
	backend: Option<String>,
	poll_interval_ms: Option<u64>,
	json: Option<bool>,
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, String> {
	let content = fs::read_to_string(&path).map_err(|e| {
		format!(
			"Unable to read config file `{}`: {}",
			path.as_ref().display(),
			e
		)
	})?;
	toml::from_str(&content).map_err(|e| {
		format!(
			"Unable to parse config file `{}`: {}",
			path.as_ref().display(),
			e
		)
	})
}

impl Config {
	pub fn watcher_choice(&self) -> Result<Option<WatcherChoice>, String> {
		match self.watcher.as_ref().and_then(|w| w.backend.as_ref()) {
			Some(name) => name
				.parse()
				.map(Some)
				.map_err(|_| format!("Unknown backend `{}` in config file", name)),
			None => Ok(None),
		}
	}

	pub fn poll_interval_ms(&self) -> Option<u64> {
		self.watcher.as_ref().and_then(|w| w.poll_interval_ms)
	}

	pub fn json(&self) -> bool {
		self.watcher
			.as_ref()
			.and_then(|w| w.json)
			.unwrap_or(false)
	}
}
