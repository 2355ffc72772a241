use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;

use pathwatch::BackendKind;

use crate::config;

fn path_validator(input: &str) -> Result<PathBuf, String> {
	let path = PathBuf::from(input);
	if !path.exists() {
		return Err(format!("Path `{}` does not exist.", input));
	}
	Ok(path)
}

#[derive(Parser)]
#[command(version = "0.1", about = "Streams filesystem change events for a path")]
pub struct Cli {
	/// The file or directory tree to watch.
	#[arg(value_parser = path_validator)]
	pub path: PathBuf,

	/// The change-detection backend.
	#[arg(long)]
	pub watcher: Option<WatcherChoice>,

	/// Scan interval for the polling backend, in milliseconds.
	#[arg(long)]
	pub poll_interval_ms: Option<u64>,

	/// Prints events as single-line JSON records.
	#[arg(long)]
	pub json: bool,

	/// Stops after this many seconds instead of waiting for enter.
	#[arg(long)]
	pub timeout_secs: Option<u64>,

	/// Optional TOML settings file; command-line flags take precedence.
	#[arg(long)]
	pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatcherChoice {
	Auto,
	Native,
	Poll,
}

impl FromStr for WatcherChoice {
	type Err = &'static str;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"auto" => Ok(WatcherChoice::Auto),
			"native" => Ok(WatcherChoice::Native),
			"poll" => Ok(WatcherChoice::Poll),
			_ => Err("no match"),
		}
	}
}

impl WatcherChoice {
	fn backend(self) -> Option<BackendKind> {
		match self {
			WatcherChoice::Auto => None,
			WatcherChoice::Native => Some(BackendKind::Native),
			WatcherChoice::Poll => Some(BackendKind::Poll),
		}
	}
}

/// Everything the runner needs after the CLI and the optional config
/// file have been reconciled.
pub struct Settings {
	pub path: PathBuf,
	pub backend: Option<BackendKind>,
	pub poll_interval: Option<Duration>,
	pub json: bool,
	pub timeout: Option<Duration>,
}

impl Cli {
	pub fn parse() -> Self {
		Parser::parse()
	}

	pub fn settings(&self) -> Result<Settings, String> {
		let file = match &self.config {
			Some(path) => config::load(path)?,
			None => config::Config::default(),
		};

		let choice = match self.watcher {
			Some(choice) => Some(choice),
			None => file.watcher_choice()?,
		};
		let poll_interval_ms = self.poll_interval_ms.or_else(|| file.poll_interval_ms());

		Ok(Settings {
			path: self.path.clone(),
			backend: choice.and_then(WatcherChoice::backend),
			poll_interval: poll_interval_ms.map(Duration::from_millis),
			json: self.json || file.json(),
			timeout: self.timeout_secs.map(Duration::from_secs),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_watcher_choices() {
		assert_eq!("auto".parse(), Ok(WatcherChoice::Auto));
		assert_eq!("native".parse(), Ok(WatcherChoice::Native));
		assert_eq!("poll".parse(), Ok(WatcherChoice::Poll));
		assert!("fancy".parse::<WatcherChoice>().is_err());
	}

	#[test]
	fn choice_maps_to_backend() {
		assert_eq!(WatcherChoice::Auto.backend(), None);
		assert_eq!(WatcherChoice::Native.backend(), Some(BackendKind::Native));
		assert_eq!(WatcherChoice::Poll.backend(), Some(BackendKind::Poll));
	}

	#[test]
	fn command_line_is_well_formed() {
		use clap::CommandFactory;
		Cli::command().debug_assert();
	}
}
