mod cli;
mod config;
mod output;

use std::{
	io::{self, BufRead},
	process, thread,
};

use log::{error, info};

use pathwatch::{Registry, WatchConfig};

use cli::Cli;

fn main() {
	env_logger::init();

	let cli = Cli::parse();
	let settings = cli.settings().unwrap_or_else(|e| {
		error!("{}", e);
		process::exit(1);
	});

	let mut watch_config = WatchConfig::default();
	watch_config.backend = settings.backend;
	if let Some(poll_interval) = settings.poll_interval {
		watch_config.poll_interval = poll_interval;
	}

	let registry = Registry::with_config(watch_config);
	let json = settings.json;
	if let Err(e) = registry.watch(&settings.path, move |event| {
		output::print_event(&event, json)
	}) {
		error!("{}", e);
		process::exit(1);
	}

	match settings.timeout {
		Some(timeout) => {
			info!("Watching `{}` for {:?}", settings.path.display(), timeout);
			thread::sleep(timeout);
		}
		None => {
			info!("Watching `{}`; press enter to stop", settings.path.display());
			let mut line = String::new();
			if io::stdin().lock().read_line(&mut line).is_err() {
				error!("Lost stdin; stopping");
			}
		}
	}

	if let Err(e) = registry.die_with(&settings.path, |event| output::print_event(&event, json)) {
		error!("{}", e);
		process::exit(1);
	}
}
