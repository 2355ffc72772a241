use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors from watch operations.
///
/// The crate-level `watch`/`die` entry points fold these into booleans;
/// `Registry` methods surface them directly.
#[derive(Debug, Error)]
pub enum Error {
	#[error("Invalid watch path `{path}`: {reason}")]
	InvalidPath { path: PathBuf, reason: String },

	#[error("No usable change-detection backend: {0}")]
	BackendUnavailable(String),

	#[error("Failed to start watching `{path}`: {reason}")]
	StartFailed { path: PathBuf, reason: String },

	#[error("No live watch on `{0}`")]
	NotWatching(PathBuf),

	#[error("A watch is already live on `{0}`")]
	AlreadyWatching(PathBuf),

	#[error("Watch did not become quiescent within {0:?}")]
	ShutdownTimeout(Duration),
}
