use std::{
	fmt, fs,
	path::{Path, PathBuf},
	time::{SystemTime, UNIX_EPOCH},
};

use log::warn;
use notify::{
	event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode},
	Event as RawEvent,
};
use serde::{Deserialize, Serialize};

/// Category of filesystem change.
///
/// The discriminants are the wire codes shared with the C ABI. They are
/// stable across releases; new categories may only be appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
	Rename,
	Modify,
	Create,
	Destroy,
	Owner,
	Other,
	Unknown,
}

impl EffectType {
	pub fn code(self) -> i32 {
		match self {
			EffectType::Rename => 0,
			EffectType::Modify => 1,
			EffectType::Create => 2,
			EffectType::Destroy => 3,
			EffectType::Owner => 4,
			EffectType::Other => 5,
			EffectType::Unknown => 6,
		}
	}

	/// Maps a wire code back to a category. Codes from newer peers fall
	/// back to `Unknown` instead of failing.
	pub fn from_code(code: i32) -> Self {
		match code {
			0 => EffectType::Rename,
			1 => EffectType::Modify,
			2 => EffectType::Create,
			3 => EffectType::Destroy,
			4 => EffectType::Owner,
			5 => EffectType::Other,
			_ => EffectType::Unknown,
		}
	}

	fn name(self) -> &'static str {
		match self {
			EffectType::Rename => "rename",
			EffectType::Modify => "modify",
			EffectType::Create => "create",
			EffectType::Destroy => "destroy",
			EffectType::Owner => "owner",
			EffectType::Other => "other",
			EffectType::Unknown => "unknown",
		}
	}
}

impl fmt::Display for EffectType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Kind of filesystem object an event refers to.
///
/// `Watcher` marks synthetic events about a watch itself (liveness,
/// teardown, backend faults) rather than about a path under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathType {
	Dir,
	File,
	HardLink,
	SymLink,
	Watcher,
	Other,
	Unknown,
}

impl PathType {
	pub fn code(self) -> i32 {
		match self {
			PathType::Dir => 0,
			PathType::File => 1,
			PathType::HardLink => 2,
			PathType::SymLink => 3,
			PathType::Watcher => 4,
			PathType::Other => 5,
			PathType::Unknown => 6,
		}
	}

	pub fn from_code(code: i32) -> Self {
		match code {
			0 => PathType::Dir,
			1 => PathType::File,
			2 => PathType::HardLink,
			3 => PathType::SymLink,
			4 => PathType::Watcher,
			5 => PathType::Other,
			_ => PathType::Unknown,
		}
	}

	fn name(self) -> &'static str {
		match self {
			PathType::Dir => "dir",
			PathType::File => "file",
			PathType::HardLink => "hard_link",
			PathType::SymLink => "sym_link",
			PathType::Watcher => "watcher",
			PathType::Other => "other",
			PathType::Unknown => "unknown",
		}
	}
}

impl fmt::Display for PathType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// One normalized filesystem change.
///
/// Field declaration order is the canonical encoding order; both the
/// binary encoding and the JSON rendering follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
	/// The affected path.
	pub path_name: PathBuf,
	pub effect_type: EffectType,
	pub path_type: PathType,
	/// Nanoseconds since the Unix epoch. Non-decreasing within one
	/// watch's stream.
	pub effect_time: i64,
	/// The paired new name, populated only for rename events that carry
	/// both halves of the move.
	pub associated_path_name: Option<PathBuf>,
}

impl Event {
	pub fn new<P: Into<PathBuf>>(path_name: P, effect_type: EffectType, path_type: PathType) -> Self {
		Self {
			path_name: path_name.into(),
			effect_type,
			path_type,
			effect_time: now_nanos(),
			associated_path_name: None,
		}
	}

	pub fn with_associated<P: Into<PathBuf>>(mut self, path: P) -> Self {
		self.associated_path_name = Some(path.into());
		self
	}

	/// First event of every stream: the watch on `root` is live.
	pub fn watcher_live(root: &Path) -> Self {
		Self::new(root, EffectType::Create, PathType::Watcher)
	}

	/// Handed to the shutdown callback when a watch on `root` dies.
	pub fn watcher_die(root: &Path) -> Self {
		Self::new(root, EffectType::Destroy, PathType::Watcher)
	}

	/// Final event of a stream whose backend failed fatally.
	pub fn watcher_fault(root: &Path) -> Self {
		Self::new(root, EffectType::Other, PathType::Watcher)
	}

	/// Canonical fixed-field-order binary encoding.
	pub fn encode(&self) -> bincode::Result<Vec<u8>> {
		bincode::serialize(self)
	}

	pub fn decode(bytes: &[u8]) -> bincode::Result<Self> {
		bincode::deserialize(bytes)
	}

	/// Normalizes one raw backend notification. Unrecognized raw kinds
	/// map to `Unknown`/`Other`; a notification without a path is
	/// malformed and dropped.
	pub fn from_raw(raw: &RawEvent) -> Option<Self> {
		let path = match raw.paths.first() {
			Some(path) => path.clone(),
			None => {
				warn!("Dropping raw notification without a path: {:?}", raw.kind);
				return None;
			}
		};

		let effect_type = match raw.kind {
			EventKind::Create(_) => EffectType::Create,
			EventKind::Remove(_) => EffectType::Destroy,
			EventKind::Modify(ModifyKind::Name(_)) => EffectType::Rename,
			EventKind::Modify(ModifyKind::Metadata(_)) => EffectType::Owner,
			EventKind::Modify(_) => EffectType::Modify,
			EventKind::Access(_) => EffectType::Other,
			EventKind::Any => EffectType::Unknown,
			EventKind::Other => EffectType::Other,
		};

		// A paired rename names the old path first and the new second.
		// The old name is gone, so the new one is the stat target.
		if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = raw.kind {
			if let Some(to) = raw.paths.get(1) {
				let path_type = path_type_of(to);
				return Some(
					Event::new(path, effect_type, path_type).with_associated(to.clone()),
				);
			}
		}

		let path_type = match raw.kind {
			EventKind::Create(CreateKind::File) | EventKind::Remove(RemoveKind::File) => {
				PathType::File
			}
			EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
				PathType::Dir
			}
			// The path is already gone; the raw kind told us nothing.
			EventKind::Remove(_) => PathType::Unknown,
			_ => path_type_of(&path),
		};

		Some(Event::new(path, effect_type, path_type))
	}
}

/// Classifies a live path, falling back to `Unknown` when it cannot be
/// inspected (usually because it no longer exists).
pub fn path_type_of(path: &Path) -> PathType {
	match fs::symlink_metadata(path) {
		Ok(metadata) => {
			let file_type = metadata.file_type();
			if file_type.is_symlink() {
				PathType::SymLink
			} else if file_type.is_dir() {
				PathType::Dir
			} else if is_hard_link(&metadata) {
				PathType::HardLink
			} else if file_type.is_file() {
				PathType::File
			} else {
				PathType::Other
			}
		}
		Err(_) => PathType::Unknown,
	}
}

#[cfg(unix)]
fn is_hard_link(metadata: &fs::Metadata) -> bool {
	use std::os::unix::fs::MetadataExt;
	metadata.nlink() > 1
}

#[cfg(not(unix))]
fn is_hard_link(_metadata: &fs::Metadata) -> bool {
	false
}

pub fn now_nanos() -> i64 {
	match SystemTime::now().duration_since(UNIX_EPOCH) {
		Ok(elapsed) => elapsed.as_nanos() as i64,
		Err(_) => 0,
	}
}
