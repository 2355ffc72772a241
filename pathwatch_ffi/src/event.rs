use std::{ffi::CString, os::raw::c_char, ptr};

use log::warn;

use pathwatch::Event;

/// Plain-data event crossing the C boundary.
///
/// The string pointers are views owned by the library; they are valid
/// only for the duration of the callback invocation they are passed to.
/// A caller keeping an event must copy them before returning.
/// `associated_path_name` is null except for paired renames.
#[repr(C)]
pub struct FfiEvent {
	pub path_name: *const c_char,
	pub associated_path_name: *const c_char,
	pub effect_type: i32,
	pub path_type: i32,
	pub effect_time: i64,
}

/// Builds the boundary view of `event` and hands it to `f`. The backing
/// strings outlive `f` and are released afterwards.
pub(crate) fn with_event_view<F: FnOnce(FfiEvent)>(event: &Event, f: F) {
	let path_name = match c_string(&event.path_name) {
		Some(path_name) => path_name,
		None => {
			warn!("Dropping event with unrepresentable path");
			return;
		}
	};
	let associated_path_name = event
		.associated_path_name
		.as_ref()
		.and_then(|path| c_string(path));

	let view = FfiEvent {
		path_name: path_name.as_ptr(),
		associated_path_name: associated_path_name
			.as_ref()
			.map_or(ptr::null(), |s| s.as_ptr()),
		effect_type: event.effect_type.code(),
		path_type: event.path_type.code(),
		effect_time: event.effect_time,
	};
	f(view);
}

fn c_string(path: &std::path::Path) -> Option<CString> {
	CString::new(path.to_string_lossy().as_bytes().to_vec()).ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::ffi::CStr;
	use std::path::Path;

	use pathwatch::{EffectType, PathType};

	#[test]
	fn view_carries_codes_and_strings() {
		let event = pathwatch::Event::new("/a/old", EffectType::Rename, PathType::File)
			.with_associated("/a/new");

		let mut seen = false;
		with_event_view(&event, |view| {
			let path = unsafe { CStr::from_ptr(view.path_name) };
			let associated = unsafe { CStr::from_ptr(view.associated_path_name) };
			assert_eq!(path.to_str().unwrap(), "/a/old");
			assert_eq!(associated.to_str().unwrap(), "/a/new");
			assert_eq!(view.effect_type, EffectType::Rename.code());
			assert_eq!(view.path_type, PathType::File.code());
			seen = true;
		});
		assert!(seen);
	}

	#[test]
	fn missing_associated_path_is_null() {
		let event = pathwatch::Event::watcher_live(Path::new("/root"));
		with_event_view(&event, |view| {
			assert!(view.associated_path_name.is_null());
			assert_eq!(view.path_type, PathType::Watcher.code());
		});
	}
}
