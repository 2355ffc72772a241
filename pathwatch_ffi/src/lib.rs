//! Stable plain-data C ABI over the `pathwatch` core.
//!
//! ```c
//! void* watcher = pathwatch_open("/some/tree", callback, user_data);
//! if (!watcher) { /* failed */ }
//! // ... events arrive on a library thread ...
//! if (!pathwatch_close(watcher)) { /* was not open */ }
//! ```
//!
//! Nothing here unwinds across the boundary; failure is null or false.
//! The `user_data` pointer rides along untouched and comes back with
//! every event.

mod event;

use std::{
	ffi::CStr,
	os::raw::{c_char, c_void},
	path::PathBuf,
	ptr,
};

use log::error;

pub use event::FfiEvent;

/// Invoked once per event, from a library-owned thread. The event's
/// string fields are views; copy them before returning to keep them.
pub type FfiEventCallback = unsafe extern "C" fn(event: FfiEvent, data: *mut c_void);

/// What `pathwatch_open` hands back: enough to find the watch again.
struct WatchSession {
	path: PathBuf,
}

/// The caller's callback and context, moved onto the delivery thread.
/// Callers promise `data` may be used from that thread; the pointer
/// itself is never dereferenced here.
#[derive(Clone, Copy)]
struct CallbackContext {
	callback: FfiEventCallback,
	data: *mut c_void,
}

unsafe impl Send for CallbackContext {}
unsafe impl Sync for CallbackContext {}

/// Starts a watch on `path`, reporting events to `callback` until
/// `pathwatch_close`. Returns an opaque handle, or null if `path` is
/// null, not valid UTF-8, or the watch cannot start.
#[no_mangle]
pub unsafe extern "C" fn pathwatch_open(
	path: *const c_char,
	callback: FfiEventCallback,
	data: *mut c_void,
) -> *mut c_void {
	if path.is_null() {
		return ptr::null_mut();
	}
	let path = match CStr::from_ptr(path).to_str() {
		Ok(path) => PathBuf::from(path),
		Err(_) => {
			error!("Watch path is not valid UTF-8");
			return ptr::null_mut();
		}
	};

	let context = CallbackContext { callback, data };
	let started = pathwatch::watch(&path, move |event| {
		event::with_event_view(&event, |view| {
			// Safety: the caller vouched for callback and data when it
			// opened the watch; the view outlives this call only.
			unsafe { (context.callback)(view, context.data) }
		});
	});
	if !started {
		return ptr::null_mut();
	}

	Box::into_raw(Box::new(WatchSession { path })) as *mut c_void
}

/// Stops the watch behind `handle` and releases it, exactly once.
/// Returns true iff a live watch was found and cleanly stopped. The
/// handle must not be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn pathwatch_close(handle: *mut c_void) -> bool {
	if handle.is_null() {
		return false;
	}
	let session = Box::from_raw(handle as *mut WatchSession);
	pathwatch::die(&session.path)
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::{
		ffi::CString,
		fs,
		sync::atomic::{AtomicUsize, Ordering},
		thread,
		time::{Duration, Instant},
	};

	unsafe extern "C" fn count_events(event: FfiEvent, data: *mut c_void) {
		assert!(!event.path_name.is_null());
		assert!(event.effect_type >= 0);
		assert!(event.path_type >= 0);
		let count = &*(data as *const AtomicUsize);
		count.fetch_add(1, Ordering::SeqCst);
	}

	#[test]
	fn open_close_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let path = CString::new(dir.path().to_str().unwrap()).unwrap();
		let count = AtomicUsize::new(0);

		let handle = unsafe {
			pathwatch_open(
				path.as_ptr(),
				count_events,
				&count as *const AtomicUsize as *mut c_void,
			)
		};
		assert!(!handle.is_null());

		fs::write(dir.path().join("a.txt"), b"hello").unwrap();
		let deadline = Instant::now() + Duration::from_secs(10);
		while count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
			thread::sleep(Duration::from_millis(25));
		}
		assert!(count.load(Ordering::SeqCst) > 0);

		assert!(unsafe { pathwatch_close(handle) });
	}

	#[test]
	fn open_rejects_null_and_duplicate_paths() {
		assert!(unsafe { pathwatch_open(ptr::null(), count_events, ptr::null_mut()) }.is_null());

		let dir = tempfile::tempdir().unwrap();
		let path = CString::new(dir.path().to_str().unwrap()).unwrap();
		let count = AtomicUsize::new(0);
		let data = &count as *const AtomicUsize as *mut c_void;

		let first = unsafe { pathwatch_open(path.as_ptr(), count_events, data) };
		assert!(!first.is_null());
		let second = unsafe { pathwatch_open(path.as_ptr(), count_events, data) };
		assert!(second.is_null());

		assert!(unsafe { pathwatch_close(first) });
	}

	#[test]
	fn close_rejects_null() {
		assert!(!unsafe { pathwatch_close(ptr::null_mut()) });
	}
}
