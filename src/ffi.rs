//! FFI bindings for StayPoints
//!
//! This module provides C-compatible functions for calling the detector from
//! other languages. Inputs and outputs are JSON in null-terminated C strings;
//! returned strings must be freed by the caller using `staypoints_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::{StayPointParams, TrailingWindow};
use crate::pipeline::{trajectory_json_to_stay_points, StayPointDetector};
use crate::segmentation::CancellationToken;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Detect stay points in a JSON array of positions and return the report JSON.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `staypoints_free_string`.
/// - Returns NULL on error; call `staypoints_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn staypoints_compute_json(
    json: *const c_char,
    radius_meters: f64,
    min_duration_seconds: f64,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match trajectory_json_to_stay_points(json_str, radius_meters, min_duration_seconds) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Detector API
// ============================================================================

/// Opaque handle to a StayPointDetector
pub struct StayPointDetectorHandle {
    detector: StayPointDetector,
    token: CancellationToken,
}

/// Create a detector.
///
/// A non-zero `emit_trailing` closes a window still open at the end of the
/// trajectory instead of discarding it.
///
/// # Safety
/// - Returns a pointer to a newly allocated detector.
/// - Must be freed with `staypoints_detector_free`.
/// - Returns NULL on invalid parameters.
#[no_mangle]
pub unsafe extern "C" fn staypoints_detector_new(
    radius_meters: f64,
    min_duration_seconds: f64,
    emit_trailing: i32,
) -> *mut StayPointDetectorHandle {
    clear_last_error();

    let trailing = if emit_trailing != 0 {
        TrailingWindow::Emit
    } else {
        TrailingWindow::Discard
    };

    let params = match StayPointParams::new(radius_meters, min_duration_seconds) {
        Ok(p) => p.with_trailing_window(trailing),
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let token = CancellationToken::new();
    match StayPointDetector::new(params) {
        Ok(detector) => Box::into_raw(Box::new(StayPointDetectorHandle {
            detector: detector.with_cancellation(token.clone()),
            token,
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a detector.
///
/// # Safety
/// - `detector` must be a valid pointer returned by `staypoints_detector_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn staypoints_detector_free(detector: *mut StayPointDetectorHandle) {
    if !detector.is_null() {
        drop(Box::from_raw(detector));
    }
}

/// Run the detector on a JSON array of positions and return the report JSON.
///
/// # Safety
/// - `detector` must be a valid pointer returned by `staypoints_detector_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `staypoints_free_string`.
/// - Returns NULL on error (including cancellation).
#[no_mangle]
pub unsafe extern "C" fn staypoints_detector_detect(
    detector: *const StayPointDetectorHandle,
    json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if detector.is_null() {
        set_last_error("Null detector pointer");
        return ptr::null_mut();
    }

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    match (*detector).detector.detect_json(&json_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Cancel any running and all future detections on this detector.
///
/// Safe to call from a thread other than the one running
/// `staypoints_detector_detect`.
///
/// # Safety
/// - `detector` must be a valid pointer returned by `staypoints_detector_new`.
#[no_mangle]
pub unsafe extern "C" fn staypoints_detector_cancel(detector: *const StayPointDetectorHandle) {
    if !detector.is_null() {
        (*detector).token.cancel();
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by StayPoints functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a StayPoints function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn staypoints_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next StayPoints call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn staypoints_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn staypoints_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
