//! FFI bindings for Humancheck
//!
//! This module provides C-compatible functions for calling Humancheck from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `humancheck_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::ptr;

use crate::config::VerificationConfig;
use crate::error::VerifyError;
use crate::verify::audio::SilentTones;
use crate::verify::encoder::ReportEncoder;
use crate::verify::orchestrator::ChallengeOrchestrator;
use crate::verify::replay::{replay_json, TelemetryRecording};
use crate::verify::types::{ChallengeKind, Phase};

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

/// NULL selects the default configuration
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<VerificationConfig, VerifyError> {
    if config_json.is_null() {
        return Ok(VerificationConfig::default());
    }
    match cstr_to_string(config_json) {
        Some(json) => VerificationConfig::from_json(&json),
        None => Err(VerifyError::InvalidConfig("config is not valid UTF-8".to_string())),
    }
}

/// Map a status result onto the C convention (0 ok, -1 error)
fn status(result: Result<(), VerifyError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay a session script and return a JSON verification report.
///
/// # Safety
/// - `script_json` must be a valid null-terminated C string.
/// - `config_json` may be NULL to use the default configuration.
/// - Returns a newly allocated string that must be freed with `humancheck_free_string`.
/// - Returns NULL on error (including scripts that never reach a verdict);
///   call `humancheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn humancheck_replay_json(
    script_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let script = match cstr_to_string(script_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid script string pointer");
            return ptr::null_mut();
        }
    };

    let report = config_from_ptr(config_json)
        .and_then(|config| replay_json(&script, config))
        .and_then(|outcome| ReportEncoder::new().encode_outcome(&outcome))
        .and_then(|report| serde_json::to_string(&report).map_err(VerifyError::JsonError));

    match report {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Score recorded telemetry and return a JSON verification result.
///
/// # Safety
/// - `recording_json` and `challenge` must be valid null-terminated C strings.
/// - `config_json` may be NULL to use the default configuration.
/// - Returns a newly allocated string that must be freed with `humancheck_free_string`.
/// - Returns NULL on error; call `humancheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn humancheck_score_json(
    recording_json: *const c_char,
    challenge: *const c_char,
    task_accuracy: f64,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let recording = match cstr_to_string(recording_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid recording string pointer");
            return ptr::null_mut();
        }
    };

    let challenge = match cstr_to_string(challenge) {
        Some(s) => s,
        None => {
            set_last_error("Invalid challenge string pointer");
            return ptr::null_mut();
        }
    };

    let result = (|| {
        let config = config_from_ptr(config_json)?;
        let kind: ChallengeKind = challenge.parse()?;
        let recording: TelemetryRecording = serde_json::from_str(&recording)?;
        let result = recording.score(&config, kind, task_accuracy)?;
        Ok::<_, VerifyError>(serde_json::to_string(&result)?)
    })();

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Session API
// ============================================================================

/// Verdict callback: `is_human` plus the caller's `user_data`
pub type HumancheckVerdictCallback = extern "C" fn(is_human: bool, user_data: *mut c_void);

/// Opaque handle to a ChallengeOrchestrator
pub struct HumancheckSessionHandle {
    orchestrator: ChallengeOrchestrator,
}

/// Create a new verification session.
///
/// # Safety
/// - `config_json` may be NULL to use the default configuration.
/// - Returns a pointer that must be freed with `humancheck_session_free`.
/// - Returns NULL on error; call `humancheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_new(
    config_json: *const c_char,
) -> *mut HumancheckSessionHandle {
    clear_last_error();

    match config_from_ptr(config_json).and_then(ChallengeOrchestrator::<SilentTones>::new) {
        Ok(orchestrator) => Box::into_raw(Box::new(HumancheckSessionHandle { orchestrator })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_free(session: *mut HumancheckSessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Apply `f` to a session handle, mapping errors to the C status convention.
unsafe fn with_session<F>(session: *mut HumancheckSessionHandle, f: F) -> i32
where
    F: FnOnce(&mut ChallengeOrchestrator) -> Result<(), VerifyError>,
{
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    status(f(&mut (*session).orchestrator))
}

/// Register the verdict callback, fired exactly once per attempt reaching `result`.
///
/// The callback runs synchronously inside `humancheck_session_advance` on the
/// calling thread. Passing NULL removes it.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
/// - `user_data` is passed through untouched and must stay valid while registered.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_set_on_result(
    session: *mut HumancheckSessionHandle,
    callback: Option<HumancheckVerdictCallback>,
    user_data: *mut c_void,
) -> i32 {
    with_session(session, |orch| {
        match callback {
            Some(callback) => orch.on_result(move |is_human| callback(is_human, user_data)),
            None => orch.clear_on_result(),
        }
        Ok(())
    })
}

/// Advance the session clock to `now_ms`, running due continuations.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_advance(
    session: *mut HumancheckSessionHandle,
    now_ms: u64,
) -> i32 {
    with_session(session, |orch| {
        orch.advance_to(now_ms);
        Ok(())
    })
}

/// Begin an attempt (`idle -> select`). Returns 0 on success, -1 on error.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_start(session: *mut HumancheckSessionHandle) -> i32 {
    with_session(session, |orch| orch.start())
}

/// Select a challenge ("rhythm" or "precision").
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
/// - `challenge` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_select(
    session: *mut HumancheckSessionHandle,
    challenge: *const c_char,
) -> i32 {
    let Some(challenge) = cstr_to_string(challenge) else {
        set_last_error("Invalid challenge string pointer");
        return -1;
    };
    with_session(session, |orch| orch.select(challenge.parse()?))
}

/// Forward a pointer position. Returns 1 if sampled, 0 if ignored, -1 on error.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_pointer(
    session: *mut HumancheckSessionHandle,
    x: f64,
    y: f64,
) -> i32 {
    let mut sampled = false;
    let code = with_session(session, |orch| {
        sampled = orch.pointer_move(x, y);
        Ok(())
    });
    if code == 0 {
        i32::from(sampled)
    } else {
        code
    }
}

/// Record a rhythm tap.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_tap(session: *mut HumancheckSessionHandle) -> i32 {
    with_session(session, |orch| orch.tap())
}

/// Click the active precision ring.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_click(session: *mut HumancheckSessionHandle) -> i32 {
    with_session(session, |orch| orch.click().map(|_| ()))
}

/// Replay the rhythm pattern during `play`.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_replay(session: *mut HumancheckSessionHandle) -> i32 {
    with_session(session, |orch| orch.replay())
}

/// Retry after a failed verdict.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_retry(session: *mut HumancheckSessionHandle) -> i32 {
    with_session(session, |orch| orch.retry())
}

/// Abandon the current attempt and return to `idle`.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_reset(session: *mut HumancheckSessionHandle) -> i32 {
    with_session(session, |orch| {
        orch.reset();
        Ok(())
    })
}

/// Current phase name.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
/// - Returns a pointer to a static string. Do NOT free. NULL on error.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_phase(
    session: *const HumancheckSessionHandle,
) -> *const c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null();
    }
    let name: &'static [u8] = match (*session).orchestrator.phase() {
        Phase::Idle => b"idle\0",
        Phase::Select => b"select\0",
        Phase::Listen => b"listen\0",
        Phase::Target => b"target\0",
        Phase::Play => b"play\0",
        Phase::Checking => b"checking\0",
        Phase::Result => b"result\0",
    };
    name.as_ptr() as *const c_char
}

/// Verification result as JSON, once the session reaches `result`.
///
/// # Safety
/// - `session` must be a valid pointer returned by `humancheck_session_new`.
/// - Returns a newly allocated string that must be freed with `humancheck_free_string`.
/// - Returns NULL with no error set if no verdict is available yet.
#[no_mangle]
pub unsafe extern "C" fn humancheck_session_result_json(
    session: *const HumancheckSessionHandle,
) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let Some(result) = (*session).orchestrator.result() else {
        return ptr::null_mut();
    };
    match serde_json::to_string(result) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Humancheck functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Humancheck function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn humancheck_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Humancheck function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn humancheck_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Humancheck library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn humancheck_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn idle_precision_script() -> CString {
        CString::new(
            r#"{
            "seed": 5,
            "events": [
                { "at_ms": 0, "action": "start" },
                { "at_ms": 0, "action": "select", "challenge": "precision" }
            ]
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_replay_json() {
        let script = idle_precision_script();

        unsafe {
            let result = humancheck_replay_json(script.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            assert!(result_str.contains("\"report_version\""));
            assert!(result_str.contains("\"is_human\":false"));

            humancheck_free_string(result);
        }
    }

    #[test]
    fn test_ffi_replay_without_verdict_errors() {
        let script = CString::new(r#"{ "events": [{ "at_ms": 0, "action": "start" }] }"#).unwrap();

        unsafe {
            let result = humancheck_replay_json(script.as_ptr(), ptr::null());
            assert!(result.is_null());
            assert!(!humancheck_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_score_json() {
        let recording = CString::new(r#"{ "clicks": [0, 300, 750, 1000] }"#).unwrap();
        let challenge = CString::new("precision").unwrap();

        unsafe {
            let result =
                humancheck_score_json(recording.as_ptr(), challenge.as_ptr(), 1.0, ptr::null());
            assert!(!result.is_null());

            let parsed: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(parsed["scores"]["task_accuracy"], 20);
            assert_eq!(parsed["scores"]["timing_humanness"], 25);

            humancheck_free_string(result);
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let session = humancheck_session_new(ptr::null());
            assert!(!session.is_null());

            let phase = |s: *mut HumancheckSessionHandle| {
                CStr::from_ptr(humancheck_session_phase(s)).to_str().unwrap()
            };
            assert_eq!(phase(session), "idle");

            assert_eq!(humancheck_session_start(session), 0);
            let precision = CString::new("precision").unwrap();
            assert_eq!(humancheck_session_select(session, precision.as_ptr()), 0);
            assert_eq!(phase(session), "target");
            assert_eq!(humancheck_session_pointer(session, 10.0, 10.0), 1);

            // No verdict yet
            assert!(humancheck_session_result_json(session).is_null());
            assert!(humancheck_last_error().is_null());

            // Let every ring expire and the check finish
            assert_eq!(humancheck_session_advance(session, 60_000), 0);
            assert_eq!(phase(session), "result");

            let result = humancheck_session_result_json(session);
            assert!(!result.is_null());
            humancheck_free_string(result);

            assert_eq!(humancheck_session_retry(session), 0);
            assert_eq!(phase(session), "idle");

            humancheck_session_free(session);
        }
    }

    extern "C" fn record_verdict(is_human: bool, user_data: *mut c_void) {
        let log = unsafe { &mut *(user_data as *mut Vec<bool>) };
        log.push(is_human);
    }

    #[test]
    fn test_ffi_verdict_callback_fires_once_per_attempt() {
        let mut verdicts: Vec<bool> = Vec::new();
        let log = &mut verdicts as *mut Vec<bool> as *mut c_void;
        let precision = CString::new("precision").unwrap();

        unsafe {
            let session = humancheck_session_new(ptr::null());
            assert_eq!(
                humancheck_session_set_on_result(session, Some(record_verdict), log),
                0
            );

            assert_eq!(humancheck_session_start(session), 0);
            assert_eq!(humancheck_session_select(session, precision.as_ptr()), 0);

            // Reach result, then keep advancing and polling
            assert_eq!(humancheck_session_advance(session, 60_000), 0);
            for now in [61_000, 70_000, 120_000] {
                assert_eq!(humancheck_session_advance(session, now), 0);
                let result = humancheck_session_result_json(session);
                assert!(!result.is_null());
                humancheck_free_string(result);
            }
            assert_eq!((*(log as *mut Vec<bool>)).len(), 1);

            // A fresh attempt reports its own verdict
            assert_eq!(humancheck_session_retry(session), 0);
            assert_eq!(humancheck_session_start(session), 0);
            assert_eq!(humancheck_session_select(session, precision.as_ptr()), 0);
            assert_eq!(humancheck_session_advance(session, 200_000), 0);
            assert_eq!(humancheck_session_advance(session, 300_000), 0);

            // Removing the callback silences later attempts
            assert_eq!(
                humancheck_session_set_on_result(session, None, ptr::null_mut()),
                0
            );
            assert_eq!(humancheck_session_retry(session), 0);
            assert_eq!(humancheck_session_start(session), 0);
            assert_eq!(humancheck_session_select(session, precision.as_ptr()), 0);
            assert_eq!(humancheck_session_advance(session, 400_000), 0);

            humancheck_session_free(session);
        }

        assert_eq!(verdicts, vec![false, false]);
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let session = humancheck_session_new(ptr::null());

            // Tap outside play
            assert_eq!(humancheck_session_tap(session), -1);
            let error = humancheck_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("tap"));

            assert_eq!(humancheck_session_start(session), 0);
            let unknown = CString::new("captcha").unwrap();
            assert_eq!(humancheck_session_select(session, unknown.as_ptr()), -1);

            assert_eq!(humancheck_session_start(ptr::null_mut()), -1);
            humancheck_session_free(session);

            let bad_config = CString::new(r#"{ "telemetry_window": 0 }"#).unwrap();
            assert!(humancheck_session_new(bad_config.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = humancheck_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
