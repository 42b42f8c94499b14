//! Loadable-extension entry points.
//!
//! # Responsibility
//! - Export the symbols SQLite's extension loader looks up.
//! - Translate registrar results into status codes and host-allocated
//!   error messages.
//!
//! # Invariants
//! - No panic unwinds across the C boundary.
//! - The host API table is bound before any other SQLite call; when it
//!   cannot be bound, no error message is written.
//! - Error messages are allocated with `sqlite3_malloc`, since the host frees
//!   them with `sqlite3_free`.
//! - Registration status codes are returned unchanged.

use log::{error, info};
use rusqlite::{ffi, Connection};
use sqlite_hmh_core::{load, LoadReport, RegistrarError, SqliteHost};
use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Entry point named after the library file (`libsqlite_hmh_ext`).
///
/// # Safety
/// Called by SQLite's loader with a valid connection handle, a writable
/// error-message slot and the host API table.
#[no_mangle]
pub unsafe extern "C" fn sqlite3_sqlitehmhext_init(
    db: *mut ffi::sqlite3,
    pz_err_msg: *mut *mut c_char,
    p_api: *const c_void,
) -> c_int {
    init_extension(db, pz_err_msg, p_api)
}

/// Generic entry point used when the loader is not given a symbol name.
///
/// # Safety
/// Same contract as [`sqlite3_sqlitehmhext_init`].
#[no_mangle]
pub unsafe extern "C" fn sqlite3_extension_init(
    db: *mut ffi::sqlite3,
    pz_err_msg: *mut *mut c_char,
    p_api: *const c_void,
) -> c_int {
    init_extension(db, pz_err_msg, p_api)
}

struct LoadFailure {
    code: c_int,
    message: Option<String>,
}

impl LoadFailure {
    fn new(code: c_int, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }
}

impl From<RegistrarError> for LoadFailure {
    fn from(value: RegistrarError) -> Self {
        Self {
            code: value.status_code(),
            message: value.host_message(),
        }
    }
}

unsafe fn init_extension(
    db: *mut ffi::sqlite3,
    pz_err_msg: *mut *mut c_char,
    p_api: *const c_void,
) -> c_int {
    let bound = catch_unwind(AssertUnwindSafe(|| bind_host_api(p_api))).unwrap_or_else(|_| {
        Err(LoadFailure::new(
            ffi::SQLITE_ERROR,
            "sqlite_hmh panicked while binding the host API table",
        ))
    });
    if let Err(failure) = bound {
        // No API table means no host allocator for the message.
        log_failure(&failure);
        return failure.code;
    }

    let outcome = catch_unwind(AssertUnwindSafe(|| register_on_handle(db)))
        .unwrap_or_else(|_| {
            Err(LoadFailure::new(
                ffi::SQLITE_ERROR,
                "sqlite_hmh panicked while loading",
            ))
        });

    match outcome {
        Ok(report) => {
            info!(
                "event=extension_entry module=ext status=ok functions={}",
                report.registered.len()
            );
            ffi::SQLITE_OK
        }
        Err(failure) => {
            log_failure(&failure);
            if let Some(message) = failure.message.as_deref() {
                write_error_message(pz_err_msg, message);
            }
            failure.code
        }
    }
}

fn log_failure(failure: &LoadFailure) {
    error!(
        "event=extension_entry module=ext status=error status_code={} error={}",
        failure.code,
        failure.message.as_deref().unwrap_or("host refused registration")
    );
}

unsafe fn register_on_handle(db: *mut ffi::sqlite3) -> Result<LoadReport, LoadFailure> {
    if db.is_null() {
        return Err(LoadFailure::new(
            ffi::SQLITE_MISUSE,
            "sqlite_hmh was loaded without a database handle",
        ));
    }

    // Borrowed handle: dropping `conn` leaves the host's connection open.
    let conn = Connection::from_handle(db).map_err(|err| {
        let code = match &err {
            rusqlite::Error::SqliteFailure(cause, _) => cause.extended_code,
            _ => ffi::SQLITE_ERROR,
        };
        LoadFailure::new(code, err.to_string())
    })?;
    let report = load(&SqliteHost::new(&conn))?;
    Ok(report)
}

/// Points rusqlite's SQLite calls at the host's API table.
#[cfg(feature = "loadable_extension")]
unsafe fn bind_host_api(p_api: *const c_void) -> Result<(), LoadFailure> {
    if p_api.is_null() {
        return Err(LoadFailure::new(
            ffi::SQLITE_MISUSE,
            "sqlite_hmh was loaded without a host API table",
        ));
    }
    ffi::rusqlite_extension_init2(p_api as *mut ffi::sqlite3_api_routines).map_err(|_| {
        LoadFailure::new(ffi::SQLITE_ERROR, "failed to bind the host API table")
    })
}

/// Statically linked: SQLite calls already resolve to the host library.
#[cfg(not(feature = "loadable_extension"))]
unsafe fn bind_host_api(_p_api: *const c_void) -> Result<(), LoadFailure> {
    Ok(())
}

unsafe fn write_error_message(pz_err_msg: *mut *mut c_char, message: &str) {
    if pz_err_msg.is_null() {
        return;
    }
    let bytes = message.as_bytes();
    let Ok(size) = c_int::try_from(bytes.len() + 1) else {
        return;
    };
    let buf = ffi::sqlite3_malloc(size) as *mut u8;
    if buf.is_null() {
        return;
    }
    std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
    *buf.add(bytes.len()) = 0;
    *pz_err_msg = buf as *mut c_char;
}

#[cfg(test)]
mod tests {
    use super::LoadFailure;
    use rusqlite::ffi;
    use sqlite_hmh_core::{HostVersion, RegistrarError};

    #[test]
    fn incompatible_host_maps_to_error_with_message() {
        let failure = LoadFailure::from(RegistrarError::IncompatibleHost {
            found: HostVersion::new(3, 8, 6),
            required: HostVersion::MINIMUM,
        });

        assert_eq!(failure.code, ffi::SQLITE_ERROR);
        let message = failure.message.expect("version gate carries a message");
        assert!(message.contains("3.8.7"), "message={message}");
        assert!(message.contains("3.8.6"), "message={message}");
    }

    #[test]
    fn rejected_registration_keeps_host_code_without_message() {
        let failure = LoadFailure::from(RegistrarError::Registration {
            function: "sketch_zero",
            arity: 0,
            source: rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None),
        });

        assert_eq!(failure.code, ffi::SQLITE_BUSY);
        assert!(failure.message.is_none());
    }

    #[cfg(feature = "loadable_extension")]
    #[test]
    fn missing_api_table_returns_misuse_without_touching_the_slot() {
        let mut slot: *mut std::os::raw::c_char = std::ptr::null_mut();
        let rc = unsafe {
            super::sqlite3_extension_init(std::ptr::null_mut(), &mut slot, std::ptr::null())
        };

        assert_eq!(rc, ffi::SQLITE_MISUSE);
        assert!(slot.is_null());
    }

    #[cfg(not(feature = "loadable_extension"))]
    mod linked {
        use super::super::{sqlite3_extension_init, write_error_message};
        use rusqlite::ffi;
        use std::ffi::CStr;
        use std::os::raw::c_char;

        unsafe fn take_message(slot: *mut c_char) -> String {
            let message = CStr::from_ptr(slot).to_string_lossy().into_owned();
            ffi::sqlite3_free(slot.cast());
            message
        }

        #[test]
        fn null_handle_is_misuse_with_message() {
            let mut slot: *mut c_char = std::ptr::null_mut();
            let rc = unsafe {
                sqlite3_extension_init(std::ptr::null_mut(), &mut slot, std::ptr::null())
            };

            assert_eq!(rc, ffi::SQLITE_MISUSE);
            assert!(!slot.is_null());
            let message = unsafe { take_message(slot) };
            assert!(message.contains("database handle"), "message={message}");
        }

        #[test]
        fn error_message_is_nul_terminated_host_memory() {
            let mut slot: *mut c_char = std::ptr::null_mut();
            unsafe { write_error_message(&mut slot, "requires sqlite 3.8.7") };
            assert_eq!(unsafe { take_message(slot) }, "requires sqlite 3.8.7");
        }

        #[test]
        fn missing_error_slot_is_ignored() {
            unsafe { write_error_message(std::ptr::null_mut(), "ignored") };
        }
    }
}
