//! Error reporting across the C boundary.
//!
//! Failing entry points store a message in a thread-local slot that
//! `in_get_last_error` exposes. Successful calls leave the slot alone.

use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use inochi2d_core::PuppetError;

use crate::object::ObjectKind;

#[derive(thiserror::Error, Debug)]
pub enum CapiError {
    #[error("{0} is null")]
    NullHandle(&'static str),

    #[error("expected a {expected} handle, got a {found} handle")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("path is not valid UTF-8")]
    InvalidPath,

    #[error("puppet state is poisoned by an earlier panic")]
    Poisoned,

    #[error(transparent)]
    Puppet(#[from] PuppetError),
}

impl CapiError {
    pub(crate) fn wrong_kind(expected: ObjectKind, found: ObjectKind) -> Self {
        CapiError::WrongKind {
            expected: expected.name(),
            found: found.name(),
        }
    }
}

pub(crate) type CapiResult<T> = std::result::Result<T, CapiError>;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Replace this thread's last error with `msg`. Interior NULs are dropped.
pub(crate) fn set_last_error(msg: &str) {
    let c = CString::new(msg.replace('\0', "")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(c));
}

/// Run an entry point body. Errors and panics are logged, stored as the last
/// error, and turned into `fallback`.
pub(crate) fn guard<T>(name: &'static str, fallback: T, f: impl FnOnce() -> CapiResult<T>) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            log::error!("{name}: {err}");
            set_last_error(&format!("{name}: {err}"));
            fallback
        }
        Err(payload) => {
            let what = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{name}: panicked: {what}");
            set_last_error(&format!("{name}: panicked: {what}"));
            fallback
        }
    }
}

/// Gets the last error of the calling thread, or null if nothing has failed yet.
///
/// The string stays valid until the next failing call on the same thread.
#[no_mangle]
pub extern "C" fn in_get_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |msg| msg.as_ptr())
    })
}
