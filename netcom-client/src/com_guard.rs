//! RAII guard for COM initialization/teardown.
//!
//! Ensures `CoUninitialize` is called exactly once per successful
//! `CoInitializeEx`, even on early returns or panics.

use std::marker::PhantomData;

use crate::com::sys;
use crate::error::{ComError, ComResult};

/// Drop guard for COM thread initialization.
///
/// Calling [`ComGuard::new`] joins the Multi-Threaded Apartment (MTA).
/// When the guard is dropped, `CoUninitialize` is called automatically.
/// On targets without COM the guard does nothing.
///
/// # Thread Safety
///
/// `ComGuard` is `!Send` and `!Sync`. COM initialization is per-thread:
/// the guard must be created and dropped on the same OS thread.
///
/// # Examples
///
/// ```no_run
/// # use netcom_client::ComGuard;
/// # fn main() -> netcom_client::ComResult<()> {
/// let _guard = ComGuard::new()?;
/// // ... COM operations ...
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ComGuard {
    _not_send: PhantomData<*mut ()>,
}

impl ComGuard {
    /// Initialize COM in MTA mode.
    ///
    /// `S_FALSE` (already initialized on this thread) counts as success and
    /// is balanced like any other successful call.
    pub fn new() -> ComResult<Self> {
        if let Err(status) = sys::initialize_mta() {
            tracing::error!(%status, "COM MTA initialization failed");
            return Err(ComError::call_failed("CoInitializeEx", status));
        }

        tracing::debug!("COM MTA initialized");

        Ok(Self {
            _not_send: PhantomData,
        })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        tracing::debug!("COM MTA teardown");
        // Paired with the successful initialization in `new()`; only runs on
        // the creating thread (!Send).
        sys::uninitialize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn com_guard_constructs_and_drops() {
        let guard = ComGuard::new();
        assert!(guard.is_ok(), "ComGuard::new() should succeed: {guard:?}");
    }

    #[test]
    fn guards_nest_on_one_thread() {
        let outer = ComGuard::new().unwrap();
        let inner = ComGuard::new().unwrap();
        drop(inner);
        drop(outer);
    }
}
