//! Operating-system entry points: class activation, COM apartment setup and
//! the BSTR allocator.
//!
//! Only these functions differ between targets. On Windows they go through
//! the `windows` crate; elsewhere activation reports an unregistered class
//! and BSTRs come from a layout-compatible allocator, which keeps the vtable
//! layer usable against in-process objects (and testable) on every target.

use std::ffi::c_void;

use super::abi::{E_POINTER, GUID, HRESULT};

#[cfg(windows)]
mod imp {
    use std::ffi::c_void;

    use windows::Win32::System::Com::{
        CLSCTX, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx, CoUninitialize,
    };
    use windows::core::{BSTR, IUnknown, Interface as _};

    use crate::com::abi::{GUID, HRESULT};

    pub fn create_instance(clsid: &GUID, iid: &GUID, context: u32) -> Result<*mut c_void, HRESULT> {
        // SAFETY: `CoCreateInstance` is a standard Win32 FFI call; the CLSID
        // lives for the duration of the call and no aggregation is requested.
        let unknown: IUnknown = unsafe { CoCreateInstance(clsid, None, CLSCTX(context)) }
            .map_err(|e| e.code())?;

        let mut out = std::ptr::null_mut();
        // SAFETY: `unknown` is a live reference and `out` is a valid slot for
        // the returned interface pointer. `unknown` is released on drop.
        let hr = unsafe { unknown.query(iid, &mut out) };
        super::interface_out(hr, out)
    }

    pub fn initialize_mta() -> Result<(), HRESULT> {
        // SAFETY: joins the multi-threaded apartment; paired with
        // `uninitialize` by the caller's guard.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() {
            return Err(hr);
        }
        Ok(())
    }

    pub fn uninitialize() {
        // SAFETY: only called by a guard whose construction succeeded.
        unsafe { CoUninitialize() };
    }

    pub fn bstr_alloc(value: &str) -> *mut u16 {
        BSTR::from(value).into_raw().cast_mut()
    }

    pub unsafe fn bstr_free(ptr: *mut u16) {
        // SAFETY: the caller guarantees `ptr` came from the system BSTR
        // allocator; rebuilding the owned value frees it on drop.
        drop(unsafe { BSTR::from_raw(ptr.cast_const()) });
    }
}

#[cfg(not(windows))]
mod imp {
    use std::alloc::{Layout, alloc, dealloc};
    use std::ffi::c_void;

    use crate::com::abi::{GUID, HRESULT, REGDB_E_CLASSNOTREG};

    const PREFIX: usize = std::mem::size_of::<u32>();

    pub fn create_instance(
        _clsid: &GUID,
        _iid: &GUID,
        _context: u32,
    ) -> Result<*mut c_void, HRESULT> {
        Err(REGDB_E_CLASSNOTREG)
    }

    pub fn initialize_mta() -> Result<(), HRESULT> {
        Ok(())
    }

    pub fn uninitialize() {}

    pub(super) fn layout(units: usize) -> Option<Layout> {
        // prefix + characters + terminating NUL
        let size = units.checked_add(1)?.checked_mul(2)?.checked_add(PREFIX)?;
        Layout::from_size_align(size, PREFIX).ok()
    }

    #[allow(clippy::cast_ptr_alignment)]
    pub fn bstr_alloc(value: &str) -> *mut u16 {
        let wide: Vec<u16> = value.encode_utf16().collect();
        let byte_len = wide.len().checked_mul(2).and_then(|n| u32::try_from(n).ok());
        let (Some(len), Some(layout)) = (byte_len, layout(wide.len())) else {
            return std::ptr::null_mut();
        };
        // SAFETY: the layout is non-zero sized. The block is written in
        // full (prefix, characters, NUL) before the pointer escapes.
        unsafe {
            let base = alloc(layout);
            if base.is_null() {
                return std::ptr::null_mut();
            }
            base.cast::<u32>().write(len);
            let chars = base.add(PREFIX).cast::<u16>();
            std::ptr::copy_nonoverlapping(wide.as_ptr(), chars, wide.len());
            chars.add(wide.len()).write(0);
            chars
        }
    }

    #[allow(clippy::cast_ptr_alignment)]
    pub unsafe fn bstr_free(ptr: *mut u16) {
        // SAFETY: the caller guarantees `ptr` came from `bstr_alloc`, so the
        // length prefix sits immediately before it.
        unsafe {
            let base = ptr.cast::<u8>().sub(PREFIX);
            let units = base.cast::<u32>().read() as usize / 2;
            if let Some(layout) = layout(units) {
                dealloc(base, layout);
            }
        }
    }
}

/// Result of a `QueryInterface`-style out-parameter: a success status with a
/// null pointer is still a failure.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn interface_out(hr: HRESULT, out: *mut c_void) -> Result<*mut c_void, HRESULT> {
    if hr.is_err() {
        return Err(hr);
    }
    if out.is_null() {
        return Err(E_POINTER);
    }
    Ok(out)
}

/// Activates `clsid` and returns a pointer to `iid` holding one reference.
pub(crate) fn create_instance(
    clsid: &GUID,
    iid: &GUID,
    context: u32,
) -> Result<*mut c_void, HRESULT> {
    imp::create_instance(clsid, iid, context)
}

pub(crate) fn initialize_mta() -> Result<(), HRESULT> {
    imp::initialize_mta()
}

pub(crate) fn uninitialize() {
    imp::uninitialize();
}

/// Allocates a length-prefixed BSTR holding `value`.
pub(crate) fn bstr_alloc(value: &str) -> *mut u16 {
    imp::bstr_alloc(value)
}

/// Frees a BSTR. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or a live BSTR from [`bstr_alloc`] (or from a callee
/// using the system BSTR allocator), and must not be used afterwards.
pub(crate) unsafe fn bstr_free(ptr: *mut u16) {
    if !ptr.is_null() {
        // SAFETY: forwarded from the caller.
        unsafe { imp::bstr_free(ptr) };
    }
}

/// Number of UTF-16 units in a BSTR, read from its length prefix.
///
/// # Safety
/// `ptr` must be null or a live BSTR.
#[allow(clippy::cast_ptr_alignment)]
pub(crate) unsafe fn bstr_len(ptr: *const u16) -> usize {
    if ptr.is_null() {
        return 0;
    }
    // SAFETY: a BSTR is preceded by a 4-byte byte count.
    let bytes = unsafe { ptr.cast::<u8>().sub(4).cast::<u32>().read_unaligned() };
    bytes as usize / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::abi::{E_NOINTERFACE, S_OK};

    #[test]
    fn null_interface_on_success_is_e_pointer() {
        assert_eq!(interface_out(S_OK, std::ptr::null_mut()), Err(E_POINTER));
        assert_eq!(
            interface_out(E_NOINTERFACE, std::ptr::null_mut()),
            Err(E_NOINTERFACE)
        );
        let mut slot = 0u8;
        let ptr = (&raw mut slot).cast::<c_void>();
        assert_eq!(interface_out(S_OK, ptr), Ok(ptr));
    }

    #[cfg(not(windows))]
    #[test]
    fn oversized_bstr_layout_is_refused() {
        assert!(imp::layout(usize::MAX).is_none());
        assert!(imp::layout(usize::MAX / 2).is_none());
        assert_eq!(imp::layout(3).map(|l| l.size()), Some(12));
    }

    #[test]
    fn bstr_length_prefix_counts_units() {
        let ptr = bstr_alloc("Wi-Fi");
        assert!(!ptr.is_null());
        // SAFETY: `ptr` is a live BSTR freed exactly once below.
        unsafe {
            assert_eq!(bstr_len(ptr), 5);
            bstr_free(ptr);
        }
    }
}
