//! String marshaling across the vtable boundary.
//!
//! Inputs are encoded into a transient buffer that lives exactly as long as
//! the call; outputs are copied into an owned `String` and the transmitted
//! buffer is freed.

use super::sys;
use crate::error::{ComError, ComResult};

/// A caller-allocated BSTR passed as an input parameter.
///
/// The string is freed when this value drops, after the call has returned.
#[derive(Debug)]
pub struct LocalBstr {
    inner: *mut u16,
}

impl LocalBstr {
    pub fn new(value: &str) -> ComResult<Self> {
        let inner = sys::bstr_alloc(value);
        if inner.is_null() {
            return Err(ComError::Internal("BSTR allocation failed".into()));
        }
        Ok(Self { inner })
    }

    /// The BSTR pointer to hand to the callee. Still owned by `self`.
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u16 {
        self.inner
    }
}

impl Drop for LocalBstr {
    fn drop(&mut self) {
        // SAFETY: `inner` was produced by `bstr_alloc` and is freed once.
        unsafe { sys::bstr_free(self.inner) };
    }
}

/// A callee-allocated BSTR received through an out-parameter.
///
/// Owns the buffer and frees it on drop. A null BSTR reads as the empty
/// string.
#[derive(Debug)]
pub struct RemoteBstr {
    inner: *mut u16,
}

impl RemoteBstr {
    pub const fn null() -> Self {
        Self {
            inner: std::ptr::null_mut(),
        }
    }

    /// Out-parameter slot for the callee to write into.
    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut *mut u16 {
        &mut self.inner
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    /// The characters of the string, without the terminating NUL.
    pub fn as_wide(&self) -> &[u16] {
        if self.inner.is_null() {
            return &[];
        }
        // SAFETY: a non-null `inner` is a live BSTR owned by `self`, and its
        // prefix states how many units follow.
        unsafe {
            let len = sys::bstr_len(self.inner);
            std::slice::from_raw_parts(self.inner, len)
        }
    }
}

impl Drop for RemoteBstr {
    fn drop(&mut self) {
        // SAFETY: ownership of the callee's allocation moved to us.
        unsafe { sys::bstr_free(self.inner) };
    }
}

impl TryFrom<RemoteBstr> for String {
    type Error = ComError;

    fn try_from(value: RemoteBstr) -> ComResult<Self> {
        Ok(Self::from_utf16(value.as_wide())?)
    }
}

/// A NUL-terminated UTF-16 buffer for `LPCWSTR` parameters.
#[derive(Debug, Clone, Default)]
pub struct LocalWide {
    inner: Option<Vec<u16>>,
}

impl LocalWide {
    /// A null `LPCWSTR`.
    pub const fn null() -> Self {
        Self { inner: None }
    }

    pub fn as_ptr(&self) -> *const u16 {
        match &self.inner {
            Some(value) => value.as_ptr(),
            None => std::ptr::null(),
        }
    }
}

impl From<&str> for LocalWide {
    fn from(value: &str) -> Self {
        Self {
            inner: Some(value.encode_utf16().chain(Some(0)).collect()),
        }
    }
}

/// Copies a caller-supplied output buffer up to its first NUL.
pub(crate) fn wide_to_string(buffer: &[u16]) -> ComResult<String> {
    let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    Ok(String::from_utf16(&buffer[..end])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_bstr_reads_prefix_length() {
        let mut remote = RemoteBstr::null();
        // SAFETY: the slot receives a fresh BSTR that `remote` now owns.
        unsafe { *remote.as_mut_ptr() = sys::bstr_alloc("Contoso Wi-Fi") };
        assert_eq!(remote.as_wide().len(), 13);
        assert_eq!(String::try_from(remote).unwrap(), "Contoso Wi-Fi");
    }

    #[test]
    fn null_remote_bstr_is_empty_string() {
        let remote = RemoteBstr::null();
        assert!(remote.is_null());
        assert_eq!(String::try_from(remote).unwrap(), "");
    }

    #[test]
    fn embedded_nul_survives_bstr_but_not_wide() {
        let local = LocalBstr::new("a\0b").unwrap();
        // SAFETY: `local` keeps the BSTR alive for the read.
        assert_eq!(unsafe { sys::bstr_len(local.as_ptr()) }, 3);
        assert_eq!(wide_to_string(&[0x61, 0, 0x62]).unwrap(), "a");
    }

    #[test]
    fn local_wide_is_nul_terminated() {
        let wide = LocalWide::from(".txt");
        // SAFETY: `wide` owns five units, the last being NUL.
        let tail = unsafe { *wide.as_ptr().add(4) };
        assert_eq!(tail, 0);
        assert!(LocalWide::null().as_ptr().is_null());
    }

    #[test]
    fn invalid_utf16_is_a_conversion_error() {
        let err = wide_to_string(&[0xD800, 0]).unwrap_err();
        assert!(matches!(err, ComError::Conversion(_)));
    }
}
