//! Object lifecycle primitives: activation, interface querying and release.
//!
//! [`ComObject`] is the only owner of a raw reference count unit in the
//! crate. It is move-only; dropping it releases the reference through slot 2.

use std::ffi::c_void;
use std::ptr::NonNull;

#[cfg(any(test, feature = "test-support"))]
use super::abi::AddRefFn;
use super::abi::{
    GUID, HRESULT, InParamFn, OutParamFn, QueryInterfaceFn, RawVariant, ReleaseFn,
    VT_EMPTY, VariantBool, slot,
};
use super::strings::{LocalBstr, RemoteBstr};
use super::sys;
use crate::error::{ComError, ComResult};

/// Where an activated class may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClassContext {
    /// In-process server DLL only.
    InProcess,
    /// Out-of-process server on this machine only.
    LocalServer,
    /// Any context the class is registered for.
    #[default]
    All,
}

impl ClassContext {
    pub const fn bits(self) -> u32 {
        match self {
            Self::InProcess => 0x1,
            Self::LocalServer => 0x4,
            Self::All => 0x17,
        }
    }
}

/// An owned reference to a COM object.
///
/// Holds exactly one reference count unit and releases it on drop. Not
/// `Clone`, `Send` or `Sync`.
#[repr(transparent)]
#[derive(Debug)]
pub struct ComObject {
    ptr: NonNull<c_void>,
}

impl ComObject {
    /// Takes ownership of one reference held by `ptr`.
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `ptr` must be null or point to a live COM object whose vtable starts
    /// with the `IUnknown` slots, and the caller must own the reference it
    /// hands over.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    #[inline(always)]
    pub fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// Gives up ownership without releasing.
    pub fn into_raw(self) -> *mut c_void {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    /// Reads the function pointer stored at `index` in the object's vtable.
    ///
    /// # Safety
    /// `F` must be the exact `extern "system"` signature of that slot on the
    /// interface this pointer was obtained for.
    pub unsafe fn method<F: Copy>(&self, index: usize) -> F {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*const c_void>());
        // SAFETY: a COM object begins with a pointer to its vtable, an array
        // of function pointers that covers `index` per the caller's contract.
        unsafe {
            let vtable = *self.ptr.as_ptr().cast::<*const *const c_void>();
            let entry = *vtable.add(index);
            std::mem::transmute_copy::<*const c_void, F>(&entry)
        }
    }

    /// Slot 0: returns a new, independent reference to `iid`.
    pub fn query_interface(&self, iid: &GUID) -> ComResult<Self> {
        // SAFETY: `self` is live and slot 0 is `QueryInterface` on every interface.
        unsafe { query_interface(self.as_raw(), iid) }
    }

    /// Calls a method that writes one value through an out-pointer.
    ///
    /// # Safety
    /// Slot `index` must have the signature `(this, *mut T) -> HRESULT`.
    pub unsafe fn get<T: Default>(&self, index: usize, method: &'static str) -> ComResult<T> {
        let mut value = T::default();
        // SAFETY: signature guaranteed by the caller; `value` outlives the call.
        let hr = unsafe {
            let f: OutParamFn<T> = self.method(index);
            f(self.as_raw(), &mut value)
        };
        check(hr, method)?;
        Ok(value)
    }

    /// Calls a method that takes one by-value input.
    ///
    /// # Safety
    /// Slot `index` must have the signature `(this, T) -> HRESULT`.
    pub unsafe fn put<T>(&self, index: usize, method: &'static str, value: T) -> ComResult<()> {
        // SAFETY: signature guaranteed by the caller.
        let hr = unsafe {
            let f: InParamFn<T> = self.method(index);
            f(self.as_raw(), value)
        };
        check(hr, method)
    }

    /// Calls a `VARIANT_BOOL` getter.
    ///
    /// # Safety
    /// Slot `index` must have the signature `(this, *mut VARIANT_BOOL) -> HRESULT`.
    pub unsafe fn get_bool(&self, index: usize, method: &'static str) -> ComResult<bool> {
        // SAFETY: forwarded from the caller.
        let value: VariantBool = unsafe { self.get(index, method)? };
        Ok(value != 0)
    }

    /// Calls a `BSTR` getter, copying the result and freeing the callee's buffer.
    ///
    /// # Safety
    /// Slot `index` must have the signature `(this, *mut BSTR) -> HRESULT`.
    pub unsafe fn get_string(&self, index: usize, method: &'static str) -> ComResult<String> {
        let mut out = RemoteBstr::null();
        // SAFETY: signature guaranteed by the caller; `out` takes ownership
        // of whatever the callee writes, even on failure.
        let hr = unsafe {
            let f: OutParamFn<*mut u16> = self.method(index);
            f(self.as_raw(), out.as_mut_ptr())
        };
        check(hr, method)?;
        out.try_into()
    }

    /// Calls a `BSTR` setter through a transient length-prefixed buffer.
    ///
    /// # Safety
    /// Slot `index` must have the signature `(this, BSTR) -> HRESULT`.
    pub unsafe fn put_string(&self, index: usize, method: &'static str, value: &str) -> ComResult<()> {
        let value = LocalBstr::new(value)?;
        // SAFETY: forwarded from the caller; `value` outlives the call.
        unsafe { self.put(index, method, value.as_ptr()) }
    }

    /// Calls a getter whose result is an interface pointer.
    ///
    /// # Safety
    /// Slot `index` must have the signature `(this, *mut *mut c_void) -> HRESULT`.
    pub unsafe fn get_object(&self, index: usize, method: &'static str) -> ComResult<Self> {
        let mut raw = std::ptr::null_mut();
        // SAFETY: signature guaranteed by the caller.
        let hr = unsafe {
            let f: OutParamFn<*mut c_void> = self.method(index);
            f(self.as_raw(), &mut raw)
        };
        // SAFETY: `raw` is whatever the callee wrote into the out-parameter.
        unsafe { out_object(hr, raw, method) }
    }
}

impl Drop for ComObject {
    fn drop(&mut self) {
        // SAFETY: `self` owns exactly one reference, released exactly once here.
        unsafe { release(self.as_raw()) };
    }
}

/// Typed wrapper over a [`ComObject`] known to implement one interface.
pub trait ComInterface: Sized {
    const IID: GUID;
    const NAME: &'static str;

    /// Wraps a reference already known to point at `Self::IID`.
    ///
    /// # Safety
    /// `object` must have been obtained for `Self::IID` (activation, a
    /// matching `QueryInterface`, or a documented out-parameter).
    unsafe fn from_object(object: ComObject) -> Self;

    fn as_object(&self) -> &ComObject;

    /// Queries `object` for this interface, leaving `object` untouched.
    fn cast_from(object: &ComObject) -> ComResult<Self> {
        let object = object.query_interface(&Self::IID).inspect_err(|e| {
            tracing::debug!(interface = Self::NAME, error = %e, "interface cast failed");
        })?;
        // SAFETY: obtained through `QueryInterface(Self::IID)`.
        Ok(unsafe { Self::from_object(object) })
    }

    /// Converts an enumerated item, consuming (and releasing) the item reference.
    fn from_item(item: ComObject) -> ComResult<Self> {
        Self::cast_from(&item)
    }
}

/// Requests activation of `clsid` exposing `iid`.
///
/// The returned object already holds one reference.
pub fn activate(clsid: &GUID, iid: &GUID, context: ClassContext) -> ComResult<ComObject> {
    let raw = sys::create_instance(clsid, iid, context.bits()).map_err(|status| {
        tracing::debug!(%status, "class activation failed");
        ComError::Activation { status }
    })?;
    tracing::trace!(ptr = ?raw, "activated");
    // SAFETY: a successful activation hands over one reference to `iid`.
    unsafe { ComObject::from_raw(raw) }.ok_or(ComError::Activation {
        status: super::abi::E_POINTER,
    })
}

/// Invokes slot 2 on a non-null pointer. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or an owned reference to a live COM object; it must
/// not be used afterwards.
pub unsafe fn release(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: slot 2 is `Release` on every interface.
    let remaining = unsafe {
        let vtable = *ptr.cast::<*const *const c_void>();
        let release: ReleaseFn = std::mem::transmute_copy(&*vtable.add(slot::RELEASE));
        release(ptr)
    };
    tracing::trace!(?ptr, remaining, "released");
}

/// Invokes slot 0 on `ptr`, returning a new reference distinct from the input's.
///
/// # Safety
/// `ptr` must point to a live COM object.
pub unsafe fn query_interface(ptr: *mut c_void, iid: &GUID) -> ComResult<ComObject> {
    let mut out = std::ptr::null_mut();
    // SAFETY: slot 0 is `QueryInterface` on every interface.
    let hr = unsafe {
        let vtable = *ptr.cast::<*const *const c_void>();
        let query: QueryInterfaceFn =
            std::mem::transmute_copy(&*vtable.add(slot::QUERY_INTERFACE));
        query(ptr, iid, &mut out)
    };
    if hr.is_err() {
        // SAFETY: a failing callee should not have written, but never leak if it did.
        unsafe { release(out) };
        return Err(ComError::InterfaceNotSupported { status: hr });
    }
    // SAFETY: a successful query hands over one reference.
    unsafe { ComObject::from_raw(out) }.ok_or(ComError::InterfaceNotSupported {
        status: super::abi::E_POINTER,
    })
}

/// Takes ownership of an interface pointer written through an out-parameter.
///
/// On failure the pointer, if the callee wrote one anyway, is released. A
/// null pointer on success is reported as `CallFailed(E_POINTER)`.
///
/// # Safety
/// `raw` must be null or an owned reference produced by the call that
/// returned `hr`.
pub unsafe fn out_object(hr: HRESULT, raw: *mut c_void, method: &'static str) -> ComResult<ComObject> {
    if hr.is_err() {
        // SAFETY: a failing callee may still have written a reference.
        unsafe { release(raw) };
        return Err(ComError::call_failed(method, hr));
    }
    // SAFETY: a successful out-parameter transfers one reference to us.
    unsafe { ComObject::from_raw(raw) }.ok_or_else(|| null_result(method))
}

/// Maps a returned status to `CallFailed`.
pub fn check(hr: HRESULT, method: &'static str) -> ComResult<()> {
    if hr.is_err() {
        return Err(ComError::call_failed(method, hr));
    }
    Ok(())
}

fn null_result(method: &'static str) -> ComError {
    ComError::call_failed(method, super::abi::E_POINTER)
}

impl RawVariant {
    /// Moves an object reference out of the record, leaving it `VT_EMPTY`.
    ///
    /// Records with any other tag are left as they are and yield `None`.
    ///
    /// # Safety
    /// If the tag denotes an object, the payload must be an owned reference.
    pub unsafe fn take_object(&mut self) -> Option<ComObject> {
        let ptr = self.object_ptr()?;
        self.vt = VT_EMPTY;
        self.payload = [0; 2];
        // SAFETY: ownership of the payload reference moves to the caller.
        unsafe { ComObject::from_raw(ptr) }
    }
}

/// Produces a second owned reference. Only used by tests that need to hold
/// on to an object while handing one reference to the code under test.
#[cfg(any(test, feature = "test-support"))]
impl ComObject {
    pub fn duplicate(&self) -> Self {
        // SAFETY: slot 1 is `AddRef` on every interface.
        unsafe {
            let add_ref: AddRefFn = self.method(slot::ADD_REF);
            add_ref(self.as_raw());
        }
        Self { ptr: self.ptr }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::abi::{E_NOINTERFACE, IID_IDISPATCH, IID_IUNKNOWN};
    use crate::testing::{FakeBuilder, Tracker};

    #[test]
    fn drop_releases_exactly_once() {
        let tracker = Tracker::new();
        let object = FakeBuilder::new(&tracker, "plain").build();
        assert_eq!(tracker.live(), 1);
        drop(object);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.releases("plain"), 1);
    }

    #[test]
    fn release_of_null_is_a_no_op() {
        // SAFETY: null is explicitly allowed.
        unsafe { release(std::ptr::null_mut()) };
    }

    #[test]
    fn query_interface_returns_independent_reference() {
        let tracker = Tracker::new();
        let object = FakeBuilder::new(&tracker, "dual").interface(IID_IDISPATCH).build();
        let second = object.query_interface(&IID_IDISPATCH).unwrap();
        assert_eq!(tracker.refcount("dual"), 2);
        drop(object);
        assert_eq!(tracker.live(), 1);
        drop(second);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn unsupported_interface_is_reported_with_status() {
        let tracker = Tracker::new();
        let object = FakeBuilder::new(&tracker, "plain").build();
        let err = object.query_interface(&IID_IDISPATCH).unwrap_err();
        assert!(matches!(
            err,
            ComError::InterfaceNotSupported { status } if status == E_NOINTERFACE
        ));
        assert!(object.query_interface(&IID_IUNKNOWN).is_ok());
        drop(object);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn into_raw_transfers_ownership() {
        let tracker = Tracker::new();
        let object = FakeBuilder::new(&tracker, "plain").build();
        let raw = object.into_raw();
        assert_eq!(tracker.live(), 1);
        // SAFETY: `raw` carries the single reference released above.
        drop(unsafe { ComObject::from_raw(raw) });
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn take_object_empties_the_record() {
        let tracker = Tracker::new();
        let mut variant = RawVariant::empty();
        variant.vt = crate::com::abi::VT_UNKNOWN;
        variant.payload[0] = FakeBuilder::new(&tracker, "item").build().into_raw() as usize;
        // SAFETY: the payload reference was handed over above.
        let object = unsafe { variant.take_object() }.unwrap();
        assert_eq!(variant.vt, VT_EMPTY);
        // SAFETY: the record is now empty.
        assert!(unsafe { variant.take_object() }.is_none());
        drop(object);
        assert_eq!(tracker.live(), 0);
    }

    #[cfg(not(windows))]
    #[test]
    fn activation_without_a_registry_fails_with_status() {
        use crate::com::abi::REGDB_E_CLASSNOTREG;

        let err = activate(&IID_IUNKNOWN, &IID_IUNKNOWN, ClassContext::All).unwrap_err();
        assert!(matches!(err, ComError::Activation { status } if status == REGDB_E_CLASSNOTREG));
    }

    #[test]
    fn class_context_bits() {
        assert_eq!(ClassContext::default(), ClassContext::All);
        assert_eq!(ClassContext::InProcess.bits(), 1);
        assert_eq!(ClassContext::LocalServer.bits(), 4);
    }
}
