//! Binary layout of the COM calling protocol.
//!
//! Everything in this module mirrors a documented C layout: status codes,
//! GUIDs, the 24-byte VARIANT record, `DISPPARAMS`, and the function-pointer
//! shapes of the universal vtable slots. Nothing here performs a call.

#![allow(clippy::cast_possible_wrap)]

use std::ffi::c_void;

use uuid::Uuid;
pub use windows_core::{GUID, HRESULT};

// ── Status codes ────────────────────────────────────────────────────
// Zero and positive values are success codes, negative values are hard
// failures. `HRESULT` displays as `0x8000_4002`-style hex.

pub const S_OK: HRESULT = HRESULT(0);
/// Success with fewer results than requested; ends an enumeration.
pub const S_FALSE: HRESULT = HRESULT(1);
pub const E_NOTIMPL: HRESULT = HRESULT(0x8000_4001_u32 as i32);
pub const E_NOINTERFACE: HRESULT = HRESULT(0x8000_4002_u32 as i32);
pub const E_POINTER: HRESULT = HRESULT(0x8000_4003_u32 as i32);
pub const E_FAIL: HRESULT = HRESULT(0x8000_4005_u32 as i32);
pub const REGDB_E_CLASSNOTREG: HRESULT = HRESULT(0x8004_0154_u32 as i32);
pub const DISP_E_MEMBERNOTFOUND: HRESULT = HRESULT(0x8002_0003_u32 as i32);

// ── GUIDs ───────────────────────────────────────────────────────────

/// Native GUID to the `Uuid` exposed by the public API.
pub fn guid_to_uuid(guid: GUID) -> Uuid {
    Uuid::from_u128(guid.to_u128())
}

pub fn uuid_to_guid(id: Uuid) -> GUID {
    GUID::from_u128(id.as_u128())
}

pub const IID_NULL: GUID = GUID::zeroed();
pub const IID_IUNKNOWN: GUID = GUID::from_u128(0x00000000_0000_0000_c000_000000000046);
pub const IID_IDISPATCH: GUID = GUID::from_u128(0x00020400_0000_0000_c000_000000000046);
pub const IID_IENUMVARIANT: GUID = GUID::from_u128(0x00020404_0000_0000_c000_000000000046);

// ── Vtable slots ────────────────────────────────────────────────────

/// Fixed vtable slot numbers shared by every interface.
pub mod slot {
    pub const QUERY_INTERFACE: usize = 0;
    pub const ADD_REF: usize = 1;
    pub const RELEASE: usize = 2;
    /// `IDispatch::Invoke`; slots 3-5 are the type-info and name lookups.
    pub const INVOKE: usize = 6;
    /// First interface-specific slot on an `IUnknown`-derived interface.
    pub const UNKNOWN_BASE: usize = 3;
    /// First interface-specific slot on an `IDispatch`-derived interface.
    pub const DISPATCH_BASE: usize = 7;
    /// `IEnumVARIANT::Next`.
    pub const ENUM_NEXT: usize = UNKNOWN_BASE;
}

/// Reserved member id of a collection's default enumerable property.
pub const DISPID_NEWENUM: i32 = -4;
pub const DISPATCH_PROPERTYGET: u16 = 2;
pub const LOCALE_NEUTRAL: u32 = 0;

// ── VARIANT ─────────────────────────────────────────────────────────

pub const VT_EMPTY: u16 = 0;
pub const VT_I4: u16 = 3;
pub const VT_BSTR: u16 = 8;
pub const VT_DISPATCH: u16 = 9;
pub const VT_UNKNOWN: u16 = 13;

/// A VARIANT record: type tag at offset 0, payload at offset 8.
///
/// Only the object-reference tags ([`VT_UNKNOWN`], [`VT_DISPATCH`]) are ever
/// interpreted; every other tag is treated as inert.
#[repr(C)]
#[derive(Debug)]
pub struct RawVariant {
    pub vt: u16,
    pub reserved1: u16,
    pub reserved2: u16,
    pub reserved3: u16,
    pub payload: [usize; 2],
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(std::mem::size_of::<RawVariant>() == 24);
const _: () = assert!(std::mem::offset_of!(RawVariant, payload) == 8);

impl RawVariant {
    /// A zeroed (`VT_EMPTY`) record, ready to be filled by a callee.
    pub const fn empty() -> Self {
        Self {
            vt: VT_EMPTY,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            payload: [0; 2],
        }
    }

    pub const fn is_object_tag(&self) -> bool {
        matches!(self.vt, VT_UNKNOWN | VT_DISPATCH)
    }

    /// The object pointer, if the tag denotes an object and the payload is set.
    pub fn object_ptr(&self) -> Option<*mut c_void> {
        let ptr = self.payload[0] as *mut c_void;
        (self.is_object_tag() && !ptr.is_null()).then_some(ptr)
    }
}

impl Default for RawVariant {
    fn default() -> Self {
        Self::empty()
    }
}

/// `DISPPARAMS` for `IDispatch::Invoke`.
#[repr(C)]
#[derive(Debug)]
pub struct DispParams {
    pub args: *mut RawVariant,
    pub named_args: *mut i32,
    pub arg_count: u32,
    pub named_arg_count: u32,
}

impl DispParams {
    /// Parameter block for a zero-argument call.
    pub const fn none() -> Self {
        Self {
            args: std::ptr::null_mut(),
            named_args: std::ptr::null_mut(),
            arg_count: 0,
            named_arg_count: 0,
        }
    }
}

/// Automation boolean: `0` is false, any other value (canonically `-1`) is true.
pub type VariantBool = i16;
pub const VARIANT_TRUE: VariantBool = -1;
pub const VARIANT_FALSE: VariantBool = 0;

// ── Slot signatures ─────────────────────────────────────────────────

pub type QueryInterfaceFn =
    unsafe extern "system" fn(this: *mut c_void, iid: *const GUID, out: *mut *mut c_void) -> HRESULT;
pub type AddRefFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type InvokeFn = unsafe extern "system" fn(
    this: *mut c_void,
    member: i32,
    iid: *const GUID,
    locale: u32,
    flags: u16,
    params: *mut DispParams,
    result: *mut RawVariant,
    exception: *mut c_void,
    arg_error: *mut u32,
) -> HRESULT;
pub type EnumNextFn = unsafe extern "system" fn(
    this: *mut c_void,
    requested: u32,
    items: *mut RawVariant,
    fetched: *mut u32,
) -> HRESULT;
/// Any method whose only parameter is a single out-pointer.
pub type OutParamFn<T> = unsafe extern "system" fn(this: *mut c_void, out: *mut T) -> HRESULT;
/// Any method whose only parameter is a single by-value input.
pub type InParamFn<T> = unsafe extern "system" fn(this: *mut c_void, value: T) -> HRESULT;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_round_trips_through_uuid() {
        let uuid = Uuid::parse_str("dcb00c01-570f-4a9b-8d69-199fdba5723b").unwrap();
        let guid = uuid_to_guid(uuid);
        assert_eq!(guid, GUID::from_u128(0xDCB00C01_570F_4A9B_8D69_199FDBA5723B));
        assert_eq!(guid.data1, 0xDCB0_0C01);
        assert_eq!(guid.data4, [0x8D, 0x69, 0x19, 0x9F, 0xDB, 0xA5, 0x72, 0x3B]);
        assert_eq!(guid_to_uuid(guid), uuid);
    }

    #[test]
    fn status_classification() {
        assert!(S_OK.is_ok());
        assert!(S_FALSE.is_ok());
        assert!(E_FAIL.is_err());
        assert_eq!(E_NOINTERFACE.0, -2_147_467_262);
    }

    #[test]
    fn only_object_tags_expose_a_pointer() {
        let mut variant = RawVariant::empty();
        variant.payload[0] = 0x1000;
        variant.vt = VT_I4;
        assert_eq!(variant.object_ptr(), None);
        variant.vt = VT_BSTR;
        assert_eq!(variant.object_ptr(), None);
        variant.vt = VT_DISPATCH;
        assert_eq!(variant.object_ptr(), Some(0x1000 as *mut c_void));
        variant.payload[0] = 0;
        assert_eq!(variant.object_ptr(), None);
    }
}
