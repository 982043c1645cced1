use std::ffi::c_void;

use super::types::{AssociationFlags, AssociationString};
use super::{CLSID_QUERY_ASSOCIATIONS, IID_IQUERY_ASSOCIATIONS};
use crate::com::abi::{GUID, HRESULT};
use crate::com::strings::{LocalWide, wide_to_string};
use crate::com::{ClassContext, ComInterface, ComObject, activate, check};
use crate::error::ComResult;

// IUnknown-based: interface methods start right after the lifecycle slots.
mod slot {
    use crate::com::abi::slot::UNKNOWN_BASE;

    pub const INIT: usize = UNKNOWN_BASE;
    pub const GET_STRING: usize = UNKNOWN_BASE + 1;
}

type InitFn = unsafe extern "system" fn(
    this: *mut c_void,
    flags: u32,
    association: *const u16,
    key: *mut c_void,
    window: *mut c_void,
) -> HRESULT;
type GetStringFn = unsafe extern "system" fn(
    this: *mut c_void,
    flags: u32,
    kind: i32,
    extra: *const u16,
    out: *mut u16,
    len: *mut u32,
) -> HRESULT;

/// `IQueryAssociations`: looks up registry-backed association strings for
/// an extension, ProgID or executable.
#[derive(Debug)]
pub struct QueryAssociations {
    inner: ComObject,
}

impl ComInterface for QueryAssociations {
    const IID: GUID = IID_IQUERY_ASSOCIATIONS;
    const NAME: &'static str = "IQueryAssociations";

    unsafe fn from_object(object: ComObject) -> Self {
        Self { inner: object }
    }

    fn as_object(&self) -> &ComObject {
        &self.inner
    }
}

impl QueryAssociations {
    pub fn activate(context: ClassContext) -> ComResult<Self> {
        let object = activate(&CLSID_QUERY_ASSOCIATIONS, &Self::IID, context)?;
        // SAFETY: activation was requested for `Self::IID`.
        Ok(unsafe { Self::from_object(object) })
    }

    /// Binds the object to `association` (".txt", "txtfile", a path, ...).
    pub fn init(&self, flags: AssociationFlags, association: &str) -> ComResult<()> {
        let association = LocalWide::from(association);
        // SAFETY: slot 3 is `Init(ASSOCF, LPCWSTR, HKEY, HWND)`; the string
        // outlives the call and no key or window is passed.
        let hr = unsafe {
            let f: InitFn = self.inner.method(slot::INIT);
            f(
                self.inner.as_raw(),
                flags.bits(),
                association.as_ptr(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        check(hr, "IQueryAssociations::Init")
    }

    /// Retrieves one association string.
    ///
    /// The first call asks for the required length, the second fills a
    /// buffer of exactly that size.
    pub fn get_string(
        &self,
        flags: AssociationFlags,
        kind: AssociationString,
        extra: Option<&str>,
    ) -> ComResult<String> {
        let extra = extra.map_or_else(LocalWide::null, LocalWide::from);

        let mut len = 0u32;
        // SAFETY: slot 4 is `GetString(ASSOCF, ASSOCSTR, LPCWSTR, LPWSTR, DWORD*)`.
        // A null output buffer requests the length only.
        let hr = unsafe { self.call_get_string(flags, kind, &extra, std::ptr::null_mut(), &mut len) };
        check(hr, "IQueryAssociations::GetString")?;
        if len == 0 {
            return Ok(String::new());
        }

        let mut buffer = vec![0u16; len as usize];
        // SAFETY: as above; `buffer` holds `len` units and outlives the call.
        let hr = unsafe { self.call_get_string(flags, kind, &extra, buffer.as_mut_ptr(), &mut len) };
        check(hr, "IQueryAssociations::GetString")?;
        wide_to_string(&buffer)
    }

    /// # Safety
    /// `out` must be null or point to at least `*len` writable units.
    unsafe fn call_get_string(
        &self,
        flags: AssociationFlags,
        kind: AssociationString,
        extra: &LocalWide,
        out: *mut u16,
        len: &mut u32,
    ) -> HRESULT {
        // SAFETY: slot layout fixed by the interface; buffers per the caller.
        unsafe {
            let f: GetStringFn = self.inner.method(slot::GET_STRING);
            f(
                self.inner.as_raw(),
                flags.bits(),
                kind.to_native(),
                extra.as_ptr(),
                out,
                len,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComError;
    use crate::testing::{AssociationSpec, E_NO_ASSOCIATION, Tracker, fake_associations};

    fn query(tracker: &Tracker) -> QueryAssociations {
        let spec = AssociationSpec::default()
            .with(".txt", 2, r"C:\Windows\notepad.exe")
            .with(".txt", 14, "text/plain")
            .with(".txt", 3, "");
        QueryAssociations::from_item(fake_associations(tracker, spec)).unwrap()
    }

    #[test]
    fn two_call_string_query() {
        let tracker = Tracker::new();
        let q = query(&tracker);
        q.init(AssociationFlags::empty(), ".TXT").unwrap();
        let exe = q
            .get_string(AssociationFlags::NOTRUNCATE, AssociationString::Executable, None)
            .unwrap();
        assert_eq!(exe, r"C:\Windows\notepad.exe");
        assert_eq!(tracker.calls("associations", 4), 2);
        assert_eq!(
            q.get_string(AssociationFlags::empty(), AssociationString::ContentType, None)
                .unwrap(),
            "text/plain"
        );
        drop(q);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn empty_value_is_empty_string() {
        let tracker = Tracker::new();
        let q = query(&tracker);
        q.init(AssociationFlags::empty(), ".txt").unwrap();
        let name = q
            .get_string(AssociationFlags::empty(), AssociationString::FriendlyDocName, Some("open"))
            .unwrap();
        assert_eq!(name, "");
    }

    #[test]
    fn unknown_association_and_missing_string() {
        let tracker = Tracker::new();
        let q = query(&tracker);
        let err = q.init(AssociationFlags::empty(), ".nope").unwrap_err();
        assert!(matches!(
            err,
            ComError::CallFailed { method: "IQueryAssociations::Init", status }
                if status == E_NO_ASSOCIATION
        ));

        q.init(AssociationFlags::empty(), ".txt").unwrap();
        let err = q
            .get_string(AssociationFlags::empty(), AssociationString::DefaultIcon, None)
            .unwrap_err();
        assert_eq!(err.status(), Some(E_NO_ASSOCIATION));
    }
}
