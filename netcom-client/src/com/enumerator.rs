//! Generic enumeration of COM collections through `IEnumVARIANT`.
//!
//! A collection exposes its enumerator either directly (it answers
//! `QueryInterface(IID_IEnumVARIANT)`) or through its default enumerable
//! member (`IDispatch::Invoke(DISPID_NEWENUM)`). The two are tried in that
//! order; after resolution both behave identically.

use super::abi::{
    DISPATCH_PROPERTYGET, DISPID_NEWENUM, DispParams, EnumNextFn, IID_IDISPATCH,
    IID_IENUMVARIANT, IID_NULL, InvokeFn, LOCALE_NEUTRAL, RawVariant, slot,
};
use super::object::ComObject;
use crate::error::{ComError, ComResult};

/// Resolves the `IEnumVARIANT` of `collection`.
///
/// Returns `None` when neither resolution path yields an enumerator; that
/// is an empty collection, not an error.
pub fn get_enumerator(collection: &ComObject) -> Option<ComObject> {
    match collection.query_interface(&IID_IENUMVARIANT) {
        Ok(enumerator) => return Some(enumerator),
        Err(e) => tracing::debug!(error = %e, "no direct IEnumVARIANT, trying DISPID_NEWENUM"),
    }

    let dispatch = collection.query_interface(&IID_IDISPATCH).ok()?;
    let member = new_enum_member(&dispatch)?;
    // `member` is an intermediate reference, released whichever way the query goes.
    member.query_interface(&IID_IENUMVARIANT).ok()
}

/// Reads the `_NewEnum` property through `IDispatch::Invoke`.
fn new_enum_member(dispatch: &ComObject) -> Option<ComObject> {
    let mut params = DispParams::none();
    let mut result = RawVariant::empty();
    let mut arg_error = 0u32;

    // SAFETY: `dispatch` was obtained for IID_IDispatch, whose slot 6 is
    // `Invoke`. All pointers outlive the call; exception info is optional.
    let hr = unsafe {
        let invoke: InvokeFn = dispatch.method(slot::INVOKE);
        invoke(
            dispatch.as_raw(),
            DISPID_NEWENUM,
            &IID_NULL,
            LOCALE_NEUTRAL,
            DISPATCH_PROPERTYGET,
            &mut params,
            &mut result,
            std::ptr::null_mut(),
            &mut arg_error,
        )
    };

    // SAFETY: on success an object-tagged result owns its reference.
    let member = unsafe { result.take_object() };
    if hr.is_err() {
        tracing::debug!(status = %hr, "DISPID_NEWENUM invoke failed");
        return None;
    }
    if member.is_none() {
        tracing::debug!(vt = result.vt, "DISPID_NEWENUM returned no object");
    }
    member
}

/// Pulls one `VARIANT` at a time from an `IEnumVARIANT`, yielding the
/// object references it carries.
///
/// Items whose tag is not an object reference are skipped without being
/// touched. After the first error the iterator is exhausted. The enumerator
/// reference is released when the iterator drops.
pub(crate) struct VariantObjects {
    inner: ComObject,
    done: bool,
}

impl VariantObjects {
    /// Wraps a reference obtained for `IID_IEnumVARIANT`.
    pub(crate) fn new(inner: ComObject) -> Self {
        Self { inner, done: false }
    }
}

impl Iterator for VariantObjects {
    type Item = ComResult<ComObject>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut item = RawVariant::empty();
            let mut fetched = 0u32;

            // SAFETY: `inner` was obtained for IID_IEnumVARIANT, whose slot 3
            // is `Next`. Exactly one record is requested into `item`.
            let hr = unsafe {
                let next: EnumNextFn = self.inner.method(slot::ENUM_NEXT);
                next(self.inner.as_raw(), 1, &mut item, &mut fetched)
            };

            if hr.is_err() {
                self.done = true;
                // The failing call may have written the record before reporting
                // the error; only a record that looks like an object is released.
                // SAFETY: an object-tagged record owns its payload reference.
                if let Some(stray) = unsafe { item.take_object() } {
                    tracing::warn!(status = %hr, "releasing stray reference from failed fetch");
                    drop(stray);
                }
                return Some(Err(ComError::call_failed("IEnumVARIANT::Next", hr)));
            }

            if fetched == 0 {
                self.done = true;
                return None;
            }

            // SAFETY: a fetched object-tagged record hands over its reference.
            match unsafe { item.take_object() } {
                Some(object) => return Some(Ok(object)),
                None => tracing::trace!(vt = item.vt, "skipping non-object item"),
            }
        }
        None
    }
}

/// Enumerates `collection`, mapping every object item through `map`.
///
/// Ownership of each item moves into `map`. On any failure (a fetch error or
/// an error from `map`) every item collected so far is dropped, and thereby
/// released, before the error is returned: no partial sequence escapes. The
/// enumerator is released exactly once on every exit. The caller keeps its
/// own reference to `collection`.
pub fn enumerate<T, F>(collection: &ComObject, mut map: F) -> ComResult<Vec<T>>
where
    F: FnMut(ComObject) -> ComResult<T>,
{
    let Some(enumerator) = get_enumerator(collection) else {
        return Ok(Vec::new());
    };

    VariantObjects::new(enumerator)
        .map(|item| item.and_then(&mut map))
        .collect()
}
