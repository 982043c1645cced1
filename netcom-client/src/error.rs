use thiserror::Error;

use crate::com::abi::HRESULT;

/// Result type alias for COM interop operations.
pub type ComResult<T> = Result<T, ComError>;

/// Centralized error enum for the COM interop layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComError {
    /// The system refused to activate the requested class.
    #[error("Activation failed: {}", status_text(.status))]
    Activation { status: HRESULT },

    /// `QueryInterface` reported that the object does not implement the interface.
    #[error("Interface not supported: {}", hex(.status))]
    InterfaceNotSupported { status: HRESULT },

    /// A vtable method returned a failure status.
    #[error("{method} failed: {}", status_text(.status))]
    CallFailed {
        method: &'static str,
        status: HRESULT,
    },

    /// An accessor was invoked on an adapter after `dispose`.
    #[error("{object} used after dispose")]
    UseAfterDispose { object: &'static str },

    /// A native value could not be converted to its Rust representation.
    #[error("Data conversion failed: {0}")]
    Conversion(String),

    /// Catch-all for unexpected internal failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ComError {
    /// Returns the native status code carried by transport/activation failures.
    pub const fn status(&self) -> Option<HRESULT> {
        match self {
            Self::Activation { status }
            | Self::InterfaceNotSupported { status }
            | Self::CallFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) const fn call_failed(method: &'static str, status: HRESULT) -> Self {
        Self::CallFailed { method, status }
    }
}

impl From<std::string::FromUtf16Error> for ComError {
    fn from(err: std::string::FromUtf16Error) -> Self {
        Self::Conversion(format!("Invalid UTF-16 string: {err}"))
    }
}

impl From<tokio::task::JoinError> for ComError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Async task join failed: {err}"))
    }
}

#[allow(clippy::cast_sign_loss)]
fn hex(hr: &HRESULT) -> String {
    format!("0x{:08X}", hr.0 as u32)
}

fn status_text(hr: &HRESULT) -> String {
    format!(
        "{} ({})",
        hex(hr),
        friendly_hresult_hint(*hr).unwrap_or("No hint available")
    )
}

/// Helper to format an HRESULT with a friendly hint.
pub fn format_hresult(hr: HRESULT) -> String {
    let hex = hex(&hr);
    match friendly_hresult_hint(hr) {
        Some(hint) => format!("{hex}: {hint}"),
        None => hex,
    }
}

/// Maps known COM and Network List Manager codes to actionable user hints.
#[allow(clippy::cast_sign_loss)]
pub fn friendly_hresult_hint(hr: HRESULT) -> Option<&'static str> {
    match hr.0 as u32 {
        0x8004_0154 => Some("Class is not registered on this machine"),
        0x8000_4002 => Some("Object does not implement the requested interface"),
        0x8004_01F0 => Some("COM is not initialized on this thread"),
        0x8007_0005 => Some("Access denied: the caller lacks permission for this object"),
        0x8000_4003 => Some("Invalid pointer (E_POINTER)"),
        0x8000_4001 => Some("Method is not implemented by this object"),
        0x8002_0003 => Some("Member not found: the object has no default enumerable member"),
        0x8007_0490 => Some("Element not found: no network or connection with that identifier"),
        0x8007_0483 => Some("No application is associated with the specified file"),
        _ => None,
    }
}

/// Maps a [`ComError`] to a friendly hint if it carries a native status.
pub fn friendly_com_hint(error: &ComError) -> Option<&'static str> {
    error.status().and_then(friendly_hresult_hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::abi::{E_NOINTERFACE, REGDB_E_CLASSNOTREG, S_OK};

    #[test]
    fn status_is_exposed_for_native_failures() {
        let err = ComError::call_failed("INetwork::GetName", E_NOINTERFACE);
        assert_eq!(err.status(), Some(E_NOINTERFACE));
        assert_eq!(ComError::UseAfterDispose { object: "NetworkInfo" }.status(), None);
    }

    #[test]
    fn display_includes_hint_for_known_codes() {
        let err = ComError::Activation {
            status: REGDB_E_CLASSNOTREG,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x80040154"), "{msg}");
        assert!(msg.contains("not registered"), "{msg}");
        assert_eq!(
            ComError::InterfaceNotSupported {
                status: E_NOINTERFACE
            }
            .to_string(),
            "Interface not supported: 0x80004002"
        );
    }

    #[test]
    fn unknown_codes_have_no_hint() {
        assert_eq!(friendly_hresult_hint(S_OK), None);
        assert_eq!(format_hresult(HRESULT(0x1234)), "0x00001234");
        assert_eq!(
            friendly_com_hint(&ComError::Activation {
                status: REGDB_E_CLASSNOTREG
            }),
            Some("Class is not registered on this machine")
        );
    }
}
