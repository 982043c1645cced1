//! # netcom-client
//!
//! Hand-rolled COM interop for the Windows Network List Manager and shell
//! association queries: direct vtable calls, leak-safe `IEnumVARIANT`
//! enumeration, typed wrappers and disposable adapters, plus an async
//! provider that runs all COM work on a dedicated thread.
//!
//! ## Features
//! - `test-support`: Enables `MockNetworkProvider` via `mockall` and the
//!   in-process fake COM objects in [`testing`]

pub mod adapter;
mod backend;
pub mod com;
mod com_guard;
pub mod com_worker;
mod error;
pub mod host;
pub mod network;
mod provider;
pub mod shell;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Stable public API
pub use adapter::{FileAssociation, NetworkConnectionInfo, NetworkInfo};
pub use backend::ComNetworkProvider;
pub use com::{ClassContext, ComInterface, ComObject, GUID, HRESULT};
pub use com_guard::ComGuard;
pub use com_worker::{ComSource, SystemSource, WorkerConfig};
pub use error::{ComError, ComResult, format_hresult, friendly_com_hint, friendly_hresult_hint};
pub use provider::{ConnectionSummary, HostStatus, NetworkProvider, NetworkSummary};

// Test support re-export
#[cfg(feature = "test-support")]
pub use provider::MockNetworkProvider;
