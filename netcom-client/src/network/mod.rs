//! Typed wrappers for the Network List Manager (`netlistmgr.h`).
//!
//! All three interfaces are dual, so their own methods start at slot 7.

mod connection;
mod manager;
mod net;
mod types;

pub use connection::NetworkConnection;
pub use manager::NetworkListManager;
pub use net::Network;
pub use types::{
    Connectivity, DomainType, NetworkCategory, NetworkFilter, NetworkTimes, filetime_to_utc,
};

use crate::com::GUID;

pub const CLSID_NETWORK_LIST_MANAGER: GUID =
    GUID::from_u128(0xDCB00C01_570F_4A9B_8D69_199FDBA5723B);
pub const IID_INETWORK_LIST_MANAGER: GUID =
    GUID::from_u128(0xDCB00000_570F_4A9B_8D69_199FDBA5723B);
pub const IID_INETWORK: GUID = GUID::from_u128(0xDCB00002_570F_4A9B_8D69_199FDBA5723B);
pub const IID_INETWORK_CONNECTION: GUID =
    GUID::from_u128(0xDCB00005_570F_4A9B_8D69_199FDBA5723B);
