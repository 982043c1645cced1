use uuid::Uuid;

use super::types::{Connectivity, DomainType};
use super::{IID_INETWORK_CONNECTION, Network};
use crate::com::abi::{GUID, guid_to_uuid};
use crate::com::{ComInterface, ComObject};
use crate::error::ComResult;

mod slot {
    use crate::com::abi::slot::DISPATCH_BASE;

    pub const GET_NETWORK: usize = DISPATCH_BASE;
    pub const IS_CONNECTED_TO_INTERNET: usize = DISPATCH_BASE + 1;
    pub const IS_CONNECTED: usize = DISPATCH_BASE + 2;
    pub const GET_CONNECTIVITY: usize = DISPATCH_BASE + 3;
    pub const GET_CONNECTION_ID: usize = DISPATCH_BASE + 4;
    pub const GET_ADAPTER_ID: usize = DISPATCH_BASE + 5;
    pub const GET_DOMAIN_TYPE: usize = DISPATCH_BASE + 6;
}

/// `INetworkConnection`: one adapter's attachment to a network.
#[derive(Debug)]
pub struct NetworkConnection {
    inner: ComObject,
}

impl ComInterface for NetworkConnection {
    const IID: GUID = IID_INETWORK_CONNECTION;
    const NAME: &'static str = "INetworkConnection";

    unsafe fn from_object(object: ComObject) -> Self {
        Self { inner: object }
    }

    fn as_object(&self) -> &ComObject {
        &self.inner
    }
}

impl NetworkConnection {
    /// The network this connection belongs to, as an independent reference.
    pub fn network(&self) -> ComResult<Network> {
        // SAFETY: slot 7 is `GetNetwork(INetwork**)`.
        let object = unsafe {
            self.inner
                .get_object(slot::GET_NETWORK, "INetworkConnection::GetNetwork")?
        };
        // SAFETY: the out-parameter is documented as `INetwork`.
        Ok(unsafe { Network::from_object(object) })
    }

    pub fn is_connected_to_internet(&self) -> ComResult<bool> {
        // SAFETY: slot 8 is `get_IsConnectedToInternet(VARIANT_BOOL*)`.
        unsafe {
            self.inner.get_bool(
                slot::IS_CONNECTED_TO_INTERNET,
                "INetworkConnection::get_IsConnectedToInternet",
            )
        }
    }

    pub fn is_connected(&self) -> ComResult<bool> {
        // SAFETY: slot 9 is `get_IsConnected(VARIANT_BOOL*)`.
        unsafe {
            self.inner
                .get_bool(slot::IS_CONNECTED, "INetworkConnection::get_IsConnected")
        }
    }

    pub fn connectivity(&self) -> ComResult<Connectivity> {
        // SAFETY: slot 10 is `GetConnectivity(NLM_CONNECTIVITY*)`.
        let value: i32 = unsafe {
            self.inner
                .get(slot::GET_CONNECTIVITY, "INetworkConnection::GetConnectivity")?
        };
        Ok(Connectivity::from_native(value))
    }

    /// Stable id of this connection.
    pub fn connection_id(&self) -> ComResult<Uuid> {
        // SAFETY: slot 11 is `GetConnectionId(GUID*)`.
        let id: GUID = unsafe {
            self.inner
                .get(slot::GET_CONNECTION_ID, "INetworkConnection::GetConnectionId")?
        };
        Ok(guid_to_uuid(id))
    }

    /// Id of the network adapter carrying the connection.
    pub fn adapter_id(&self) -> ComResult<Uuid> {
        // SAFETY: slot 12 is `GetAdapterId(GUID*)`.
        let id: GUID = unsafe {
            self.inner
                .get(slot::GET_ADAPTER_ID, "INetworkConnection::GetAdapterId")?
        };
        Ok(guid_to_uuid(id))
    }

    pub fn domain_type(&self) -> ComResult<DomainType> {
        // SAFETY: slot 13 is `GetDomainType(NLM_DOMAIN_TYPE*)`.
        let value: i32 = unsafe {
            self.inner
                .get(slot::GET_DOMAIN_TYPE, "INetworkConnection::GetDomainType")?
        };
        Ok(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::abi::E_POINTER;
    use crate::error::ComError;
    use crate::testing::{ConnectionSpec, Tracker, fake_connection};

    #[test]
    fn identifiers_and_state() {
        let tracker = Tracker::new();
        let mut spec = ConnectionSpec::new("wifi", 0x11, 0xA1);
        spec.domain_type = 1;
        spec.internet = false;
        spec.connectivity = 0x20;
        let c = NetworkConnection::from_item(fake_connection(&tracker, spec)).unwrap();

        assert_eq!(c.connection_id().unwrap(), Uuid::from_u128(0x11));
        assert_eq!(c.adapter_id().unwrap(), Uuid::from_u128(0xA1));
        assert_eq!(c.domain_type().unwrap(), DomainType::Domain);
        assert!(c.is_connected().unwrap());
        assert!(!c.is_connected_to_internet().unwrap());
        assert_eq!(c.connectivity().unwrap(), Connectivity::IPV4_LOCAL_NETWORK);
        drop(c);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn missing_network_is_a_call_failure() {
        let tracker = Tracker::new();
        let spec = ConnectionSpec::new("orphan", 0x11, 0xA1);
        let c = NetworkConnection::from_item(fake_connection(&tracker, spec)).unwrap();
        let err = c.network().unwrap_err();
        assert_eq!(err.status(), Some(E_POINTER));
        assert!(matches!(err, ComError::CallFailed { .. }));
    }
}
