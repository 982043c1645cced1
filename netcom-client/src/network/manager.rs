use std::ffi::c_void;

use uuid::Uuid;

use super::types::{Connectivity, NetworkFilter};
use super::{CLSID_NETWORK_LIST_MANAGER, IID_INETWORK_LIST_MANAGER, Network, NetworkConnection};
use crate::com::abi::{GUID, HRESULT, uuid_to_guid};
use crate::com::{ClassContext, ComInterface, ComObject, activate, enumerate, out_object};
use crate::error::ComResult;

mod slot {
    use crate::com::abi::slot::DISPATCH_BASE;

    pub const GET_NETWORKS: usize = DISPATCH_BASE;
    pub const GET_NETWORK: usize = DISPATCH_BASE + 1;
    pub const GET_NETWORK_CONNECTIONS: usize = DISPATCH_BASE + 2;
    pub const GET_NETWORK_CONNECTION: usize = DISPATCH_BASE + 3;
    pub const IS_CONNECTED_TO_INTERNET: usize = DISPATCH_BASE + 4;
    pub const IS_CONNECTED: usize = DISPATCH_BASE + 5;
    pub const GET_CONNECTIVITY: usize = DISPATCH_BASE + 6;
}

type GetNetworksFn =
    unsafe extern "system" fn(this: *mut c_void, flags: i32, out: *mut *mut c_void) -> HRESULT;
type GetByIdFn =
    unsafe extern "system" fn(this: *mut c_void, id: GUID, out: *mut *mut c_void) -> HRESULT;

/// `INetworkListManager`: the machine-wide entry point.
#[derive(Debug)]
pub struct NetworkListManager {
    inner: ComObject,
}

impl ComInterface for NetworkListManager {
    const IID: GUID = IID_INETWORK_LIST_MANAGER;
    const NAME: &'static str = "INetworkListManager";

    unsafe fn from_object(object: ComObject) -> Self {
        Self { inner: object }
    }

    fn as_object(&self) -> &ComObject {
        &self.inner
    }
}

impl NetworkListManager {
    /// Activates the system Network List Manager.
    pub fn activate(context: ClassContext) -> ComResult<Self> {
        let object = activate(&CLSID_NETWORK_LIST_MANAGER, &Self::IID, context)?;
        // SAFETY: activation was requested for `Self::IID`.
        Ok(unsafe { Self::from_object(object) })
    }

    /// Networks known to the machine, filtered by connection state.
    pub fn networks(&self, filter: NetworkFilter) -> ComResult<Vec<Network>> {
        let mut raw = std::ptr::null_mut();
        // SAFETY: slot 7 is `GetNetworks(NLM_ENUM_NETWORK, IEnumNetworks**)`.
        let collection = unsafe {
            let f: GetNetworksFn = self.inner.method(slot::GET_NETWORKS);
            let hr = f(self.inner.as_raw(), filter.to_native(), &mut raw);
            out_object(hr, raw, "INetworkListManager::GetNetworks")?
        };
        enumerate(&collection, Network::from_item)
    }

    /// Looks up one network by id.
    ///
    /// # Errors
    /// An unknown id fails with `CallFailed` carrying `0x80070490`
    /// (element not found).
    pub fn network(&self, id: Uuid) -> ComResult<Network> {
        // SAFETY: slot 8 is `GetNetwork(GUID, INetwork**)`.
        let object = unsafe { self.get_by_id(slot::GET_NETWORK, id, "INetworkListManager::GetNetwork")? };
        // SAFETY: the out-parameter is documented as `INetwork`.
        Ok(unsafe { Network::from_object(object) })
    }

    /// Every active connection on the machine.
    pub fn connections(&self) -> ComResult<Vec<NetworkConnection>> {
        // SAFETY: slot 9 is `GetNetworkConnections(IEnumNetworkConnections**)`.
        let collection = unsafe {
            self.inner.get_object(
                slot::GET_NETWORK_CONNECTIONS,
                "INetworkListManager::GetNetworkConnections",
            )?
        };
        enumerate(&collection, NetworkConnection::from_item)
    }

    /// Looks up one active connection by id.
    pub fn connection(&self, id: Uuid) -> ComResult<NetworkConnection> {
        // SAFETY: slot 10 is `GetNetworkConnection(GUID, INetworkConnection**)`.
        let object = unsafe {
            self.get_by_id(
                slot::GET_NETWORK_CONNECTION,
                id,
                "INetworkListManager::GetNetworkConnection",
            )?
        };
        // SAFETY: the out-parameter is documented as `INetworkConnection`.
        Ok(unsafe { NetworkConnection::from_object(object) })
    }

    pub fn is_connected_to_internet(&self) -> ComResult<bool> {
        // SAFETY: slot 11 is `get_IsConnectedToInternet(VARIANT_BOOL*)`.
        unsafe {
            self.inner.get_bool(
                slot::IS_CONNECTED_TO_INTERNET,
                "INetworkListManager::get_IsConnectedToInternet",
            )
        }
    }

    pub fn is_connected(&self) -> ComResult<bool> {
        // SAFETY: slot 12 is `get_IsConnected(VARIANT_BOOL*)`.
        unsafe {
            self.inner
                .get_bool(slot::IS_CONNECTED, "INetworkListManager::get_IsConnected")
        }
    }

    /// Machine-wide connectivity, the union over every network.
    pub fn connectivity(&self) -> ComResult<Connectivity> {
        // SAFETY: slot 13 is `GetConnectivity(NLM_CONNECTIVITY*)`.
        let value: i32 = unsafe {
            self.inner
                .get(slot::GET_CONNECTIVITY, "INetworkListManager::GetConnectivity")?
        };
        Ok(Connectivity::from_native(value))
    }

    /// # Safety
    /// Slot `index` must have the signature `(this, GUID, IUnknown**)`.
    unsafe fn get_by_id(&self, index: usize, id: Uuid, method: &'static str) -> ComResult<ComObject> {
        let mut raw = std::ptr::null_mut();
        // SAFETY: signature guaranteed by the caller.
        unsafe {
            let f: GetByIdFn = self.inner.method(index);
            let hr = f(self.inner.as_raw(), uuid_to_guid(id), &mut raw);
            out_object(hr, raw, method)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComError;
    use crate::testing::{
        ConnectionSpec, E_ELEMENT_NOT_FOUND, ManagerSpec, NetworkSpec, Tracker, fake_manager,
    };

    fn spec(direct: bool) -> ManagerSpec {
        ManagerSpec {
            networks: vec![
                NetworkSpec::new(1, "Home")
                    .connected(true)
                    .with_connection(ConnectionSpec::new("home-wifi", 0x11, 0xA1)),
                NetworkSpec::new(2, "Office"),
                NetworkSpec::new(3, "Lab")
                    .connected(false)
                    .with_connection(ConnectionSpec::new("lab-eth", 0x31, 0xA2))
                    .with_connection(ConnectionSpec::new("lab-wifi", 0x32, 0xA3)),
            ],
            connected: true,
            internet: true,
            connectivity: 0x40,
            direct_collections: direct,
        }
    }

    fn manager(tracker: &Tracker, direct: bool) -> NetworkListManager {
        let object = fake_manager(tracker, spec(direct));
        NetworkListManager::cast_from(&object).unwrap()
    }

    fn names(networks: &[Network]) -> Vec<String> {
        networks.iter().map(|n| n.name().unwrap()).collect()
    }

    #[test]
    fn networks_are_filtered_by_state() {
        for direct in [true, false] {
            let tracker = Tracker::new();
            let manager = manager(&tracker, direct);
            assert_eq!(names(&manager.networks(NetworkFilter::Connected).unwrap()), ["Home", "Lab"]);
            assert_eq!(names(&manager.networks(NetworkFilter::Disconnected).unwrap()), ["Office"]);
            assert_eq!(manager.networks(NetworkFilter::All).unwrap().len(), 3);
            drop(manager);
            assert_eq!(tracker.live(), 0);
        }
    }

    #[test]
    fn collection_is_released_after_enumeration() {
        let tracker = Tracker::new();
        let manager = manager(&tracker, true);
        let networks = manager.networks(NetworkFilter::All).unwrap();
        assert_eq!(tracker.releases("networks"), 1);
        assert_eq!(tracker.destroyed("networks"), 1);
        assert_eq!(tracker.destroyed("networks.enum"), 1);
        drop(networks);
        drop(manager);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn connections_span_every_network() {
        let tracker = Tracker::new();
        let manager = manager(&tracker, false);
        let ids: Vec<Uuid> = manager
            .connections()
            .unwrap()
            .iter()
            .map(|c| c.connection_id().unwrap())
            .collect();
        assert_eq!(ids, [0x11, 0x31, 0x32].map(Uuid::from_u128));
        drop(manager);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn lookup_by_id() {
        let tracker = Tracker::new();
        let manager = manager(&tracker, true);
        assert_eq!(manager.network(Uuid::from_u128(2)).unwrap().name().unwrap(), "Office");
        let connection = manager.connection(Uuid::from_u128(0x32)).unwrap();
        assert_eq!(connection.adapter_id().unwrap(), Uuid::from_u128(0xA3));

        let err = manager.network(Uuid::from_u128(99)).unwrap_err();
        assert!(matches!(
            err,
            ComError::CallFailed { method: "INetworkListManager::GetNetwork", status }
                if status == E_ELEMENT_NOT_FOUND
        ));
        drop(connection);
        drop(manager);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn host_state() {
        let tracker = Tracker::new();
        let manager = manager(&tracker, true);
        assert!(manager.is_connected().unwrap());
        assert!(manager.is_connected_to_internet().unwrap());
        assert_eq!(manager.connectivity().unwrap(), Connectivity::IPV4_INTERNET);
    }

    #[cfg(not(windows))]
    #[test]
    fn activation_fails_without_a_registry() {
        let err = NetworkListManager::activate(ClassContext::All).unwrap_err();
        assert!(matches!(err, ComError::Activation { .. }));
    }
}
