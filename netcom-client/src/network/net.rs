use std::ffi::c_void;

use uuid::Uuid;

use super::types::{Connectivity, DomainType, NetworkCategory, NetworkTimes, filetime_to_utc};
use super::{IID_INETWORK, NetworkConnection};
use crate::com::abi::{GUID, HRESULT, guid_to_uuid};
use crate::com::{ComInterface, ComObject, check, enumerate};
use crate::error::ComResult;

mod slot {
    use crate::com::abi::slot::DISPATCH_BASE;

    pub const GET_NAME: usize = DISPATCH_BASE;
    pub const SET_NAME: usize = DISPATCH_BASE + 1;
    pub const GET_DESCRIPTION: usize = DISPATCH_BASE + 2;
    pub const SET_DESCRIPTION: usize = DISPATCH_BASE + 3;
    pub const GET_NETWORK_ID: usize = DISPATCH_BASE + 4;
    pub const GET_DOMAIN_TYPE: usize = DISPATCH_BASE + 5;
    pub const GET_NETWORK_CONNECTIONS: usize = DISPATCH_BASE + 6;
    pub const GET_TIME_CREATED_AND_CONNECTED: usize = DISPATCH_BASE + 7;
    pub const IS_CONNECTED_TO_INTERNET: usize = DISPATCH_BASE + 8;
    pub const IS_CONNECTED: usize = DISPATCH_BASE + 9;
    pub const GET_CONNECTIVITY: usize = DISPATCH_BASE + 10;
    pub const GET_CATEGORY: usize = DISPATCH_BASE + 11;
    pub const SET_CATEGORY: usize = DISPATCH_BASE + 12;
}

type GetTimesFn = unsafe extern "system" fn(
    this: *mut c_void,
    created_low: *mut u32,
    created_high: *mut u32,
    connected_low: *mut u32,
    connected_high: *mut u32,
) -> HRESULT;

/// `INetwork`: one network profile.
#[derive(Debug)]
pub struct Network {
    inner: ComObject,
}

impl ComInterface for Network {
    const IID: GUID = IID_INETWORK;
    const NAME: &'static str = "INetwork";

    unsafe fn from_object(object: ComObject) -> Self {
        Self { inner: object }
    }

    fn as_object(&self) -> &ComObject {
        &self.inner
    }
}

impl Network {
    /// Profile name as shown in the shell.
    pub fn name(&self) -> ComResult<String> {
        // SAFETY: slot 7 is `GetName(BSTR*)`.
        unsafe { self.inner.get_string(slot::GET_NAME, "INetwork::GetName") }
    }

    /// Renames the profile. Requires elevation on a real system.
    pub fn set_name(&self, name: &str) -> ComResult<()> {
        // SAFETY: slot 8 is `SetName(BSTR)`.
        unsafe { self.inner.put_string(slot::SET_NAME, "INetwork::SetName", name) }
    }

    pub fn description(&self) -> ComResult<String> {
        // SAFETY: slot 9 is `GetDescription(BSTR*)`.
        unsafe {
            self.inner
                .get_string(slot::GET_DESCRIPTION, "INetwork::GetDescription")
        }
    }

    pub fn set_description(&self, description: &str) -> ComResult<()> {
        // SAFETY: slot 10 is `SetDescription(BSTR)`.
        unsafe {
            self.inner
                .put_string(slot::SET_DESCRIPTION, "INetwork::SetDescription", description)
        }
    }

    pub fn network_id(&self) -> ComResult<Uuid> {
        // SAFETY: slot 11 is `GetNetworkId(GUID*)`.
        let id: GUID = unsafe { self.inner.get(slot::GET_NETWORK_ID, "INetwork::GetNetworkId")? };
        Ok(guid_to_uuid(id))
    }

    pub fn domain_type(&self) -> ComResult<DomainType> {
        // SAFETY: slot 12 is `GetDomainType(NLM_DOMAIN_TYPE*)`.
        let value: i32 = unsafe { self.inner.get(slot::GET_DOMAIN_TYPE, "INetwork::GetDomainType")? };
        Ok(value.into())
    }

    /// Connections currently attached to this network.
    pub fn connections(&self) -> ComResult<Vec<NetworkConnection>> {
        // SAFETY: slot 13 is `GetNetworkConnections(IEnumNetworkConnections**)`.
        let collection = unsafe {
            self.inner
                .get_object(slot::GET_NETWORK_CONNECTIONS, "INetwork::GetNetworkConnections")?
        };
        enumerate(&collection, NetworkConnection::from_item)
    }

    /// Creation and last-connection timestamps, converted from FILETIME.
    /// A zero FILETIME reads as `None`.
    pub fn times(&self) -> ComResult<NetworkTimes> {
        let (mut created_low, mut created_high) = (0u32, 0u32);
        let (mut connected_low, mut connected_high) = (0u32, 0u32);
        // SAFETY: slot 14 is `GetTimeCreatedAndConnected` with four `DWORD*`
        // outputs; all four locals outlive the call.
        let hr = unsafe {
            let f: GetTimesFn = self.inner.method(slot::GET_TIME_CREATED_AND_CONNECTED);
            f(
                self.inner.as_raw(),
                &mut created_low,
                &mut created_high,
                &mut connected_low,
                &mut connected_high,
            )
        };
        check(hr, "INetwork::GetTimeCreatedAndConnected")?;
        Ok(NetworkTimes {
            created: filetime_to_utc(created_low, created_high),
            connected: filetime_to_utc(connected_low, connected_high),
        })
    }

    pub fn is_connected_to_internet(&self) -> ComResult<bool> {
        // SAFETY: slot 15 is `get_IsConnectedToInternet(VARIANT_BOOL*)`.
        unsafe {
            self.inner.get_bool(
                slot::IS_CONNECTED_TO_INTERNET,
                "INetwork::get_IsConnectedToInternet",
            )
        }
    }

    pub fn is_connected(&self) -> ComResult<bool> {
        // SAFETY: slot 16 is `get_IsConnected(VARIANT_BOOL*)`.
        unsafe { self.inner.get_bool(slot::IS_CONNECTED, "INetwork::get_IsConnected") }
    }

    pub fn connectivity(&self) -> ComResult<Connectivity> {
        // SAFETY: slot 17 is `GetConnectivity(NLM_CONNECTIVITY*)`.
        let value: i32 = unsafe {
            self.inner
                .get(slot::GET_CONNECTIVITY, "INetwork::GetConnectivity")?
        };
        Ok(Connectivity::from_native(value))
    }

    pub fn category(&self) -> ComResult<NetworkCategory> {
        // SAFETY: slot 18 is `GetCategory(NLM_NETWORK_CATEGORY*)`.
        let value: i32 = unsafe { self.inner.get(slot::GET_CATEGORY, "INetwork::GetCategory")? };
        Ok(value.into())
    }

    /// Requires elevation on a real system.
    pub fn set_category(&self, category: NetworkCategory) -> ComResult<()> {
        // SAFETY: slot 19 is `SetCategory(NLM_NETWORK_CATEGORY)`.
        unsafe {
            self.inner
                .put(slot::SET_CATEGORY, "INetwork::SetCategory", category.to_native())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::abi::E_FAIL;
    use crate::error::ComError;
    use crate::testing::{ConnectionSpec, NetworkSpec, Tracker, fake_network};

    fn network(tracker: &Tracker, spec: NetworkSpec) -> Network {
        Network::from_item(fake_network(tracker, spec)).unwrap()
    }

    #[test]
    fn scalar_accessors() {
        let tracker = Tracker::new();
        let mut spec = NetworkSpec::new(0xABCD, "Home").connected(true);
        spec.category = 1;
        spec.domain_type = 2;
        let n = network(&tracker, spec);

        assert_eq!(n.name().unwrap(), "Home");
        assert_eq!(n.description().unwrap(), "Home description");
        assert_eq!(n.network_id().unwrap(), Uuid::from_u128(0xABCD));
        assert_eq!(n.category().unwrap(), NetworkCategory::Private);
        assert_eq!(n.domain_type().unwrap(), DomainType::DomainAuthenticated);
        assert!(n.is_connected().unwrap());
        assert!(n.is_connected_to_internet().unwrap());
        assert!(n.connectivity().unwrap().has_internet());
        drop(n);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn setters_reach_the_object() {
        let tracker = Tracker::new();
        let n = network(&tracker, NetworkSpec::new(1, "Home"));
        n.set_name("Café ☕").unwrap();
        n.set_description("").unwrap();
        n.set_category(NetworkCategory::Private).unwrap();
        assert_eq!(n.name().unwrap(), "Café ☕");
        assert_eq!(n.description().unwrap(), "");
        assert_eq!(n.category().unwrap(), NetworkCategory::Private);
    }

    #[test]
    fn every_read_is_a_fresh_call() {
        let tracker = Tracker::new();
        let n = network(&tracker, NetworkSpec::new(1, "Home"));
        n.name().unwrap();
        n.name().unwrap();
        assert_eq!(tracker.calls("Home", 7), 2);
    }

    #[test]
    fn times_are_converted() {
        let tracker = Tracker::new();
        let mut spec = NetworkSpec::new(1, "Home");
        spec.created = (1_704_067_200 + 11_644_473_600) * 10_000_000;
        let times = network(&tracker, spec).times().unwrap();
        assert_eq!(
            times.created.unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
        assert_eq!(times.connected, None);
    }

    #[test]
    fn failure_carries_method_and_status() {
        let tracker = Tracker::new();
        let mut spec = NetworkSpec::new(1, "Home");
        spec.failures.push((18, E_FAIL));
        let n = network(&tracker, spec);
        let err = n.category().unwrap_err();
        assert!(matches!(
            err,
            ComError::CallFailed { method: "INetwork::GetCategory", status } if status == E_FAIL
        ));
        assert_eq!(n.name().unwrap(), "Home");
    }

    #[test]
    fn connections_of_a_network() {
        let tracker = Tracker::new();
        let spec = NetworkSpec::new(1, "Home")
            .with_connection(ConnectionSpec::new("wifi", 0x11, 0xA1))
            .with_connection(ConnectionSpec::new("eth", 0x12, 0xA2));
        let n = network(&tracker, spec);
        let connections = n.connections().unwrap();
        assert_eq!(connections.len(), 2);
        assert_eq!(tracker.destroyed("Home.connections"), 1);

        // The child's parent link is an independent reference.
        let parent = connections[0].network().unwrap();
        drop(n);
        drop(connections);
        assert_eq!(parent.name().unwrap(), "Home");
        drop(parent);
        assert_eq!(tracker.live(), 0);
    }
}
