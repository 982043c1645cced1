use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Lifecycle, NetworkConnectionInfo};
use crate::error::ComResult;
use crate::network::{Connectivity, DomainType, Network, NetworkCategory};

/// A network profile, identified by its network id.
#[derive(Debug)]
pub struct NetworkInfo {
    network: Lifecycle<Network>,
    id: Uuid,
}

impl NetworkInfo {
    /// Takes ownership of `network`, reading its id once for equality.
    ///
    /// # Errors
    /// Returns `Err` if the network id cannot be read; `network` is released.
    pub fn new(network: Network) -> ComResult<Self> {
        let id = network.network_id()?;
        Ok(Self {
            network: Lifecycle::new(network, "NetworkInfo"),
            id,
        })
    }

    /// Current profile name.
    ///
    /// # Errors
    /// Returns [`UseAfterDispose`](crate::ComError::UseAfterDispose) after [`dispose`](Self::dispose),
    /// or the failure of the underlying call.
    pub fn name(&self) -> ComResult<String> {
        self.network.get()?.name()
    }

    /// Renames the profile.
    pub fn set_name(&self, name: &str) -> ComResult<()> {
        self.network.get()?.set_name(name)
    }

    /// Current profile description.
    pub fn description(&self) -> ComResult<String> {
        self.network.get()?.description()
    }

    /// Replaces the profile description.
    ///
    /// # Errors
    /// Requires elevation on most systems; a refusal surfaces as
    /// [`CallFailed`](crate::ComError::CallFailed).
    pub fn set_description(&self, description: &str) -> ComResult<()> {
        self.network.get()?.set_description(description)
    }

    /// Public, private or domain-authenticated.
    pub fn category(&self) -> ComResult<NetworkCategory> {
        self.network.get()?.category()
    }

    pub fn set_category(&self, category: NetworkCategory) -> ComResult<()> {
        self.network.get()?.set_category(category)
    }

    /// Connectivity summed over every connection of this network.
    pub fn connectivity(&self) -> ComResult<Connectivity> {
        self.network.get()?.connectivity()
    }

    pub fn domain_type(&self) -> ComResult<DomainType> {
        self.network.get()?.domain_type()
    }

    /// Whether any connection of this network is up.
    pub fn is_connected(&self) -> ComResult<bool> {
        self.network.get()?.is_connected()
    }

    pub fn is_connected_to_internet(&self) -> ComResult<bool> {
        self.network.get()?.is_connected_to_internet()
    }

    /// The id as reported by a fresh call, unlike the cached identity used
    /// for equality.
    pub fn network_id(&self) -> ComResult<Uuid> {
        self.network.get()?.network_id()
    }

    /// When the profile was created. `None` when never recorded.
    pub fn creation_time(&self) -> ComResult<Option<DateTime<Utc>>> {
        Ok(self.network.get()?.times()?.created)
    }

    /// When the network was last connected. `None` when never connected.
    pub fn connection_time(&self) -> ComResult<Option<DateTime<Utc>>> {
        Ok(self.network.get()?.times()?.connected)
    }

    /// Current connections of this network.
    ///
    /// # Errors
    /// Returns `Err` if enumeration fails part way; no connection is
    /// returned in that case.
    pub fn connections(&self) -> ComResult<Vec<NetworkConnectionInfo>> {
        self.network
            .get()?
            .connections()?
            .into_iter()
            .map(NetworkConnectionInfo::new)
            .collect()
    }

    /// Releases the underlying reference. Calling it again does nothing.
    pub fn dispose(&mut self) {
        self.network.dispose();
    }

    pub const fn is_disposed(&self) -> bool {
        self.network.is_disposed()
    }
}

impl PartialEq for NetworkInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NetworkInfo {}

impl Hash for NetworkInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::com::ComInterface;
    use crate::error::ComError;
    use crate::testing::{ConnectionSpec, NetworkSpec, Tracker, fake_network};

    fn info(tracker: &Tracker, spec: NetworkSpec) -> NetworkInfo {
        NetworkInfo::new(Network::from_item(fake_network(tracker, spec)).unwrap()).unwrap()
    }

    #[test]
    fn independent_acquisitions_are_equal() {
        let tracker = Tracker::new();
        let a = info(&tracker, NetworkSpec::new(7, "Home"));
        let b = info(&tracker, NetworkSpec::new(7, "Home (renamed)"));
        let c = info(&tracker, NetworkSpec::new(8, "Home"));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        drop(set);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn accessors_are_not_cached() {
        let tracker = Tracker::new();
        let n = info(&tracker, NetworkSpec::new(7, "Home"));
        assert_eq!(n.name().unwrap(), "Home");
        n.set_name("Cabin").unwrap();
        assert_eq!(n.name().unwrap(), "Cabin");
        assert_eq!(tracker.calls("Home", 7), 2);
    }

    #[test]
    fn dispose_is_idempotent_and_releases_once() {
        let tracker = Tracker::new();
        let mut n = info(&tracker, NetworkSpec::new(7, "Home"));
        n.dispose();
        assert_eq!(tracker.live(), 0);
        let releases = tracker.releases("Home");
        n.dispose();
        assert_eq!(tracker.releases("Home"), releases);
        assert!(n.is_disposed());
    }

    #[test]
    fn every_accessor_fails_after_dispose() {
        let tracker = Tracker::new();
        let mut n = info(&tracker, NetworkSpec::new(7, "Home"));
        n.dispose();

        let disposed = |r: ComResult<()>| {
            assert!(matches!(
                r,
                Err(ComError::UseAfterDispose { object: "NetworkInfo" })
            ));
        };
        disposed(n.name().map(drop));
        disposed(n.set_name("x"));
        disposed(n.description().map(drop));
        disposed(n.set_description("x"));
        disposed(n.category().map(drop));
        disposed(n.set_category(NetworkCategory::Public));
        disposed(n.connectivity().map(drop));
        disposed(n.domain_type().map(drop));
        disposed(n.is_connected().map(drop));
        disposed(n.is_connected_to_internet().map(drop));
        disposed(n.network_id().map(drop));
        disposed(n.creation_time().map(drop));
        disposed(n.connection_time().map(drop));
        disposed(n.connections().map(drop));
    }

    #[test]
    fn children_outlive_their_parent() {
        let tracker = Tracker::new();
        let spec = NetworkSpec::new(7, "Home")
            .connected(true)
            .with_connection(ConnectionSpec::new("wifi", 0x11, 0xA1));
        let mut n = info(&tracker, spec);
        let connections = n.connections().unwrap();
        n.dispose();
        assert_eq!(connections[0].connection_id().unwrap(), Uuid::from_u128(0x11));
        assert_eq!(connections[0].network().unwrap(), n);
        drop(connections);
        assert_eq!(tracker.live(), 0);
    }
}
