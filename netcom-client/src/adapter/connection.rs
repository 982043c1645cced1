use std::hash::{Hash, Hasher};

use uuid::Uuid;

use super::{Lifecycle, NetworkInfo};
use crate::error::ComResult;
use crate::network::{Connectivity, DomainType, NetworkConnection};

/// One connection, identified by its connection id.
#[derive(Debug)]
pub struct NetworkConnectionInfo {
    connection: Lifecycle<NetworkConnection>,
    id: Uuid,
}

impl NetworkConnectionInfo {
    /// Takes ownership of `connection`, reading its id once for equality.
    ///
    /// # Errors
    /// Returns `Err` if the connection id cannot be read.
    pub fn new(connection: NetworkConnection) -> ComResult<Self> {
        let id = connection.connection_id()?;
        Ok(Self {
            connection: Lifecycle::new(connection, "NetworkConnectionInfo"),
            id,
        })
    }

    /// The owning network, as an adapter with its own reference.
    pub fn network(&self) -> ComResult<NetworkInfo> {
        NetworkInfo::new(self.connection.get()?.network()?)
    }

    /// Fresh read of the connection id.
    ///
    /// # Errors
    /// Returns [`UseAfterDispose`](crate::ComError::UseAfterDispose) after
    /// [`dispose`](Self::dispose), or the failure of the underlying call.
    pub fn connection_id(&self) -> ComResult<Uuid> {
        self.connection.get()?.connection_id()
    }

    /// The network adapter carrying this connection.
    pub fn adapter_id(&self) -> ComResult<Uuid> {
        self.connection.get()?.adapter_id()
    }

    pub fn connectivity(&self) -> ComResult<Connectivity> {
        self.connection.get()?.connectivity()
    }

    pub fn domain_type(&self) -> ComResult<DomainType> {
        self.connection.get()?.domain_type()
    }

    pub fn is_connected(&self) -> ComResult<bool> {
        self.connection.get()?.is_connected()
    }

    /// Whether this connection reaches the internet over IPv4 or IPv6.
    pub fn is_connected_to_internet(&self) -> ComResult<bool> {
        self.connection.get()?.is_connected_to_internet()
    }

    /// Releases the underlying reference. Adapters already obtained through
    /// [`network`](Self::network) stay usable.
    pub fn dispose(&mut self) {
        self.connection.dispose();
    }

    pub const fn is_disposed(&self) -> bool {
        self.connection.is_disposed()
    }
}

impl PartialEq for NetworkConnectionInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NetworkConnectionInfo {}

impl Hash for NetworkConnectionInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::ComInterface;
    use crate::error::ComError;
    use crate::testing::{ConnectionSpec, Tracker, fake_connection};

    fn info(tracker: &Tracker, spec: ConnectionSpec) -> NetworkConnectionInfo {
        let connection = NetworkConnection::from_item(fake_connection(tracker, spec)).unwrap();
        NetworkConnectionInfo::new(connection).unwrap()
    }

    #[test]
    fn equality_follows_connection_id() {
        let tracker = Tracker::new();
        let a = info(&tracker, ConnectionSpec::new("a", 1, 0xA1));
        let b = info(&tracker, ConnectionSpec::new("b", 1, 0xA2));
        assert_eq!(a, b);
        assert_eq!(a.adapter_id().unwrap(), Uuid::from_u128(0xA1));
    }

    #[test]
    fn disposed_connection_rejects_accessors() {
        let tracker = Tracker::new();
        let mut c = info(&tracker, ConnectionSpec::new("a", 1, 0xA1));
        c.dispose();
        c.dispose();
        assert_eq!(tracker.releases("a"), tracker.created("a") + tracker.add_refs("a"));
        assert!(matches!(
            c.network(),
            Err(ComError::UseAfterDispose { object: "NetworkConnectionInfo" })
        ));
        assert!(c.connection_id().is_err());
        assert!(c.adapter_id().is_err());
        assert!(c.connectivity().is_err());
        assert!(c.domain_type().is_err());
        assert!(c.is_connected().is_err());
        assert!(c.is_connected_to_internet().is_err());
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn failed_identity_read_releases_the_wrapper() {
        let tracker = Tracker::new();
        let mut spec = ConnectionSpec::new("a", 1, 0xA1);
        spec.failures.push((11, crate::com::abi::E_FAIL));
        let connection = NetworkConnection::from_item(fake_connection(&tracker, spec)).unwrap();
        assert!(NetworkConnectionInfo::new(connection).is_err());
        assert_eq!(tracker.live(), 0);
    }
}
