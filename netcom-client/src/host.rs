//! Machine-level convenience entry points.
//!
//! Each function activates a fresh Network List Manager (or association
//! query object), uses it, and releases it before returning. Results that
//! hold references (adapters) own their own references.

use uuid::Uuid;

use crate::adapter::{FileAssociation, NetworkConnectionInfo, NetworkInfo};
use crate::com::ClassContext;
use crate::error::ComResult;
use crate::network::{Connectivity, NetworkFilter, NetworkListManager};

fn manager() -> ComResult<NetworkListManager> {
    NetworkListManager::activate(ClassContext::default())
}

pub fn enumerate_networks(filter: NetworkFilter) -> ComResult<Vec<NetworkInfo>> {
    manager()?
        .networks(filter)?
        .into_iter()
        .map(NetworkInfo::new)
        .collect()
}

pub fn get_network(id: Uuid) -> ComResult<NetworkInfo> {
    NetworkInfo::new(manager()?.network(id)?)
}

pub fn enumerate_network_connections() -> ComResult<Vec<NetworkConnectionInfo>> {
    manager()?
        .connections()?
        .into_iter()
        .map(NetworkConnectionInfo::new)
        .collect()
}

pub fn get_network_connection(id: Uuid) -> ComResult<NetworkConnectionInfo> {
    NetworkConnectionInfo::new(manager()?.connection(id)?)
}

pub fn is_connected() -> ComResult<bool> {
    manager()?.is_connected()
}

pub fn is_connected_to_internet() -> ComResult<bool> {
    manager()?.is_connected_to_internet()
}

pub fn connectivity() -> ComResult<Connectivity> {
    manager()?.connectivity()
}

pub fn file_association(association: &str) -> ComResult<FileAssociation> {
    FileAssociation::open(association, ClassContext::default())
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use crate::com::abi::REGDB_E_CLASSNOTREG;
    use crate::error::ComError;

    fn unregistered<T: std::fmt::Debug>(result: ComResult<T>) {
        assert!(matches!(
            result,
            Err(ComError::Activation { status }) if status == REGDB_E_CLASSNOTREG
        ));
    }

    #[test]
    fn every_entry_point_reports_activation_failure() {
        unregistered(enumerate_networks(NetworkFilter::All));
        unregistered(get_network(Uuid::nil()));
        unregistered(enumerate_network_connections());
        unregistered(get_network_connection(Uuid::nil()));
        unregistered(is_connected());
        unregistered(is_connected_to_internet());
        unregistered(connectivity());
        unregistered(file_association(".txt"));
    }
}
