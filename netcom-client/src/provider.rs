use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg(feature = "test-support")]
use mockall::automock;

use crate::network::{Connectivity, DomainType, NetworkCategory, NetworkFilter};
use crate::shell::AssociationString;

/// Point-in-time view of one network.
///
/// Returned by [`NetworkProvider::list_networks`]. Plain data: holds no COM
/// references and can cross threads freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSummary {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: NetworkCategory,
    pub domain_type: DomainType,
    pub connectivity: Connectivity,
    pub is_connected: bool,
    pub is_connected_to_internet: bool,
    pub created: Option<DateTime<Utc>>,
    pub connected: Option<DateTime<Utc>>,
    /// Number of active connections attached to the network.
    pub connection_count: usize,
}

/// Point-in-time view of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub id: Uuid,
    pub adapter_id: Uuid,
    pub network_id: Uuid,
    pub network_name: String,
    pub connectivity: Connectivity,
    pub domain_type: DomainType,
    pub is_connected: bool,
    pub is_connected_to_internet: bool,
}

/// Machine-wide connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStatus {
    pub is_connected: bool,
    pub is_connected_to_internet: bool,
    pub connectivity: Connectivity,
}

/// Async trait for network and association queries.
///
/// This is the stable public API. Implementations own the COM objects and
/// hand back snapshots.
#[cfg_attr(feature = "test-support", automock)]
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    /// List networks known to the machine.
    ///
    /// # Errors
    /// Returns `Err` if the Network List Manager cannot be activated or a
    /// property read fails.
    async fn list_networks(&self, filter: NetworkFilter) -> Result<Vec<NetworkSummary>>;

    /// List every active connection.
    async fn list_connections(&self) -> Result<Vec<ConnectionSummary>>;

    /// Read machine-wide connectivity.
    async fn host_status(&self) -> Result<HostStatus>;

    /// Read one association string for an extension, ProgID or executable.
    ///
    /// # Errors
    /// Returns `Err` if nothing is associated or the string is not registered.
    async fn query_association(&self, association: &str, kind: AssociationString)
    -> Result<String>;
}
