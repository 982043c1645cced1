use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::com_worker::{ComRequest, ComSource, ComWorker, SystemSource, WorkerConfig};
use crate::error::ComResult;
use crate::network::NetworkFilter;
use crate::provider::{ConnectionSummary, HostStatus, NetworkProvider, NetworkSummary};
use crate::shell::AssociationString;

/// Concrete [`NetworkProvider`] backed by a dedicated COM worker thread.
pub struct ComNetworkProvider<S: ComSource = SystemSource> {
    worker: ComWorker<S>,
}

impl<S: ComSource> ComNetworkProvider<S> {
    /// Starts the worker. Blocks until COM is initialized on it.
    pub fn new(source: S, config: WorkerConfig) -> ComResult<Self> {
        tracing::info!("Initializing ComNetworkProvider...");
        let worker = ComWorker::start(Arc::new(source), config)?;
        tracing::info!("ComNetworkProvider initialized successfully");
        Ok(Self { worker })
    }
}

#[async_trait]
impl<S: ComSource> NetworkProvider for ComNetworkProvider<S> {
    async fn list_networks(&self, filter: NetworkFilter) -> anyhow::Result<Vec<NetworkSummary>> {
        self.worker
            .send_request(|reply| ComRequest::ListNetworks { filter, reply })
            .await
            .context("Failed to list networks")
    }

    async fn list_connections(&self) -> anyhow::Result<Vec<ConnectionSummary>> {
        self.worker
            .send_request(|reply| ComRequest::ListConnections { reply })
            .await
            .context("Failed to list network connections")
    }

    async fn host_status(&self) -> anyhow::Result<HostStatus> {
        self.worker
            .send_request(|reply| ComRequest::HostStatus { reply })
            .await
            .context("Failed to read host connectivity")
    }

    async fn query_association(
        &self,
        association: &str,
        kind: AssociationString,
    ) -> anyhow::Result<String> {
        let association_owned = association.to_string();
        self.worker
            .send_request(|reply| ComRequest::QueryAssociation {
                association: association_owned,
                kind,
                reply,
            })
            .await
            .with_context(|| format!("Failed to query {kind} for '{association}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComError;
    use crate::testing::{AssociationSpec, FakeSource, ManagerSpec, NetworkSpec, Tracker};

    async fn provider<S: ComSource>(source: S) -> ComNetworkProvider<S> {
        tokio::task::spawn_blocking(move || {
            ComNetworkProvider::new(source, WorkerConfig::default()).unwrap()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn provider_returns_snapshots() {
        let tracker = Tracker::new();
        let source = FakeSource {
            tracker: tracker.clone(),
            manager: ManagerSpec {
                networks: vec![NetworkSpec::new(1, "Home").connected(true)],
                connected: true,
                internet: true,
                connectivity: 0x40,
                direct_collections: true,
            },
            associations: AssociationSpec::default(),
        };
        let provider = provider(source).await;

        let networks = provider.list_networks(NetworkFilter::Connected).await.unwrap();
        assert_eq!(networks[0].name, "Home");
        assert!(provider.list_networks(NetworkFilter::Disconnected).await.unwrap().is_empty());
        assert!(provider.host_status().await.unwrap().is_connected_to_internet);
        assert!(provider.list_connections().await.unwrap().is_empty());
        assert_eq!(tracker.live(), 0);
    }

    #[tokio::test]
    async fn association_errors_carry_context_and_status() {
        let provider = provider(FakeSource::default()).await;
        let err = provider
            .query_association(".txt", AssociationString::Executable)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("executable"), "{err}");
        assert!(err.downcast_ref::<ComError>().is_some_and(|e| e.status().is_some()));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn system_source_reports_unregistered_class() {
        let provider = provider(SystemSource::default()).await;
        let err = provider.host_status().await.unwrap_err();
        let com = err.downcast_ref::<ComError>().unwrap();
        assert!(matches!(com, ComError::Activation { .. }));
    }
}
