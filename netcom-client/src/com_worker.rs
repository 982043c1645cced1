//! Dedicated COM thread.
//!
//! Every COM reference the async layer needs is created, used and released
//! on one OS thread that holds a [`ComGuard`]. Callers talk to it over a
//! bounded channel and get owned snapshots back.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::ComGuard;
use crate::adapter::{FileAssociation, NetworkConnectionInfo, NetworkInfo};
use crate::com::ClassContext;
use crate::error::{ComError, ComResult};
use crate::network::{NetworkFilter, NetworkListManager};
use crate::provider::{ConnectionSummary, HostStatus, NetworkSummary};
use crate::shell::{AssociationString, QueryAssociations};

/// Where the worker gets its root objects from.
pub trait ComSource: Send + Sync + 'static {
    fn network_manager(&self) -> ComResult<NetworkListManager>;
    fn associations(&self) -> ComResult<QueryAssociations>;
}

/// Activates the real system classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSource {
    pub context: ClassContext,
}

impl ComSource for SystemSource {
    fn network_manager(&self) -> ComResult<NetworkListManager> {
        NetworkListManager::activate(self.context)
    }

    fn associations(&self) -> ComResult<QueryAssociations> {
        QueryAssociations::activate(self.context)
    }
}

/// Tuning for [`ComWorker`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    /// Requests that may wait before senders are back-pressured.
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { queue_depth: 32 }
    }
}

pub enum ComRequest {
    ListNetworks {
        filter: NetworkFilter,
        reply: oneshot::Sender<ComResult<Vec<NetworkSummary>>>,
    },
    ListConnections {
        reply: oneshot::Sender<ComResult<Vec<ConnectionSummary>>>,
    },
    HostStatus {
        reply: oneshot::Sender<ComResult<HostStatus>>,
    },
    QueryAssociation {
        association: String,
        kind: AssociationString,
        reply: oneshot::Sender<ComResult<String>>,
    },
}

pub struct ComWorker<S: ComSource> {
    sender: Option<mpsc::Sender<ComRequest>>,
    handle: Option<std::thread::JoinHandle<()>>,
    _phantom: std::marker::PhantomData<S>,
}

impl<S: ComSource> ComWorker<S> {
    /// Spawns the worker and waits until COM is initialized on it.
    ///
    /// Blocks the calling thread; call it outside of an async context.
    pub fn start(source: Arc<S>, config: WorkerConfig) -> ComResult<Self> {
        let (tx, mut rx) = mpsc::channel(config.queue_depth.max(1));
        let (init_tx, init_rx) = oneshot::channel();

        let handle = std::thread::Builder::new()
            .name("netcom-com".into())
            .spawn(move || {
                let _guard = match ComGuard::new() {
                    Ok(g) => {
                        let _ = init_tx.send(Ok(()));
                        g
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "COM worker failed to initialize MTA");
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                while let Some(req) = rx.blocking_recv() {
                    Self::handle(&source, req);
                }

                tracing::debug!("COM worker thread exiting cleanly");
            })
            .map_err(|e| ComError::Internal(format!("failed to spawn COM worker: {e}")))?;

        init_rx
            .blocking_recv()
            .map_err(|_| ComError::Internal("COM worker thread panicked during init".into()))??;

        tracing::debug!("COM worker thread started");

        Ok(Self {
            sender: Some(tx),
            handle: Some(handle),
            _phantom: std::marker::PhantomData,
        })
    }

    pub async fn send_request<F, R>(&self, req_builder: F) -> ComResult<R>
    where
        F: FnOnce(oneshot::Sender<ComResult<R>>) -> ComRequest,
    {
        if self
            .handle
            .as_ref()
            .is_some_and(std::thread::JoinHandle::is_finished)
        {
            tracing::error!("COM worker thread panicked or exited unexpectedly");
            return Err(ComError::Internal("COM worker thread panicked".into()));
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ComError::Internal("COM worker stopped".into()))?;

        let (tx, rx) = oneshot::channel();
        sender
            .send(req_builder(tx))
            .await
            .map_err(|_| ComError::Internal("COM worker channel closed (worker stopped)".into()))?;

        rx.await
            .map_err(|_| ComError::Internal("COM worker shut down during request".into()))?
    }

    fn handle(source: &S, req: ComRequest) {
        match req {
            ComRequest::ListNetworks { filter, reply } => {
                let span = tracing::info_span!("netcom.list_networks", ?filter);
                let _enter = span.enter();
                let result = Self::list_networks(source, filter);
                if let Ok(n) = &result {
                    tracing::info!(count = n.len(), "list_networks completed");
                }
                let _ = reply.send(result);
            }
            ComRequest::ListConnections { reply } => {
                let span = tracing::info_span!("netcom.list_connections");
                let _enter = span.enter();
                let result = Self::list_connections(source);
                if let Ok(c) = &result {
                    tracing::info!(count = c.len(), "list_connections completed");
                }
                let _ = reply.send(result);
            }
            ComRequest::HostStatus { reply } => {
                let span = tracing::info_span!("netcom.host_status");
                let _enter = span.enter();
                let _ = reply.send(Self::host_status(source));
            }
            ComRequest::QueryAssociation {
                association,
                kind,
                reply,
            } => {
                let span =
                    tracing::info_span!("netcom.query_association", %association, %kind);
                let _enter = span.enter();
                let result = source
                    .associations()
                    .and_then(|query| FileAssociation::new(query, &association))
                    .and_then(|assoc| assoc.get(kind));
                let _ = reply.send(result);
            }
        }
    }

    fn list_networks(source: &S, filter: NetworkFilter) -> ComResult<Vec<NetworkSummary>> {
        let manager = source.network_manager()?;
        manager
            .networks(filter)?
            .into_iter()
            .map(|network| summarize_network(&NetworkInfo::new(network)?))
            .collect()
    }

    fn list_connections(source: &S) -> ComResult<Vec<ConnectionSummary>> {
        let manager = source.network_manager()?;
        manager
            .connections()?
            .into_iter()
            .map(|connection| summarize_connection(&NetworkConnectionInfo::new(connection)?))
            .collect()
    }

    fn host_status(source: &S) -> ComResult<HostStatus> {
        let manager = source.network_manager()?;
        Ok(HostStatus {
            is_connected: manager.is_connected()?,
            is_connected_to_internet: manager.is_connected_to_internet()?,
            connectivity: manager.connectivity()?,
        })
    }
}

impl<S: ComSource> Drop for ComWorker<S> {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        drop(self.sender.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("COM worker thread panicked");
            }
        }
    }
}

fn summarize_network(info: &NetworkInfo) -> ComResult<NetworkSummary> {
    Ok(NetworkSummary {
        id: info.network_id()?,
        name: info.name()?,
        description: info.description()?,
        category: info.category()?,
        domain_type: info.domain_type()?,
        connectivity: info.connectivity()?,
        is_connected: info.is_connected()?,
        is_connected_to_internet: info.is_connected_to_internet()?,
        created: info.creation_time()?,
        connected: info.connection_time()?,
        connection_count: info.connections()?.len(),
    })
}

fn summarize_connection(info: &NetworkConnectionInfo) -> ComResult<ConnectionSummary> {
    let network = info.network()?;
    Ok(ConnectionSummary {
        id: info.connection_id()?,
        adapter_id: info.adapter_id()?,
        network_id: network.network_id()?,
        network_name: network.name()?,
        connectivity: info.connectivity()?,
        domain_type: info.domain_type()?,
        is_connected: info.is_connected()?,
        is_connected_to_internet: info.is_connected_to_internet()?,
    })
}
