use crate::api_client::ApiClient;
use crate::error::{ClientError, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the snapshot informer
#[derive(Debug, Clone)]
pub struct InformerConfig {
    /// Interval between full listings
    pub sync_interval: Duration,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
}

/// Periodically lists nodes and pods into an in-memory snapshot.
///
/// Readers see the last successful listing, which may lag the API server.
/// A failed listing leaves the previous snapshot in place.
pub struct SnapshotInformer {
    api_client: Arc<ApiClient>,
    config: InformerConfig,
    snapshot: RwLock<Option<Snapshot>>,
    synced: watch::Sender<bool>,
}

impl SnapshotInformer {
    pub fn new(api_client: Arc<ApiClient>, config: InformerConfig) -> Self {
        Self {
            api_client,
            config,
            snapshot: RwLock::new(None),
            synced: watch::Sender::new(false),
        }
    }

    /// Run the listing loop until `token` is cancelled
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting snapshot informer against {} (interval: {:?})",
            self.api_client.base_url(),
            self.config.sync_interval
        );

        // First tick fires immediately so the initial sync is not delayed
        let mut interval = tokio::time::interval(self.config.sync_interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Snapshot informer shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    if let Err(e) = self.resync().await {
                        warn!("Snapshot listing failed, keeping previous snapshot: {}", e);
                    }
                }
            }
        }
    }

    /// List nodes and pods once and replace the snapshot
    pub async fn resync(&self) -> Result<()> {
        let nodes = self.api_client.list_nodes().await?;
        let pods = self.api_client.list_pods().await?;

        debug!(
            "Snapshot refreshed with {} nodes and {} pods",
            nodes.len(),
            pods.len()
        );

        *self.snapshot.write().await = Some(Snapshot { nodes, pods });
        self.synced.send_if_modified(|synced| !std::mem::replace(synced, true));
        Ok(())
    }

    /// Whether at least one full listing has completed
    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Wait until the first listing completes, or fail after `timeout`
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<()> {
        let mut rx = self.synced.subscribe();
        let synced = async { rx.wait_for(|synced| *synced).await.map(|_| ()) };
        let result = match tokio::time::timeout(timeout, synced).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ClientError::internal_error("sync signal closed")),
            Err(_) => Err(ClientError::NotSynced),
        };
        result
    }

    /// Nodes from the last successful listing
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        match self.snapshot.read().await.as_ref() {
            Some(snapshot) => Ok(snapshot.nodes.clone()),
            None => Err(ClientError::NotSynced),
        }
    }

    /// Pods from the last successful listing
    pub async fn list_pods(&self) -> Result<Vec<Pod>> {
        match self.snapshot.read().await.as_ref() {
            Some(snapshot) => Ok(snapshot.pods.clone()),
            None => Err(ClientError::NotSynced),
        }
    }

    pub fn api_client(&self) -> &Arc<ApiClient> {
        &self.api_client
    }
}
