use crate::error::ClientError;
use crate::informer::SnapshotInformer;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use std::sync::Arc;
use tinysched_core::pod_key;
use tinysched_scheduler::{ClusterClient, Result, SchedulerError};

/// Cluster view backed by the informer snapshot, with binds sent straight to the API server
pub struct ObservedCluster {
    informer: Arc<SnapshotInformer>,
}

impl ObservedCluster {
    pub fn new(informer: Arc<SnapshotInformer>) -> Self {
        Self { informer }
    }
}

impl From<ClientError> for SchedulerError {
    fn from(err: ClientError) -> Self {
        SchedulerError::observation(err.to_string())
    }
}

#[async_trait]
impl ClusterClient for ObservedCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.informer.list_nodes().await?)
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        Ok(self.informer.list_pods().await?)
    }

    async fn bind(
        &self,
        namespace: &str,
        name: &str,
        uid: Option<&str>,
        node_name: &str,
    ) -> Result<()> {
        self.informer
            .api_client()
            .bind_pod(namespace, name, uid, node_name)
            .await
            .map_err(|e| {
                SchedulerError::bind_failed(pod_key(namespace, name), node_name, e.to_string())
            })
    }
}
