use crate::error::{Result, SchedulerError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use std::future::Future;
use std::time::Duration;

/// Access to the cluster control plane
///
/// Listing returns a point-in-time snapshot that may lag behind the real
/// cluster state. `bind` is the only mutating call the scheduler makes.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List all known nodes
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List all known pods across namespaces
    async fn list_pods(&self) -> Result<Vec<Pod>>;

    /// Durably assign a pod to a node
    async fn bind(
        &self,
        namespace: &str,
        name: &str,
        uid: Option<&str>,
        node_name: &str,
    ) -> Result<()>;
}

/// Run a control plane call, failing with `SchedulerError::Timeout` if it takes too long
pub(crate) async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(SchedulerError::timeout(operation, timeout)),
    }
}
