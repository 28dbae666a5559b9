use crate::cluster::{with_timeout, ClusterClient};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tinysched_core::PodInfo;
use tracing::debug;

/// Pending pods claimed by this scheduler, oldest first.
///
/// Rebuilt from the observed pod list on every refresh.
#[derive(Debug)]
pub struct SchedulingQueue {
    scheduler_name: String,
    pods: Vec<Arc<PodInfo>>,
}

impl SchedulingQueue {
    /// Create an empty queue for pods naming `scheduler_name`
    pub fn new(scheduler_name: impl Into<String>) -> Self {
        Self {
            scheduler_name: scheduler_name.into(),
            pods: Vec::new(),
        }
    }

    /// Refresh from the cluster. On failure the previous contents are kept.
    pub async fn update(&mut self, cluster: &dyn ClusterClient, timeout: Duration) -> Result<usize> {
        let pods = with_timeout("list pods", timeout, cluster.list_pods()).await?;

        let mut pending: Vec<Arc<PodInfo>> = pods
            .into_iter()
            .map(PodInfo::new)
            .filter(|pod| self.claims(pod))
            .map(Arc::new)
            .collect();

        pending.sort_by(|a, b| {
            a.creation_timestamp()
                .map(|t| t.0)
                .cmp(&b.creation_timestamp().map(|t| t.0))
        });

        debug!("Queue refreshed with {} pending pods", pending.len());
        self.pods = pending;
        Ok(self.pods.len())
    }

    /// Whether this scheduler is responsible for placing the pod now
    fn claims(&self, pod: &PodInfo) -> bool {
        pod.scheduler_name() == self.scheduler_name && pod.is_pending() && pod.node_name().is_empty()
    }

    /// Queued pods, oldest first
    pub fn pods(&self) -> &[Arc<PodInfo>] {
        &self.pods
    }

    /// Number of queued pods
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    pub fn scheduler_name(&self) -> &str {
        &self.scheduler_name
    }
}
