use crate::cache::{AssumeCache, AssumeCacheConfig};
use crate::cluster::{with_timeout, ClusterClient};
use crate::filter::{default_filters, run_filters, FilterPlugin};
use crate::queue::SchedulingQueue;
use crate::score::{default_scores, prioritize_nodes, select_host, select_winners, ScorePlugin};
use crate::types::{CycleReport, ScheduleOutcome, ScheduleResult, SkipReason};
use crate::{Result, SchedulerError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tinysched_core::{NodeInfo, PodInfo};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pods declaring this scheduler name are claimed by this instance
    pub scheduler_name: String,
    /// Pause between scheduling cycles
    pub schedule_interval: Duration,
    /// Upper bound for each list and bind call
    pub api_timeout: Duration,
    /// Assume cache validity and sweep settings
    pub assume_cache: AssumeCacheConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_name: "tiny-scheduler".to_string(),
            schedule_interval: Duration::from_secs(1),
            api_timeout: Duration::from_secs(5),
            assume_cache: AssumeCacheConfig::default(),
        }
    }
}

/// Pod scheduler
pub struct Scheduler {
    cluster: Arc<dyn ClusterClient>,
    config: SchedulerConfig,
    queue: SchedulingQueue,
    assume_cache: AssumeCache,
    filters: Vec<Arc<dyn FilterPlugin>>,
    scorers: Vec<Arc<dyn ScorePlugin>>,
}

impl Scheduler {
    /// Create a scheduler with the default plugins. Must be called inside a Tokio runtime.
    pub fn new(cluster: Arc<dyn ClusterClient>, config: SchedulerConfig) -> Self {
        Self {
            queue: SchedulingQueue::new(config.scheduler_name.clone()),
            assume_cache: AssumeCache::new(config.assume_cache.clone()),
            cluster,
            config,
            filters: default_filters(),
            scorers: default_scores(),
        }
    }

    /// Replace the filter plugins. They run in the given order.
    pub fn with_filters(mut self, filters: Vec<Arc<dyn FilterPlugin>>) -> Self {
        self.filters = filters;
        self
    }

    /// Replace the score plugins
    pub fn with_scorers(mut self, scorers: Vec<Arc<dyn ScorePlugin>>) -> Self {
        self.scorers = scorers;
        self
    }

    /// Scheduler name pods must declare to be claimed
    pub fn name(&self) -> &str {
        &self.config.scheduler_name
    }

    /// Placements bound but not yet observed
    pub fn assume_cache(&self) -> &AssumeCache {
        &self.assume_cache
    }

    /// Queue contents as of the last refresh
    pub fn queue(&self) -> &SchedulingQueue {
        &self.queue
    }

    /// Run the scheduler loop until `token` is cancelled
    pub async fn run(&mut self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting scheduler '{}' (interval: {:?}, filters: {}, scorers: {})",
            self.config.scheduler_name,
            self.config.schedule_interval,
            self.filters.len(),
            self.scorers.len()
        );

        loop {
            let report = self.schedule_cycle().await;
            if report.bound > 0 || report.failed > 0 {
                info!(
                    "Scheduling cycle finished: {} queued, {} bound, {} skipped, {} failed",
                    report.queued, report.bound, report.skipped, report.failed
                );
            }

            tokio::select! {
                _ = token.cancelled() => {
                    info!("Scheduler shutting down");
                    self.assume_cache.stop();
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.schedule_interval) => {}
            }
        }
    }

    /// Refresh the queue and attempt every queued pod once, oldest first
    pub async fn schedule_cycle(&mut self) -> CycleReport {
        debug!("Running scheduling cycle");

        if let Err(e) = self
            .queue
            .update(self.cluster.as_ref(), self.config.api_timeout)
            .await
        {
            error!(
                "Failed to refresh scheduling queue, keeping {} queued pods: {}",
                self.queue.len(),
                e
            );
        }

        let pods = self.queue.pods().to_vec();
        let mut report = CycleReport {
            queued: pods.len(),
            ..Default::default()
        };

        for pod in &pods {
            match self.schedule_one(pod).await {
                Ok(ScheduleOutcome::Bound(result)) => {
                    info!(
                        "Scheduled pod {} to node {} ({} feasible nodes)",
                        pod.key(),
                        result.suggested_host,
                        result.feasible_nodes
                    );
                    report.bound += 1;
                }
                Ok(ScheduleOutcome::Skipped(reason)) => {
                    debug!("Skip scheduling pod {}: {}", pod.key(), reason);
                    report.skipped += 1;
                }
                Err(e @ SchedulerError::BindFailed { .. }) => {
                    error!("Error while binding pod {}: {}", pod.key(), e);
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Error while scheduling pod {}: {}", pod.key(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Full scheduling workflow for a single pod: skip check, place, bind, assume
    pub async fn schedule_one(&self, pod: &Arc<PodInfo>) -> Result<ScheduleOutcome> {
        if let Some(reason) = self.skip_reason(pod).await {
            return Ok(ScheduleOutcome::Skipped(reason));
        }

        let result = self.schedule_pod(pod).await?;
        self.bind(pod, &result.suggested_host).await?;

        Ok(ScheduleOutcome::Bound(result))
    }

    async fn skip_reason(&self, pod: &PodInfo) -> Option<SkipReason> {
        if pod.is_terminating() {
            return Some(SkipReason::Terminating);
        }
        if self.assume_cache.has_pod(pod.key()).await {
            return Some(SkipReason::AlreadyAssumed);
        }
        None
    }

    /// Choose a node for the pod without binding it
    pub async fn schedule_pod(&self, pod: &Arc<PodInfo>) -> Result<ScheduleResult> {
        let all_nodes = self.snapshot_node_infos().await?;
        let total = all_nodes.len();

        let feasible_nodes = run_filters(&self.filters, all_nodes, pod);

        if feasible_nodes.is_empty() {
            return Err(SchedulerError::no_feasible_nodes(
                pod.key(),
                format!("all {} nodes filtered out", total),
            ));
        }

        // When only one node passes filtering, just use it
        if feasible_nodes.len() == 1 {
            return Ok(ScheduleResult {
                suggested_host: feasible_nodes[0].name().to_string(),
                feasible_nodes: 1,
            });
        }

        let feasible_count = feasible_nodes.len();
        let totals =
            prioritize_nodes(&self.scorers, Arc::new(feasible_nodes), pod.clone()).await;
        let winners = select_winners(&totals);

        let host = select_host(&winners).ok_or_else(|| SchedulerError::no_winner_selected(pod.key()))?;

        debug!(
            "Selected node {} for pod {} with score {} ({} tied)",
            host.node_name,
            pod.key(),
            host.score,
            winners.len()
        );

        Ok(ScheduleResult {
            suggested_host: host.node_name.clone(),
            feasible_nodes: feasible_count,
        })
    }

    /// Build node views from the observed state overlaid with assumed placements
    async fn snapshot_node_infos(&self) -> Result<Vec<NodeInfo>> {
        let timeout = self.config.api_timeout;
        let nodes = with_timeout("list nodes", timeout, self.cluster.list_nodes()).await?;
        let pods = with_timeout("list pods", timeout, self.cluster.list_pods()).await?;

        let mut node_pods: HashMap<String, BTreeMap<String, Arc<PodInfo>>> = HashMap::new();

        // Pods the observed state already shows as assigned consume resources
        for pod in pods {
            let pod = PodInfo::new(pod);
            if pod.node_name().is_empty() {
                continue;
            }
            node_pods
                .entry(pod.node_name().to_string())
                .or_default()
                .entry(pod.key().to_string())
                .or_insert_with(|| Arc::new(pod));
        }

        let mut node_infos = Vec::with_capacity(nodes.len());
        for node in nodes {
            let node_name = node.metadata.name.clone().unwrap_or_default();
            let mut resident = node_pods.remove(&node_name).unwrap_or_default();

            // Bound by us but possibly not yet visible in the observed state
            self.assume_cache
                .range_node_pods(&node_name, |key, pod| {
                    resident
                        .entry(key.to_string())
                        .or_insert_with(|| pod.clone());
                })
                .await;

            node_infos.push(NodeInfo::new(node, resident));
        }

        Ok(node_infos)
    }

    /// Bind the pod and record the assumption on success
    async fn bind(&self, pod: &Arc<PodInfo>, node_name: &str) -> Result<()> {
        info!("Binding pod {} to node {}", pod.key(), node_name);

        let operation = format!("bind {}", pod.key());
        with_timeout(
            &operation,
            self.config.api_timeout,
            self.cluster
                .bind(pod.namespace(), pod.name(), pod.uid(), node_name),
        )
        .await
        .map_err(|e| match e {
            e @ SchedulerError::BindFailed { .. } => e,
            e => SchedulerError::bind_failed(pod.key(), node_name, e.to_string()),
        })?;

        self.assume_cache.add_pod(node_name, pod.clone()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::{Node, Pod};

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            scheduler_name: TEST_SCHEDULER.to_string(),
            ..Default::default()
        }
    }

    fn scheduler(cluster: &Arc<MockCluster>) -> Scheduler {
        Scheduler::new(cluster.clone(), config())
    }

    #[tokio::test]
    async fn test_cycle_binds_and_assumes() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.add_pod(make_pod("web", "1", "1Gi", 0)).await;

        let mut scheduler = scheduler(&cluster);
        let report = scheduler.schedule_cycle().await;

        assert_eq!(report.bound, 1);
        assert_eq!(
            cluster.bindings().await,
            vec![BindRecord {
                namespace: "default".to_string(),
                name: "web".to_string(),
                node_name: "node1".to_string(),
            }]
        );
        assert!(scheduler.assume_cache().has_pod("default/web").await);
        assert_eq!(
            scheduler.assume_cache().node_of("default/web").await.as_deref(),
            Some("node1")
        );
    }

    #[tokio::test]
    async fn test_assumed_pod_is_not_bound_twice() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.add_pod(make_pod("web", "1", "1Gi", 0)).await;

        let mut scheduler = scheduler(&cluster);
        scheduler.schedule_cycle().await;

        // The observed state still shows the pod as pending
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report.queued, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.bound, 0);
        assert_eq!(cluster.bindings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_assumed_resources_are_not_offered_again() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.add_pod(make_pod("first", "1500m", "1Gi", 0)).await;
        cluster.add_pod(make_pod("second", "1", "1Gi", 1)).await;

        let mut scheduler = scheduler(&cluster);
        let report = scheduler.schedule_cycle().await;

        assert_eq!(report.bound, 1);
        assert_eq!(report.failed, 1);
        let bindings = cluster.bindings().await;
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].name, "first");
    }

    #[tokio::test]
    async fn test_observed_assignment_counts_once() {
        let cluster = Arc::new(MockCluster::new());
        cluster.set_apply_bindings(true).await;
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.add_pod(make_pod("first", "1", "1Gi", 0)).await;

        let mut scheduler = scheduler(&cluster);
        scheduler.schedule_cycle().await;

        // Visible both as observed and assumed, but only consumes resources once
        cluster.add_pod(make_pod("second", "1", "1Gi", 1)).await;
        let report = scheduler.schedule_cycle().await;

        assert_eq!(report.bound, 1);
        assert_eq!(cluster.bindings().await.len(), 2);
    }

    #[tokio::test]
    async fn test_no_feasible_nodes() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "1", "1Gi")).await;

        let scheduler = scheduler(&cluster);
        let pod = Arc::new(PodInfo::new(make_pod("big", "2", "2Gi", 0)));

        let result = scheduler.schedule_one(&pod).await;
        assert!(matches!(result, Err(SchedulerError::NoFeasibleNodes { .. })));
        assert!(cluster.bindings().await.is_empty());
        assert!(!scheduler.assume_cache().has_pod("default/big").await);
    }

    #[tokio::test]
    async fn test_no_nodes_at_all() {
        let cluster = Arc::new(MockCluster::new());
        let scheduler = scheduler(&cluster);
        let pod = Arc::new(PodInfo::new(make_pod("web", "1", "1Gi", 0)));

        let result = scheduler.schedule_pod(&pod).await;
        assert!(matches!(result, Err(SchedulerError::NoFeasibleNodes { .. })));
    }

    #[tokio::test]
    async fn test_bind_failure_records_nothing_and_retries() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.add_pod(make_pod("web", "1", "1Gi", 0)).await;
        cluster.set_bind_failure(true).await;

        let mut scheduler = scheduler(&cluster);
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report.failed, 1);
        assert!(!scheduler.assume_cache().has_pod("default/web").await);

        cluster.set_bind_failure(false).await;
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report.bound, 1);
        assert_eq!(cluster.bindings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_bind_failure_from_cluster_is_not_rewrapped() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.set_bind_failure(true).await;

        let scheduler = scheduler(&cluster);
        let pod = Arc::new(PodInfo::new(make_pod("web", "1", "1Gi", 0)));

        let err = scheduler.schedule_one(&pod).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to bind pod default/web to node node1: mock: bind rejected"
        );
    }

    #[tokio::test]
    async fn test_terminating_pod_is_skipped() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;

        let scheduler = scheduler(&cluster);
        let pod = Arc::new(PodInfo::new(terminating(make_pod("web", "1", "1Gi", 0))));

        let outcome = scheduler.schedule_one(&pod).await.unwrap();
        assert_eq!(outcome, ScheduleOutcome::Skipped(SkipReason::Terminating));
        assert!(cluster.bindings().await.is_empty());
    }

    #[tokio::test]
    async fn test_equal_scores_pick_lowest_name() {
        let cluster = Arc::new(MockCluster::new());
        for name in ["node-c", "node-a", "node-b"] {
            cluster.add_node(make_node(name, "4", "8Gi")).await;
        }

        let scheduler = scheduler(&cluster);
        let pod = Arc::new(PodInfo::new(make_pod("web", "1", "1Gi", 0)));

        let result = scheduler.schedule_pod(&pod).await.unwrap();
        assert_eq!(result.feasible_nodes, 3);
        assert_eq!(result.suggested_host, "node-a");
    }

    #[tokio::test]
    async fn test_no_score_plugins_is_no_winner() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node-a", "4", "8Gi")).await;
        cluster.add_node(make_node("node-b", "4", "8Gi")).await;

        let scheduler = scheduler(&cluster).with_scorers(Vec::new());
        let pod = Arc::new(PodInfo::new(make_pod("web", "1", "1Gi", 0)));

        let result = scheduler.schedule_pod(&pod).await;
        assert!(matches!(result, Err(SchedulerError::NoWinnerSelected { .. })));
    }

    #[tokio::test]
    async fn test_single_candidate_skips_scoring() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node-a", "4", "8Gi")).await;
        cluster.add_node(make_node("node-b", "1", "8Gi")).await;

        // No scorers would otherwise yield NoWinnerSelected
        let scheduler = scheduler(&cluster).with_scorers(Vec::new());
        let pod = Arc::new(PodInfo::new(make_pod("web", "2", "1Gi", 0)));

        let result = scheduler.schedule_pod(&pod).await.unwrap();
        assert_eq!(
            result,
            ScheduleResult {
                suggested_host: "node-a".to_string(),
                feasible_nodes: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_list_failure_fails_attempt_only() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.add_pod(make_pod("web", "1", "1Gi", 0)).await;

        let mut scheduler = scheduler(&cluster);
        cluster.set_list_failure(true).await;
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report, CycleReport::default());

        cluster.set_list_failure(false).await;
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report.bound, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_retries_previous_queue() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_pod(make_pod("web", "1", "1Gi", 0)).await;

        let mut scheduler = scheduler(&cluster);
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report.queued, 1);
        assert_eq!(report.failed, 1);

        // Refresh fails: the pod stays queued and is attempted again
        cluster.set_list_failure(true).await;
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report.queued, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(scheduler.queue().len(), 1);

        cluster.set_list_failure(false).await;
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        let report = scheduler.schedule_cycle().await;
        assert_eq!(report.bound, 1);
    }

    struct HangingBind(MockCluster);

    #[async_trait]
    impl ClusterClient for HangingBind {
        async fn list_nodes(&self) -> Result<Vec<Node>> {
            self.0.list_nodes().await
        }

        async fn list_pods(&self) -> Result<Vec<Pod>> {
            self.0.list_pods().await
        }

        async fn bind(
            &self,
            _namespace: &str,
            _name: &str,
            _uid: Option<&str>,
            _node_name: &str,
        ) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_timeout_is_recoverable() {
        let inner = MockCluster::new();
        inner.add_node(make_node("node1", "2", "4Gi")).await;
        let cluster = Arc::new(HangingBind(inner));

        let scheduler = Scheduler::new(cluster, config());
        let pod = Arc::new(PodInfo::new(make_pod("web", "1", "1Gi", 0)));

        let result = scheduler.schedule_one(&pod).await;
        assert!(matches!(result, Err(SchedulerError::BindFailed { .. })));
        assert!(!scheduler.assume_cache().has_pod("default/web").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let cluster = Arc::new(MockCluster::new());
        cluster.add_node(make_node("node1", "2", "4Gi")).await;
        cluster.add_pod(make_pod("web", "1", "1Gi", 0)).await;

        let mut scheduler = scheduler(&cluster);
        let token = CancellationToken::new();

        let handle = {
            let token = token.clone();
            tokio::spawn(async move {
                scheduler.run(token).await.unwrap();
                scheduler
            })
        };

        tokio::time::sleep(Duration::from_millis(3500)).await;
        token.cancel();
        let scheduler = handle.await.unwrap();

        // Bound once in the first cycle, skipped in the following ones
        assert_eq!(cluster.bindings().await.len(), 1);
        assert!(scheduler.assume_cache().has_pod("default/web").await);
    }
}
