use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tinysched_core::PodInfo;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for the assume cache
#[derive(Debug, Clone)]
pub struct AssumeCacheConfig {
    /// How long an assumed placement stays valid
    pub ttl: Duration,
    /// Interval between background sweeps of expired entries
    pub sweep_interval: Duration,
}

impl Default for AssumeCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
struct AssumedPod {
    pod: Arc<PodInfo>,
    assumed_at: Instant,
}

/// Node buckets plus the reverse index, always updated together
#[derive(Debug, Default)]
struct CacheState {
    node_pods: HashMap<String, HashMap<String, AssumedPod>>,
    pod_nodes: HashMap<String, String>,
}

impl CacheState {
    fn forget(&mut self, pod_key: &str) -> bool {
        let Some(node_name) = self.pod_nodes.remove(pod_key) else {
            return false;
        };

        if let Some(bucket) = self.node_pods.get_mut(&node_name) {
            bucket.remove(pod_key);
            if bucket.is_empty() {
                self.node_pods.remove(&node_name);
            }
        }
        true
    }

    fn sweep(&mut self, ttl: Duration, now: Instant) -> usize {
        let expired: Vec<String> = self
            .node_pods
            .values()
            .flat_map(|bucket| bucket.iter())
            .filter(|(_, entry)| now.duration_since(entry.assumed_at) > ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.forget(key);
        }
        expired.len()
    }
}

/// Short-lived record of placements we have bound but may not yet observe.
///
/// Entries expire `ttl` after insertion whether or not the observed state
/// has caught up. A background task started by `new` sweeps expired entries
/// every `sweep_interval`; it stops on `stop` or when the cache is dropped.
/// Must be created inside a Tokio runtime.
pub struct AssumeCache {
    state: Arc<RwLock<CacheState>>,
    ttl: Duration,
    token: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl AssumeCache {
    pub fn new(config: AssumeCacheConfig) -> Self {
        let state = Arc::new(RwLock::new(CacheState::default()));
        let token = CancellationToken::new();

        let sweeper = tokio::spawn(Self::run_sweeper(
            state.clone(),
            config.clone(),
            token.clone(),
        ));

        Self {
            state,
            ttl: config.ttl,
            token,
            sweeper,
        }
    }

    async fn run_sweeper(
        state: Arc<RwLock<CacheState>>,
        config: AssumeCacheConfig,
        token: CancellationToken,
    ) {
        debug!(
            "Starting assume cache sweeper (interval: {:?}, ttl: {:?})",
            config.sweep_interval, config.ttl
        );

        let mut interval = tokio::time::interval_at(
            Instant::now() + config.sweep_interval,
            config.sweep_interval,
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Assume cache sweeper shutting down");
                    return;
                }
                _ = interval.tick() => {
                    let removed = state.write().await.sweep(config.ttl, Instant::now());
                    if removed > 0 {
                        info!("Expired {} assumed pods", removed);
                    }
                }
            }
        }
    }

    /// Record that `pod` was bound to `node_name`, replacing any earlier assumption
    pub async fn add_pod(&self, node_name: &str, pod: Arc<PodInfo>) {
        let mut state = self.state.write().await;
        let key = pod.key().to_string();

        // Keep the single-bucket invariant when a pod is re-assumed elsewhere
        state.forget(&key);

        state
            .node_pods
            .entry(node_name.to_string())
            .or_default()
            .insert(
                key.clone(),
                AssumedPod {
                    pod,
                    assumed_at: Instant::now(),
                },
            );
        state.pod_nodes.insert(key, node_name.to_string());
    }

    /// Drop an assumption. No-op if the pod is unknown.
    pub async fn forget_pod(&self, pod_key: &str) {
        if self.state.write().await.forget(pod_key) {
            debug!("Forgot assumed pod {}", pod_key);
        }
    }

    /// True while the pod has an unexpired assumption
    pub async fn has_pod(&self, pod_key: &str) -> bool {
        let state = self.state.read().await;
        self.live_node(&state, pod_key).is_some()
    }

    /// Node a pod is currently assumed on
    pub async fn node_of(&self, pod_key: &str) -> Option<String> {
        let state = self.state.read().await;
        self.live_node(&state, pod_key).map(str::to_string)
    }

    /// Node of an unexpired entry, looked up under the caller's guard
    fn live_node<'a>(&self, state: &'a CacheState, pod_key: &str) -> Option<&'a str> {
        let node_name = state.pod_nodes.get(pod_key)?;
        let entry = state.node_pods.get(node_name)?.get(pod_key)?;
        (!self.is_expired(entry)).then_some(node_name.as_str())
    }

    /// Call `f` for every unexpired pod assumed on `node_name`
    pub async fn range_node_pods<F>(&self, node_name: &str, mut f: F)
    where
        F: FnMut(&str, &Arc<PodInfo>),
    {
        let state = self.state.read().await;
        if let Some(bucket) = state.node_pods.get(node_name) {
            for (key, entry) in bucket {
                if !self.is_expired(entry) {
                    f(key, &entry.pod);
                }
            }
        }
    }

    /// Remove every expired entry now, returning how many were removed
    pub async fn sweep(&self) -> usize {
        self.state.write().await.sweep(self.ttl, Instant::now())
    }

    /// Number of stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.state.read().await.pod_nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop the background sweeper
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop the sweeper and wait for it to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        let _ = (&mut self.sweeper).await;
    }

    fn is_expired(&self, entry: &AssumedPod) -> bool {
        entry.assumed_at.elapsed() > self.ttl
    }
}

impl Drop for AssumeCache {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
