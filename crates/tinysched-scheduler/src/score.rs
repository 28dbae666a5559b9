use crate::types::NodeScore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tinysched_core::{NodeInfo, PodInfo};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Score awarded to every node by `EqualScore`
pub const EQUAL_SCORE: i64 = 1000;

/// Scoring plugin trait
pub trait ScorePlugin: Send + Sync {
    /// Score each candidate node for the pod (higher is better)
    fn score(&self, nodes: &[NodeInfo], pod: &PodInfo) -> Vec<NodeScore>;

    /// Name of the scoring plugin
    fn name(&self) -> &str;
}

/// Gives every node the same score
pub struct EqualScore;

impl ScorePlugin for EqualScore {
    fn score(&self, nodes: &[NodeInfo], _pod: &PodInfo) -> Vec<NodeScore> {
        nodes
            .iter()
            .map(|node| NodeScore::new(node.name(), EQUAL_SCORE))
            .collect()
    }

    fn name(&self) -> &str {
        "EqualScore"
    }
}

/// Prefers nodes with the most CPU and memory left after placing the pod (0-100)
pub struct LeastAllocated;

impl LeastAllocated {
    fn score_node(node: &NodeInfo, pod: &PodInfo) -> i64 {
        let allocatable = node.allocatable();

        // If node has no resources, score 0
        if allocatable.cpu_millicores <= 0 || allocatable.memory_bytes <= 0 {
            return 0;
        }

        let mut remaining = node.free();
        remaining.sub(pod.request());

        let percent_free = |remaining: i64, total: i64| -> i128 {
            (i128::from(remaining) * 100 / i128::from(total)).clamp(0, 100)
        };

        let cpu_free = percent_free(remaining.cpu_millicores, allocatable.cpu_millicores);
        let memory_free = percent_free(remaining.memory_bytes, allocatable.memory_bytes);
        let score = ((cpu_free + memory_free) / 2) as i64;

        debug!(
            "Node {} least allocated score: {} (CPU free: {}%, Memory free: {}%)",
            node.name(),
            score,
            cpu_free,
            memory_free
        );

        score
    }
}

impl ScorePlugin for LeastAllocated {
    fn score(&self, nodes: &[NodeInfo], pod: &PodInfo) -> Vec<NodeScore> {
        nodes
            .iter()
            .map(|node| NodeScore::new(node.name(), Self::score_node(node, pod)))
            .collect()
    }

    fn name(&self) -> &str {
        "LeastAllocated"
    }
}

/// Get default scoring plugins
pub fn default_scores() -> Vec<Arc<dyn ScorePlugin>> {
    vec![Arc::new(EqualScore)]
}

/// Run every plugin on its own task and sum the results per node.
///
/// Each task returns its scores independently; the sum is built here after
/// joining, so plugins share no mutable state. A plugin that panics
/// contributes nothing.
pub async fn prioritize_nodes(
    plugins: &[Arc<dyn ScorePlugin>],
    nodes: Arc<Vec<NodeInfo>>,
    pod: Arc<PodInfo>,
) -> BTreeMap<String, i64> {
    let mut tasks = JoinSet::new();

    for plugin in plugins {
        let plugin = plugin.clone();
        let nodes = nodes.clone();
        let pod = pod.clone();
        tasks.spawn(async move {
            let scores = plugin.score(&nodes, &pod);
            (plugin.name().to_string(), scores)
        });
    }

    let mut totals = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((plugin_name, scores)) => {
                debug!(
                    "{} scored {} nodes for pod {}",
                    plugin_name,
                    scores.len(),
                    pod.key()
                );
                for NodeScore { node_name, score } in scores {
                    let total = totals.entry(node_name).or_insert(0i64);
                    *total = total.saturating_add(score);
                }
            }
            Err(e) => error!("Score plugin task failed for pod {}: {}", pod.key(), e),
        }
    }

    totals
}

/// Nodes whose summed score equals the maximum, ordered by node name
pub fn select_winners(totals: &BTreeMap<String, i64>) -> Vec<NodeScore> {
    let Some(max) = totals.values().copied().max() else {
        return Vec::new();
    };

    totals
        .iter()
        .filter(|(_, score)| **score == max)
        .map(|(name, score)| NodeScore::new(name.clone(), *score))
        .collect()
}

/// Pick one winner. Ties resolve to the lowest node name.
pub fn select_host(winners: &[NodeScore]) -> Option<&NodeScore> {
    winners.iter().min_by(|a, b| a.node_name.cmp(&b.node_name))
}
