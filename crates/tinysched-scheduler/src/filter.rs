use std::sync::Arc;
use tinysched_core::{NodeInfo, PodInfo, ResourceQuantity};
use tracing::debug;

/// Filter plugin trait
///
/// Receives the nodes that survived the previous plugin and returns the
/// subset that can host the pod.
pub trait FilterPlugin: Send + Sync {
    /// Narrow `nodes` to those that can accommodate `pod`
    fn filter(&self, nodes: Vec<NodeInfo>, pod: &PodInfo) -> Vec<NodeInfo>;

    /// Name of the filter
    fn name(&self) -> &str;
}

/// Keeps nodes whose free resources cover the pod's requests
pub struct ResourceFilter;

impl FilterPlugin for ResourceFilter {
    fn filter(&self, nodes: Vec<NodeInfo>, pod: &PodInfo) -> Vec<NodeInfo> {
        let request = pod.request();

        nodes
            .into_iter()
            .filter(|node| {
                let free = node.free();
                if free.accommodate(request) {
                    return true;
                }
                debug!(
                    "Node {} filtered out for pod {}: {}",
                    node.name(),
                    pod.key(),
                    insufficient_reason(&free, request)
                );
                false
            })
            .collect()
    }

    fn name(&self) -> &str {
        "ResourceFilter"
    }
}

/// Describe the first dimension in which `free` falls short of `request`
fn insufficient_reason(free: &ResourceQuantity, request: &ResourceQuantity) -> String {
    if request.cpu_millicores > free.cpu_millicores {
        format!(
            "Insufficient CPU: requested {} milli, available {} milli",
            request.cpu_millicores, free.cpu_millicores
        )
    } else if request.memory_bytes > free.memory_bytes {
        format!(
            "Insufficient memory: requested {} bytes, available {} bytes",
            request.memory_bytes, free.memory_bytes
        )
    } else {
        format!(
            "Insufficient GPU: requested {}, available {}",
            request.gpu, free.gpu
        )
    }
}

/// Get default filter plugins
pub fn default_filters() -> Vec<Arc<dyn FilterPlugin>> {
    vec![Arc::new(ResourceFilter)]
}

/// Apply every filter in order; a node must pass all of them
pub fn run_filters(
    filters: &[Arc<dyn FilterPlugin>],
    nodes: Vec<NodeInfo>,
    pod: &PodInfo,
) -> Vec<NodeInfo> {
    filters.iter().fold(nodes, |nodes, filter| {
        let before = nodes.len();
        let surviving = filter.filter(nodes, pod);
        debug!(
            "{} kept {}/{} nodes for pod {}",
            filter.name(),
            surviving.len(),
            before,
            pod.key()
        );
        surviving
    })
}
