use crate::pod_info::PodInfo;
use crate::resources::ResourceQuantity;
use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Point-in-time view of a node and the pods considered resident on it.
///
/// Built once per scheduling attempt and never updated in place.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    node: Node,
    pods: BTreeMap<String, Arc<PodInfo>>,
    allocatable: ResourceQuantity,
    requests: ResourceQuantity,
}

impl NodeInfo {
    /// Create a node view from the node object and its resident pods keyed by `namespace/name`
    pub fn new(node: Node, pods: BTreeMap<String, Arc<PodInfo>>) -> Self {
        let allocatable = node
            .status
            .as_ref()
            .and_then(|s| s.allocatable.as_ref())
            .map(ResourceQuantity::from_k8s_resource_map)
            .unwrap_or_default();

        let mut requests = ResourceQuantity::ZERO;
        for pod in pods.values() {
            requests.add(pod.request());
        }

        Self {
            node,
            pods,
            allocatable,
            requests,
        }
    }

    /// Node name, empty if unset
    pub fn name(&self) -> &str {
        self.node.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Resident pods keyed by `namespace/name`
    pub fn pods(&self) -> &BTreeMap<String, Arc<PodInfo>> {
        &self.pods
    }

    /// Whether the pod is resident on this node
    pub fn has_pod(&self, pod_key: &str) -> bool {
        self.pods.contains_key(pod_key)
    }

    /// Capacity the node reports as schedulable
    pub fn allocatable(&self) -> &ResourceQuantity {
        &self.allocatable
    }

    /// Sum of resident pods' requests
    pub fn requests(&self) -> &ResourceQuantity {
        &self.requests
    }

    /// `allocatable - requests`, negative when over-committed
    pub fn free(&self) -> ResourceQuantity {
        let mut free = self.allocatable;
        free.sub(&self.requests);
        free
    }
}
