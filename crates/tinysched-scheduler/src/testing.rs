//! In-memory cluster and object builders for the scheduler tests

use crate::cluster::ClusterClient;
use crate::error::{Result, SchedulerError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, Node, NodeStatus, Pod, PodSpec, PodStatus, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::BTreeMap;
use tinysched_core::pod_key;
use tokio::sync::RwLock;

pub(crate) const TEST_SCHEDULER: &str = "tiny-scheduler";

/// A bind call observed by `MockCluster`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BindRecord {
    pub namespace: String,
    pub name: String,
    pub node_name: String,
}

#[derive(Default)]
struct MockState {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    bindings: Vec<BindRecord>,
    fail_list: bool,
    fail_bind: bool,
    apply_bindings: bool,
}

/// Cluster double whose listings lag binds unless `apply_bindings` is enabled
#[derive(Default)]
pub(crate) struct MockCluster {
    state: RwLock<MockState>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_node(&self, node: Node) {
        self.state.write().await.nodes.push(node);
    }

    pub async fn add_pod(&self, pod: Pod) {
        self.state.write().await.pods.push(pod);
    }

    pub async fn set_list_failure(&self, fail: bool) {
        self.state.write().await.fail_list = fail;
    }

    pub async fn set_bind_failure(&self, fail: bool) {
        self.state.write().await.fail_bind = fail;
    }

    /// Make successful binds immediately visible in `list_pods`
    pub async fn set_apply_bindings(&self, apply: bool) {
        self.state.write().await.apply_bindings = apply;
    }

    pub async fn bindings(&self) -> Vec<BindRecord> {
        self.state.read().await.bindings.clone()
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let state = self.state.read().await;
        if state.fail_list {
            return Err(SchedulerError::observation("mock: list nodes failed"));
        }
        Ok(state.nodes.clone())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        let state = self.state.read().await;
        if state.fail_list {
            return Err(SchedulerError::observation("mock: list pods failed"));
        }
        Ok(state.pods.clone())
    }

    async fn bind(
        &self,
        namespace: &str,
        name: &str,
        _uid: Option<&str>,
        node_name: &str,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_bind {
            return Err(SchedulerError::bind_failed(
                pod_key(namespace, name),
                node_name,
                "mock: bind rejected",
            ));
        }

        state.bindings.push(BindRecord {
            namespace: namespace.to_string(),
            name: name.to_string(),
            node_name: node_name.to_string(),
        });

        if state.apply_bindings {
            for pod in state.pods.iter_mut() {
                if pod.metadata.namespace.as_deref() == Some(namespace)
                    && pod.metadata.name.as_deref() == Some(name)
                {
                    if let Some(spec) = pod.spec.as_mut() {
                        spec.node_name = Some(node_name.to_string());
                    }
                }
            }
        }

        Ok(())
    }
}

fn quantities(pairs: &[(&str, &str)]) -> BTreeMap<String, Quantity> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
        .collect()
}

pub(crate) fn make_node(name: &str, cpu: &str, memory: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            allocatable: Some(quantities(&[
                ("cpu", cpu),
                ("memory", memory),
                ("nvidia.com/gpu", "0"),
            ])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A pending pod for `TEST_SCHEDULER`, created `created_secs` after an arbitrary epoch
pub(crate) fn make_pod(name: &str, cpu: &str, memory: &str, created_secs: i64) -> Pod {
    let created = chrono::DateTime::from_timestamp(1_700_000_000 + created_secs, 0)
        .expect("valid timestamp");

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-{}", name)),
            creation_timestamp: Some(Time(created)),
            ..Default::default()
        },
        spec: Some(PodSpec {
            scheduler_name: Some(TEST_SCHEDULER.to_string()),
            containers: vec![Container {
                name: "main".to_string(),
                resources: Some(ResourceRequirements {
                    requests: Some(quantities(&[("cpu", cpu), ("memory", memory)])),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some("Pending".to_string()),
            ..Default::default()
        }),
    }
}

pub(crate) fn with_scheduler(mut pod: Pod, scheduler_name: &str) -> Pod {
    if let Some(spec) = pod.spec.as_mut() {
        spec.scheduler_name = Some(scheduler_name.to_string());
    }
    pod
}

pub(crate) fn with_phase(mut pod: Pod, phase: &str) -> Pod {
    if let Some(status) = pod.status.as_mut() {
        status.phase = Some(phase.to_string());
    }
    pod
}

pub(crate) fn on_node(mut pod: Pod, node_name: &str) -> Pod {
    if let Some(spec) = pod.spec.as_mut() {
        spec.node_name = Some(node_name.to_string());
    }
    pod
}

pub(crate) fn terminating(mut pod: Pod) -> Pod {
    pod.metadata.deletion_timestamp = pod.metadata.creation_timestamp.clone();
    pod
}
