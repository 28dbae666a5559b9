use crate::resources::ResourceQuantity;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Phase reported by the API server for pods that are not yet running
pub const POD_PHASE_PENDING: &str = "Pending";

/// Scheduler name the API server assigns when a pod does not declare one
pub const DEFAULT_SCHEDULER_NAME: &str = "default-scheduler";

/// Namespace assumed for pods without one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Build the `namespace/name` identity used to track a pod
pub fn pod_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// Immutable view of a pod together with its derived resource request
#[derive(Debug, Clone)]
pub struct PodInfo {
    pod: Pod,
    request: ResourceQuantity,
    key: String,
}

impl PodInfo {
    /// Wrap a pod, computing its key and summed request once
    pub fn new(pod: Pod) -> Self {
        let request = compute_pod_request(&pod);
        let key = pod_key(
            pod.metadata.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE),
            pod.metadata.name.as_deref().unwrap_or_default(),
        );
        Self { pod, request, key }
    }

    /// The underlying pod object
    pub fn pod(&self) -> &Pod {
        &self.pod
    }

    /// Summed container requests
    pub fn request(&self) -> &ResourceQuantity {
        &self.request
    }

    /// `namespace/name`
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pod name, empty if unset
    pub fn name(&self) -> &str {
        self.pod.metadata.name.as_deref().unwrap_or_default()
    }

    /// Pod namespace, `default` if unset
    pub fn namespace(&self) -> &str {
        self.pod
            .metadata
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Server-assigned uid, used to guard the binding against pod replacement
    pub fn uid(&self) -> Option<&str> {
        self.pod.metadata.uid.as_deref()
    }

    /// Node the pod is assigned to, empty if unscheduled
    pub fn node_name(&self) -> &str {
        self.pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.as_deref())
            .unwrap_or_default()
    }

    /// Scheduler responsible for this pod
    pub fn scheduler_name(&self) -> &str {
        self.pod
            .spec
            .as_ref()
            .and_then(|s| s.scheduler_name.as_deref())
            .unwrap_or(DEFAULT_SCHEDULER_NAME)
    }

    /// Reported phase, empty if the pod has no status yet
    pub fn phase(&self) -> &str {
        self.pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or_default()
    }

    /// Whether the phase is `Pending`. A missing phase is not pending.
    pub fn is_pending(&self) -> bool {
        self.phase() == POD_PHASE_PENDING
    }

    /// True once deletion has been requested
    pub fn is_terminating(&self) -> bool {
        self.pod.metadata.deletion_timestamp.is_some()
    }

    /// Creation time, used to order the scheduling queue
    pub fn creation_timestamp(&self) -> Option<&Time> {
        self.pod.metadata.creation_timestamp.as_ref()
    }
}

/// Sum CPU, memory and GPU requests across all containers of a pod
pub fn compute_pod_request(pod: &Pod) -> ResourceQuantity {
    let mut request = ResourceQuantity::ZERO;

    let Some(spec) = &pod.spec else {
        return request;
    };

    for container in &spec.containers {
        let Some(requests) = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
        else {
            continue;
        };

        request.add(&ResourceQuantity::from_k8s_resource_map(requests));
    }

    request
}
