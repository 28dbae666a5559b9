//! Tinysched Core - Resource accounting for the tinysched pod scheduler
//!
//! This crate provides:
//! - Exact multi-dimensional resource quantities (CPU, memory, GPU)
//! - Kubernetes quantity parsing
//! - Pod and node descriptors derived from k8s-openapi objects
//! - Error types with miette diagnostics

pub mod error;
pub mod node_info;
pub mod pod_info;
pub mod resources;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use node_info::NodeInfo;
pub use pod_info::{pod_key, PodInfo, DEFAULT_SCHEDULER_NAME, POD_PHASE_PENDING};
pub use resources::{ResourceQuantity, RESOURCE_CPU, RESOURCE_MEMORY, RESOURCE_NVIDIA_GPU};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Node, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Deserialize a resource from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}
