//! Tinysched Client - control plane access for the scheduler
//!
//! This crate provides:
//! - A Kubernetes API client for listing nodes and pods and posting bindings
//! - A polling informer that keeps a lagging snapshot of the cluster
//! - `ObservedCluster`, the `ClusterClient` the scheduler runs against

pub mod api_client;
pub mod cluster;
pub mod error;
pub mod informer;

pub use api_client::{ApiClient, ConnectOptions};
pub use cluster::ObservedCluster;
pub use error::{ClientError, Result};
pub use informer::{InformerConfig, SnapshotInformer};
