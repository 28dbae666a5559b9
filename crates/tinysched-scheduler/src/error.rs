// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// Listing cluster state failed
    #[error("Failed to observe cluster state: {message}")]
    #[diagnostic(
        code(scheduler::observation_failed),
        help("The control plane may be unreachable. The next cycle will retry")
    )]
    Observation {
        #[allow(unused)]
        message: String,
    },

    /// No node survived filtering
    #[error("No feasible nodes found for pod {pod_name}: {reason}")]
    #[diagnostic(
        code(scheduler::no_feasible_nodes),
        help("Check node allocatable resources against the pod's requests")
    )]
    NoFeasibleNodes {
        #[allow(unused)]
        pod_name: String,
        #[allow(unused)]
        reason: String,
    },

    /// Scoring produced no winner
    #[error("No node selected for pod {pod_name}")]
    #[diagnostic(
        code(scheduler::no_winner_selected),
        help("Check that at least one score plugin is configured")
    )]
    NoWinnerSelected {
        #[allow(unused)]
        pod_name: String,
    },

    /// The binding call failed
    #[error("Failed to bind pod {pod_name} to node {node_name}: {message}")]
    #[diagnostic(
        code(scheduler::bind_failed),
        help("The pod stays pending and is retried in the next cycle")
    )]
    BindFailed {
        #[allow(unused)]
        pod_name: String,
        #[allow(unused)]
        node_name: String,
        #[allow(unused)]
        message: String,
    },

    /// A control plane call did not complete in time
    #[error("{operation} timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(scheduler::timeout),
        help("Increase the API timeout or check control plane latency")
    )]
    Timeout {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        timeout_ms: u64,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create an Observation error
    pub fn observation(message: impl Into<String>) -> Self {
        Self::Observation {
            message: message.into(),
        }
    }

    /// Create a NoFeasibleNodes error
    pub fn no_feasible_nodes(pod_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoFeasibleNodes {
            pod_name: pod_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a NoWinnerSelected error
    pub fn no_winner_selected(pod_name: impl Into<String>) -> Self {
        Self::NoWinnerSelected {
            pod_name: pod_name.into(),
        }
    }

    /// Create a BindFailed error
    pub fn bind_failed(
        pod_name: impl Into<String>,
        node_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BindFailed {
            pod_name: pod_name.into(),
            node_name: node_name.into(),
            message: message.into(),
        }
    }

    /// Create a Timeout error
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
