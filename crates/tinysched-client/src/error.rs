// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for control plane access
#[derive(Error, Debug, Diagnostic)]
pub enum ClientError {
    /// Transport-level failure
    #[error("HTTP request to {url} failed: {message}")]
    #[diagnostic(
        code(tinysched::client::http_error),
        help("Check that the API server is reachable from this host")
    )]
    HttpError {
        #[allow(unused)]
        url: String,
        #[allow(unused)]
        message: String,
    },

    /// The API server answered with a non-success status
    #[error("API server returned {status}: {message}")]
    #[diagnostic(
        code(tinysched::client::api_error),
        help("Inspect the API server logs for the rejected request")
    )]
    ApiError {
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        message: String,
    },

    /// A request did not complete in time
    #[error("{operation} timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(tinysched::client::timeout),
        help("The API server accepted the request but did not answer. Check its health or raise --api-timeout-secs")
    )]
    Timeout {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        timeout_ms: u64,
    },

    /// Connection settings could not be loaded
    #[error("Invalid cluster configuration: {message}")]
    #[diagnostic(
        code(tinysched::client::config_error),
        help("Pass --kubeconfig, set KUBECONFIG, or run inside the cluster with a service account")
    )]
    ConfigError {
        #[allow(unused)]
        message: String,
    },

    /// The snapshot has not completed its first listing yet
    #[error("Cluster snapshot has not synced yet")]
    #[diagnostic(
        code(tinysched::client::not_synced),
        help("Wait for the informer to complete its first listing")
    )]
    NotSynced,

    /// Response body could not be decoded
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(tinysched::client::serialization_error),
        help("The API server response did not match the expected shape")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(tinysched::client::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Create an HttpError
    pub fn http_error(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HttpError {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an ApiError
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
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

    /// Create a ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
