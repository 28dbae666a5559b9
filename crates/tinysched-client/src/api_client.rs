use crate::error::{ClientError, Result};
use k8s_openapi::api::core::v1::{Binding, Node, ObjectReference, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::Request;
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How to reach and authenticate against the API server
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Explicit kubeconfig file. Takes precedence over inference.
    pub kubeconfig: Option<PathBuf>,
    /// Override for the API server URL. Without a kubeconfig this connects
    /// unauthenticated, which is only useful against local test servers.
    pub api_url: Option<String>,
    /// Upper bound for every request
    pub request_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            api_url: None,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Client for the Kubernetes API the scheduler observes and binds through
pub struct ApiClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl ApiClient {
    /// Resolve connection settings and build a client.
    ///
    /// Order: `kubeconfig` if given; otherwise `api_url` if given; otherwise
    /// `KUBECONFIG` or `~/.kube/config`, falling back to the in-cluster
    /// service account.
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let mut config = match (&options.kubeconfig, &options.api_url) {
            (Some(path), _) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    ClientError::config_error(format!(
                        "Failed to read kubeconfig file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        ClientError::config_error(format!(
                            "Failed to create config from kubeconfig {}: {}",
                            path.display(),
                            e
                        ))
                    })?
            }
            (None, Some(url)) => config_for_url(url)?,
            (None, None) => Config::infer().await.map_err(|e| {
                ClientError::config_error(format!("Failed to infer cluster config: {}", e))
            })?,
        };

        if let (Some(_), Some(url)) = (&options.kubeconfig, &options.api_url) {
            config.cluster_url = config_for_url(url)?.cluster_url;
        }

        info!("Using API server at {}", config.cluster_url);
        Self::from_config(config, options.request_timeout)
    }

    /// Unauthenticated client for a plain URL. Must be called inside a Tokio runtime.
    pub fn for_url(url: &str, request_timeout: Duration) -> Result<Self> {
        Self::from_config(config_for_url(url)?, request_timeout)
    }

    /// Build from a resolved config. Must be called inside a Tokio runtime.
    pub fn from_config(config: Config, request_timeout: Duration) -> Result<Self> {
        let base_url = config.cluster_url.to_string().trim_end_matches('/').to_string();
        let client = Client::try_from(config).map_err(|e| {
            ClientError::config_error(format!("Failed to create Kubernetes client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    /// GET /api/v1/nodes
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list("/api/v1/nodes").await
    }

    /// GET /api/v1/pods
    pub async fn list_pods(&self) -> Result<Vec<Pod>> {
        self.list("/api/v1/pods").await
    }

    /// POST /api/v1/namespaces/{namespace}/pods/{name}/binding
    pub async fn bind_pod(
        &self,
        namespace: &str,
        name: &str,
        uid: Option<&str>,
        node_name: &str,
    ) -> Result<()> {
        let path = format!("/api/v1/namespaces/{}/pods", namespace);
        debug!("POST {}{}/{}/binding (target node {})", self.base_url, path, name, node_name);

        let binding = Binding {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: uid.map(str::to_string),
                ..Default::default()
            },
            target: ObjectReference {
                kind: Some("Node".to_string()),
                api_version: Some("v1".to_string()),
                name: Some(node_name.to_string()),
                ..Default::default()
            },
        };
        let body = serde_json::to_vec(&binding).map_err(|e| {
            ClientError::serialization_error(format!("Failed to encode binding: {}", e))
        })?;

        let request = Request::new(path)
            .create_subresource("binding", name, &PostParams::default(), body)
            .map_err(|e| ClientError::internal_error(format!("Failed to build binding request: {}", e)))?;

        let operation = format!("bind {}/{}", namespace, name);
        self.send(&operation, self.client.request_text(request))
            .await?;
        Ok(())
    }

    /// GET a list endpoint and decode its `items`, skipping entries that fail to parse
    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        debug!("GET {}{}", self.base_url, path);

        let request = Request::new(path)
            .list(&ListParams::default())
            .map_err(|e| ClientError::internal_error(format!("Failed to build list request: {}", e)))?;

        let operation = format!("list {}", path);
        let body: serde_json::Value = self
            .send(&operation, self.client.request(request))
            .await?;

        let items = body["items"].as_array().cloned().unwrap_or_default();
        let mut objects = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value(item) {
                Ok(object) => objects.push(object),
                Err(e) => warn!("Failed to parse item from {}: {}", path, e),
            }
        }

        Ok(objects)
    }

    /// Await a request under `request_timeout`, mapping transport and API errors
    async fn send<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(kube::Error::Api(resp))) => Err(ClientError::api_error(
                resp.code,
                format!("{} failed: {}", operation, resp.message),
            )),
            Ok(Err(kube::Error::SerdeError(e))) => Err(ClientError::serialization_error(
                format!("Failed to parse {} response: {}", operation, e),
            )),
            Ok(Err(e)) => Err(ClientError::http_error(&self.base_url, e.to_string())),
            Err(_) => Err(ClientError::timeout(operation, self.request_timeout)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Unauthenticated config pointing at `url`
fn config_for_url(url: &str) -> Result<Config> {
    let cluster_url = url
        .parse::<http::Uri>()
        .map_err(|e| ClientError::config_error(format!("Invalid API server URL '{}': {}", url, e)))?;
    Ok(Config::new(cluster_url))
}
