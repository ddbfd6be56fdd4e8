//! Kubernetes driver pod deletion used when a job is cancelled

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{ErrorCode, HookError, Result};

#[async_trait]
pub trait PodManager: Send + Sync {
    /// Delete a pod, returning a short description of the API response.
    /// Without a namespace the client's default namespace is used.
    async fn delete_pod(&self, name: &str, namespace: Option<&str>) -> Result<String>;
}

#[cfg(feature = "kubernetes")]
pub use client::KubePodManager;

#[cfg(feature = "kubernetes")]
mod client {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;
    use kube::api::DeleteParams;
    use kube::core::Status;
    use kube::Api;
    use tokio::sync::OnceCell;

    /// Pod deletion through the Kubernetes API, using the ambient kubeconfig
    /// or in-cluster service account
    pub struct KubePodManager {
        client: OnceCell<kube::Client>,
    }

    impl KubePodManager {
        pub fn new() -> Self {
            Self {
                client: OnceCell::new(),
            }
        }

        async fn client(&self) -> Result<kube::Client> {
            let client = self
                .client
                .get_or_try_init(kube::Client::try_default)
                .await
                .map_err(|e| {
                    HookError::execution_with_code(
                        ErrorCode::EXEC_ENVIRONMENT_ERROR,
                        "cannot create kubernetes client",
                        None,
                    )
                    .with_source(e)
                })?;
            Ok(client.clone())
        }
    }

    impl Default for KubePodManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PodManager for KubePodManager {
        async fn delete_pod(&self, name: &str, namespace: Option<&str>) -> Result<String> {
            let client = self.client().await?;
            let pods: Api<Pod> = match namespace {
                Some(namespace) => Api::namespaced(client, namespace),
                None => Api::default_namespaced(client),
            };

            let response = pods
                .delete(name, &DeleteParams::default())
                .await
                .map_err(|e| {
                    HookError::execution_with_code(
                        ErrorCode::EXEC_GENERIC,
                        format!("failed to delete pod {}", name),
                        None,
                    )
                    .with_source(e)
                })?;

            Ok(response.either(
                |_pod| format!("deletion of pod {} started", name),
                |status| describe_status(name, &status),
            ))
        }
    }

    pub(super) fn describe_status(name: &str, status: &Status) -> String {
        match &status.status {
            Some(summary) => format!("pod {} deleted: {:?}", name, summary),
            None => format!("pod {} deleted: unknown", name),
        }
    }
}

/// Records deletions instead of calling a cluster
#[derive(Clone, Default)]
pub struct MockPodManager {
    deleted: Arc<Mutex<Vec<(String, Option<String>)>>>,
    failure: Option<String>,
}

impl MockPodManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn deleted(&self) -> Vec<(String, Option<String>)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl PodManager for MockPodManager {
    async fn delete_pod(&self, name: &str, namespace: Option<&str>) -> Result<String> {
        self.deleted
            .lock()
            .unwrap()
            .push((name.to_string(), namespace.map(str::to_string)));

        match &self.failure {
            Some(message) => Err(HookError::execution_with_code(
                ErrorCode::EXEC_GENERIC,
                message.clone(),
                None,
            )),
            None => Ok(format!("pod {} deleted", name)),
        }
    }
}
