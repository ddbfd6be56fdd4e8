use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_MASTER: &str = "yarn";
pub const DEFAULT_SPARK_BINARY: &str = "spark-submit";

/// Where and how a job is submitted. Resolved once per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// local, yarn, spark://HOST:PORT, mesos://HOST:PORT or k8s://https://HOST:PORT
    pub master: String,
    pub deploy_mode: Option<String>,
    pub spark_home: Option<PathBuf>,
    pub spark_binary: String,
    pub namespace: Option<String>,
}

impl Default for ConnectionDescriptor {
    fn default() -> Self {
        Self {
            master: DEFAULT_MASTER.to_string(),
            deploy_mode: None,
            spark_home: None,
            spark_binary: DEFAULT_SPARK_BINARY.to_string(),
            namespace: None,
        }
    }
}

impl ConnectionDescriptor {
    pub fn new(master: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            ..Self::default()
        }
    }

    pub fn with_deploy_mode(mut self, deploy_mode: impl Into<String>) -> Self {
        self.deploy_mode = Some(deploy_mode.into());
        self
    }

    pub fn with_spark_home(mut self, spark_home: impl Into<PathBuf>) -> Self {
        self.spark_home = Some(spark_home.into());
        self
    }

    pub fn with_spark_binary(mut self, spark_binary: impl Into<String>) -> Self {
        self.spark_binary = spark_binary.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn is_cluster_mode(&self) -> bool {
        self.deploy_mode.as_deref() == Some("cluster")
    }

    /// `{spark_home}/bin/{binary}` when a home is configured, else the bare
    /// binary name resolved through PATH
    pub fn spark_binary_path(&self) -> String {
        match &self.spark_home {
            Some(home) => home
                .join("bin")
                .join(&self.spark_binary)
                .to_string_lossy()
                .into_owned(),
            None => self.spark_binary.clone(),
        }
    }
}
