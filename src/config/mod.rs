use crate::error::{ErrorCode, HookError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod connection;

pub use connection::ConnectionDescriptor;

pub const CONFIG_FILE_NAME: &str = "sparkwatch.toml";
pub const KUBERNETES_NAMESPACE_CONF: &str = "spark.kubernetes.namespace";

/// Get the platform configuration directory for sparkwatch
pub fn get_global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("io", "sparkwatch", "sparkwatch").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Connection settings as written in the config file; every field optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub master: Option<String>,
    pub deploy_mode: Option<String>,
    pub spark_home: Option<PathBuf>,
    pub spark_binary: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Wait between driver status polls in standalone cluster mode
    #[serde(with = "humantime_serde")]
    pub status_poll_interval: Duration,
    /// Consecutive failed polls tolerated before tracking gives up
    pub max_missed_status_reports: u32,
    /// Master port that selects the REST submission status endpoint
    pub rest_port: u16,
    #[serde(with = "humantime_serde")]
    pub status_request_timeout: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            status_poll_interval: Duration::from_secs(1),
            max_missed_status_reports: 10,
            rest_port: 6066,
            status_request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub enabled: bool,
    /// Base of the resource manager apps API, e.g. `http://rm:8088/ws/v1/cluster/apps`
    pub yarn_rm_url: Option<String>,
    pub max_fetch_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub fetch_retry_delay: Duration,
    pub kubectl_binary: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            yarn_rm_url: None,
            max_fetch_attempts: 10,
            fetch_retry_delay: Duration::from_secs(1),
            kubectl_binary: "kubectl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub connection: ConnectionConfig,
    pub tracking: TrackingConfig,
    pub logs: LogsConfig,
    /// Extra environment for the submit process
    pub env: BTreeMap<String, String>,
    /// Spark configuration properties
    pub conf: BTreeMap<String, String>,
}

impl HookConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration, falling back to defaults when no file is found.
    ///
    /// An explicit `path` must exist; otherwise `SPARKWATCH_CONFIG` and then
    /// the platform config directory are consulted.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(HookError::config_with_code(
                        ErrorCode::CONFIG_NOT_FOUND,
                        format!("config file {} does not exist", path.display()),
                    ));
                }
                Some(path.to_path_buf())
            }
            None => std::env::var_os("SPARKWATCH_CONFIG")
                .map(PathBuf::from)
                .or_else(|| get_global_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME)))
                .filter(|path| path.exists()),
        };

        let mut config = match candidate {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    HookError::config_with_code(
                        ErrorCode::CONFIG_NOT_FOUND,
                        format!("cannot read {}", path.display()),
                    )
                    .with_source(e)
                })?;
                Self::from_toml_str(&content)
                    .map_err(|e| e.with_context(path.display()))?
            }
            None => {
                tracing::info!(
                    "No configuration file found, defaulting to master {}",
                    connection::DEFAULT_MASTER
                );
                Self::default()
            }
        };

        config.merge_env_vars();
        Ok(config)
    }

    pub fn merge_env_vars(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    /// Apply `SPARKWATCH_*` overrides read through `lookup`
    pub fn merge_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let conn = &mut self.connection;
        if let Some(master) = lookup("SPARKWATCH_MASTER") {
            conn.master = Some(master);
        }
        if let Some(deploy_mode) = lookup("SPARKWATCH_DEPLOY_MODE") {
            conn.deploy_mode = Some(deploy_mode);
        }
        if let Some(spark_home) = lookup("SPARKWATCH_SPARK_HOME") {
            conn.spark_home = Some(PathBuf::from(spark_home));
        }
        if let Some(spark_binary) = lookup("SPARKWATCH_SPARK_BINARY") {
            conn.spark_binary = Some(spark_binary);
        }
        if let Some(namespace) = lookup("SPARKWATCH_NAMESPACE") {
            conn.namespace = Some(namespace);
        }
        if let Some(rm_url) = lookup("SPARKWATCH_YARN_RM_URL") {
            self.logs.yarn_rm_url = Some(rm_url);
        }
    }

    /// Resolve the connection, applying defaults and the namespace from
    /// `spark.kubernetes.namespace` when that conf is set
    pub fn connection_descriptor(&self) -> ConnectionDescriptor {
        let conn = &self.connection;
        let defaults = ConnectionDescriptor::default();

        ConnectionDescriptor {
            master: conn.master.clone().unwrap_or(defaults.master),
            deploy_mode: conn.deploy_mode.clone(),
            spark_home: conn.spark_home.clone(),
            spark_binary: conn.spark_binary.clone().unwrap_or(defaults.spark_binary),
            namespace: self
                .conf
                .get(KUBERNETES_NAMESPACE_CONF)
                .cloned()
                .or_else(|| conn.namespace.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[connection]
master = "spark://spark-master:6066"
deploy_mode = "cluster"
spark_home = "/opt/spark"

[tracking]
status_poll_interval = "5s"
max_missed_status_reports = 3

[logs]
yarn_rm_url = "http://rm:8088/ws/v1/cluster/apps"

[env]
HADOOP_CONF_DIR = "/etc/hadoop"

[conf]
"spark.kubernetes.namespace" = "jobs"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = HookConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.tracking.status_poll_interval, Duration::from_secs(5));
        assert_eq!(config.tracking.max_missed_status_reports, 3);
        assert_eq!(config.tracking.rest_port, 6066);
        assert_eq!(config.logs.max_fetch_attempts, 10);
        assert_eq!(config.env.get("HADOOP_CONF_DIR").unwrap(), "/etc/hadoop");

        let conn = config.connection_descriptor();
        assert_eq!(conn.master, "spark://spark-master:6066");
        assert!(conn.is_cluster_mode());
        assert_eq!(conn.spark_binary, "spark-submit");
        assert_eq!(conn.namespace.as_deref(), Some("jobs"));
    }

    #[test]
    fn test_empty_config_defaults_to_yarn() {
        let config = HookConfig::from_toml_str("").unwrap();
        let conn = config.connection_descriptor();
        assert_eq!(conn.master, "yarn");
        assert_eq!(config.tracking.status_poll_interval, Duration::from_secs(1));
        assert_eq!(config.tracking.max_missed_status_reports, 10);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = HookConfig::from_toml_str("[connection\nmaster = ").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_PARSE_ERROR);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SPARKWATCH_MASTER", "k8s://https://api:6443"),
            ("SPARKWATCH_NAMESPACE", "spark"),
            ("SPARKWATCH_YARN_RM_URL", "http://rm/apps"),
        ]
        .into_iter()
        .collect();

        let mut config = HookConfig::default();
        config.merge_env_from(|key| vars.get(key).map(|v| v.to_string()));

        let conn = config.connection_descriptor();
        assert_eq!(conn.master, "k8s://https://api:6443");
        assert_eq!(conn.namespace.as_deref(), Some("spark"));
        assert_eq!(config.logs.yarn_rm_url.as_deref(), Some("http://rm/apps"));
    }

    #[tokio::test]
    async fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[connection]\nmaster = \"local[2]\"\n").unwrap();

        let config = HookConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.connection.master.as_deref(), Some("local[2]"));
    }

    #[tokio::test]
    async fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = HookConfig::load(Some(&dir.path().join("absent.toml")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
    }
}
