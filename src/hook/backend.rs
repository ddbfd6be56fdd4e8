//! Backend identity resolution from the master endpoint

use crate::config::ConnectionDescriptor;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Yarn,
    Kubernetes,
    StandaloneCluster,
    /// Client mode, local, mesos, or anything unrecognised
    Other,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Yarn => "yarn",
            BackendKind::Kubernetes => "kubernetes",
            BackendKind::StandaloneCluster => "standalone-cluster",
            BackendKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Backend facts derived once per job. Never fails: unrecognised masters
/// resolve to [`BackendKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendResolution {
    pub kind: BackendKind,
    pub is_yarn: bool,
    pub is_kubernetes: bool,
    /// Poll the driver status after submission (standalone cluster mode only)
    pub track_driver_status: bool,
    pub cluster_mode: bool,
}

impl BackendResolution {
    pub fn resolve(conn: &ConnectionDescriptor) -> Self {
        let master = conn.master.as_str();
        let is_yarn = master.contains("yarn");
        let is_kubernetes = master.contains("k8s");
        let cluster_mode = conn.is_cluster_mode();
        let track_driver_status = master.starts_with("spark://") && cluster_mode;

        let kind = if is_yarn {
            BackendKind::Yarn
        } else if is_kubernetes {
            BackendKind::Kubernetes
        } else if track_driver_status {
            BackendKind::StandaloneCluster
        } else {
            BackendKind::Other
        };

        Self {
            kind,
            is_yarn,
            is_kubernetes,
            track_driver_status,
            cluster_mode,
        }
    }
}
