//! Per-job session state: driver identity, driver status and exit signals

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Backend-specific handle on the submitted driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverIdentity {
    /// YARN application id, e.g. `application_1234_5678`
    YarnApplication(String),
    /// Kubernetes driver pod name, e.g. `app-1a2b-driver`
    KubernetesPod(String),
    /// Standalone cluster driver id, e.g. `driver-20240101120000-0001`
    StandaloneDriver(String),
}

impl DriverIdentity {
    pub fn as_str(&self) -> &str {
        match self {
            DriverIdentity::YarnApplication(id)
            | DriverIdentity::KubernetesPod(id)
            | DriverIdentity::StandaloneDriver(id) => id,
        }
    }
}

impl fmt::Display for DriverIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standalone cluster driver states as reported by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// Submitted but not yet scheduled on a worker
    Submitted,
    /// Allocated to a worker and running
    Running,
    /// Ran and exited cleanly
    Finished,
    /// Exited non-zero or lost its worker, waiting to run again
    Relaunching,
    /// Temporarily unknown, e.g. during master failure recovery
    Unknown,
    /// Killed by a user
    Killed,
    /// Exited non-zero and was not supervised
    Failed,
    /// Could not run or restart (e.g. missing jar)
    Error,
}

impl DriverStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DriverStatus::Finished
                | DriverStatus::Unknown
                | DriverStatus::Killed
                | DriverStatus::Failed
                | DriverStatus::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DriverStatus::Submitted => "SUBMITTED",
            DriverStatus::Running => "RUNNING",
            DriverStatus::Finished => "FINISHED",
            DriverStatus::Relaunching => "RELAUNCHING",
            DriverStatus::Unknown => "UNKNOWN",
            DriverStatus::Killed => "KILLED",
            DriverStatus::Failed => "FAILED",
            DriverStatus::Error => "ERROR",
        }
    }

    /// Parse a status token; anything unrecognised is `Unknown`
    pub fn from_token(token: &str) -> Self {
        token.parse().unwrap_or(DriverStatus::Unknown)
    }
}

impl FromStr for DriverStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" => Ok(DriverStatus::Submitted),
            "RUNNING" => Ok(DriverStatus::Running),
            "FINISHED" => Ok(DriverStatus::Finished),
            "RELAUNCHING" => Ok(DriverStatus::Relaunching),
            "UNKNOWN" => Ok(DriverStatus::Unknown),
            "KILLED" => Ok(DriverStatus::Killed),
            "FAILED" => Ok(DriverStatus::Failed),
            "ERROR" => Ok(DriverStatus::Error),
            other => Err(format!("unrecognised driver status: {}", other)),
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    ReturnCode(i32),
    KubernetesExitCode {
        return_code: i32,
        exit_code: Option<i32>,
    },
    DriverStatus {
        driver_id: String,
        status: DriverStatus,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ReturnCode(code) => write!(f, "submit returned {}", code),
            FailureReason::KubernetesExitCode {
                exit_code: Some(code),
                ..
            } => write!(f, "driver pod exited with code {}", code),
            FailureReason::KubernetesExitCode {
                exit_code: None, ..
            } => write!(f, "driver pod exit code was never reported"),
            FailureReason::DriverStatus { driver_id, status } => {
                write!(f, "driver {} ended with status {}", driver_id, status)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure(FailureReason),
}

impl JobOutcome {
    /// Verdict after the submit process exits.
    ///
    /// On Kubernetes the driver's own exit code in the log must also be 0; a
    /// log that never reported one counts as a failure.
    pub fn from_submit_exit(return_code: i32, is_kubernetes: bool, exit_code: Option<i32>) -> Self {
        if return_code != 0 {
            JobOutcome::Failure(FailureReason::ReturnCode(return_code))
        } else if is_kubernetes && exit_code != Some(0) {
            JobOutcome::Failure(FailureReason::KubernetesExitCode {
                return_code,
                exit_code,
            })
        } else {
            JobOutcome::Success
        }
    }

    /// Verdict after driver status tracking ends
    pub fn from_driver_status(driver_id: &str, status: DriverStatus) -> Self {
        if status == DriverStatus::Finished {
            JobOutcome::Success
        } else {
            JobOutcome::Failure(FailureReason::DriverStatus {
                driver_id: driver_id.to_string(),
                status,
            })
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSession {
    pub driver_identity: Option<DriverIdentity>,
    pub driver_status: Option<DriverStatus>,
    /// Exit code scraped from Kubernetes submit output
    pub kubernetes_exit_code: Option<i32>,
    /// Driver identity matches seen so far, across all lines
    pub identity_matches: usize,
    pub submit_pid: Option<u32>,
    pub submit_running: bool,
}

impl JobSession {
    pub fn yarn_application_id(&self) -> Option<&str> {
        match &self.driver_identity {
            Some(DriverIdentity::YarnApplication(id)) => Some(id),
            _ => None,
        }
    }

    pub fn kubernetes_driver_pod(&self) -> Option<&str> {
        match &self.driver_identity {
            Some(DriverIdentity::KubernetesPod(pod)) => Some(pod),
            _ => None,
        }
    }

    pub fn standalone_driver_id(&self) -> Option<&str> {
        match &self.driver_identity {
            Some(DriverIdentity::StandaloneDriver(id)) => Some(id),
            _ => None,
        }
    }
}

/// Session shared between the submitting task and `cancel()`.
///
/// The lock is only held for short synchronous reads and writes, never
/// across an await point.
#[derive(Debug, Clone, Default)]
pub struct SharedSession(Arc<Mutex<JobSession>>);

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JobSession> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> JobSession {
        self.lock().clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut JobSession) -> R) -> R {
        f(&mut self.lock())
    }

    /// Clear all state before the hook is reused for another submission
    pub fn reset(&self) {
        *self.lock() = JobSession::default();
    }
}
