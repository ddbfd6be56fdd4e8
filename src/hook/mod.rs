//! Spark job submission and lifecycle tracking
//!
//! [`SparkSubmitHook`] runs one `spark-submit` invocation at a time. While
//! the submit process runs, its combined output is classified line by line
//! to discover the driver identity for the selected backend. Standalone
//! cluster jobs are then tracked by polling the driver status until it is
//! terminal. Driver logs are fetched on a best-effort basis after the job
//! ends, and [`SparkSubmitHook::cancel`] tears down whatever the job has
//! started so far.

pub mod backend;
pub mod classifier;
pub mod commands;
pub mod driver_logs;
pub mod kubernetes;
pub mod session;
pub mod status;

#[cfg(test)]
mod tests;

pub use backend::{BackendKind, BackendResolution};
pub use classifier::{LineObserver, LogClassifier, TracingObserver};
pub use commands::{mask_command, SubmitCommand};
pub use kubernetes::{MockPodManager, PodManager};
pub use session::{DriverIdentity, DriverStatus, FailureReason, JobOutcome, JobSession, SharedSession};

use std::sync::Arc;

use crate::config::{ConnectionDescriptor, HookConfig};
use crate::error::{ErrorCode, HookError, Result};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::subprocess::{ProcessRunner, SubprocessManager};
use commands::{build_kill_command, build_submit_command, build_yarn_kill_command, render_command};
use driver_logs::DriverLogFetcher;
use status::DriverStatusTracker;

/// What `cancel()` attempted and how each attempt ended.
///
/// `None` means the action did not apply to this job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelReport {
    /// Return code of the standalone `--kill` command
    pub driver_kill: Option<std::result::Result<i32, String>>,
    /// SIGTERM delivered to the submit process group
    pub submit_terminated: Option<std::result::Result<u32, String>>,
    /// Return code of `yarn application -kill`
    pub yarn_kill: Option<std::result::Result<i32, String>>,
    /// Kubernetes API response for the driver pod deletion
    pub pod_delete: Option<std::result::Result<String, String>>,
}

impl CancelReport {
    pub fn attempted(&self) -> bool {
        self.driver_kill.is_some()
            || self.submit_terminated.is_some()
            || self.yarn_kill.is_some()
            || self.pod_delete.is_some()
    }

    /// Failure descriptions of every attempted action
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        if let Some(Err(e)) = &self.driver_kill {
            failures.push(format!("driver kill: {}", e));
        }
        if let Some(Err(e)) = &self.submit_terminated {
            failures.push(format!("submit process: {}", e));
        }
        if let Some(Err(e)) = &self.yarn_kill {
            failures.push(format!("yarn kill: {}", e));
        }
        if let Some(Err(e)) = &self.pod_delete {
            failures.push(format!("pod delete: {}", e));
        }
        failures
    }
}

pub struct SparkSubmitHook {
    connection: ConnectionDescriptor,
    resolution: BackendResolution,
    config: HookConfig,
    runner: Arc<dyn ProcessRunner>,
    http: Arc<dyn HttpClient>,
    pods: Option<Arc<dyn PodManager>>,
    observer: Arc<dyn LineObserver>,
    session: SharedSession,
}

pub struct SparkSubmitHookBuilder {
    connection: ConnectionDescriptor,
    config: HookConfig,
    runner: Option<Arc<dyn ProcessRunner>>,
    http: Option<Arc<dyn HttpClient>>,
    pods: Option<Arc<dyn PodManager>>,
    observer: Option<Arc<dyn LineObserver>>,
}

impl SparkSubmitHookBuilder {
    pub fn config(mut self, config: HookConfig) -> Self {
        self.config = config;
        self
    }

    pub fn runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn pod_manager(mut self, pods: Arc<dyn PodManager>) -> Self {
        self.pods = Some(pods);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Resolve the backend and fill in production collaborators.
    ///
    /// Fails when the master is Kubernetes and no pod manager is available.
    pub fn build(self) -> Result<SparkSubmitHook> {
        let resolution = BackendResolution::resolve(&self.connection);
        tracing::debug!(
            "Resolved backend {} for master {} (track driver status: {})",
            resolution.kind,
            self.connection.master,
            resolution.track_driver_status
        );

        let pods = self.pods.or_else(default_pod_manager);
        if resolution.is_kubernetes && pods.is_none() {
            return Err(HookError::config_with_code(
                ErrorCode::CONFIG_BACKEND_UNAVAILABLE,
                "kubernetes master selected but kubernetes support is not available; \
                 rebuild with the `kubernetes` feature",
            ));
        }

        let http = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::new(
                self.config.tracking.status_request_timeout,
            )?),
        };

        Ok(SparkSubmitHook {
            connection: self.connection,
            resolution,
            config: self.config,
            runner: self
                .runner
                .unwrap_or_else(|| SubprocessManager::production().runner()),
            http,
            pods,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            session: SharedSession::new(),
        })
    }
}

#[cfg(feature = "kubernetes")]
fn default_pod_manager() -> Option<Arc<dyn PodManager>> {
    Some(Arc::new(kubernetes::KubePodManager::new()))
}

#[cfg(not(feature = "kubernetes"))]
fn default_pod_manager() -> Option<Arc<dyn PodManager>> {
    None
}

impl SparkSubmitHook {
    pub fn builder(connection: ConnectionDescriptor) -> SparkSubmitHookBuilder {
        SparkSubmitHookBuilder {
            connection,
            config: HookConfig::default(),
            runner: None,
            http: None,
            pods: None,
            observer: None,
        }
    }

    pub fn connection(&self) -> &ConnectionDescriptor {
        &self.connection
    }

    pub fn resolution(&self) -> &BackendResolution {
        &self.resolution
    }

    /// Copy of the current job state
    pub fn session(&self) -> JobSession {
        self.session.snapshot()
    }

    /// Submit the job and wait for it to end.
    ///
    /// `Ok` always carries [`JobOutcome::Success`]; a failed job is returned
    /// as a Submission or Tracking error naming the reason.
    pub async fn submit(&self, command: &SubmitCommand) -> Result<JobOutcome> {
        self.session.reset();

        let process = build_submit_command(&self.connection, command, &self.config.env);
        let rendered = render_command(&process.argv());
        tracing::info!("Spark-Submit cmd: {}", rendered);

        let (lines, status, pid) = self.runner.run_streaming(process).await?.merged();
        self.session.update(|s| {
            s.submit_pid = pid;
            s.submit_running = true;
        });

        let classifier = LogClassifier::for_backend(&self.resolution);
        let line_count = classifier
            .consume(lines, &self.session, self.observer.as_ref())
            .await;
        let exit = status.await;
        self.session.update(|s| s.submit_running = false);
        let return_code = exit?.return_code();
        tracing::debug!(
            "spark-submit exited with {} after {} lines",
            return_code,
            line_count
        );

        let snapshot = self.session.snapshot();
        let verdict = JobOutcome::from_submit_exit(
            return_code,
            self.resolution.is_kubernetes,
            snapshot.kubernetes_exit_code,
        );
        if let JobOutcome::Failure(reason) = verdict {
            tracing::debug!("Submission failed: {}", reason);
            self.emit_driver_logs().await;
            return Err(match reason {
                FailureReason::KubernetesExitCode { exit_code, .. } => {
                    HookError::kubernetes_exit(rendered, return_code, exit_code)
                }
                _ => HookError::submission(rendered, return_code),
            });
        }

        tracing::debug!(
            "Should track driver: {}",
            self.resolution.track_driver_status
        );
        if self.resolution.track_driver_status {
            let Some(driver_id) = snapshot.standalone_driver_id() else {
                return Err(HookError::precondition(
                    ErrorCode::PRECONDITION_NO_DRIVER_ID,
                    "No driver id is known: something went wrong when executing the spark submit command",
                ));
            };

            self.session
                .update(|s| s.driver_status = Some(DriverStatus::Submitted));
            let final_status = self.tracker().track_until_terminal(&self.session).await?;

            if let JobOutcome::Failure(reason) =
                JobOutcome::from_driver_status(driver_id, final_status)
            {
                tracing::debug!("Tracking failed: {}", reason);
                return Err(HookError::bad_final_status(driver_id, final_status));
            }
        }

        self.emit_driver_logs().await;
        Ok(JobOutcome::Success)
    }

    /// Tear down whatever the current job has started.
    ///
    /// Every applicable action is attempted even when an earlier one fails.
    pub async fn cancel(&self) -> CancelReport {
        tracing::debug!("Kill command is being called");

        let snapshot = self.session.snapshot();
        let mut report = CancelReport::default();

        if self.resolution.track_driver_status {
            if let Some(driver_id) = snapshot.standalone_driver_id() {
                tracing::info!("Killing driver {} on cluster", driver_id);
                let result = self.kill_driver(driver_id).await;
                match &result {
                    Ok(code) => tracing::info!(
                        "Spark driver {} killed with return code: {}",
                        driver_id,
                        code
                    ),
                    Err(e) => tracing::warn!("Failed to kill driver {}: {}", driver_id, e),
                }
                report.driver_kill = Some(result.map_err(|e| e.user_message()));
            }
        }

        if let (true, Some(pid)) = (snapshot.submit_running, snapshot.submit_pid) {
            tracing::info!(
                "Sending kill signal to {}",
                self.connection.spark_binary
            );
            let result = terminate_process_group(pid).map(|()| pid);
            if let Err(e) = &result {
                tracing::warn!("Failed to signal submit process {}: {}", pid, e);
            }
            report.submit_terminated = Some(result);
        }

        if let Some(app_id) = snapshot.yarn_application_id() {
            tracing::info!("Killing application {} on YARN", app_id);
            let result = self
                .runner
                .run(build_yarn_kill_command(
                    app_id,
                    Some(self.config.tracking.status_request_timeout),
                ))
                .await
                .map(|output| output.status.return_code())
                .map_err(|e| e.to_string());
            match &result {
                Ok(code) => tracing::info!("YARN killed with return code: {}", code),
                Err(e) => tracing::warn!("Failed to kill YARN application {}: {}", app_id, e),
            }
            report.yarn_kill = Some(result);
        }

        if let Some(pod) = snapshot.kubernetes_driver_pod() {
            tracing::info!("Killing pod {} on Kubernetes", pod);
            let result = match &self.pods {
                Some(pods) => pods
                    .delete_pod(pod, self.connection.namespace.as_deref())
                    .await
                    .map_err(|e| e.user_message()),
                None => Err("no kubernetes pod manager configured".to_string()),
            };
            match &result {
                Ok(response) => tracing::info!("Spark on K8s killed with response: {}", response),
                Err(e) => tracing::info!("Exception when attempting to kill Spark on K8s: {}", e),
            }
            report.pod_delete = Some(result);
        }

        report
    }

    /// Run the standalone `--kill` command for a driver and return its code
    pub async fn kill_driver(&self, driver_id: &str) -> Result<i32> {
        let mut command = build_kill_command(&self.connection, Some(driver_id))?;
        command.timeout = Some(self.config.tracking.status_request_timeout);
        tracing::debug!("Spark-Kill cmd: {}", render_command(&command.argv()));
        let output = self.runner.run(command).await?;
        Ok(output.status.return_code())
    }

    fn tracker(&self) -> DriverStatusTracker {
        DriverStatusTracker::new(
            self.connection.clone(),
            self.config.tracking.clone(),
            Arc::clone(&self.runner),
            Arc::clone(&self.http),
        )
    }

    async fn emit_driver_logs(&self) {
        let fetcher = DriverLogFetcher::new(
            self.config.logs.clone(),
            self.connection.namespace.clone(),
            Arc::clone(&self.runner),
            Arc::clone(&self.http),
        );
        fetcher
            .emit(&self.resolution, &self.session.snapshot())
            .await;
    }
}

#[cfg(unix)]
fn terminate_process_group(pid: u32) -> std::result::Result<(), String> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid).map_err(|_| format!("invalid process id {}", pid))?;
    kill(Pid::from_raw(-pgid), Signal::SIGTERM).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn terminate_process_group(pid: u32) -> std::result::Result<(), String> {
    Err(format!(
        "cannot signal process {} on this platform",
        pid
    ))
}
