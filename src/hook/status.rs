//! Standalone cluster driver status tracking

use std::sync::Arc;

use super::commands::{build_status_query, StatusQuery};
use super::session::{DriverStatus, SharedSession};
use crate::config::{ConnectionDescriptor, TrackingConfig};
use crate::error::{HookError, Result};
use crate::http::HttpClient;
use crate::subprocess::ProcessRunner;

const STATUS_MARKER: &str = "driverState";

/// Extract the driver state from status query output.
///
/// Every line mentioning `driverState` is considered and the last one wins.
/// Output without such a line yields [`DriverStatus::Unknown`].
pub fn parse_driver_status(output: &str) -> DriverStatus {
    let mut status = DriverStatus::Unknown;

    for line in output.lines().map(str::trim) {
        let Some(start) = line.find(STATUS_MARKER) else {
            continue;
        };
        tracing::debug!("spark driver status log: {}", line);

        let after_key = &line[start + STATUS_MARKER.len()..];
        let Some((_, value)) = after_key.split_once(':') else {
            continue;
        };
        let token = value
            .split(',')
            .next()
            .unwrap_or_default()
            .trim_matches(|c: char| c == '"' || c == ',' || c.is_whitespace());
        status = DriverStatus::from_token(token);
    }

    status
}

/// Polls the driver status until it reaches a terminal state
pub struct DriverStatusTracker {
    connection: ConnectionDescriptor,
    config: TrackingConfig,
    runner: Arc<dyn ProcessRunner>,
    http: Arc<dyn HttpClient>,
}

impl DriverStatusTracker {
    pub fn new(
        connection: ConnectionDescriptor,
        config: TrackingConfig,
        runner: Arc<dyn ProcessRunner>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            connection,
            config,
            runner,
            http,
        }
    }

    /// Poll until the session's driver status is terminal and return it.
    ///
    /// A failed query leaves the status unchanged and counts as a missed
    /// report; a failure with `max_missed_status_reports` misses already
    /// recorded aborts tracking.
    pub async fn track_until_terminal(&self, session: &SharedSession) -> Result<DriverStatus> {
        let snapshot = session.snapshot();
        let driver_id = snapshot.standalone_driver_id().map(str::to_string);
        let query = build_status_query(&self.connection, driver_id.as_deref(), self.config.rest_port)?;
        let driver_id = driver_id.unwrap_or_default();

        let mut status = snapshot.driver_status.unwrap_or(DriverStatus::Submitted);
        let mut missed = 0u32;

        while !status.is_terminal() {
            tokio::time::sleep(self.config.status_poll_interval).await;

            tracing::debug!("polling status of spark driver with id {}", driver_id);

            match self.execute(&query).await {
                Ok(output) => {
                    let polled = parse_driver_status(&output);
                    if polled != status {
                        tracing::info!("Driver {} status: {}", driver_id, polled);
                    }
                    status = polled;
                    session.update(|s| s.driver_status = Some(polled));
                }
                Err(failure) => {
                    if missed >= self.config.max_missed_status_reports {
                        return Err(HookError::too_many_missed_reports(
                            &driver_id,
                            self.config.max_missed_status_reports,
                            &failure,
                        ));
                    }
                    missed += 1;
                    tracing::warn!(
                        "Driver status poll failed ({}/{}): {}",
                        missed,
                        self.config.max_missed_status_reports,
                        failure
                    );
                }
            }
        }

        Ok(status)
    }

    /// Run one status query, returning its output or a failure description
    async fn execute(&self, query: &StatusQuery) -> std::result::Result<String, String> {
        match query {
            StatusQuery::Rest { url } => match self.http.get(url).await {
                Ok(response) if response.is_success() => Ok(response.body),
                Ok(response) => Err(format!("status endpoint returned HTTP {}", response.status)),
                Err(e) => Err(e.to_string()),
            },
            StatusQuery::Cli(command) => match self.runner.run(command.clone()).await {
                Ok(output) if output.status.success() => Ok(output.combined()),
                Ok(output) => Err(format!("returncode = {}", output.status)),
                Err(e) => Err(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::hook::session::DriverIdentity;
    use crate::http::{HttpResponse, MockHttpClient};
    use crate::subprocess::MockProcessRunner;
    use std::time::Duration;

    const DRIVER_ID: &str = "driver-20240101120000-0001";
    const REST_URL: &str =
        "http://master:6066/v1/submissions/status/driver-20240101120000-0001";

    fn status_body(state: &str) -> String {
        format!(
            "{{\n  \"action\" : \"SubmissionStatusResponse\",\n  \"driverState\" : \"{}\",\n  \"success\" : true\n}}\n",
            state
        )
    }

    fn tracker(master: &str, runner: &MockProcessRunner, http: &MockHttpClient) -> DriverStatusTracker {
        let config = TrackingConfig {
            status_poll_interval: Duration::ZERO,
            ..TrackingConfig::default()
        };
        DriverStatusTracker::new(
            ConnectionDescriptor::new(master).with_deploy_mode("cluster"),
            config,
            Arc::new(runner.clone()),
            Arc::new(http.clone()),
        )
    }

    fn tracked_session() -> SharedSession {
        let session = SharedSession::new();
        session.update(|s| {
            s.driver_identity = Some(DriverIdentity::StandaloneDriver(DRIVER_ID.to_string()));
            s.driver_status = Some(DriverStatus::Submitted);
        });
        session
    }

    #[test]
    fn test_parse_driver_status() {
        assert_eq!(parse_driver_status(&status_body("RUNNING")), DriverStatus::Running);
        assert_eq!(
            parse_driver_status(r#"{"driverState":"FAILED","workerId":"w-1"}"#),
            DriverStatus::Failed
        );
        assert_eq!(
            parse_driver_status("INFO 12:00:01 \"driverState\" : \"FINISHED\","),
            DriverStatus::Finished
        );
    }

    #[test]
    fn test_parse_driver_status_last_line_wins() {
        let output = format!("{}{}", status_body("RUNNING"), status_body("KILLED"));
        assert_eq!(parse_driver_status(&output), DriverStatus::Killed);
    }

    #[test]
    fn test_parse_driver_status_without_marker_is_unknown() {
        assert_eq!(parse_driver_status(""), DriverStatus::Unknown);
        assert_eq!(
            parse_driver_status("Exception in thread main java.net.ConnectException"),
            DriverStatus::Unknown
        );
        assert_eq!(parse_driver_status("\"driverState\" : \"WAITING\""), DriverStatus::Unknown);
    }

    #[tokio::test]
    async fn test_cli_tracking_stops_at_finished_after_three_polls() {
        let mut runner = MockProcessRunner::new();
        for state in ["SUBMITTED", "RUNNING", "FINISHED"] {
            runner
                .expect_command("spark-submit")
                .with_args(|args| args.iter().any(|a| a == "--status"))
                .returns_stdout(&status_body(state))
                .times(1)
                .finish();
        }
        let http = MockHttpClient::new();
        let session = tracked_session();

        let status = tracker("spark://master:7077", &runner, &http)
            .track_until_terminal(&session)
            .await
            .unwrap();

        assert_eq!(status, DriverStatus::Finished);
        assert!(runner.verify_called("spark-submit", 3));
        assert_eq!(session.snapshot().driver_status, Some(DriverStatus::Finished));
        assert_eq!(
            runner.get_call_history()[0].args,
            vec!["--master", "spark://master:7077", "--status", DRIVER_ID]
        );
    }

    #[tokio::test]
    async fn test_eleven_failures_with_max_ten_aborts() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_command("spark-submit")
            .returns_exit_code(1)
            .finish();
        let session = tracked_session();

        let err = tracker("spark://master:7077", &runner, &MockHttpClient::new())
            .track_until_terminal(&session)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::TRACKING_TOO_MANY_MISSED_REPORTS);
        assert!(runner.verify_called("spark-submit", 11));
        assert!(err.to_string().contains("returncode = 1"));
        assert_eq!(session.snapshot().driver_status, Some(DriverStatus::Submitted));
    }

    #[tokio::test]
    async fn test_ten_failures_then_success_completes() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_command("spark-submit")
            .returns_exit_code(1)
            .times(10)
            .finish();
        runner
            .expect_command("spark-submit")
            .returns_stdout(&status_body("FINISHED"))
            .finish();

        let status = tracker("spark://master:7077", &runner, &MockHttpClient::new())
            .track_until_terminal(&tracked_session())
            .await
            .unwrap();

        assert_eq!(status, DriverStatus::Finished);
        assert!(runner.verify_called("spark-submit", 11));
    }

    #[tokio::test]
    async fn test_missed_reports_are_not_reset_by_success() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_command("spark-submit")
            .returns_exit_code(1)
            .times(6)
            .finish();
        runner
            .expect_command("spark-submit")
            .returns_stdout(&status_body("RUNNING"))
            .times(1)
            .finish();
        runner
            .expect_command("spark-submit")
            .returns_exit_code(1)
            .finish();

        let err = tracker("spark://master:7077", &runner, &MockHttpClient::new())
            .track_until_terminal(&tracked_session())
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::TRACKING_TOO_MANY_MISSED_REPORTS);
        assert!(runner.verify_called("spark-submit", 12));
    }

    #[tokio::test]
    async fn test_rest_tracking_counts_http_errors_as_missed() {
        let runner = MockProcessRunner::new();
        let http = MockHttpClient::new();
        http.respond(
            REST_URL,
            HttpResponse {
                status: 500,
                body: String::new(),
            },
        )
        .respond(REST_URL, HttpResponse::ok(status_body("RUNNING")))
        .respond(REST_URL, HttpResponse::ok(status_body("KILLED")));

        let status = tracker("spark://master:6066", &runner, &http)
            .track_until_terminal(&tracked_session())
            .await
            .unwrap();

        assert_eq!(status, DriverStatus::Killed);
        assert_eq!(http.call_count(REST_URL), 3);
        assert!(runner.get_call_history().is_empty());
    }

    #[tokio::test]
    async fn test_no_driver_id_fails_without_polling() {
        let runner = MockProcessRunner::new();
        let http = MockHttpClient::new();
        let session = SharedSession::new();

        let err = tracker("spark://master:7077", &runner, &http)
            .track_until_terminal(&session)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::PRECONDITION_NO_DRIVER_ID);
        assert!(runner.get_call_history().is_empty());
        assert!(http.calls().is_empty());
    }
}
