use super::*;
use crate::config::{LogsConfig, TrackingConfig};
use crate::http::MockHttpClient;
use crate::subprocess::MockProcessRunner;
use std::sync::Mutex;
use std::time::Duration;

const DRIVER_ID: &str = "driver-20240101120000-0001";

#[derive(Default)]
struct CollectingObserver(Mutex<Vec<String>>);

impl LineObserver for CollectingObserver {
    fn observe(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

fn quiet_config() -> HookConfig {
    HookConfig {
        tracking: TrackingConfig {
            status_poll_interval: Duration::ZERO,
            ..TrackingConfig::default()
        },
        logs: LogsConfig {
            enabled: false,
            ..LogsConfig::default()
        },
        ..HookConfig::default()
    }
}

fn hook(conn: ConnectionDescriptor, runner: &MockProcessRunner) -> SparkSubmitHook {
    SparkSubmitHook::builder(conn)
        .config(quiet_config())
        .runner(Arc::new(runner.clone()))
        .http_client(Arc::new(MockHttpClient::new()))
        .pod_manager(Arc::new(MockPodManager::new()))
        .build()
        .unwrap()
}

fn not_status_query(args: &[String]) -> bool {
    !args.iter().any(|a| a == "--status" || a == "--kill")
}

fn status_output(state: &str) -> String {
    format!("{{\n  \"driverState\" : \"{}\",\n}}\n", state)
}

fn standalone() -> ConnectionDescriptor {
    ConnectionDescriptor::new("spark://master:7077").with_deploy_mode("cluster")
}

fn kubernetes() -> ConnectionDescriptor {
    ConnectionDescriptor::new("k8s://https://api:6443")
        .with_deploy_mode("cluster")
        .with_namespace("jobs")
}

#[tokio::test]
async fn test_yarn_cluster_submit_records_first_application_id() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .returns_stdout(
            "INFO Client: Submitting application application_1700000000000_0042\n\
             INFO Client: Application report for application_1700000000000_0042 (state: FINISHED)\n",
        )
        .finish();
    let hook = hook(ConnectionDescriptor::new("yarn").with_deploy_mode("cluster"), &runner);

    let outcome = hook
        .submit(&SubmitCommand::from_tokens(["--master", "yarn", "app.py"]))
        .await
        .unwrap();

    assert_eq!(outcome, JobOutcome::Success);
    let session = hook.session();
    assert_eq!(
        session.yarn_application_id(),
        Some("application_1700000000000_0042")
    );
    assert!(!session.submit_running);
}

#[tokio::test]
async fn test_nonzero_return_code_fails_with_masked_command() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .returns_stderr("Exception in thread \"main\" java.lang.IllegalArgumentException\n")
        .returns_exit_code(1)
        .finish();
    let hook = hook(ConnectionDescriptor::new("local[2]"), &runner);

    let err = hook
        .submit(&SubmitCommand::from_tokens([
            "--conf",
            "spark.foo.password='topsecret'",
            "app.py",
        ]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SUBMIT_NONZERO_RETURN);
    assert_eq!(
        err.to_string(),
        "[E3001] Cannot execute: spark-submit --conf spark.foo.password='******' app.py. Error code is: 1."
    );
    assert!(!err.user_message().contains("topsecret"));
}

#[tokio::test]
async fn test_kubernetes_exit_code_overrides_zero_return_code() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .returns_stdout(
            "\t pod name: spark-pi-1a2b3c-driver\n\
             \t exit code: 0\n\
             \t pod name: spark-pi-4d5e6f-driver\n\
             \t exit code: 137\n",
        )
        .finish();
    let hook = hook(kubernetes(), &runner);

    let err = hook
        .submit(&SubmitCommand::from_tokens(["local:///opt/app.jar"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SUBMIT_KUBERNETES_EXIT_CODE);
    let session = hook.session();
    assert_eq!(session.kubernetes_driver_pod(), Some("spark-pi-4d5e6f-driver"));
    assert_eq!(session.kubernetes_exit_code, Some(137));
}

#[tokio::test]
async fn test_kubernetes_without_reported_exit_code_fails() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .returns_stdout("\t pod name: spark-pi-1a2b3c-driver\n")
        .finish();
    let hook = hook(kubernetes(), &runner);

    let err = hook
        .submit(&SubmitCommand::from_tokens(["local:///opt/app.jar"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SUBMIT_KUBERNETES_EXIT_CODE);
}

#[tokio::test]
async fn test_kubernetes_failure_emits_driver_log() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .returns_stdout("\t pod name: spark-pi-1a2b3c-driver\n\t exit code: 1\n")
        .finish();
    runner
        .expect_command("kubectl")
        .with_args(|args| args == ["logs", "-n", "jobs", "spark-pi-1a2b3c-driver"])
        .returns_stdout("java.lang.OutOfMemoryError\n")
        .finish();
    let mut config = quiet_config();
    config.logs.enabled = true;
    let hook = SparkSubmitHook::builder(kubernetes())
        .config(config)
        .runner(Arc::new(runner.clone()))
        .http_client(Arc::new(MockHttpClient::new()))
        .pod_manager(Arc::new(MockPodManager::new()))
        .build()
        .unwrap();

    let err = hook
        .submit(&SubmitCommand::from_tokens(["local:///opt/app.jar"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SUBMIT_KUBERNETES_EXIT_CODE);
    assert!(runner.verify_called("kubectl", 1));
}

#[tokio::test]
async fn test_standalone_cluster_tracks_driver_until_finished() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .with_args(not_status_query)
        .returns_stderr(&format!(
            "INFO RestSubmissionClient: Submission successfully created as {}\n",
            DRIVER_ID
        ))
        .finish();
    for state in ["RUNNING", "FINISHED"] {
        runner
            .expect_command("spark-submit")
            .with_args(|args| args.iter().any(|a| a == "--status"))
            .returns_stdout(&status_output(state))
            .times(1)
            .finish();
    }
    let hook = hook(standalone(), &runner);

    let outcome = hook
        .submit(&SubmitCommand::from_tokens(["app.jar"]))
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(runner.verify_called("spark-submit", 3));
    let session = hook.session();
    assert_eq!(session.standalone_driver_id(), Some(DRIVER_ID));
    assert_eq!(session.driver_status, Some(DriverStatus::Finished));
}

#[tokio::test]
async fn test_standalone_bad_final_status_fails() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .with_args(not_status_query)
        .returns_stdout(&format!("Driver successfully submitted as {}\n", DRIVER_ID))
        .finish();
    runner
        .expect_command("spark-submit")
        .with_args(|args| args.iter().any(|a| a == "--status"))
        .returns_stdout(&status_output("FAILED"))
        .finish();
    let hook = hook(standalone(), &runner);

    let err = hook
        .submit(&SubmitCommand::from_tokens(["app.jar"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::TRACKING_BAD_FINAL_STATUS);
    assert_eq!(
        err.to_string(),
        format!("[E4001] Driver {} badly exited with status FAILED", DRIVER_ID)
    );
}

#[tokio::test]
async fn test_standalone_without_driver_id_is_precondition_error() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .with_args(not_status_query)
        .returns_stdout("WARN could not reach master\n")
        .finish();
    let hook = hook(standalone(), &runner);

    let err = hook
        .submit(&SubmitCommand::from_tokens(["app.jar"]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::PRECONDITION_NO_DRIVER_ID);
    assert!(runner.verify_called("spark-submit", 1));
}

#[tokio::test]
async fn test_observer_sees_every_trimmed_line_and_env_is_passed() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("/opt/spark/bin/spark-submit")
        .returns_stdout("  line one  \n\tline two\n")
        .finish();
    let observer = Arc::new(CollectingObserver::default());
    let mut config = quiet_config();
    config
        .env
        .insert("HADOOP_CONF_DIR".to_string(), "/etc/hadoop".to_string());
    let hook = SparkSubmitHook::builder(ConnectionDescriptor::new("local").with_spark_home("/opt/spark"))
        .config(config)
        .runner(Arc::new(runner.clone()))
        .http_client(Arc::new(MockHttpClient::new()))
        .observer(observer.clone())
        .build()
        .unwrap();

    hook.submit(&SubmitCommand::from_tokens(["app.py"]))
        .await
        .unwrap();

    assert_eq!(*observer.0.lock().unwrap(), vec!["line one", "line two"]);
    let submitted = &runner.get_call_history()[0];
    assert_eq!(submitted.env.get("HADOOP_CONF_DIR").unwrap(), "/etc/hadoop");
}

#[tokio::test]
async fn test_resubmission_starts_from_a_clean_session() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .returns_stdout("Submitted application application_1_1\n")
        .times(1)
        .finish();
    runner
        .expect_command("spark-submit")
        .returns_stdout("nothing to see\n")
        .finish();
    let hook = hook(ConnectionDescriptor::new("yarn").with_deploy_mode("cluster"), &runner);
    let command = SubmitCommand::from_tokens(["app.py"]);

    hook.submit(&command).await.unwrap();
    assert_eq!(hook.session().yarn_application_id(), Some("application_1_1"));

    hook.submit(&command).await.unwrap();
    assert_eq!(hook.session().driver_identity, None);
}

#[cfg(not(feature = "kubernetes"))]
#[test]
fn test_kubernetes_master_requires_pod_manager() {
    let err = SparkSubmitHook::builder(kubernetes())
        .runner(Arc::new(MockProcessRunner::new()))
        .http_client(Arc::new(MockHttpClient::new()))
        .build()
        .err()
        .unwrap();

    assert_eq!(err.code(), ErrorCode::CONFIG_BACKEND_UNAVAILABLE);
}

#[cfg(feature = "kubernetes")]
#[test]
fn test_kubernetes_master_gets_default_pod_manager() {
    let hook = SparkSubmitHook::builder(kubernetes())
        .runner(Arc::new(MockProcessRunner::new()))
        .http_client(Arc::new(MockHttpClient::new()))
        .build()
        .unwrap();

    assert!(hook.resolution().is_kubernetes);
}

#[tokio::test]
async fn test_cancel_before_submit_does_nothing() {
    let runner = MockProcessRunner::new();
    let hook = hook(standalone(), &runner);

    let report = hook.cancel().await;

    assert!(!report.attempted());
    assert!(runner.get_call_history().is_empty());
}

#[tokio::test]
async fn test_cancel_kills_standalone_driver() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("spark-submit")
        .with_args(|args| args.iter().any(|a| a == "--kill"))
        .finish();
    let hook = hook(standalone(), &runner);
    hook.session.update(|s| {
        s.driver_identity = Some(DriverIdentity::StandaloneDriver(DRIVER_ID.to_string()))
    });

    let report = hook.cancel().await;

    assert_eq!(report.driver_kill, Some(Ok(0)));
    assert_eq!(
        runner.get_call_history()[0].args,
        vec!["--master", "spark://master:7077", "--kill", DRIVER_ID]
    );
    assert_eq!(
        runner.get_call_history()[0].timeout,
        Some(TrackingConfig::default().status_request_timeout)
    );
}

#[tokio::test]
async fn test_cancel_kills_yarn_application() {
    let mut runner = MockProcessRunner::new();
    runner
        .expect_command("yarn")
        .with_args(|args| args == ["application", "-kill", "application_1_2"])
        .finish();
    let hook = hook(ConnectionDescriptor::new("yarn").with_deploy_mode("cluster"), &runner);
    hook.session.update(|s| {
        s.driver_identity = Some(DriverIdentity::YarnApplication("application_1_2".to_string()))
    });

    let report = hook.cancel().await;

    assert_eq!(report.yarn_kill, Some(Ok(0)));
    assert_eq!(report.driver_kill, None);
    assert!(report.failures().is_empty());
    assert_eq!(
        runner.get_call_history()[0].timeout,
        Some(TrackingConfig::default().status_request_timeout)
    );
}

#[tokio::test]
async fn test_cancel_deletes_kubernetes_pod_in_namespace() {
    let pods = MockPodManager::new();
    let hook = SparkSubmitHook::builder(kubernetes())
        .config(quiet_config())
        .runner(Arc::new(MockProcessRunner::new()))
        .http_client(Arc::new(MockHttpClient::new()))
        .pod_manager(Arc::new(pods.clone()))
        .build()
        .unwrap();
    hook.session.update(|s| {
        s.driver_identity = Some(DriverIdentity::KubernetesPod("spark-pi-1a2b3c-driver".to_string()))
    });

    let report = hook.cancel().await;

    assert!(matches!(report.pod_delete, Some(Ok(_))));
    assert_eq!(
        pods.deleted(),
        vec![(
            "spark-pi-1a2b3c-driver".to_string(),
            Some("jobs".to_string())
        )]
    );
}

#[tokio::test]
async fn test_cancel_failures_are_reported_not_raised() {
    let hook = SparkSubmitHook::builder(kubernetes())
        .config(quiet_config())
        .runner(Arc::new(MockProcessRunner::new()))
        .http_client(Arc::new(MockHttpClient::new()))
        .pod_manager(Arc::new(MockPodManager::failing("pods is forbidden")))
        .build()
        .unwrap();
    hook.session.update(|s| {
        s.driver_identity = Some(DriverIdentity::KubernetesPod("spark-pi-1a2b3c-driver".to_string()))
    });

    let report = hook.cancel().await;

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("pods is forbidden"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_cancel_terminates_running_submit_process_group() {
    use std::os::unix::process::{CommandExt, ExitStatusExt};

    let mut child = std::process::Command::new("sleep")
        .arg("30")
        .process_group(0)
        .spawn()
        .unwrap();
    let runner = MockProcessRunner::new();
    let hook = hook(ConnectionDescriptor::new("local"), &runner);
    hook.session.update(|s| {
        s.submit_pid = Some(child.id());
        s.submit_running = true;
    });

    let report = hook.cancel().await;

    assert_eq!(report.submit_terminated, Some(Ok(child.id())));
    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(15));
}
