use super::*;
use futures::StreamExt;
use std::time::Duration;

#[tokio::test]
async fn test_production_runner_success() {
    let runner = runner::TokioProcessRunner;
    let command = ProcessCommandBuilder::new("echo")
        .arg("hello world")
        .build();

    let output = runner.run(command).await.unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout.trim(), "hello world");
    assert!(output.stderr.is_empty());
}

#[tokio::test]
async fn test_production_runner_failure() {
    let runner = runner::TokioProcessRunner;
    let command = ProcessCommandBuilder::new("false").build();

    let output = runner.run(command).await.unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[tokio::test]
async fn test_production_runner_command_not_found() {
    let runner = runner::TokioProcessRunner;
    let command = ProcessCommandBuilder::new("nonexistent-command-12345").build();

    let result = runner.run(command).await;
    assert!(matches!(
        result.unwrap_err(),
        ProcessError::CommandNotFound(_)
    ));
}

#[tokio::test]
async fn test_production_runner_timeout() {
    let runner = runner::TokioProcessRunner;
    let command = ProcessCommandBuilder::new("sleep")
        .arg("5")
        .timeout(Duration::from_millis(100))
        .build();

    let result = runner.run(command).await;
    assert!(matches!(result.unwrap_err(), ProcessError::Timeout(_)));
}

#[tokio::test]
async fn test_mock_runner_basic() {
    let mut mock = MockProcessRunner::new();

    mock.expect_command("spark-submit")
        .with_args(|args| args == ["--status", "driver-1"])
        .returns_stdout("\"driverState\" : \"RUNNING\",\n")
        .returns_success()
        .finish();

    let output = mock
        .run(
            ProcessCommandBuilder::new("spark-submit")
                .args(["--status", "driver-1"])
                .build(),
        )
        .await
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.contains("RUNNING"));
    assert!(mock.verify_called("spark-submit", 1));
}

#[tokio::test]
async fn test_mock_runner_sequenced_responses() {
    let mut mock = MockProcessRunner::new();

    mock.expect_command("yarn")
        .returns_exit_code(1)
        .times(1)
        .finish();
    mock.expect_command("yarn")
        .returns_success()
        .times(1)
        .finish();

    let first = mock.run(ProcessCommandBuilder::new("yarn").build()).await;
    let second = mock.run(ProcessCommandBuilder::new("yarn").build()).await;
    let third = mock.run(ProcessCommandBuilder::new("yarn").build()).await;

    assert_eq!(first.unwrap().status.code(), Some(1));
    assert!(second.unwrap().status.success());
    assert!(matches!(
        third.unwrap_err(),
        ProcessError::MockExpectationNotMet(_)
    ));
}

#[tokio::test]
async fn test_mock_runner_streaming() {
    let mut mock = MockProcessRunner::new();

    mock.expect_command("spark-submit")
        .returns_stdout("line one\nline two\n")
        .returns_exit_code(2)
        .finish();

    let (lines, status, pid) = mock
        .run_streaming(ProcessCommandBuilder::new("spark-submit").build())
        .await
        .unwrap()
        .merged();

    let lines: Vec<String> = lines.filter_map(|l| async move { l.ok() }).collect().await;
    assert_eq!(lines, vec!["line one", "line two"]);
    assert_eq!(status.await.unwrap(), ExitStatus::Error(2));
    assert!(pid.is_none());
}

#[tokio::test]
async fn test_subprocess_manager_mock() {
    let (manager, mut mock) = SubprocessManager::mock();

    mock.expect_command("kubectl")
        .returns_stdout("driver output\n")
        .finish();

    let output = manager
        .runner()
        .run(ProcessCommandBuilder::new("kubectl").args(["logs", "pod"]).build())
        .await
        .unwrap();

    assert_eq!(output.stdout, "driver output\n");
    assert_eq!(mock.get_call_history()[0].args, vec!["logs", "pod"]);
}

#[test]
fn test_builder_collects_args_env_and_timeout() {
    let command = ProcessCommandBuilder::new("spark-submit")
        .args(["--master", "yarn"])
        .env("SPARK_HOME", "/opt/spark")
        .timeout(Duration::from_secs(30))
        .build();

    assert_eq!(command.argv(), vec!["spark-submit", "--master", "yarn"]);
    assert_eq!(command.env.get("SPARK_HOME").map(String::as_str), Some("/opt/spark"));
    assert_eq!(command.timeout, Some(Duration::from_secs(30)));
}
