use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{
    ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, ProcessStream, ProcessStreamFut,
};

/// Scripted process runner for tests.
///
/// Expectations are matched in registration order. An expectation limited with
/// [`MockCommandConfig::times`] stops matching once used up, so registering
/// several limited expectations for the same program scripts a sequence of
/// responses.
#[derive(Clone)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: ProcessOutput,
    times_called: usize,
    expected_times: Option<usize>,
}

impl MockExpectation {
    fn matches(&self, command: &ProcessCommand) -> bool {
        self.program == command.program
            && self
                .args_matcher
                .as_ref()
                .map_or(true, |matcher| matcher(&command.args))
    }

    fn exhausted(&self) -> bool {
        self.expected_times
            .is_some_and(|expected| self.times_called >= expected)
    }
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                },
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        self.call_count(program) == times
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.call_history
            .lock()
            .unwrap()
            .iter()
            .filter(|cmd| cmd.program == program)
            .count()
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn reset(&mut self) {
        self.expectations.lock().unwrap().clear();
        self.call_history.lock().unwrap().clear();
    }

    fn respond(&self, command: &ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.call_history.lock().unwrap().push(command.clone());

        let mut expectations = self.expectations.lock().unwrap();
        let mut saw_exhausted = false;

        for expectation in expectations.iter_mut() {
            if !expectation.matches(command) {
                continue;
            }
            if expectation.exhausted() {
                saw_exhausted = true;
                continue;
            }

            expectation.times_called += 1;
            return Ok(expectation.response.clone());
        }

        if saw_exhausted {
            return Err(ProcessError::MockExpectationNotMet(format!(
                "Command '{}' called more times than expected",
                command.program
            )));
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {} {:?}",
            command.program, command.args
        )))
    }

    fn line_stream(text: &str) -> ProcessStreamFut {
        let lines: Vec<_> = text.lines().map(|line| Ok(line.to_string())).collect();
        Box::pin(futures::stream::iter(lines))
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.respond(&command)
    }

    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError> {
        let output = self.respond(&command)?;
        let status = output.status.clone();

        Ok(ProcessStream {
            stdout: Self::line_stream(&output.stdout),
            stderr: Self::line_stream(&output.stderr),
            status: Box::pin(async move { Ok(status) }),
            pid: None,
        })
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response.status = ExitStatus::Success;
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
