use async_trait::async_trait;
use futures::stream::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use super::error::ProcessError;

#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Extra variables layered over the inherited parent environment
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl ProcessCommand {
    /// Program followed by its arguments
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Stdout followed by stderr, the way a `2>&1` capture reads after the fact
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout.trim_end_matches('\n'), self.stderr)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Timeout,
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            _ => None,
        }
    }

    /// Numeric return code as a shell would report it (128 + signal for signals)
    pub fn return_code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Error(code) => *code,
            ExitStatus::Signal(signal) => 128 + signal,
            ExitStatus::Timeout => -1,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "0"),
            ExitStatus::Error(code) => write!(f, "{}", code),
            ExitStatus::Timeout => write!(f, "timeout"),
            ExitStatus::Signal(signal) => write!(f, "signal {}", signal),
        }
    }
}

pub type ProcessStreamItem = Result<String, ProcessError>;
pub type ProcessStreamFut = Pin<Box<dyn Stream<Item = ProcessStreamItem> + Send>>;
pub type ProcessStatusFut =
    Pin<Box<dyn futures::Future<Output = Result<ExitStatus, ProcessError>> + Send>>;

pub struct ProcessStream {
    pub stdout: ProcessStreamFut,
    pub stderr: ProcessStreamFut,
    pub status: ProcessStatusFut,
    /// OS process id, also the process group id of the spawned child
    pub pid: Option<u32>,
}

impl ProcessStream {
    /// Interleave stdout and stderr into a single line stream as lines arrive
    pub fn merged(self) -> (ProcessStreamFut, ProcessStatusFut, Option<u32>) {
        let lines = Box::pin(futures::stream::select(self.stdout, self.stderr)) as ProcessStreamFut;
        (lines, self.status, self.pid)
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError>;
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    /// Normalize a line by removing trailing newlines
    fn normalize_line(mut line: String) -> String {
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        line
    }

    /// Create a line stream from a buffered reader
    fn create_line_stream<R>(reader: tokio::io::BufReader<R>, command: String) -> ProcessStreamFut
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
    {
        use tokio::io::AsyncBufReadExt;

        // The reader is dropped after the first read error so the stream ends
        Box::pin(futures::stream::unfold(
            (Some(reader), command),
            |(reader, command)| async move {
                let mut reader = reader?;
                let mut buf = Vec::new();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => None, // EOF
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        Some((Ok(Self::normalize_line(line)), (Some(reader), command)))
                    }
                    Err(e) => Some((
                        Err(ProcessError::IoError {
                            command: command.clone(),
                            source: e,
                        }),
                        (None, command),
                    )),
                }
            },
        )) as ProcessStreamFut
    }

    /// Create a status future with optional timeout
    fn create_status_future(
        mut child: tokio::process::Child,
        timeout: Option<Duration>,
        command: String,
    ) -> ProcessStatusFut {
        Box::pin(async move {
            let status = if let Some(timeout_duration) = timeout {
                match tokio::time::timeout(timeout_duration, child.wait()).await {
                    Ok(Ok(status)) => Self::parse_exit_status(status),
                    Ok(Err(e)) => return Err(ProcessError::IoError { command, source: e }),
                    Err(_) => {
                        let _ = child.start_kill();
                        ExitStatus::Timeout
                    }
                }
            } else {
                match child.wait().await {
                    Ok(status) => Self::parse_exit_status(status),
                    Err(e) => return Err(ProcessError::IoError { command, source: e }),
                }
            };

            Ok(status)
        })
    }

    /// Log command execution details
    fn log_command_start(command: &ProcessCommand) {
        // Arguments may carry credentials; callers log a masked rendering themselves
        tracing::debug!(
            "Executing subprocess: {} ({} args)",
            command.program,
            command.args.len()
        );

        if !command.env.is_empty() {
            tracing::debug!(
                "Extra environment variables: {}",
                command.env.keys().cloned().collect::<Vec<_>>().join(", ")
            );
        }
    }

    /// Configure the command with its arguments and environment
    fn configure_command(command: &ProcessCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);

        // New process group so a terminate signal reaches the whole submit tree
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd.args(&command.args);

        // Parent environment is inherited; explicit variables take precedence
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        cmd
    }

    /// Wait for process with optional timeout
    async fn wait_with_timeout(
        child: tokio::process::Child,
        timeout: Option<Duration>,
    ) -> Result<std::process::Output, ProcessError> {
        match timeout {
            Some(duration) => {
                match tokio::time::timeout(duration, child.wait_with_output()).await {
                    Ok(result) => result.map_err(ProcessError::Io),
                    Err(_) => Err(ProcessError::Timeout(duration)),
                }
            }
            None => child.wait_with_output().await.map_err(ProcessError::Io),
        }
    }

    /// Convert process exit status to our ExitStatus enum
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    /// Log the process execution result
    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Subprocess '{}' completed successfully in {:?}",
                    command.program,
                    result.duration
                );
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Subprocess '{}' failed with exit code {} in {:?}",
                    command.program,
                    code,
                    result.duration
                );
                if !result.stderr.is_empty() {
                    tracing::trace!("Stderr: {}", result.stderr);
                }
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "Subprocess '{}' terminated by signal {} in {:?}",
                    command.program,
                    signal,
                    result.duration
                );
            }
            ExitStatus::Timeout => {
                tracing::warn!(
                    "Subprocess '{}' timed out after {:?}",
                    command.program,
                    result.duration
                );
            }
        }
    }

    /// Map spawn error to ProcessError
    fn map_spawn_error(error: std::io::Error, command: &ProcessCommand) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(command.program.clone())
        } else {
            ProcessError::SpawnFailed {
                command: command.program.clone(),
                source: error,
            }
        }
    }

    /// Extract a stream from a child process, converting None to error
    fn extract_stream<T>(stream: Option<T>, stream_name: &str) -> Result<T, ProcessError> {
        stream.ok_or_else(|| ProcessError::InternalError {
            message: format!("Failed to capture {}", stream_name),
        })
    }

    /// Extract and create output streams from a child process
    fn create_output_streams(
        child: &mut tokio::process::Child,
        program: &str,
    ) -> Result<(ProcessStreamFut, ProcessStreamFut), ProcessError> {
        use tokio::io::BufReader;

        let stdout = Self::extract_stream(child.stdout.take(), "stdout")?;
        let stdout_stream = Self::create_line_stream(BufReader::new(stdout), program.to_string());

        let stderr_stream = match child.stderr.take() {
            Some(stderr) => Self::create_line_stream(BufReader::new(stderr), program.to_string()),
            None => Box::pin(futures::stream::empty()) as ProcessStreamFut,
        };

        Ok((stdout_stream, stderr_stream))
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = std::time::Instant::now();

        Self::log_command_start(&command);

        let mut cmd = Self::configure_command(&command);
        let child = cmd
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, &command))?;

        let output = Self::wait_with_timeout(child, command.timeout).await?;

        let result = ProcessOutput {
            status: Self::parse_exit_status(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };

        Self::log_result(&result, &command);

        Ok(result)
    }

    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError> {
        Self::log_command_start(&command);

        let mut cmd = Self::configure_command(&command);
        let mut child = cmd.spawn().map_err(|e| {
            tracing::error!(
                "Failed to spawn '{}': {:?} (kind: {:?})",
                command.program,
                e,
                e.kind()
            );
            Self::map_spawn_error(e, &command)
        })?;

        let pid = child.id();
        let (stdout_stream, stderr_stream) = Self::create_output_streams(&mut child, &command.program)?;

        let status_fut =
            Self::create_status_future(child, command.timeout, command.program.clone());

        Ok(ProcessStream {
            stdout: stdout_stream,
            stderr: stderr_stream,
            status: status_fut,
            pid,
        })
    }
}
