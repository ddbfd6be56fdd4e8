use crate::error::{ErrorCode, HookError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while running '{command}': {source}")]
    IoError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

/// Convert ProcessError to HookError
impl From<ProcessError> for HookError {
    fn from(err: ProcessError) -> Self {
        let (code, command) = match &err {
            ProcessError::CommandNotFound(cmd) => (ErrorCode::EXEC_COMMAND_NOT_FOUND, Some(cmd.clone())),
            ProcessError::Timeout(_) => (ErrorCode::EXEC_TIMEOUT, None),
            ProcessError::SpawnFailed { command, .. } => {
                (ErrorCode::EXEC_SPAWN_FAILED, Some(command.clone()))
            }
            ProcessError::IoError { .. } | ProcessError::Io(_) => (ErrorCode::EXEC_OUTPUT_ERROR, None),
            ProcessError::InternalError { .. } => (ErrorCode::EXEC_ENVIRONMENT_ERROR, None),
            ProcessError::MockExpectationNotMet(_) => (ErrorCode::EXEC_GENERIC, None),
        };

        HookError::execution_with_code(code, err.to_string(), command).with_source(err)
    }
}
