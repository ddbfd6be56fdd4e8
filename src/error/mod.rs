use std::fmt::Display;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// The unified error type for submission, tracking and their collaborators
#[derive(Error, Debug)]
pub enum HookError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Invalid state: {message}")]
    Precondition {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Cannot execute: {command}. Error code is: {return_code}.")]
    Submission {
        code: u16,
        /// Masked rendering of the submit command line
        command: String,
        return_code: i32,
        kubernetes_exit_code: Option<i32>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}")]
    Tracking {
        code: u16,
        message: String,
        driver_id: Option<String>,
        status: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        command: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] HTTP error: {message}")]
    Http {
        code: u16,
        message: String,
        url: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HookError {
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn precondition(code: u16, message: impl Into<String>) -> Self {
        Self::Precondition {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attempted a status poll or kill without a discovered driver id
    pub fn missing_driver_id(action: &str) -> Self {
        Self::precondition(
            ErrorCode::PRECONDITION_NO_DRIVER_ID,
            format!(
                "attempted to {} but no driver id is known. Giving up.",
                action
            ),
        )
    }

    pub fn submission(command: impl Into<String>, return_code: i32) -> Self {
        Self::Submission {
            code: ErrorCode::SUBMIT_NONZERO_RETURN,
            command: command.into(),
            return_code,
            kubernetes_exit_code: None,
            source: None,
        }
    }

    /// Submit returned zero but the Kubernetes driver log reported otherwise
    pub fn kubernetes_exit(
        command: impl Into<String>,
        return_code: i32,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Submission {
            code: ErrorCode::SUBMIT_KUBERNETES_EXIT_CODE,
            command: command.into(),
            return_code,
            kubernetes_exit_code: exit_code,
            source: None,
        }
    }

    pub fn bad_final_status(driver_id: &str, status: impl Display) -> Self {
        let status = status.to_string();
        Self::Tracking {
            code: ErrorCode::TRACKING_BAD_FINAL_STATUS,
            message: format!("Driver {} badly exited with status {}", driver_id, status),
            driver_id: Some(driver_id.to_string()),
            status: Some(status),
            source: None,
        }
    }

    pub fn too_many_missed_reports(driver_id: &str, max_missed: u32, last_failure: &str) -> Self {
        Self::Tracking {
            code: ErrorCode::TRACKING_TOO_MANY_MISSED_REPORTS,
            message: format!(
                "Failed to poll for the driver status {} times: {}",
                max_missed, last_failure
            ),
            driver_id: Some(driver_id.to_string()),
            status: None,
            source: None,
        }
    }

    pub fn execution_with_code(
        code: u16,
        message: impl Into<String>,
        command: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            command,
            source: None,
        }
    }

    pub fn http_with_code(code: u16, message: impl Into<String>, url: Option<String>) -> Self {
        Self::Http {
            code,
            message: message.into(),
            url,
            source: None,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Precondition { source: src, .. }
            | Self::Submission { source: src, .. }
            | Self::Tracking { source: src, .. }
            | Self::Execution { source: src, .. }
            | Self::Http { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Precondition { message, .. }
            | Self::Tracking { message, .. }
            | Self::Execution { message, .. }
            | Self::Http { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::Submission { command, .. } => {
                *command = format!("{} ({})", command, context);
            }
        }
        self
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Precondition { .. } => 3,
            Self::Submission { .. } => 4,
            Self::Tracking { .. } => 5,
            Self::Execution { .. } => 6,
            Self::Http { .. } => 7,
            Self::Other { .. } => 1,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Precondition { code, .. }
            | Self::Submission { code, .. }
            | Self::Tracking { code, .. }
            | Self::Execution { code, .. }
            | Self::Http { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Precondition { message, .. } => format!("Invalid state: {}", message),
            Self::Submission {
                command,
                return_code,
                kubernetes_exit_code,
                ..
            } => match kubernetes_exit_code {
                Some(exit_code) => format!(
                    "Cannot execute: {}. Error code is: {} (driver exit code {}).",
                    command, return_code, exit_code
                ),
                None => format!("Cannot execute: {}. Error code is: {}.", command, return_code),
            },
            Self::Tracking { message, .. } => format!("Tracking failed: {}", message),
            Self::Execution {
                message, command, ..
            } => match command {
                Some(cmd) => format!("Command '{}' failed: {}", cmd, message),
                None => format!("Execution error: {}", message),
            },
            Self::Http { message, url, .. } => match url {
                Some(url) => format!("Request to {} failed: {}", url, message),
                None => format!("HTTP error: {}", message),
            },
            Self::Other { message, .. } => message.clone(),
        }
    }

    /// Get a developer-friendly error message with full chain
    pub fn developer_message(&self) -> String {
        use std::error::Error as _;

        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        message
    }
}

/// Type alias for Results using HookError
pub type Result<T> = std::result::Result<T, HookError>;

impl From<toml::de::Error> for HookError {
    fn from(err: toml::de::Error) -> Self {
        HookError::config_with_code(ErrorCode::CONFIG_PARSE_ERROR, "Invalid TOML syntax")
            .with_source(err)
    }
}

impl From<serde_json::Error> for HookError {
    fn from(err: serde_json::Error) -> Self {
        HookError::http_with_code(ErrorCode::HTTP_DECODE, "Invalid JSON response", None)
            .with_source(err)
    }
}
