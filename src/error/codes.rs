/// Error code registry for sparkwatch
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Precondition errors
/// - 3000-3999: Submission errors
/// - 4000-4999: Tracking errors
/// - 5000-5999: Execution errors
/// - 6000-6999: HTTP errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1003;
    pub const CONFIG_BACKEND_UNAVAILABLE: u16 = 1004;

    // Precondition errors (2000-2999)
    pub const PRECONDITION_GENERIC: u16 = 2000;
    pub const PRECONDITION_NO_DRIVER_ID: u16 = 2001;
    pub const PRECONDITION_EMPTY_COMMAND: u16 = 2002;

    // Submission errors (3000-3999)
    pub const SUBMIT_GENERIC: u16 = 3000;
    pub const SUBMIT_NONZERO_RETURN: u16 = 3001;
    pub const SUBMIT_KUBERNETES_EXIT_CODE: u16 = 3002;

    // Tracking errors (4000-4999)
    pub const TRACKING_GENERIC: u16 = 4000;
    pub const TRACKING_BAD_FINAL_STATUS: u16 = 4001;
    pub const TRACKING_TOO_MANY_MISSED_REPORTS: u16 = 4002;

    // Execution errors (5000-5999)
    pub const EXEC_GENERIC: u16 = 5000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 5001;
    pub const EXEC_TIMEOUT: u16 = 5002;
    pub const EXEC_SPAWN_FAILED: u16 = 5003;
    pub const EXEC_OUTPUT_ERROR: u16 = 5004;
    pub const EXEC_ENVIRONMENT_ERROR: u16 = 5005;

    // HTTP errors (6000-6999)
    pub const HTTP_GENERIC: u16 = 6000;
    pub const HTTP_TRANSPORT: u16 = 6001;
    pub const HTTP_STATUS: u16 = 6002;
    pub const HTTP_DECODE: u16 = 6003;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Short human description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "Configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file could not be parsed",
        ErrorCode::CONFIG_INVALID_VALUE => "Configuration value is invalid",
        ErrorCode::CONFIG_BACKEND_UNAVAILABLE => "Backend support is not available",
        ErrorCode::PRECONDITION_GENERIC => "Precondition violated",
        ErrorCode::PRECONDITION_NO_DRIVER_ID => "No driver id is known",
        ErrorCode::PRECONDITION_EMPTY_COMMAND => "Submit command is empty",
        ErrorCode::SUBMIT_GENERIC => "Submission failed",
        ErrorCode::SUBMIT_NONZERO_RETURN => "Submit process returned a non-zero code",
        ErrorCode::SUBMIT_KUBERNETES_EXIT_CODE => "Kubernetes driver reported a non-zero exit code",
        ErrorCode::TRACKING_GENERIC => "Driver tracking failed",
        ErrorCode::TRACKING_BAD_FINAL_STATUS => "Driver ended in a non-FINISHED status",
        ErrorCode::TRACKING_TOO_MANY_MISSED_REPORTS => "Too many failed driver status polls",
        ErrorCode::EXEC_GENERIC => "Execution error",
        ErrorCode::EXEC_COMMAND_NOT_FOUND => "Command not found",
        ErrorCode::EXEC_TIMEOUT => "Command timed out",
        ErrorCode::EXEC_SPAWN_FAILED => "Command could not be spawned",
        ErrorCode::EXEC_OUTPUT_ERROR => "Command output could not be read",
        ErrorCode::EXEC_ENVIRONMENT_ERROR => "Process environment error",
        ErrorCode::HTTP_GENERIC => "HTTP error",
        ErrorCode::HTTP_TRANSPORT => "HTTP request could not be sent",
        ErrorCode::HTTP_STATUS => "HTTP request returned an error status",
        ErrorCode::HTTP_DECODE => "HTTP response could not be decoded",
        _ => "Unknown error",
    }
}
