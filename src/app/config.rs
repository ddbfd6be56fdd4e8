//! Application configuration
//!
//! Settings that apply to the process as a whole rather than to a job.

use std::path::PathBuf;

/// Target on which forwarded spark-submit output is logged
pub const SUBMIT_OUTPUT_TARGET: &str = "spark_submit";

/// Application configuration structure
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Explicit hook configuration file
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            config_path: None,
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Get the log filter based on verbosity.
    ///
    /// Forwarded submit output is logged at TRACE and stays visible at every
    /// verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info,spark_submit=trace",
            1 => "debug,spark_submit=trace,hyper=info,reqwest=info",
            2 => "trace,hyper=info,reqwest=info,h2=info",
            _ => "trace",
        }
    }
}
