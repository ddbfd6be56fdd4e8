//! # sparkwatch
//!
//! Submits one Spark job through `spark-submit`, discovers its driver from the
//! submit output, follows the driver to completion and fetches its logs.
//!
//! ## Usage
//!
//! ```bash
//! sparkwatch submit --master spark://master:7077 --deploy-mode cluster -- app.jar
//! ```
//!
//! ## Modules
//!
//! - `app` - Logging setup and fatal error reporting for the binary
//! - `cli` - Command-line arguments and command implementations
//! - `config` - Connection descriptor and hook configuration loading
//! - `error` - Unified error type with numeric error codes
//! - `hook` - Backend resolution, output classification, status tracking and cancellation
//! - `http` - HTTP GET capability for status polling and log retrieval
//! - `subprocess` - Subprocess abstraction with a mock runner for testing
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod hook;
pub mod http;
pub mod subprocess;
