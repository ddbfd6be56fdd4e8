//! CLI argument structures

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConnectionDescriptor;

/// Submit a Spark job, track its driver and fetch its logs
#[derive(Parser)]
#[command(name = "sparkwatch")]
#[command(about = "sparkwatch - Submit Spark jobs and follow them to completion", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection overrides; anything unset comes from the config file
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Master URL (yarn, spark://HOST:PORT, k8s://https://HOST:PORT, local[*])
    #[arg(long)]
    pub master: Option<String>,

    /// Deploy mode (client or cluster)
    #[arg(long)]
    pub deploy_mode: Option<String>,

    /// Spark installation; the binary is looked up under its bin/ directory
    #[arg(long)]
    pub spark_home: Option<PathBuf>,

    /// Name of the submit binary
    #[arg(long)]
    pub spark_binary: Option<String>,

    /// Kubernetes namespace of the driver pod
    #[arg(long)]
    pub namespace: Option<String>,
}

impl ConnectionArgs {
    pub fn apply(&self, mut conn: ConnectionDescriptor) -> ConnectionDescriptor {
        if let Some(master) = &self.master {
            conn.master = master.clone();
        }
        if let Some(deploy_mode) = &self.deploy_mode {
            conn.deploy_mode = Some(deploy_mode.clone());
        }
        if let Some(spark_home) = &self.spark_home {
            conn.spark_home = Some(spark_home.clone());
        }
        if let Some(spark_binary) = &self.spark_binary {
            conn.spark_binary = spark_binary.clone();
        }
        if let Some(namespace) = &self.namespace {
            conn.namespace = Some(namespace.clone());
        }
        conn
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a job and wait until it finishes
    #[command(name = "submit")]
    Submit {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Seconds between driver status polls
        #[arg(long, value_name = "SECONDS")]
        poll_interval: Option<u64>,

        /// Extra environment variable for the submit process
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        env: Vec<(String, String)>,

        /// Submit arguments as a single shell-quoted string
        #[arg(long, conflicts_with = "tokens", allow_hyphen_values = true)]
        cmd: Option<String>,

        /// Submit arguments, after `--`
        #[arg(last = true)]
        tokens: Vec<String>,
    },

    /// Show which backend a master resolves to
    #[command(name = "resolve")]
    Resolve {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Kill a standalone cluster driver
    #[command(name = "kill")]
    Kill {
        /// Driver id, e.g. driver-20240101120000-0001
        #[arg(long)]
        driver_id: String,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
