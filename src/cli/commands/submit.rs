//! Submit command implementation

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::load_config;
use crate::cli::args::ConnectionArgs;
use crate::error::{ErrorCode, HookError};
use crate::hook::{SparkSubmitHook, SubmitCommand};

pub struct SubmitParams {
    pub connection: ConnectionArgs,
    pub poll_interval: Option<u64>,
    pub env: Vec<(String, String)>,
    pub cmd: Option<String>,
    pub tokens: Vec<String>,
    pub config_path: Option<PathBuf>,
}

/// Submit the job and wait for it; Ctrl-C cancels the job
pub async fn run_submit_command(params: SubmitParams) -> Result<()> {
    let (mut config, connection) =
        load_config(&params.connection, params.config_path.as_deref()).await?;

    if let Some(secs) = params.poll_interval {
        config.tracking.status_poll_interval = Duration::from_secs(secs);
    }
    config.env.extend(params.env);

    let command = match params.cmd {
        Some(cmd) => SubmitCommand::parse(&cmd)?,
        None if params.tokens.is_empty() => {
            return Err(HookError::precondition(
                ErrorCode::PRECONDITION_EMPTY_COMMAND,
                "no submit arguments given; pass them after `--` or with --cmd",
            )
            .into())
        }
        None => SubmitCommand::from_tokens(params.tokens),
    }
    .with_connection_args(&connection, &config.conf);

    let hook = SparkSubmitHook::builder(connection).config(config).build()?;

    let submit = hook.submit(&command);
    tokio::pin!(submit);

    let outcome = tokio::select! {
        result = &mut submit => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling the job");
            let report = hook.cancel().await;
            for failure in report.failures() {
                warn!("Cancellation incomplete: {}", failure);
            }
            submit.await?
        }
    };

    let session = hook.session();
    match session.driver_identity {
        Some(identity) => info!("Job {} completed: {:?}", identity, outcome),
        None => info!("Job completed: {:?}", outcome),
    }

    Ok(())
}
