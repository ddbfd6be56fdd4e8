//! Command routing and execution

use crate::cli::args::Commands;
use crate::cli::commands::*;
use anyhow::Result;
use std::path::PathBuf;

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Commands, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Submit {
            connection,
            poll_interval,
            env,
            cmd,
            tokens,
        } => {
            run_submit_command(SubmitParams {
                connection,
                poll_interval,
                env,
                cmd,
                tokens,
                config_path,
            })
            .await
        }
        Commands::Resolve { connection } => run_resolve_command(connection, config_path).await,
        Commands::Kill {
            driver_id,
            connection,
        } => run_kill_command(driver_id, connection, config_path).await,
    }
}
