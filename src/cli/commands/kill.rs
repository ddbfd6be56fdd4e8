//! Kill command implementation

use anyhow::Result;
use std::path::PathBuf;

use super::load_config;
use crate::cli::args::ConnectionArgs;
use crate::error::HookError;
use crate::hook::SparkSubmitHook;

/// Issue the standalone `--kill` command for a driver
pub async fn run_kill_command(
    driver_id: String,
    connection: ConnectionArgs,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, conn) = load_config(&connection, config_path.as_deref()).await?;
    let hook = SparkSubmitHook::builder(conn).config(config).build()?;

    let code = hook.kill_driver(&driver_id).await?;
    println!("Spark driver {} killed with return code: {}", driver_id, code);

    if code != 0 {
        return Err(HookError::other(format!(
            "kill command for {} exited with {}",
            driver_id, code
        ))
        .into());
    }
    Ok(())
}
