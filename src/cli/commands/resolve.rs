//! Resolve command implementation

use anyhow::Result;
use std::path::PathBuf;

use super::load_config;
use crate::cli::args::ConnectionArgs;
use crate::hook::BackendResolution;

/// Print the backend a master resolves to and whether its driver is tracked
pub async fn run_resolve_command(
    connection: ConnectionArgs,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, conn) = load_config(&connection, config_path.as_deref()).await?;
    let resolution = BackendResolution::resolve(&conn);

    println!("master: {}", conn.master);
    println!(
        "deploy mode: {}",
        conn.deploy_mode.as_deref().unwrap_or("client")
    );
    println!("backend: {}", resolution.kind);
    println!("track driver status: {}", resolution.track_driver_status);
    println!("binary: {}", conn.spark_binary_path());

    Ok(())
}
