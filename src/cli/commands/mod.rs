//! Command implementation modules

pub mod kill;
pub mod resolve;
pub mod submit;

pub use kill::run_kill_command;
pub use resolve::run_resolve_command;
pub use submit::{run_submit_command, SubmitParams};

use crate::cli::args::ConnectionArgs;
use crate::config::{ConnectionDescriptor, HookConfig};
use std::path::Path;

/// Load the hook configuration and apply command-line connection overrides
pub(crate) async fn load_config(
    connection: &ConnectionArgs,
    config_path: Option<&Path>,
) -> anyhow::Result<(HookConfig, ConnectionDescriptor)> {
    let config = HookConfig::load(config_path).await?;
    let conn = connection.apply(config.connection_descriptor());
    Ok((config, conn))
}
