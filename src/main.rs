use clap::Parser;
use sparkwatch::app::{handle_fatal_error, init_logging, AppConfig};
use sparkwatch::cli::{execute_command, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = AppConfig::new(cli.verbose).with_config_path(cli.config.clone());
    init_logging(&config);

    if let Err(e) = execute_command(cli.command, config.config_path.clone()).await {
        handle_fatal_error(e, config.verbose);
    }
}
