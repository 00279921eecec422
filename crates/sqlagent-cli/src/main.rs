use clap::Parser;
use eyre::Result;
use tracing_subscriber::EnvFilter;

use sqlagent_cli::cli::Cli;
use sqlagent_cli::{commands, config};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = config::load_config()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let logs = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    commands::run(cli.command, config).await
}
