//! Agencyflow CLI entry point.

use clap::Parser;

use agencyflow::cli::commands::{init, recur, sync, xref};
use agencyflow::cli::{handle_error, Cli, Commands};
use agencyflow::infrastructure::config::ConfigLoader;
use agencyflow::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli.command, json).await {
        handle_error(err, json);
    }
}

async fn run(command: Commands, json: bool) -> anyhow::Result<()> {
    // init runs before any config exists
    let command = match command {
        Commands::Init(args) => return init::execute(args, json).await,
        other => other,
    };

    let config = ConfigLoader::load()?;
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging))?;

    match command {
        Commands::Init(_) => Ok(()),
        Commands::Recur(args) => recur::execute(args, &config, json).await,
        Commands::Sync(args) => sync::execute(args, &config, json).await,
        Commands::Xref(args) => xref::execute(args, &config, json).await,
    }
}
