//! tfinstall - find, download, or build Terraform binaries
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tfinstall::cli::{Cli, Commands};
use tfinstall::config::ConfigManager;
use tfinstall::error::InstallResult;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> InstallResult<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        tfinstall::cli::commands::completions(shell);
        return Ok(());
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let verbose = cli.verbose.max(u8::from(config.general.verbose));
    let filter = match verbose {
        0 => EnvFilter::new("tfinstall=warn"),
        1 => EnvFilter::new("tfinstall=info"),
        _ => EnvFilter::new("tfinstall=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    match cli.command {
        Commands::Completions { .. } => unreachable!("Completions handled above"),
        Commands::Find(args) => tfinstall::cli::commands::find(args, &config, verbose).await,
        Commands::Cache(args) => tfinstall::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            tfinstall::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
