//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::InstallResult;

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> InstallResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config),
        Some(ConfigAction::Path) => {
            println!("{}", manager.path().display());
            Ok(())
        }
    }
}

fn show_config(config: &Config) -> InstallResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    println!("# effective work dir: {}", ConfigManager::work_dir(config).display());
    Ok(())
}
