//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// tfinstall - find, download, or build Terraform binaries
///
/// Resolves a version, git ref, or "latest" to a verified terraform binary
/// and prints its path.
#[derive(Parser, Debug)]
#[command(name = "tfinstall")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "TFINSTALL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find or produce a terraform binary and print its path
    Find(FindArgs),

    /// Inspect or clear cached binaries
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Arguments for the find command
#[derive(Parser, Debug)]
pub struct FindArgs {
    /// Version (1.5.7), git ref (refs/heads/main), commit hash, or "latest"
    #[arg(required_unless_present = "git_ref")]
    pub selector: Option<String>,

    /// Treat SELECTOR as a git ref; omit SELECTOR for the default branch head
    #[arg(long)]
    pub git_ref: bool,

    /// Repository to build git refs from
    #[arg(long, value_name = "URL")]
    pub repo: Option<String>,

    /// Cache/work directory
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Build from the release tag when no release archive exists
    #[arg(long)]
    pub fallback_to_source: bool,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached binaries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Cache/work directory
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
    },

    /// Remove cached binaries and their checkouts
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Cache/work directory
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Binary paths, one per line
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_find() {
        let cli = Cli::parse_from(["tfinstall", "find", "1.5.7", "--fallback-to-source"]);
        match cli.command {
            Commands::Find(args) => {
                assert_eq!(args.selector.as_deref(), Some("1.5.7"));
                assert!(args.fallback_to_source);
                assert!(!args.git_ref);
            }
            _ => panic!("expected Find command"),
        }
    }

    #[test]
    fn cli_parses_find_git_ref() {
        let cli = Cli::parse_from([
            "tfinstall",
            "find",
            "--git-ref",
            "refs/pull/25633/head",
            "--repo",
            "https://example.com/terraform.git",
            "--timeout",
            "600",
        ]);
        match cli.command {
            Commands::Find(args) => {
                assert!(args.git_ref);
                assert_eq!(args.selector.as_deref(), Some("refs/pull/25633/head"));
                assert_eq!(args.repo.as_deref(), Some("https://example.com/terraform.git"));
                assert_eq!(args.timeout, Some(600));
            }
            _ => panic!("expected Find command"),
        }
    }

    #[test]
    fn cli_git_ref_without_selector_is_head() {
        let cli = Cli::parse_from(["tfinstall", "find", "--git-ref"]);
        match cli.command {
            Commands::Find(args) => assert!(args.selector.is_none()),
            _ => panic!("expected Find command"),
        }
    }

    #[test]
    fn cli_find_requires_selector() {
        assert!(Cli::try_parse_from(["tfinstall", "find"]).is_err());
    }

    #[test]
    fn cli_parses_cache_clear() {
        let cli = Cli::parse_from(["tfinstall", "cache", "clear", "--yes"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Clear { yes, work_dir },
            }) => {
                assert!(yes);
                assert!(work_dir.is_none());
            }
            _ => panic!("expected cache clear"),
        }
    }

    #[test]
    fn cli_parses_completions() {
        let cli = Cli::parse_from(["tfinstall", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["tfinstall", "config"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["tfinstall", "-v", "config"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["tfinstall", "-vv", "config", "path"]);
        assert_eq!(cli.verbose, 2);
    }
}
