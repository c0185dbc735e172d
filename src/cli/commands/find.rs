//! Find command - resolve a selector to a binary path

use crate::cache::BinaryCache;
use crate::cli::args::FindArgs;
use crate::config::{Config, ConfigManager};
use crate::error::InstallResult;
use crate::installer::{FindOptions, Installer};
use crate::process::CancelToken;
use crate::selector::{FallbackPolicy, Selector, DEFAULT_REPO_URL};
use crate::ui::{self, TaskSpinner, UiContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Execute the find command
pub async fn execute(args: FindArgs, config: &Config, verbose: u8) -> InstallResult<()> {
    let ctx = UiContext::detect();
    let selector = selector_from(&args, config)?;

    let cancel = match args.timeout {
        Some(secs) => CancelToken::with_deadline(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    spawn_interrupt_handler(cancel.clone());

    let fallback = if args.fallback_to_source {
        FallbackPolicy::BuildFromSource
    } else {
        config.install.fallback_policy()
    };

    let mut options = FindOptions::new(selector.clone())
        .with_fallback(fallback)
        .with_cancel(cancel);
    if let Some(dir) = args.work_dir {
        options = options.with_work_dir(dir);
    }

    let cache = Arc::new(BinaryCache::new(ConfigManager::work_dir(config)));
    let installer = Installer::from_config(config, cache);

    let show_spinner = verbose == 0 && !args.json;
    let mut spinner = TaskSpinner::new(&ctx);
    if show_spinner {
        spinner.start(&format!("Finding terraform {}", selector));
    }

    let found = match installer.find(options).await {
        Ok(found) => found,
        Err(e) => {
            if show_spinner {
                spinner.stop_error(&format!("Could not find terraform {}", selector));
            }
            return Err(e);
        }
    };
    spinner.clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    if verbose > 0 {
        ui::step_ok(&ctx, &format!("Found terraform {}", selector));
        ui::key_value(&ctx, "version", &found.version);
        ui::key_value(&ctx, "strategy", &found.strategy.to_string());
        ui::key_value(&ctx, "cached", if found.cache_hit { "yes" } else { "no" });
    }
    println!("{}", found.path.display());

    Ok(())
}

/// Build the selector from the positional argument and flags.
///
/// `--repo` (or a non-default `install.repo_url`) only applies to git refs.
fn selector_from(args: &FindArgs, config: &Config) -> InstallResult<Selector> {
    let raw = args.selector.as_deref().unwrap_or("");
    let repo = args.repo.clone().or_else(|| {
        (config.install.repo_url != DEFAULT_REPO_URL).then(|| config.install.repo_url.clone())
    });

    if args.git_ref {
        return Ok(Selector::git_ref(raw, repo, None));
    }

    match Selector::parse(raw)? {
        Selector::GitRef(sel) => Ok(Selector::git_ref(sel.git_ref, repo.or(sel.repo), sel.work_dir)),
        other => Ok(other),
    }
}

fn spawn_interrupt_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling");
            cancel.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;

    fn find_args(argv: &[&str]) -> FindArgs {
        let mut full = vec!["tfinstall", "find"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Find(args) => args,
            _ => panic!("expected Find command"),
        }
    }

    #[test]
    fn version_selector() {
        let sel = selector_from(&find_args(&["1.5.7"]), &Config::default()).unwrap();
        assert_eq!(sel, Selector::exact_version("1.5.7").unwrap());
    }

    #[test]
    fn git_ref_flag_forces_git_ref() {
        let sel = selector_from(&find_args(&["--git-ref", "v0.12"]), &Config::default()).unwrap();
        assert_eq!(sel, Selector::git_ref("v0.12", None, None));
    }

    #[test]
    fn git_ref_flag_alone_is_head() {
        let sel = selector_from(&find_args(&["--git-ref"]), &Config::default()).unwrap();
        assert_eq!(sel.to_string(), "HEAD");
    }

    #[test]
    fn repo_flag_applies_to_parsed_refs() {
        let sel = selector_from(
            &find_args(&["refs/tags/v0.12.29", "--repo", "https://example.com/tf.git"]),
            &Config::default(),
        )
        .unwrap();
        match sel {
            Selector::GitRef(sel) => assert_eq!(sel.repo_url(), "https://example.com/tf.git"),
            _ => panic!("expected git ref"),
        }
    }

    #[test]
    fn configured_repo_is_used_for_refs() {
        let mut config = Config::default();
        config.install.repo_url = "https://mirror.example.com/terraform.git".to_string();
        let sel = selector_from(&find_args(&["refs/heads/main"]), &config).unwrap();
        match sel {
            Selector::GitRef(sel) => {
                assert_eq!(sel.repo_url(), "https://mirror.example.com/terraform.git")
            }
            _ => panic!("expected git ref"),
        }
    }

    #[test]
    fn invalid_selector_is_rejected() {
        assert!(selector_from(&find_args(&["???"]), &Config::default()).is_err());
    }
}
