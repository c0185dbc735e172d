//! Cache command - inspect and clear cached binaries

use crate::cache::{BinaryCache, CacheEntry};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::InstallResult;
use crate::ui::{self, UiContext};
use console::style;
use std::path::PathBuf;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> InstallResult<()> {
    match args.action {
        CacheAction::List { format, work_dir } => {
            let cache = open(work_dir, config);
            list_entries(&cache, format).await
        }
        CacheAction::Clear { yes, work_dir } => {
            let cache = open(work_dir, config);
            let ctx = UiContext::detect().with_auto_yes(yes);
            clear_entries(&ctx, &cache).await
        }
    }
}

fn open(work_dir: Option<PathBuf>, config: &Config) -> BinaryCache {
    BinaryCache::new(work_dir.unwrap_or_else(|| ConfigManager::work_dir(config)))
}

async fn list_entries(cache: &BinaryCache, format: OutputFormat) -> InstallResult<()> {
    let entries = cache.list(None).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.binary.display());
            }
        }
        OutputFormat::Table if entries.is_empty() => {
            println!("No cached binaries in {}", cache.default_dir().display());
        }
        OutputFormat::Table => print_table(&entries),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<40} {:<8} {:<16} {:<17}",
        "IDENTIFIER", "STRATEGY", "VERSION", "CREATED"
    );
    println!("{}", "-".repeat(84));

    for entry in entries {
        println!(
            "{:<40} {:<8} {:<16} {:<17}",
            entry.identifier,
            entry.strategy,
            entry.version,
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} binary(ies)", entries.len());
}

async fn clear_entries(ctx: &UiContext, cache: &BinaryCache) -> InstallResult<()> {
    let entries = cache.list(None).await?;

    if entries.is_empty() {
        println!("No cached binaries to clear.");
        return Ok(());
    }

    println!("This will remove {} cached binary(ies):", entries.len());
    for entry in &entries {
        println!("  {} {}", style("•").red(), entry.identifier);
    }
    println!();

    if !ui::confirm(ctx, "Are you sure?", false).await? {
        ui::remark(ctx, "Aborted. Pass --yes to clear without a prompt.");
        return Ok(());
    }

    let removed = cache.clear(None).await?;
    ui::step_ok(ctx, &format!("Cleared {} cached binary(ies)", removed));

    Ok(())
}
