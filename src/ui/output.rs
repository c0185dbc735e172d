//! One-line status messages on stderr

use super::context::UiContext;
use console::style;

/// A completed step
pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        eprintln!("{} {}", style("✓").green(), message);
    } else {
        eprintln!("{} {}", style("[OK]").green(), message);
    }
}

/// Dimmed hint text
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        eprintln!("  {}", style(message).dim());
    } else {
        eprintln!("  {}", message);
    }
}

/// Aligned `key: value`
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        eprintln!("  {}: {}", style(key).dim(), value);
    } else {
        eprintln!("  {}: {}", key, value);
    }
}
