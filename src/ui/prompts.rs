//! Confirmation prompt with CI fallback

use super::context::UiContext;
use crate::error::{InstallError, InstallResult};
use std::io::{self, Write};

/// Ask a yes/no question.
///
/// Auto-yes answers `true`; a non-interactive context answers `default`.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> InstallResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let prompt = format!("{} [{}] ", message, if default { "Y/n" } else { "y/N" });
    let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stderr = io::stderr();
        stderr.write_all(prompt.as_bytes())?;
        stderr.flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input)
    })
    .await
    .map_err(|e| InstallError::io("reading confirmation", io::Error::other(e)))?
    .map_err(|e| InstallError::io("reading confirmation", e))?;

    Ok(match answer.trim() {
        "" => default,
        a => a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirm_auto_yes() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm(&ctx, "Test?", false).await.unwrap());
    }

    #[tokio::test]
    async fn confirm_non_interactive_default() {
        let ctx = UiContext::non_interactive();
        assert!(confirm(&ctx, "Test?", true).await.unwrap());
        assert!(!confirm(&ctx, "Test?", false).await.unwrap());
    }
}
