//! Cancellation-aware subprocess execution
//!
//! Every external command (git, go, the probed terraform binary) goes through
//! [`run`]. Commands block until they exit unless the supplied [`CancelToken`]
//! fires, in which case the child's whole process group is killed.

use crate::error::{InstallError, InstallResult};
use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Max number of output lines to include in fetch and probe error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Cooperative cancellation signal shared between a caller and running work.
///
/// Wraps a [`CancellationToken`] with an optional deadline. Clones observe
/// the same signal. A token created with [`CancelToken::never`] has no
/// underlying token, so nothing can fire it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Create a token that only fires when [`CancelToken::cancel`] is called
    pub fn new() -> Self {
        Self {
            token: Some(CancellationToken::new()),
            deadline: None,
        }
    }

    /// Create a token that never fires
    pub fn never() -> Self {
        Self::default()
    }

    /// Create a token that fires on [`CancelToken::cancel`] or once `timeout` has elapsed
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            token: Some(CancellationToken::new()),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Fire the token. No-op for [`CancelToken::never`].
    pub fn cancel(&self) {
        if let Some(ref token) = self.token {
            token.cancel();
        }
    }

    /// Whether the token has fired or its deadline has passed
    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
            || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolve once the token fires or the deadline passes
    pub async fn cancelled(&self) {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        match self.token {
            Some(ref token) => {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = deadline => {}
                }
            }
            None => deadline.await,
        }
    }
}

/// Render a command line for logs and error messages
pub fn describe(program: &OsStr, args: &[&OsStr]) -> String {
    let mut parts = vec![program.to_string_lossy().into_owned()];
    parts.extend(args.iter().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run a command to completion, capturing stdout and stderr.
///
/// Spawn failures are `CommandFailed`; a fired token is `Cancelled`. A
/// non-zero exit status is returned as a normal `Output` for the caller to judge.
pub async fn run(mut command: Command, cancel: &CancelToken) -> InstallResult<Output> {
    let label = {
        let std_cmd = command.as_std();
        let args: Vec<&OsStr> = std_cmd.get_args().collect();
        describe(std_cmd.get_program(), &args)
    };

    if cancel.is_cancelled() {
        return Err(InstallError::Cancelled { command: label });
    }

    debug!("Executing: {}", label);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    let child = command
        .spawn()
        .map_err(|e| InstallError::command_failed(label.clone(), e))?;
    let pid = child.id();

    tokio::select! {
        output = child.wait_with_output() => {
            output.map_err(|e| InstallError::command_failed(label, e))
        }
        _ = cancel.cancelled() => {
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            debug!("Cancelled: {}", label);
            Err(InstallError::Cancelled { command: label })
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // The child leads its own process group, so this reaches its children too.
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg has no memory-safety preconditions; a stale pgid only
    // results in ESRCH, which is ignored.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

/// Complete stdout followed by stderr
pub fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    stdout.lines().chain(stderr.lines()).collect::<Vec<_>>().join("\n")
}

/// The last `ERROR_TAIL_LINES` lines of stdout and stderr combined
pub fn error_output(output: &Output) -> String {
    let combined = combined_output(output);
    let lines: Vec<&str> = combined.lines().collect();
    let total = lines.len();
    let tail = if total > ERROR_TAIL_LINES {
        &lines[total - ERROR_TAIL_LINES..]
    } else {
        &lines[..]
    };
    tail.join("\n")
}
