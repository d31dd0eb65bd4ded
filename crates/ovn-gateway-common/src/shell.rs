//! Shell command execution for the gateway backends.
//!
//! Commands are run through `/bin/sh -c` so the `ipset`, `iptables` and
//! `ovn-nbctl` invocations can be assembled as single strings. Every
//! externally derived argument must go through [`shellquote`].
//!
//! # Example
//!
//! ```ignore
//! use ovn_gateway_common::shell::{self, IPTABLES_CMD, shellquote};
//!
//! let cmd = format!("{} -w -t nat -S {}", IPTABLES_CMD, shellquote("POSTROUTING"));
//! let rules = shell::exec_or_throw(&cmd).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{GatewayError, GatewayResult};

/// Path to the `ipset` command.
pub const IPSET_CMD: &str = "/sbin/ipset";

/// Path to the `iptables` command.
pub const IPTABLES_CMD: &str = "/sbin/iptables";

/// Path to the `ip6tables` command.
pub const IP6TABLES_CMD: &str = "/sbin/ip6tables";

/// The OVN northbound control utility (resolved via `PATH`).
pub const OVN_NBCTL_CMD: &str = "ovn-nbctl";

/// Characters that need escaping inside shell double quotes:
/// `$`, `` ` ``, `"`, `\` and newline.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// The string is wrapped in double quotes and every character with special
/// meaning inside double quotes is backslash-escaped.
///
/// # Example
///
/// ```
/// use ovn_gateway_common::shell::shellquote;
///
/// assert_eq!(shellquote("simple"), "\"simple\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// assert_eq!(shellquote("!"), "\"!\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of a shell command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// Trimmed stdout output.
    pub stdout: String,
    /// Trimmed stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a shell command asynchronously.
///
/// A non-zero exit is not an error here; callers that need to distinguish
/// exit codes (`iptables -C`) inspect [`ExecResult::exit_code`].
pub async fn exec(cmd: &str) -> GatewayResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| GatewayError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    Ok(finish(cmd, output))
}

/// Executes a shell command, feeding `input` on its stdin.
///
/// Used for `ipset restore`, which reads a whole batch of set operations
/// from stdin and applies them in one invocation.
pub async fn exec_with_stdin(cmd: &str, input: &str) -> GatewayResult<ExecResult> {
    tracing::debug!(command = %cmd, input_bytes = input.len(), "Executing shell command with stdin");

    let spawn_err = |e| GatewayError::ShellExec {
        command: cmd.to_string(),
        source: e,
    };

    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_err)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).await.map_err(spawn_err)?;
        // Dropping stdin closes the pipe so the child sees EOF.
    }

    let output = child.wait_with_output().await.map_err(spawn_err)?;
    Ok(finish(cmd, output))
}

fn finish(cmd: &str, output: std::process::Output) -> ExecResult {
    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %cmd, exit_code = exit_code, "Command succeeded");
    } else {
        tracing::debug!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command exited non-zero"
        );
    }

    result
}

/// Executes a shell command and returns an error on non-zero exit.
///
/// Returns the trimmed stdout on success.
pub async fn exec_or_throw(cmd: &str) -> GatewayResult<String> {
    let result = exec(cmd).await?;
    into_stdout(cmd, result)
}

/// Like [`exec_or_throw`], feeding `input` on stdin.
pub async fn exec_with_stdin_or_throw(cmd: &str, input: &str) -> GatewayResult<String> {
    let result = exec_with_stdin(cmd, input).await?;
    into_stdout(cmd, result)
}

fn into_stdout(cmd: &str, result: ExecResult) -> GatewayResult<String> {
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(GatewayError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
