use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use zk_provider_core::error::{ProviderError, Result};

pub const INSTALL_HINT: &str = "curl -LSfs get.zokrat.es | sh";

/// Run `zokrates <args>` inside `dir`, feeding `stdin` if given.
///
/// Returns the raw output whatever the exit status; spawn failures are
/// mapped through `fail`, except a missing binary which is `MissingTool`.
pub fn run_raw(
    binary: &Path,
    dir: &Path,
    args: &[String],
    stdin: Option<&str>,
    fail: fn(String) -> ProviderError,
) -> Result<Output> {
    tracing::debug!("{} {}", binary.display(), args.join(" "));

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProviderError::MissingTool {
                name: binary.display().to_string(),
                install: INSTALL_HINT.into(),
            })
        }
        Err(e) => return Err(fail(format!("failed to run zokrates: {e}"))),
    };

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())
            .map_err(|e| fail(format!("failed to write zokrates stdin: {e}")))?;
    }

    child
        .wait_with_output()
        .map_err(|e| fail(format!("failed to run zokrates: {e}")))
}

/// Run `zokrates <args>` and return stdout, or the tool's own message on failure.
pub fn run(
    binary: &Path,
    dir: &Path,
    args: &[String],
    stdin: Option<&str>,
    fail: fn(String) -> ProviderError,
) -> Result<String> {
    let output = run_raw(binary, dir, args, stdin, fail)?;
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    Err(fail(format!(
        "zokrates {}: {message}",
        args.first().map(String::as_str).unwrap_or("")
    )))
}
