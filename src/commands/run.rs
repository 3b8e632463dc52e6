//! Implementation of the `oncefs run` command.
//!
//! Runs an external command under the call-once guard. The command is
//! executed directly (no shell) from an argv array; a single argument is
//! split with shell-words so `oncefs run ... -- "make -j8 sim"` works.
//!
//! A non-zero exit is recorded as a failure, so later `run`s for the same
//! name report it (exit code 3) instead of retrying until `clean`.

use super::{guard_for, load_config};
use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{OnceError, Result};
use crate::once::Outcome;
use anyhow::{Context, anyhow};
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Maximum number of log lines echoed when the command fails.
const FAILURE_TAIL_MAX_LINES: usize = 50;

/// Maximum characters echoed when the command fails.
const FAILURE_TAIL_MAX_CHARS: usize = 4096;

pub fn cmd_run(args: RunArgs) -> Result<()> {
    let name = args.target.name.clone();

    match run_guarded(&args)? {
        Outcome::Executed(()) => {
            tracing::info!(operation = %name, "command completed");
        }
        Outcome::AlreadyDone => {
            tracing::info!(operation = %name, "already done; skipping");
        }
    }

    Ok(())
}

/// Resolve config, then run the command under the guard for `args.target`.
fn run_guarded(args: &RunArgs) -> Result<Outcome<()>> {
    let mut config = load_config(&args.target)?;
    apply_overrides(&mut config, args)?;

    let argv = parse_command(&args.cmd)?;
    let guard = guard_for(&args.target, &config)?;

    if args.clean {
        guard.clean()?;
    }

    guard.ensure_done(|| run_command(&argv, args.log_file.as_deref()))
}

/// Apply `--timeout`/`--poll-interval`/`--stale-timeout` on top of the file config.
fn apply_overrides(config: &mut Config, args: &RunArgs) -> Result<()> {
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(poll) = args.poll_interval {
        config.poll_interval_secs = poll;
    }
    if let Some(stale) = args.stale_timeout {
        config.stale_timeout_secs = stale;
    }
    config.validate()
}

/// Turn the trailing CLI arguments into an argv array.
fn parse_command(cmd: &[String]) -> Result<Vec<String>> {
    let argv = match cmd {
        [single] => shell_words::split(single).map_err(|e| {
            OnceError::UserError(format!(
                "failed to parse command '{}': {}\n\n\
                 Fix: check for unmatched quotes or invalid escape sequences.",
                single, e
            ))
        })?,
        many => many.to_vec(),
    };

    if argv.is_empty() || argv[0].is_empty() {
        return Err(OnceError::UserError(
            "command is empty after parsing.\n\nFix: pass the command after `--`.".to_string(),
        ));
    }

    Ok(argv)
}

/// Run `argv` to completion, streaming output to the terminal or `log_file`.
fn run_command(argv: &[String], log_file: Option<&Path>) -> anyhow::Result<()> {
    let command_line = shell_words::join(argv);
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]).stdin(Stdio::null());

    let log = match log_file {
        Some(path) => Some(attach_log(&mut command, path, &command_line)?),
        None => None,
    };

    tracing::info!(command = %command_line, "running command");
    let status = command
        .status()
        .with_context(|| format!("failed to execute command '{}'", command_line))?;

    if status.success() {
        return Ok(());
    }

    let message = format!(
        "command '{}' exited with status {}",
        command_line,
        describe_status(status)
    );

    if let Some((path, offset)) = log {
        let tail = read_log_tail(&path, offset);
        if !tail.is_empty() {
            tracing::warn!(
                log_file = %path.display(),
                "command output (truncated):\n{}",
                tail
            );
        }
    }

    Err(anyhow!(message))
}

/// Point stdout and stderr of `command` at `path` (appending) and return the
/// file path plus the offset where this run's output starts.
fn attach_log(
    command: &mut Command,
    path: &Path,
    command_line: &str,
) -> anyhow::Result<(PathBuf, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory '{}'", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file '{}'", path.display()))?;

    writeln!(file, "=== {} {} ===", Utc::now().to_rfc3339(), command_line)
        .with_context(|| format!("failed to write log file '{}'", path.display()))?;
    let offset = file.seek(SeekFrom::End(0)).unwrap_or(0);

    let stderr_file = file
        .try_clone()
        .with_context(|| format!("failed to duplicate log file handle '{}'", path.display()))?;
    command.stdout(Stdio::from(file)).stderr(Stdio::from(stderr_file));

    Ok((path.to_path_buf(), offset))
}

/// Read what this run appended to the log, truncated to the last lines.
fn read_log_tail(path: &Path, offset: u64) -> String {
    let mut contents = String::new();
    let read = File::open(path).and_then(|mut f| {
        f.seek(SeekFrom::Start(offset))?;
        let mut bytes = Vec::new();
        f.read_to_end(&mut bytes)?;
        contents = String::from_utf8_lossy(&bytes).to_string();
        Ok(())
    });

    match read {
        Ok(()) => truncate_output(&contents, FAILURE_TAIL_MAX_LINES, FAILURE_TAIL_MAX_CHARS),
        Err(_) => String::new(),
    }
}

#[cfg(unix)]
fn describe_status(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code.to_string(),
        (None, Some(signal)) => format!("signal {}", signal),
        (None, None) => "unknown".to_string(),
    }
}

#[cfg(not(unix))]
fn describe_status(status: ExitStatus) -> String {
    status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Keep the last `max_lines` lines, then the last `max_chars` characters.
fn truncate_output(output: &str, max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    // The end of the output is where errors usually are.
    let relevant = if lines.len() > max_lines {
        &lines[lines.len() - max_lines..]
    } else {
        &lines[..]
    };

    let result = relevant.join("\n");
    if result.len() <= max_chars {
        return result;
    }

    let mut start = result.len() - max_chars;
    while !result.is_char_boundary(start) {
        start += 1;
    }
    format!("...(truncated)...\n{}", &result[start..])
}
