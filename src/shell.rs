//! Shell command execution for OS configuration and the tunnel binary.
//!
//! All route, addressing and DNS mutations go through this module so
//! every executed command is logged under one category and failures
//! carry the command line that produced them.

use std::fmt;
use std::io;
use std::process::{Command, Stdio};

use crate::logger::{self, LogLevel};

/// Result type for shell operations
pub type Result<T> = std::result::Result<T, ExecError>;

/// Errors produced by executing an external command
#[derive(Debug)]
pub enum ExecError {
    /// The command could not be spawned at all
    Io { program: String, source: io::Error },
    /// The command ran but exited with a non-zero status
    ExitStatus {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { program, source } => write!(f, "failed to run '{program}': {source}"),
            Self::ExitStatus {
                program,
                code,
                stderr,
            } => {
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                if stderr.is_empty() {
                    write!(f, "'{program}' exited with status {code}")
                } else {
                    write!(f, "'{program}' exited with status {code}: {stderr}")
                }
            }
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::ExitStatus { .. } => None,
        }
    }
}

/// Run a command to completion, logging it under `category`.
///
/// # Errors
///
/// Returns [`ExecError`] when the command cannot be spawned or exits
/// with a non-zero status.
pub fn exec(category: &str, program: &str, args: &[&str]) -> Result<()> {
    logger::log(
        LogLevel::Debug,
        category,
        format!("exec: {program} {}", args.join(" ")),
    );

    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ExecError::Io {
            program: program.to_string(),
            source: e,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ExecError::ExitStatus {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a command and feed every output line to `on_line`.
///
/// The callback receives `(line, is_stderr)` for each line of the
/// command's stdout and stderr. Used where the caller must inspect
/// command output regardless of exit status (e.g. detecting a
/// transient port conflict while applying the tunnel configuration).
///
/// # Errors
///
/// Returns [`ExecError`] when the command cannot be spawned or exits
/// with a non-zero status. The callback is invoked in both cases.
pub fn exec_with_output<F>(
    category: &str,
    program: &str,
    args: &[&str],
    mut on_line: F,
) -> Result<()>
where
    F: FnMut(&str, bool),
{
    logger::log(
        LogLevel::Debug,
        category,
        format!("exec: {program} {}", args.join(" ")),
    );

    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| ExecError::Io {
            program: program.to_string(),
            source: e,
        })?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        on_line(line, false);
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        on_line(line, true);
    }

    if output.status.success() {
        Ok(())
    } else {
        Err(ExecError::ExitStatus {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a command and return its raw output, or `None` on spawn failure.
///
/// For read-only probes (`route get`, `ifconfig`, `ping`) where a
/// missing tool or failed probe is handled by the caller.
#[must_use]
pub fn output(program: &str, args: &[&str]) -> Option<std::process::Output> {
    Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .ok()
}
