#![cfg_attr(
    not(any(target_os = "macos", target_os = "windows")),
    allow(dead_code)
)]

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{CaError, Result};

#[derive(Debug)]
pub(crate) struct CommandOutcome {
    pub success: bool,
    pub stderr: String,
}

impl CommandOutcome {
    /// Whether stderr says the object to act on does not exist.
    pub(crate) fn reports_missing(&self) -> bool {
        let lower = self.stderr.to_ascii_lowercase();
        lower.contains("could not be found")
            || lower.contains("cannot find")
            || lower.contains("not found")
    }
}

pub(crate) fn run_command<I, S>(operation: &str, program: &str, args: I) -> Result<CommandOutcome>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!(operation, program, "running trust store command");
    let output = Command::new(program).args(args).output().map_err(|error| {
        if error.kind() == io::ErrorKind::NotFound {
            return CaError::UnsupportedOperation(format!(
                "{operation}: command '{program}' not found"
            ));
        }
        CaError::TrustStore(format!("{operation}: failed to run '{program}': {error}"))
    })?;

    Ok(CommandOutcome {
        success: output.status.success(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Repeats a one-match-per-call removal until the store reports `name` missing,
/// giving up after `max_attempts` successful deletions.
pub(crate) fn remove_until_missing<F>(
    operation: &str,
    name: &str,
    max_attempts: usize,
    mut remove_one: F,
) -> Result<()>
where
    F: FnMut() -> Result<CommandOutcome>,
{
    for _ in 0..max_attempts {
        let outcome = remove_one()?;
        if !outcome.success {
            if outcome.reports_missing() {
                return Ok(());
            }
            return Err(operation_error(operation, outcome.stderr));
        }
    }
    Err(operation_error(
        operation,
        format!("'{name}' still present after {max_attempts} deletions"),
    ))
}

pub(crate) fn operation_error(operation: &str, detail: impl Into<String>) -> CaError {
    CaError::TrustStore(format!("{operation}: {}", detail.into()))
}

pub(crate) fn path_arg<'a>(operation: &str, path: &'a Path) -> Result<&'a str> {
    path.to_str()
        .ok_or_else(|| operation_error(operation, format!("non UTF-8 path {}", path.display())))
}
