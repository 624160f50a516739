use serde::Serialize;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::process::{Command, Stdio};

use super::ExtractError;

/// Availability of one external command-line tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: &'static str,
    pub program: String,
    pub available: bool,
}

impl ToolStatus {
    /// Run `program version_arg` once; any spawnable program counts as present.
    pub fn probe(name: &'static str, program: &str, version_arg: &str) -> Self {
        let available = Command::new(program)
            .arg(version_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok();
        tracing::debug!(tool = name, program, available, "probed external tool");
        Self {
            name,
            program: program.to_string(),
            available,
        }
    }
}

/// Run a tool to completion and return its stdout as (lossy) UTF-8.
pub(super) fn run_capture<I, S>(tool: &str, program: &str, args: I) -> Result<String, ExtractError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ExtractError::ToolMissing(tool.to_string()),
            _ => ExtractError::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::ToolFailed {
            tool: tool.to_string(),
            message: format!("{} ({})", stderr.trim(), output.status),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
