use std::{ffi::OsStr, process::Command};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command {command} returned non-zero exit status: {output}")]
    NonZeroExit { command: String, output: String },
}

fn display_command(program: &OsStr, args: &[&OsStr]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run an external tool to completion and return its stdout.
///
/// Stderr is folded into the error message when the tool fails.
pub fn run_command_and_check<S: AsRef<OsStr>>(
    program: S,
    args: &[&OsStr],
) -> Result<String, ToolError> {
    let program = program.as_ref();
    let command = display_command(program, args);
    debug!("Running {}", command);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ToolError::Spawn {
            command: command.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ToolError::NonZeroExit {
            command,
            output: format!("{stdout}{stderr}"),
        });
    }

    Ok(stdout)
}
