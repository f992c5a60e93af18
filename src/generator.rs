//! External site generator invocation.
//!
//! The generator (`jekyll build --incremental` by default) runs in the
//! project root with inherited stdin, stdout and stderr, so its own progress
//! output and error messages reach the terminal unchanged.

use crate::registry::BuildContext;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("could not start '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("generator task failed: {0}")]
    Join(String),
}

/// Run the configured generator to completion and return its exit code.
///
/// A process killed by a signal has no exit code and reports 1.
pub fn run(ctx: &BuildContext) -> Result<i32, GeneratorError> {
    let config = &ctx.config.generator;
    tracing::info!(command = %config.command, args = ?config.args, "running generator");

    let status = Command::new(&config.command)
        .args(&config.args)
        .current_dir(&ctx.root)
        .status()
        .map_err(|source| GeneratorError::Spawn {
            command: config.command.clone(),
            source,
        })?;

    Ok(status.code().unwrap_or(1))
}
