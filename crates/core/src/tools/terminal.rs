//! # Terminal Commands
//!
//! Runs the short-lived commands around a swarm: the per-node spawn
//! callback and the post-spawn steps. Unlike nodes, these are awaited to
//! completion and reported as structured results.
//!
//! Commands are split on whitespace and executed directly, never through a
//! shell.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::SwarmError;

/// Environment variables handed to a spawn callback
pub const ENV_NODE_INDEX: &str = "FINKLES_NODE_INDEX";
pub const ENV_NODE_ROLE: &str = "FINKLES_NODE_ROLE";
pub const ENV_NODE_PID: &str = "FINKLES_NODE_PID";
pub const ENV_BOOTSTRAP_PEER_ID: &str = "FINKLES_BOOTSTRAP_PEER_ID";
pub const ENV_BOOTSTRAP_PEER_ADDR: &str = "FINKLES_BOOTSTRAP_PEER_ADDR";

/// Result of a single post-spawn step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub exit_code: Option<i32>,
}

/// Split a command line into program and arguments
pub fn parse_command(command: &str) -> Result<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty command"))?;
    Ok((program, parts.collect()))
}

/// Run one step with inherited stdio and wait for it to exit
pub async fn run_step(step: &str, cwd: Option<&Path>) -> Result<StepResult> {
    let (program, args) = parse_command(step)?;

    let mut cmd = Command::new(&program);
    cmd.args(&args).stdin(Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    tracing::info!(step = %step, "Running step");
    let status = cmd
        .status()
        .await
        .with_context(|| format!("Failed to run step `{}`", step))?;

    Ok(StepResult {
        step: step.to_string(),
        success: status.success(),
        exit_code: status.code(),
    })
}

/// Run steps in order, stopping after the first one that fails
pub async fn run_steps(steps: &[String], cwd: Option<&Path>) -> Result<Vec<StepResult>> {
    let mut results = Vec::with_capacity(steps.len());

    for step in steps {
        let result = run_step(step, cwd).await?;
        let success = result.success;
        if !success {
            tracing::warn!(step = %step, exit_code = ?result.exit_code, "Step failed");
        }
        results.push(result);
        if !success {
            break;
        }
    }

    Ok(results)
}

/// Run a spawn callback for one node and wait for it.
///
/// Output is captured; stdout is logged at debug level and stderr is
/// included in the error when the callback exits unsuccessfully.
pub async fn run_callback(
    callback: &str,
    index: usize,
    env: &[(&str, String)],
) -> Result<(), SwarmError> {
    let fail = |reason: String| SwarmError::Callback {
        callback: callback.to_string(),
        index,
        reason,
    };

    let (program, args) = parse_command(callback).map_err(|e| fail(e.to_string()))?;

    let output = Command::new(&program)
        .args(&args)
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| fail(e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        tracing::debug!(index, callback = %callback, "{}", line);
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(fail(format!(
            "exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}
