//! # Node Launcher
//!
//! Starts node processes and hands back their diagnostic (stderr) stream.
//!
//! The coordinator only talks to the [`NodeLauncher`] and [`NodeProcess`]
//! traits; [`ProcessLauncher`] is the OS-backed implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::SwarmError;
use crate::tools::scanner::LineScanner;

/// Read-only diagnostic output of a launched node
pub type DiagnosticStream = Box<dyn AsyncRead + Send + Unpin>;

/// Line scanner over a node's diagnostic stream
pub type DiagnosticScanner = LineScanner<BufReader<DiagnosticStream>>;

/// Tracing target for forwarded node output
pub const NODE_LOG_TARGET: &str = "finkles::node";

/// Role of a node within the swarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// First node; every other node bootstraps from it
    Bootstrap,
    /// Node launched with the bootstrap node's identity
    Peer,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Peer => "peer",
        }
    }
}

/// Everything needed to start one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub index: usize,
    pub role: NodeRole,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory, created before launch if missing
    pub working_dir: Option<PathBuf>,
}

/// Control over a running node process
#[async_trait]
pub trait NodeProcess: Send {
    /// OS process id, if still known
    fn id(&self) -> Option<u32>;

    /// Kill the process and reap it. A process that already exited is
    /// reaped without error.
    async fn terminate(&mut self) -> io::Result<()>;
}

/// A freshly started node
pub struct LaunchedNode {
    pub process: Box<dyn NodeProcess>,
    pub diagnostics: Option<DiagnosticStream>,
}

/// Starts node processes
#[async_trait]
pub trait NodeLauncher: Send + Sync {
    /// Start a node and return as soon as it is running
    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedNode, SwarmError>;
}

/// Launches nodes as OS child processes with stderr piped
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl NodeLauncher for ProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedNode, SwarmError> {
        let launch_error = |source: io::Error| SwarmError::Launch {
            program: spec.program.clone(),
            source,
        };

        if let Some(dir) = &spec.working_dir {
            tokio::fs::create_dir_all(dir).await.map_err(launch_error)?;
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(launch_error)?;
        let diagnostics = child
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as DiagnosticStream);

        tracing::debug!(
            index = spec.index,
            role = spec.role.as_str(),
            pid = ?child.id(),
            args = ?spec.args,
            "Node process started"
        );

        Ok(LaunchedNode {
            process: Box::new(ChildProcess { child }),
            diagnostics,
        })
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl NodeProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.kill().await
    }
}

/// Forward the rest of a node's output to tracing until it closes.
///
/// Keeps the pipe empty so a chatty node never blocks on a full stderr.
pub fn spawn_drain(index: usize, mut scanner: DiagnosticScanner) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match scanner.next_line().await {
                Ok(Some(line)) => {
                    tracing::debug!(target: NODE_LOG_TARGET, index, "{}", line);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(target: NODE_LOG_TARGET, index, error = %e, "Node output failed");
                    break;
                }
            }
        }
        tracing::debug!(
            target: NODE_LOG_TARGET,
            index,
            lines = scanner.lines_read(),
            truncated = scanner.lines_truncated(),
            "Node output closed"
        );
    })
}
