//! # Swarm State
//!
//! The nodes of one swarm, in launch order. The bootstrap node is always at
//! index 0. Processes are never stopped implicitly: dropping a
//! [`SwarmState`] leaves them running, [`SwarmState::shutdown`] kills and
//! reaps them.

use std::fmt;
use tokio::task::JoinHandle;

use super::discovery::BootstrapFacts;
use super::launcher::{NodeProcess, NodeRole};
use crate::error::SwarmError;

/// Owned handle to one running node
pub struct WorkerHandle {
    index: usize,
    role: NodeRole,
    pid: Option<u32>,
    args: Vec<String>,
    sequence: u64,
    process: Box<dyn NodeProcess>,
    drain: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(
        index: usize,
        role: NodeRole,
        args: Vec<String>,
        sequence: u64,
        process: Box<dyn NodeProcess>,
    ) -> Self {
        let pid = process.id();
        Self {
            index,
            role,
            pid,
            args,
            sequence,
            process,
            drain: None,
        }
    }

    pub(crate) fn attach_drain(&mut self, drain: JoinHandle<()>) {
        self.drain = Some(drain);
    }

    /// Position in the swarm (launch order)
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// OS process id captured at launch
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Arguments the node was launched with
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Sequence number of this node's launch event
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Kill and reap the node, stopping its output forwarder
    pub async fn terminate(mut self) -> Result<(), SwarmError> {
        let result = self.process.terminate().await;
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }

        result.map_err(|source| SwarmError::Terminate {
            index: self.index,
            source,
        })?;

        tracing::debug!(index = self.index, pid = ?self.pid, "Node terminated");
        Ok(())
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("index", &self.index)
            .field("role", &self.role)
            .field("pid", &self.pid)
            .field("args", &self.args)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// All nodes of one swarm
#[derive(Debug, Default)]
pub struct SwarmState {
    workers: Vec<WorkerHandle>,
    bootstrap: Option<BootstrapFacts>,
}

impl SwarmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Nodes in launch order
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    pub fn get(&self, index: usize) -> Option<&WorkerHandle> {
        self.workers.get(index)
    }

    /// Identity discovered from the bootstrap node
    pub fn bootstrap(&self) -> Option<&BootstrapFacts> {
        self.bootstrap.as_ref()
    }

    pub(crate) fn push(&mut self, worker: WorkerHandle) {
        self.workers.push(worker);
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut WorkerHandle> {
        self.workers.last_mut()
    }

    pub(crate) fn set_bootstrap(&mut self, facts: BootstrapFacts) {
        self.bootstrap = Some(facts);
    }

    /// Terminate every node, newest first.
    ///
    /// Keeps going past failures and returns the first one.
    pub async fn shutdown(self) -> Result<(), SwarmError> {
        let total = self.workers.len();
        let mut first_error = None;

        for worker in self.workers.into_iter().rev() {
            let index = worker.index();
            if let Err(e) = worker.terminate().await {
                tracing::warn!(index, error = %e, "Failed to terminate node");
                first_error.get_or_insert(e);
            }
        }

        if total > 0 {
            tracing::info!(nodes = total, "Swarm shut down");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
