//! # Swarm Events
//!
//! Sequence-numbered record of what the coordinator did, in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of swarm event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwarmEventKind {
    /// Spawn sequence started
    SpawnStarted,
    /// A node process is running
    NodeLaunched,
    /// Started reading the bootstrap node's output
    DiscoveryStarted,
    /// Both bootstrap facts are known
    DiscoveryCompleted,
    /// Discovery ended without both facts
    DiscoveryFailed,
    /// A node's spawn callback finished
    CallbackCompleted,
    /// Every node launched
    SpawnCompleted,
    /// Spawn aborted; launched nodes were torn down
    SpawnFailed,
}

/// An event in the swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEvent {
    /// Position in the coordinator's event order, starting at 1
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: SwarmEventKind,
    /// Node the event is about, if any
    #[serde(default)]
    pub node: Option<usize>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SwarmEvent {
    /// Create a new event
    pub fn new(sequence: u64, kind: SwarmEventKind) -> Self {
        Self {
            sequence,
            timestamp: Utc::now(),
            kind,
            node: None,
            data: None,
        }
    }

    /// Attach the node index
    pub fn with_node(mut self, index: usize) -> Self {
        self.node = Some(index);
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
