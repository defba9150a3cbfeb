//! # Swarm Orchestration
//!
//! Launches a local swarm of nodes and tracks them as one group.
//!
//! ## Spawn Flow
//!
//! ```text
//! Launch bootstrap (-n) → Scan its stderr → peer ID + listen address
//!                                                 ↓
//!                 Launch peers (--bootstrap-peer-id, --bootstrap-peer-addr)
//!                                                 ↓
//!                                            SwarmState
//! ```

pub mod coordinator;
pub mod discovery;
pub mod events;
pub mod launcher;
pub mod state;

pub use coordinator::{SwarmConfig, SwarmCoordinator, DEFAULT_NUM_NODES};
pub use discovery::{BootstrapDiscovery, BootstrapFacts, DiscoveryState};
pub use events::{SwarmEvent, SwarmEventKind};
pub use launcher::{
    DiagnosticStream, LaunchSpec, LaunchedNode, NodeLauncher, NodeProcess, NodeRole,
    ProcessLauncher,
};
pub use state::{SwarmState, WorkerHandle};
