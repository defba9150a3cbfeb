//! # Swarm Errors
//!
//! Typed failures for the spawn sequence. Every variant aborts
//! `SwarmCoordinator::start`; callers can match on the variant to tell
//! "the node exited early" apart from "reading its logs failed".

use std::io;
use std::time::Duration;

/// Errors raised while launching or discovering a swarm
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    /// The executable is missing or the OS refused to start it
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Reading the bootstrap node's diagnostic stream failed
    #[error("failed to read bootstrap node output: {0}")]
    DiscoveryStream(#[source] io::Error),

    /// The diagnostic stream closed before both bootstrap facts were seen
    #[error("bootstrap node output closed before it reported its peer ID and address ({lines_read} lines read)")]
    DiscoveryIncomplete { lines_read: u64 },

    /// No bootstrap facts within the configured deadline
    #[error("bootstrap discovery timed out after {timeout:?}")]
    DiscoveryTimedOut { timeout: Duration },

    /// Discovery was cancelled by the caller
    #[error("bootstrap discovery was cancelled")]
    DiscoveryCancelled,

    /// The launcher returned no diagnostic stream for a node that needs one
    #[error("node {index} has no diagnostic stream to scan")]
    MissingDiagnostics { index: usize },

    /// A post-spawn callback could not run or exited unsuccessfully
    #[error("callback `{callback}` failed for node {index}: {reason}")]
    Callback {
        callback: String,
        index: usize,
        reason: String,
    },

    /// The caller cancelled the spawn after discovery
    #[error("swarm spawn was cancelled after {launched} nodes were launched")]
    SpawnCancelled { launched: usize },

    /// Killing or reaping a node failed during teardown
    #[error("failed to terminate node {index}: {source}")]
    Terminate {
        index: usize,
        #[source]
        source: io::Error,
    },
}

impl SwarmError {
    /// Whether this error came out of bootstrap discovery
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryStream(_)
                | Self::DiscoveryIncomplete { .. }
                | Self::DiscoveryTimedOut { .. }
                | Self::DiscoveryCancelled
        )
    }
}
