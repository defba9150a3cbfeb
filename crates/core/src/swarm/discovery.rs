//! # Bootstrap Discovery
//!
//! Reads the bootstrap node's output until it has reported both its peer ID
//! and its listen address.
//!
//! ## States
//!
//! ```text
//!                 ┌─ peer ID ──▶ AwaitingAddress ─ address ─┐
//! AwaitingBoth ───┤                                         ├──▶ Complete
//!                 └─ address ──▶ AwaitingPeerId ── peer ID ─┘
//!
//! EOF / read error / cancel / deadline in any non-terminal state ──▶ Failed
//! ```
//!
//! Each fact is first-match-wins. Once both are known no further lines are
//! read, so the caller can keep consuming the stream afterwards.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use crate::error::SwarmError;
use crate::tools::extractor::{Fact, FactExtractor, LogLineExtractor};
use crate::tools::scanner::LineScanner;

/// State of a discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    /// Neither fact seen yet
    AwaitingBoth,
    /// Address known, waiting for the peer ID
    AwaitingPeerId,
    /// Peer ID known, waiting for the address
    AwaitingAddress,
    /// Both facts known
    Complete,
    /// Stream ended, errored, or discovery was aborted
    Failed,
}

impl DiscoveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Connection identity of the bootstrap node.
///
/// Only ever constructed with both fields present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapFacts {
    peer_id: String,
    listen_addr: String,
}

impl BootstrapFacts {
    pub fn new(peer_id: impl Into<String>, listen_addr: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            listen_addr: listen_addr.into(),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }
}

#[derive(Debug, Default)]
struct PartialFacts {
    peer_id: Option<String>,
    listen_addr: Option<String>,
}

impl PartialFacts {
    fn state(&self) -> DiscoveryState {
        match (&self.peer_id, &self.listen_addr) {
            (Some(_), Some(_)) => DiscoveryState::Complete,
            (Some(_), None) => DiscoveryState::AwaitingAddress,
            (None, Some(_)) => DiscoveryState::AwaitingPeerId,
            (None, None) => DiscoveryState::AwaitingBoth,
        }
    }

    fn complete(&self) -> Option<BootstrapFacts> {
        match (&self.peer_id, &self.listen_addr) {
            (Some(peer_id), Some(listen_addr)) => {
                Some(BootstrapFacts::new(peer_id.clone(), listen_addr.clone()))
            }
            _ => None,
        }
    }
}

/// Discovery state machine over one node's output
pub struct BootstrapDiscovery<'a> {
    extractor: &'a dyn FactExtractor,
    facts: PartialFacts,
    state: DiscoveryState,
    timeout: Option<Duration>,
}

impl Default for BootstrapDiscovery<'static> {
    fn default() -> Self {
        Self::new(&LogLineExtractor)
    }
}

impl<'a> BootstrapDiscovery<'a> {
    /// Create a discovery run using the given extractor, with no deadline
    pub fn new(extractor: &'a dyn FactExtractor) -> Self {
        Self {
            extractor,
            facts: PartialFacts::default(),
            state: DiscoveryState::AwaitingBoth,
            timeout: None,
        }
    }

    /// Bound the whole run by a deadline
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current state
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// The facts, once both are known
    pub fn facts(&self) -> Option<BootstrapFacts> {
        self.facts.complete()
    }

    /// Feed a single line and return the resulting state.
    ///
    /// Lines seen after a terminal state are ignored.
    pub fn observe(&mut self, line: &str) -> DiscoveryState {
        if self.state.is_terminal() {
            return self.state;
        }

        for fact in self.extractor.extract_all(line) {
            match fact {
                Fact::PeerId(peer_id) if self.facts.peer_id.is_none() => {
                    tracing::debug!(peer_id = %peer_id, "Bootstrap peer ID found");
                    self.facts.peer_id = Some(peer_id);
                }
                Fact::ListenAddr(addr) if self.facts.listen_addr.is_none() => {
                    tracing::debug!(listen_addr = %addr, "Bootstrap listen address found");
                    self.facts.listen_addr = Some(addr);
                }
                fact => {
                    tracing::debug!(?fact, "Ignoring repeated bootstrap fact");
                }
            }
        }

        let next = self.facts.state();
        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, "Discovery state changed");
            self.state = next;
        }
        self.state
    }

    /// Consume lines until both facts are known.
    ///
    /// Stops reading as soon as discovery completes; remaining output stays
    /// in `scanner`. Any other outcome moves the run to `Failed`.
    pub async fn run<R>(
        &mut self,
        scanner: &mut LineScanner<R>,
        cancel: &CancellationToken,
    ) -> Result<BootstrapFacts, SwarmError>
    where
        R: AsyncBufRead + Unpin,
    {
        let timeout = self.timeout;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SwarmError::DiscoveryCancelled),
            result = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, self.consume(scanner))
                        .await
                        .unwrap_or(Err(SwarmError::DiscoveryTimedOut { timeout: limit })),
                    None => self.consume(scanner).await,
                }
            } => result,
        };

        match &result {
            Ok(facts) => {
                tracing::info!(
                    peer_id = %facts.peer_id(),
                    listen_addr = %facts.listen_addr(),
                    lines_read = scanner.lines_read(),
                    "Bootstrap node discovered"
                );
            }
            Err(e) => {
                self.state = DiscoveryState::Failed;
                tracing::warn!(error = %e, lines_read = scanner.lines_read(), "Bootstrap discovery failed");
            }
        }

        result
    }

    async fn consume<R>(&mut self, scanner: &mut LineScanner<R>) -> Result<BootstrapFacts, SwarmError>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            match scanner.next_line().await {
                Ok(Some(line)) => {
                    self.observe(&line);
                    if let Some(facts) = self.facts() {
                        return Ok(facts);
                    }
                }
                Ok(None) => {
                    return Err(SwarmError::DiscoveryIncomplete {
                        lines_read: scanner.lines_read(),
                    })
                }
                Err(e) => return Err(SwarmError::DiscoveryStream(e)),
            }
        }
    }
}
