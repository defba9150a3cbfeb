//! # Fact Extractor
//!
//! Pulls bootstrap connection facts out of a node's human-readable log
//! lines. The node only prints free text, so the rules are plain substring
//! matches against its log vocabulary.

use serde::{Deserialize, Serialize};

/// Marker that identifies a peer ID line
pub const PEER_ID_MARKER: &str = "peer ID";
/// Prefix preceding the peer ID value
pub const PEER_ID_PREFIX: &str = "peer ID: ";
/// Marker that identifies a listen address line
pub const LISTEN_ADDR_MARKER: &str = "Assigned to new address";
/// Prefix preceding the listen address value
pub const LISTEN_ADDR_PREFIX: &str = "Assigned to new address; listening on ";
/// Suffix terminating the listen address value
pub const LISTEN_ADDR_SUFFIX: &str = " now";

/// A single connection fact found in a log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Fact {
    /// The node's peer identifier
    PeerId(String),
    /// The node's listen address (multiaddr)
    ListenAddr(String),
}

/// Turns lines of node output into connection facts
pub trait FactExtractor: Send + Sync {
    /// The highest-precedence fact in `line`, if any
    fn extract(&self, line: &str) -> Option<Fact>;

    /// Every fact in `line`, in precedence order
    fn extract_all(&self, line: &str) -> Vec<Fact> {
        self.extract(line).into_iter().collect()
    }
}

/// Extractor for the node's default log vocabulary
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLineExtractor;

impl FactExtractor for LogLineExtractor {
    fn extract(&self, line: &str) -> Option<Fact> {
        extract_fact(line)
    }

    fn extract_all(&self, line: &str) -> Vec<Fact> {
        extract_facts(line)
    }
}

/// Apply the log rules to a single line.
///
/// The peer ID rule is checked before the address rule.
pub fn extract_fact(line: &str) -> Option<Fact> {
    extract_facts(line).into_iter().next()
}

/// Apply every log rule to a single line, peer ID first
pub fn extract_facts(line: &str) -> Vec<Fact> {
    let mut facts = Vec::new();

    if line.contains(PEER_ID_MARKER) {
        if let Some(peer_id) = extract_peer_id(line) {
            facts.push(Fact::PeerId(peer_id));
        }
    }

    if line.contains(LISTEN_ADDR_MARKER) {
        if let Some(addr) = extract_listen_addr(line) {
            facts.push(Fact::ListenAddr(addr));
        }
    }

    facts
}

fn extract_peer_id(line: &str) -> Option<String> {
    let (_, rest) = line.split_once(PEER_ID_PREFIX)?;
    non_empty(rest)
}

fn extract_listen_addr(line: &str) -> Option<String> {
    let (_, rest) = line.split_once(LISTEN_ADDR_PREFIX)?;
    let addr = rest
        .split_once(LISTEN_ADDR_SUFFIX)
        .map(|(addr, _)| addr)
        .unwrap_or(rest);
    non_empty(addr)
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
