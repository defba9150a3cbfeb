//! # Tools
//!
//! Deterministic helpers the swarm is built from.
//!
//! ## Modules
//!
//! - `scanner` - Bounded line reader over a node's output stream
//! - `extractor` - Bootstrap facts from free-text log lines
//! - `terminal` - Spawn callbacks and post-spawn steps

pub mod extractor;
pub mod scanner;
pub mod terminal;
