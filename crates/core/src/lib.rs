//! # Finkles Core
//!
//! Launches and manages a local swarm of SummerCash (`smcd`) nodes.
//!
//! ## Architecture
//!
//! - `config` - `.finkles.yaml` loading and script selection
//! - `swarm/` - Coordinator, bootstrap discovery, node processes
//! - `tools/` - Line scanning, log fact extraction, command running
//! - `error` - Typed swarm failures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use finkles_core::swarm::{SwarmConfig, SwarmCoordinator};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut coordinator = SwarmCoordinator::new(SwarmConfig::default());
//! let state = coordinator.start(&CancellationToken::new()).await?;
//! // ...
//! state.shutdown().await?;
//! ```

pub mod config;
pub mod error;
pub mod swarm;
pub mod tools;

pub use error::SwarmError;
