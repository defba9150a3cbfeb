//! # Finkles Configuration
//!
//! Reads `.finkles.yaml`. The top level is a global script; `spawn` and
//! `test` may override it per command.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::swarm::coordinator::{SwarmConfig, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_NODE_BINARY};
use crate::tools::scanner::DEFAULT_MAX_LINE_BYTES;

/// Config file looked up in the working directory by default
pub const DEFAULT_CONFIG_FILE: &str = ".finkles.yaml";

/// Node spawn settings of a script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodesConfig {
    /// Number of nodes to spawn
    #[serde(default)]
    pub n: Option<usize>,
    /// Arguments passed to every node
    #[serde(default)]
    pub args: Vec<String>,
    /// Command run each time a node has been spawned
    #[serde(default)]
    pub callback: Option<String>,
}

/// One runnable script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default)]
    pub nodes: Option<NodesConfig>,
    /// Directory holding all node data
    #[serde(default, alias = "datadir")]
    pub data_dir: Option<PathBuf>,
    /// Commands run after the nodes are up
    #[serde(default)]
    pub steps: Vec<String>,
    /// Node executable (default: smcd)
    #[serde(default)]
    pub binary: Option<String>,
    /// Discovery deadline in seconds; 0 disables it (default: 60)
    #[serde(default)]
    pub discovery_timeout_secs: Option<u64>,
    /// Longest node log line kept in memory
    #[serde(default)]
    pub max_line_bytes: Option<usize>,
}

impl ScriptConfig {
    /// Resolve defaults into the coordinator's settings
    pub fn swarm_config(&self) -> SwarmConfig {
        let nodes = self.nodes.clone().unwrap_or_default();
        let discovery_timeout = match self.discovery_timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_DISCOVERY_TIMEOUT),
        };

        SwarmConfig {
            nodes: nodes.n,
            extra_args: nodes.args,
            callback: nodes.callback,
            data_dir: self.data_dir.clone(),
            binary: self
                .binary
                .clone()
                .unwrap_or_else(|| DEFAULT_NODE_BINARY.to_string()),
            discovery_timeout,
            max_line_bytes: self.max_line_bytes.unwrap_or(DEFAULT_MAX_LINE_BYTES),
        }
    }
}

/// The whole `.finkles.yaml` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinklesConfig {
    /// Global script, used when no command-specific script applies
    #[serde(flatten)]
    pub global: ScriptConfig,
    /// Script used to test the node software
    #[serde(default)]
    pub test: Option<ScriptConfig>,
    /// Script used to deploy a node swarm
    #[serde(default)]
    pub spawn: Option<ScriptConfig>,
}

impl FinklesConfig {
    /// Parse a config from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse finkles config")
    }

    /// Load a config file from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(anyhow::anyhow!(
                    "no finkles config found in the working directory"
                ));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config: {:?}", path));
            }
        };

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {:?}", path))?;
        tracing::debug!(path = %path.display(), "Loaded finkles config");
        Ok(config)
    }

    /// Script for the `spawn` command.
    ///
    /// Falls back to the global script unless `spawn` defines `nodes`.
    pub fn spawn_script(&self) -> &ScriptConfig {
        match &self.spawn {
            Some(script) if script.nodes.is_some() => script,
            _ => &self.global,
        }
    }

    /// Script for the `test` command
    pub fn test_script(&self) -> Result<&ScriptConfig> {
        self.test
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("configuration file does not contain script: 'test'"))
    }
}
