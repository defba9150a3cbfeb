//! # Swarm Coordinator
//!
//! Launches a swarm: bootstrap node first, then discovery against its
//! output, then every peer configured with the bootstrap node's identity.
//! Nodes are launched one at a time from a single control flow.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SwarmError;
use crate::tools::extractor::{FactExtractor, LogLineExtractor};
use crate::tools::scanner::{LineScanner, DEFAULT_MAX_LINE_BYTES};
use crate::tools::terminal::{
    self, ENV_BOOTSTRAP_PEER_ADDR, ENV_BOOTSTRAP_PEER_ID, ENV_NODE_INDEX, ENV_NODE_PID,
    ENV_NODE_ROLE,
};

use super::discovery::{BootstrapDiscovery, BootstrapFacts};
use super::events::{SwarmEvent, SwarmEventKind};
use super::launcher::{
    spawn_drain, DiagnosticStream, LaunchSpec, NodeLauncher, NodeRole, ProcessLauncher,
};
use super::state::{SwarmState, WorkerHandle};

/// Number of nodes spawned when the config does not say
pub const DEFAULT_NUM_NODES: usize = 8;
/// Node executable used when the config does not say
pub const DEFAULT_NODE_BINARY: &str = "smcd";
/// Deadline for bootstrap discovery when the config does not say
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Flag that starts a node in bootstrap mode
pub const BOOTSTRAP_FLAG: &str = "-n";
/// Flag carrying the bootstrap node's peer ID to a peer
pub const BOOTSTRAP_PEER_ID_FLAG: &str = "--bootstrap-peer-id";
/// Flag carrying the bootstrap node's listen address to a peer
pub const BOOTSTRAP_PEER_ADDR_FLAG: &str = "--bootstrap-peer-addr";

/// Resolved settings for one swarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Node count override (default: 8)
    pub nodes: Option<usize>,
    /// Extra arguments passed to every node, after the role flags
    pub extra_args: Vec<String>,
    /// Command run after each node is launched
    pub callback: Option<String>,
    /// Root for per-node working directories (`node-<index>`)
    pub data_dir: Option<PathBuf>,
    /// Node executable
    pub binary: String,
    /// Deadline for bootstrap discovery; `None` waits indefinitely
    pub discovery_timeout: Option<Duration>,
    /// Longest diagnostic line buffered before truncation
    pub max_line_bytes: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            nodes: None,
            extra_args: Vec::new(),
            callback: None,
            data_dir: None,
            binary: DEFAULT_NODE_BINARY.to_string(),
            discovery_timeout: Some(DEFAULT_DISCOVERY_TIMEOUT),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl SwarmConfig {
    /// Number of nodes to launch
    pub fn node_count(&self) -> usize {
        self.nodes.unwrap_or(DEFAULT_NUM_NODES)
    }

    /// Arguments for the bootstrap node
    pub fn bootstrap_args(&self) -> Vec<String> {
        let mut args = vec![BOOTSTRAP_FLAG.to_string()];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Arguments for a peer node
    pub fn peer_args(&self, bootstrap: &BootstrapFacts) -> Vec<String> {
        let mut args = vec![
            BOOTSTRAP_PEER_ID_FLAG.to_string(),
            bootstrap.peer_id().to_string(),
            BOOTSTRAP_PEER_ADDR_FLAG.to_string(),
            bootstrap.listen_addr().to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Working directory for the node at `index`
    pub fn working_dir(&self, index: usize) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("node-{}", index)))
    }

    fn launch_spec(&self, index: usize, role: NodeRole, args: Vec<String>) -> LaunchSpec {
        LaunchSpec {
            index,
            role,
            program: self.binary.clone(),
            args,
            working_dir: self.working_dir(index),
        }
    }
}

/// The swarm coordinator
pub struct SwarmCoordinator<L = ProcessLauncher> {
    config: SwarmConfig,
    launcher: L,
    extractor: Box<dyn FactExtractor>,
    events: Vec<SwarmEvent>,
    event_tx: Option<mpsc::Sender<SwarmEvent>>,
    sequence: u64,
}

impl SwarmCoordinator<ProcessLauncher> {
    /// Create a coordinator that launches real processes
    pub fn new(config: SwarmConfig) -> Self {
        Self::with_launcher(config, ProcessLauncher)
    }
}

impl<L: NodeLauncher> SwarmCoordinator<L> {
    /// Create a coordinator with a custom launcher
    pub fn with_launcher(config: SwarmConfig, launcher: L) -> Self {
        Self {
            config,
            launcher,
            extractor: Box::new(LogLineExtractor),
            events: Vec::new(),
            event_tx: None,
            sequence: 0,
        }
    }

    /// Replace the log-line extractor used for discovery
    pub fn with_extractor(mut self, extractor: impl FactExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Set event channel for streaming events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<SwarmEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Events emitted so far, across every `start` call
    pub fn events(&self) -> &[SwarmEvent] {
        &self.events
    }

    /// Emit an event and return its sequence number
    async fn emit(
        &mut self,
        kind: SwarmEventKind,
        node: Option<usize>,
        data: Option<serde_json::Value>,
    ) -> u64 {
        self.sequence += 1;
        let mut event = SwarmEvent::new(self.sequence, kind);
        if let Some(index) = node {
            event = event.with_node(index);
        }
        if let Some(data) = data {
            event = event.with_data(data);
        }

        self.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
        self.sequence
    }

    /// Launch a new swarm.
    ///
    /// Returns only once every node is running. On failure, nodes launched
    /// so far are terminated before the error is returned.
    #[tracing::instrument(skip(self, cancel), fields(n = self.config.node_count()))]
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<SwarmState, SwarmError> {
        let n = self.config.node_count();
        self.emit(
            SwarmEventKind::SpawnStarted,
            None,
            Some(serde_json::json!({ "n": n })),
        )
        .await;
        tracing::info!(n, binary = %self.config.binary, "Spawning a swarm of nodes");

        let mut state = SwarmState::new();
        match self.spawn_all(n, &mut state, cancel).await {
            Ok(()) => {
                self.emit(SwarmEventKind::SpawnCompleted, None, None).await;
                tracing::info!(nodes = state.len(), "Swarm is up");
                Ok(state)
            }
            Err(e) => {
                tracing::error!(error = %e, launched = state.len(), "Swarm spawn failed, tearing down launched nodes");
                self.emit(
                    SwarmEventKind::SpawnFailed,
                    None,
                    Some(serde_json::json!({ "error": e.to_string() })),
                )
                .await;
                if let Err(teardown) = state.shutdown().await {
                    tracing::warn!(error = %teardown, "Teardown after failed spawn was incomplete");
                }
                Err(e)
            }
        }
    }

    async fn spawn_all(
        &mut self,
        n: usize,
        state: &mut SwarmState,
        cancel: &CancellationToken,
    ) -> Result<(), SwarmError> {
        if n == 0 {
            return Ok(());
        }

        // Phase 1: bootstrap node
        tracing::info!("Starting a bootstrap node for the swarm");
        let bootstrap_spec =
            self.config
                .launch_spec(0, NodeRole::Bootstrap, self.config.bootstrap_args());
        let diagnostics = self
            .launch_node(bootstrap_spec, state)
            .await?
            .ok_or(SwarmError::MissingDiagnostics { index: 0 })?;

        // Phase 2: discovery
        let facts = self.discover(diagnostics, state, cancel).await?;
        self.run_callback(0, NodeRole::Bootstrap, state, &facts, cancel)
            .await?;

        // Phase 3: peers
        for index in 1..n {
            if cancel.is_cancelled() {
                return Err(SwarmError::SpawnCancelled {
                    launched: state.len(),
                });
            }

            let spec = self
                .config
                .launch_spec(index, NodeRole::Peer, self.config.peer_args(&facts));
            if let Some(stream) = self.launch_node(spec, state).await? {
                let scanner = LineScanner::with_limit(stream, self.config.max_line_bytes);
                if let Some(worker) = state.last_mut() {
                    worker.attach_drain(spawn_drain(index, scanner));
                }
            }
            self.run_callback(index, NodeRole::Peer, state, &facts, cancel)
                .await?;
        }

        Ok(())
    }

    /// Launch one node and record it; returns its diagnostic stream
    async fn launch_node(
        &mut self,
        spec: LaunchSpec,
        state: &mut SwarmState,
    ) -> Result<Option<DiagnosticStream>, SwarmError> {
        let launched = self.launcher.launch(&spec).await?;
        let pid = launched.process.id();

        let sequence = self
            .emit(
                SwarmEventKind::NodeLaunched,
                Some(spec.index),
                Some(serde_json::json!({
                    "role": spec.role.as_str(),
                    "pid": pid,
                    "args": spec.args,
                })),
            )
            .await;

        tracing::info!(index = spec.index, role = spec.role.as_str(), pid = ?pid, "Node launched");
        state.push(WorkerHandle::new(
            spec.index,
            spec.role,
            spec.args,
            sequence,
            launched.process,
        ));
        Ok(launched.diagnostics)
    }

    async fn discover(
        &mut self,
        diagnostics: DiagnosticStream,
        state: &mut SwarmState,
        cancel: &CancellationToken,
    ) -> Result<BootstrapFacts, SwarmError> {
        self.emit(SwarmEventKind::DiscoveryStarted, Some(0), None)
            .await;

        let mut scanner = LineScanner::with_limit(diagnostics, self.config.max_line_bytes);
        let result = BootstrapDiscovery::new(self.extractor.as_ref())
            .with_timeout(self.config.discovery_timeout)
            .run(&mut scanner, cancel)
            .await;

        let facts = match result {
            Ok(facts) => facts,
            Err(e) => {
                self.emit(
                    SwarmEventKind::DiscoveryFailed,
                    Some(0),
                    Some(serde_json::json!({ "error": e.to_string() })),
                )
                .await;
                return Err(e);
            }
        };

        self.emit(
            SwarmEventKind::DiscoveryCompleted,
            Some(0),
            Some(serde_json::to_value(&facts).unwrap_or_default()),
        )
        .await;

        if let Some(bootstrap) = state.last_mut() {
            bootstrap.attach_drain(spawn_drain(0, scanner));
        }
        state.set_bootstrap(facts.clone());
        Ok(facts)
    }

    /// Run the spawn callback for one node; cancellation kills it
    async fn run_callback(
        &mut self,
        index: usize,
        role: NodeRole,
        state: &SwarmState,
        facts: &BootstrapFacts,
        cancel: &CancellationToken,
    ) -> Result<(), SwarmError> {
        let Some(callback) = self.config.callback.clone() else {
            return Ok(());
        };

        let mut env = vec![
            (ENV_NODE_INDEX, index.to_string()),
            (ENV_NODE_ROLE, role.as_str().to_string()),
            (ENV_BOOTSTRAP_PEER_ID, facts.peer_id().to_string()),
            (ENV_BOOTSTRAP_PEER_ADDR, facts.listen_addr().to_string()),
        ];
        if let Some(pid) = state.get(index).and_then(WorkerHandle::pid) {
            env.push((ENV_NODE_PID, pid.to_string()));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SwarmError::SpawnCancelled {
                    launched: state.len(),
                });
            }
            result = terminal::run_callback(&callback, index, &env) => result?,
        }
        self.emit(SwarmEventKind::CallbackCompleted, Some(index), None)
            .await;
        tracing::debug!(index, callback = %callback, "Spawn callback finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::launcher::{LaunchedNode, NodeProcess};
    use crate::tools::extractor::Fact;
    use async_trait::async_trait;
    use std::io;
    use std::sync::{Arc, Mutex};

    const BOOTSTRAP_OUTPUT: &[u8] = b"INFO starting smcd\n\
        INFO Assigned to new address; listening on /ip4/127.0.0.1/tcp/4001 now active\n\
        INFO peer ID: QmAbc123\n\
        INFO serving\n";

    #[derive(Default)]
    struct Record {
        launched: Vec<LaunchSpec>,
        terminated: Vec<usize>,
    }

    struct FakeProcess {
        index: usize,
        record: Arc<Mutex<Record>>,
    }

    #[async_trait]
    impl NodeProcess for FakeProcess {
        fn id(&self) -> Option<u32> {
            Some(1000 + self.index as u32)
        }

        async fn terminate(&mut self) -> io::Result<()> {
            self.record.lock().unwrap().terminated.push(self.index);
            Ok(())
        }
    }

    struct FakeLauncher {
        record: Arc<Mutex<Record>>,
        bootstrap_output: &'static [u8],
        fail_at: Option<usize>,
        cancel_at: Option<(usize, CancellationToken)>,
    }

    impl FakeLauncher {
        fn new(bootstrap_output: &'static [u8]) -> Self {
            Self {
                record: Arc::new(Mutex::new(Record::default())),
                bootstrap_output,
                fail_at: None,
                cancel_at: None,
            }
        }

        fn cancelling_at(mut self, index: usize, cancel: CancellationToken) -> Self {
            self.cancel_at = Some((index, cancel));
            self
        }

        fn failing_at(mut self, index: usize) -> Self {
            self.fail_at = Some(index);
            self
        }
    }

    #[async_trait]
    impl NodeLauncher for FakeLauncher {
        async fn launch(&self, spec: &LaunchSpec) -> Result<LaunchedNode, SwarmError> {
            if self.fail_at == Some(spec.index) {
                return Err(SwarmError::Launch {
                    program: spec.program.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
                });
            }

            self.record.lock().unwrap().launched.push(spec.clone());
            if let Some((index, cancel)) = &self.cancel_at {
                if *index == spec.index {
                    cancel.cancel();
                }
            }
            let diagnostics = match spec.role {
                NodeRole::Bootstrap => Some(Box::new(self.bootstrap_output) as DiagnosticStream),
                NodeRole::Peer => None,
            };

            Ok(LaunchedNode {
                process: Box::new(FakeProcess {
                    index: spec.index,
                    record: self.record.clone(),
                }),
                diagnostics,
            })
        }
    }

    fn config(nodes: Option<usize>) -> SwarmConfig {
        SwarmConfig {
            nodes,
            ..SwarmConfig::default()
        }
    }

    fn sequence_of(coordinator: &SwarmCoordinator<FakeLauncher>, kind: SwarmEventKind) -> u64 {
        coordinator
            .events()
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.sequence)
            .unwrap()
    }

    #[test]
    fn test_default_node_count() {
        let config = SwarmConfig::default();
        assert_eq!(config.nodes, None);
        assert_eq!(config.node_count(), 8);
    }

    #[test]
    fn test_node_arguments() {
        let config = SwarmConfig {
            extra_args: vec!["--network".to_string(), "test".to_string()],
            data_dir: Some(PathBuf::from("/tmp/finkles")),
            ..SwarmConfig::default()
        };
        let facts = BootstrapFacts::new("QmAbc123", "/ip4/127.0.0.1/tcp/4001");

        assert_eq!(config.bootstrap_args(), vec!["-n", "--network", "test"]);
        assert_eq!(
            config.peer_args(&facts),
            vec![
                "--bootstrap-peer-id",
                "QmAbc123",
                "--bootstrap-peer-addr",
                "/ip4/127.0.0.1/tcp/4001",
                "--network",
                "test",
            ]
        );
        assert_eq!(
            config.working_dir(3),
            Some(PathBuf::from("/tmp/finkles/node-3"))
        );
    }

    #[tokio::test]
    async fn test_start_five_nodes() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let record = launcher.record.clone();
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(5)), launcher);

        let state = coordinator.start(&CancellationToken::new()).await.unwrap();

        assert_eq!(state.len(), 5);
        assert_eq!(record.lock().unwrap().launched.len(), 5);
        assert_eq!(state.get(0).unwrap().role(), NodeRole::Bootstrap);
        for worker in &state.workers()[1..] {
            assert_eq!(worker.role(), NodeRole::Peer);
            assert_eq!(worker.args()[1], "QmAbc123");
            assert_eq!(worker.args()[3], "/ip4/127.0.0.1/tcp/4001");
        }

        // Every peer launch follows discovery completion
        let discovered = sequence_of(&coordinator, SwarmEventKind::DiscoveryCompleted);
        assert!(state.get(0).unwrap().sequence() < discovered);
        assert!(state.workers()[1..].iter().all(|w| w.sequence() > discovered));

        // Launch order matches index order
        let sequences: Vec<u64> = state.workers().iter().map(|w| w.sequence()).collect();
        assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));

        assert_eq!(
            state.bootstrap(),
            Some(&BootstrapFacts::new("QmAbc123", "/ip4/127.0.0.1/tcp/4001"))
        );
        assert!(record.lock().unwrap().terminated.is_empty());

        state.shutdown().await.unwrap();
        assert_eq!(record.lock().unwrap().terminated, vec![4, 3, 2, 1, 0]);
    }

    #[tokio::test]
    async fn test_default_spawns_eight() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let mut coordinator = SwarmCoordinator::with_launcher(config(None), launcher);

        let state = coordinator.start(&CancellationToken::new()).await.unwrap();
        assert_eq!(state.len(), 8);
    }

    #[tokio::test]
    async fn test_zero_nodes_launches_nothing() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let record = launcher.record.clone();
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(0)), launcher);

        let state = coordinator.start(&CancellationToken::new()).await.unwrap();
        assert!(state.is_empty());
        assert!(state.bootstrap().is_none());
        assert!(record.lock().unwrap().launched.is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_launch_failure() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT).failing_at(0);
        let record = launcher.record.clone();
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(5)), launcher);

        let err = coordinator
            .start(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SwarmError::Launch { .. }));
        assert!(record.lock().unwrap().launched.is_empty());
        assert!(coordinator
            .events()
            .iter()
            .all(|e| e.kind != SwarmEventKind::NodeLaunched));
    }

    #[tokio::test]
    async fn test_discovery_failure_tears_down_bootstrap() {
        let launcher = FakeLauncher::new(b"INFO peer ID: QmAbc123\n");
        let record = launcher.record.clone();
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(3)), launcher);

        let err = coordinator
            .start(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SwarmError::DiscoveryIncomplete { .. }));
        let record = record.lock().unwrap();
        assert_eq!(record.launched.len(), 1);
        assert_eq!(record.terminated, vec![0]);
    }

    #[tokio::test]
    async fn test_peer_failure_tears_down_launched_nodes() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT).failing_at(2);
        let record = launcher.record.clone();
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(4)), launcher);

        let err = coordinator
            .start(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SwarmError::Launch { .. }));
        let record = record.lock().unwrap();
        assert_eq!(record.launched.len(), 2);
        assert_eq!(record.terminated, vec![1, 0]);
        assert!(coordinator
            .events()
            .iter()
            .any(|e| e.kind == SwarmEventKind::SpawnFailed));
    }

    #[tokio::test]
    async fn test_cancelled_before_discovery() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let record = launcher.record.clone();
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(2)), launcher);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = coordinator.start(&cancel).await.unwrap_err();

        assert!(matches!(err, SwarmError::DiscoveryCancelled));
        assert_eq!(record.lock().unwrap().terminated, vec![0]);
    }

    #[tokio::test]
    async fn test_cancelled_between_peer_launches() {
        let cancel = CancellationToken::new();
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT).cancelling_at(2, cancel.clone());
        let record = launcher.record.clone();
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(5)), launcher);

        let err = coordinator.start(&cancel).await.unwrap_err();

        assert!(matches!(err, SwarmError::SpawnCancelled { launched: 3 }));
        let record = record.lock().unwrap();
        assert_eq!(record.launched.len(), 3);
        assert_eq!(record.terminated, vec![2, 1, 0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_interrupts_slow_callback() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let record = launcher.record.clone();
        let config = SwarmConfig {
            nodes: Some(3),
            callback: Some("sleep 30".to_string()),
            ..SwarmConfig::default()
        };
        let mut coordinator = SwarmCoordinator::with_launcher(config, launcher);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = coordinator.start(&cancel).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, SwarmError::SpawnCancelled { launched: 1 }));
        assert_eq!(record.lock().unwrap().terminated, vec![0]);
    }

    /// Reads a single `READY id=<peer> addr=<address>` line
    struct SentinelExtractor;

    impl FactExtractor for SentinelExtractor {
        fn extract(&self, line: &str) -> Option<Fact> {
            self.extract_all(line).into_iter().next()
        }

        fn extract_all(&self, line: &str) -> Vec<Fact> {
            let Some(rest) = line.strip_prefix("READY ") else {
                return Vec::new();
            };
            rest.split_whitespace()
                .filter_map(|field| match field.split_once('=') {
                    Some(("id", value)) => Some(Fact::PeerId(value.to_string())),
                    Some(("addr", value)) => Some(Fact::ListenAddr(value.to_string())),
                    _ => None,
                })
                .collect()
        }
    }

    const SENTINEL_OUTPUT: &[u8] = b"booting
        READY id=QmSentinel addr=/ip4/10.0.0.1/tcp/7000
        serving
";

    #[tokio::test]
    async fn test_custom_extractor() {
        let launcher = FakeLauncher::new(SENTINEL_OUTPUT);
        let mut coordinator = SwarmCoordinator::with_launcher(config(Some(3)), launcher)
            .with_extractor(SentinelExtractor);

        let state = coordinator.start(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            state.bootstrap(),
            Some(&BootstrapFacts::new("QmSentinel", "/ip4/10.0.0.1/tcp/7000"))
        );
        for worker in &state.workers()[1..] {
            assert_eq!(worker.args()[1], "QmSentinel");
            assert_eq!(worker.args()[3], "/ip4/10.0.0.1/tcp/7000");
        }

        // The log vocabulary alone never finds these facts
        let launcher = FakeLauncher::new(SENTINEL_OUTPUT);
        let err = SwarmCoordinator::with_launcher(config(Some(3)), launcher)
            .start(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::DiscoveryIncomplete { lines_read: 3 }));
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let (tx, mut rx) = mpsc::channel(64);
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let mut coordinator =
            SwarmCoordinator::with_launcher(config(Some(2)), launcher).with_event_channel(tx);

        coordinator.start(&CancellationToken::new()).await.unwrap();
        drop(coordinator);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                SwarmEventKind::SpawnStarted,
                SwarmEventKind::NodeLaunched,
                SwarmEventKind::DiscoveryStarted,
                SwarmEventKind::DiscoveryCompleted,
                SwarmEventKind::NodeLaunched,
                SwarmEventKind::SpawnCompleted,
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_callback_runs_per_node() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let config = SwarmConfig {
            nodes: Some(3),
            callback: Some("true".to_string()),
            ..SwarmConfig::default()
        };
        let mut coordinator = SwarmCoordinator::with_launcher(config, launcher);

        coordinator.start(&CancellationToken::new()).await.unwrap();
        let callbacks: Vec<Option<usize>> = coordinator
            .events()
            .iter()
            .filter(|e| e.kind == SwarmEventKind::CallbackCompleted)
            .map(|e| e.node)
            .collect();
        assert_eq!(callbacks, vec![Some(0), Some(1), Some(2)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_callback_failure_aborts_spawn() {
        let launcher = FakeLauncher::new(BOOTSTRAP_OUTPUT);
        let record = launcher.record.clone();
        let config = SwarmConfig {
            nodes: Some(3),
            callback: Some("false".to_string()),
            ..SwarmConfig::default()
        };
        let mut coordinator = SwarmCoordinator::with_launcher(config, launcher);

        let err = coordinator
            .start(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SwarmError::Callback { index: 0, .. }));
        assert_eq!(record.lock().unwrap().terminated, vec![0]);
    }
}
