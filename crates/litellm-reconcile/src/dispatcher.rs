//! # Dispatcher
//!
//! Per-kind worker pool. Runs passes for different records concurrently and
//! passes for the same record strictly one after another.
//!
//! ## Scheduling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Dispatcher (one kind)                         │
//! │                                                                         │
//! │  enqueue(key) ──┐                                                       │
//! │  timer fires  ──┼──► queued? ── yes ──► coalesce                        │
//! │                 │      │                                                │
//! │                 │      no ──► running? ── yes ──► mark dirty            │
//! │                 │               │                                       │
//! │                 │               no ──► queue (FIFO)                     │
//! │                 │                                                       │
//! │  queue ──► at most `concurrency` passes, each under `pass_timeout`      │
//! │                                                                         │
//! │  pass finished                                                          │
//! │    Synced            reset backoff, drift timer                         │
//! │    Deleted / Gone    forget key                                         │
//! │    retryable error   backoff timer (initial..max, x2)                   │
//! │    terminal error    wait for the next enqueue                          │
//! │    dirty             re-queue immediately                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each key holds at most one live timer. Arming a timer or enqueueing the
//! key invalidates the previous one, so a stale timer fires into nothing.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionCache;
use crate::drift::DriftScheduler;
use crate::engine::{PassOutcome, Reconciler};
use crate::error::{ReconcileError, ReconcileResult};
use litellm_core::{ObjectKey, ResourceKind};

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 1024;

// =============================================================================
// Configuration and Stats
// =============================================================================

/// Scheduling parameters of one dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub concurrency: usize,
    pub pass_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub drift_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            concurrency: 4,
            pass_timeout: Duration::from_secs(60),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(300),
            drift_interval: Duration::from_secs(300),
        }
    }
}

/// Counters published for readiness and logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Passes in flight.
    pub running: usize,
    /// Keys waiting for a free slot.
    pub queued: usize,
    /// Passes that ended without error.
    pub succeeded: u64,
    /// Passes that ended with an error.
    pub failed: u64,
}

// =============================================================================
// Commands and Handle
// =============================================================================

#[derive(Debug)]
enum Command {
    Enqueue(ObjectKey),
    Timer { key: ObjectKey, token: u64 },
}

/// Handle for feeding and stopping a dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    kind: ResourceKind,
    commands_tx: mpsc::Sender<Command>,
    shutdown_tx: mpsc::Sender<()>,
    stats: Arc<RwLock<DispatchStats>>,
}

impl DispatcherHandle {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Requests a pass for `key`.
    pub async fn enqueue(&self, key: ObjectKey) -> ReconcileResult<()> {
        self.commands_tx
            .send(Command::Enqueue(key))
            .await
            .map_err(|_| ReconcileError::Channel(format!("{} dispatcher stopped", self.kind.kind)))
    }

    /// Triggers graceful shutdown. In-flight passes are allowed to finish.
    pub async fn shutdown(&self) -> ReconcileResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| ReconcileError::Channel(format!("{} dispatcher already stopped", self.kind.kind)))
    }

    pub async fn stats(&self) -> DispatchStats {
        self.stats.read().await.clone()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Default)]
struct KeyState {
    backoff: Option<ExponentialBackoff>,
    /// Token of the live timer; 0 when none.
    timer: u64,
}

/// Per-kind worker pool. Drive it with [`Dispatcher::run`].
pub struct Dispatcher {
    reconciler: Arc<dyn Reconciler>,
    cache: Arc<ConnectionCache>,
    config: DispatchConfig,
    drift: DriftScheduler,

    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<RwLock<DispatchStats>>,

    queue: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    running: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    keys: HashMap<ObjectKey, KeyState>,
    next_token: u64,
    succeeded: u64,
    failed: u64,
    passes: JoinSet<(ObjectKey, ReconcileResult<PassOutcome>)>,
}

impl Dispatcher {
    /// Creates a dispatcher and its handle.
    pub fn new(reconciler: Arc<dyn Reconciler>, config: DispatchConfig) -> (Self, DispatcherHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let stats = Arc::new(RwLock::new(DispatchStats::default()));

        let handle = DispatcherHandle {
            kind: reconciler.kind(),
            commands_tx: commands_tx.clone(),
            shutdown_tx,
            stats: stats.clone(),
        };

        let dispatcher = Dispatcher {
            reconciler,
            cache: Arc::new(ConnectionCache::new()),
            drift: DriftScheduler::new(config.drift_interval),
            config,
            commands_tx,
            commands_rx,
            shutdown_rx,
            stats,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            running: HashSet::new(),
            dirty: HashSet::new(),
            keys: HashMap::new(),
            next_token: 0,
            succeeded: 0,
            failed: 0,
            passes: JoinSet::new(),
        };

        (dispatcher, handle)
    }

    fn kind(&self) -> &'static str {
        self.reconciler.kind().kind
    }

    /// Runs until shutdown, then waits for in-flight passes.
    pub async fn run(mut self) {
        info!(
            kind = self.kind(),
            concurrency = self.config.concurrency,
            drift_interval = ?self.config.drift_interval,
            "Dispatcher started"
        );

        loop {
            self.start_ready();
            self.publish_stats().await;

            tokio::select! {
                Some(command) = self.commands_rx.recv() => self.handle(command),

                Some(joined) = self.passes.join_next(), if !self.passes.is_empty() => {
                    match joined {
                        Ok((key, result)) => self.finish(key, result),
                        Err(e) => error!(kind = self.kind(), error = %e, "Pass supervisor failed"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!(kind = self.kind(), in_flight = self.passes.len(), "Dispatcher received shutdown");
                    break;
                }
            }
        }

        while let Some(joined) = self.passes.join_next().await {
            if let Ok((key, result)) = joined {
                self.running.remove(&key);
                self.count(&result);
            }
        }
        self.queue.clear();
        self.queued.clear();
        self.publish_stats().await;
        info!(kind = self.kind(), "Dispatcher stopped");
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue(key) => {
                self.disarm(&key);
                self.schedule(key);
            }
            Command::Timer { key, token } => {
                let live = self.keys.get(&key).map(|s| s.timer) == Some(token);
                if live {
                    self.disarm(&key);
                    self.schedule(key);
                } else {
                    debug!(kind = self.kind(), %key, "Ignoring stale timer");
                }
            }
        }
    }

    fn schedule(&mut self, key: ObjectKey) {
        if self.running.contains(&key) {
            self.dirty.insert(key);
        } else if self.queued.insert(key.clone()) {
            self.queue.push_back(key);
        }
    }

    fn start_ready(&mut self) {
        while self.running.len() < self.config.concurrency {
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&key);
            self.running.insert(key.clone());
            self.spawn_pass(key);
        }
    }

    fn spawn_pass(&mut self, key: ObjectKey) {
        let reconciler = self.reconciler.clone();
        let cache = self.cache.clone();
        let deadline = self.config.pass_timeout;

        self.passes.spawn(async move {
            let pass_key = key.clone();
            let pass = tokio::spawn(async move {
                match tokio::time::timeout(deadline, reconciler.reconcile(&pass_key, &cache)).await {
                    Ok(result) => result,
                    Err(_) => {
                        let err = ReconcileError::Timeout(deadline);
                        record_timeout(&*reconciler, &pass_key, &err, deadline).await;
                        Err(err)
                    }
                }
            });

            let result = match pass.await {
                Ok(result) => result,
                Err(e) => Err(ReconcileError::Channel(format!("pass aborted: {}", e))),
            };
            (key, result)
        });
    }

    // =========================================================================
    // Outcomes
    // =========================================================================

    fn finish(&mut self, key: ObjectKey, result: ReconcileResult<PassOutcome>) {
        self.running.remove(&key);
        self.count(&result);

        match result {
            Ok(PassOutcome::Synced) => {
                let delay = self.drift.delay_for(&key);
                self.state(&key).backoff = None;
                debug!(kind = self.kind(), %key, next_check = ?delay, "Pass succeeded");
                self.arm(key.clone(), delay);
            }
            Ok(PassOutcome::Deleted) | Ok(PassOutcome::Gone) => {
                debug!(kind = self.kind(), %key, "Record finished, forgetting key");
                self.keys.remove(&key);
            }
            Err(err) if err.is_retryable() => {
                let delay = self.next_backoff(&key);
                debug!(kind = self.kind(), %key, retry_in = ?delay, "Pass failed, scheduling retry");
                self.arm(key.clone(), delay);
            }
            Err(err) => {
                warn!(kind = self.kind(), %key, error = %err, "Pass failed permanently until the record changes");
                self.state(&key).backoff = None;
            }
        }

        if self.dirty.remove(&key) {
            self.disarm(&key);
            self.schedule(key);
        }
    }

    fn count(&mut self, result: &ReconcileResult<PassOutcome>) {
        if result.is_err() {
            self.failed += 1;
        } else {
            self.succeeded += 1;
        }
    }

    // =========================================================================
    // Timers and Backoff
    // =========================================================================

    fn state(&mut self, key: &ObjectKey) -> &mut KeyState {
        self.keys.entry(key.clone()).or_default()
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.config.initial_backoff,
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    fn next_backoff(&mut self, key: &ObjectKey) -> Duration {
        let fresh = self.create_backoff();
        let max = self.config.max_backoff;
        let state = self.state(key);
        state
            .backoff
            .get_or_insert(fresh)
            .next_backoff()
            .unwrap_or(max)
            .min(max)
    }

    fn arm(&mut self, key: ObjectKey, delay: Duration) {
        self.next_token += 1;
        let token = self.next_token;
        self.state(&key).timer = token;

        let tx = self.commands_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The dispatcher may be gone.
            let _ = tx.send(Command::Timer { key, token }).await;
        });
    }

    fn disarm(&mut self, key: &ObjectKey) {
        if let Some(state) = self.keys.get_mut(key) {
            state.timer = 0;
        }
    }

    async fn publish_stats(&self) {
        let mut stats = self.stats.write().await;
        stats.running = self.running.len();
        stats.queued = self.queue.len();
        stats.succeeded = self.succeeded;
        stats.failed = self.failed;
    }
}

/// Surfaces a timed-out pass on the record. The write gets its own deadline.
async fn record_timeout(reconciler: &dyn Reconciler, key: &ObjectKey, err: &ReconcileError, deadline: Duration) {
    let kind = reconciler.kind().kind;
    match tokio::time::timeout(deadline, reconciler.record_failure(key, err)).await {
        Ok(Ok(())) => debug!(kind, %key, "Recorded pass timeout"),
        Ok(Err(e)) => warn!(kind, %key, error = %e, "Failed to record pass timeout"),
        Err(_) => warn!(kind, %key, "Recording pass timeout timed out"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use litellm_core::types::TEAM;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Script = Box<dyn Fn(usize) -> ReconcileResult<PassOutcome> + Send + Sync>;

    /// Counts passes per key and the peak overlap of passes per key.
    struct FakeReconciler {
        delay: Duration,
        script: Script,
        calls: Mutex<HashMap<ObjectKey, usize>>,
        in_flight: Mutex<HashMap<ObjectKey, usize>>,
        max_overlap: AtomicUsize,
        recorded: Mutex<Vec<(ObjectKey, String)>>,
    }

    impl FakeReconciler {
        fn new(delay: Duration, script: Script) -> Arc<Self> {
            Arc::new(FakeReconciler {
                delay,
                script,
                calls: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                max_overlap: AtomicUsize::new(0),
                recorded: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self, key: &ObjectKey) -> usize {
            self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Reconciler for FakeReconciler {
        fn kind(&self) -> ResourceKind {
            TEAM
        }

        async fn reconcile(&self, key: &ObjectKey, _cache: &ConnectionCache) -> ReconcileResult<PassOutcome> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(key.clone()).or_default();
                *n += 1;
                *n
            };
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                let n = in_flight.entry(key.clone()).or_default();
                *n += 1;
                self.max_overlap.fetch_max(*n, Ordering::SeqCst);
            }

            tokio::time::sleep(self.delay).await;

            *self.in_flight.lock().unwrap().get_mut(key).unwrap() -= 1;
            (self.script)(call)
        }

        async fn record_failure(&self, key: &ObjectKey, err: &ReconcileError) -> ReconcileResult<()> {
            self.recorded.lock().unwrap().push((key.clone(), err.to_string()));
            Ok(())
        }
    }

    fn config() -> DispatchConfig {
        DispatchConfig {
            concurrency: 2,
            pass_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            drift_interval: Duration::from_secs(3600),
        }
    }

    fn start(reconciler: Arc<FakeReconciler>, config: DispatchConfig) -> (DispatcherHandle, tokio::task::JoinHandle<()>) {
        let (dispatcher, handle) = Dispatcher::new(reconciler, config);
        (handle, tokio::spawn(dispatcher.run()))
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("ml", name)
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_serialized_and_coalesced() {
        let fake = FakeReconciler::new(Duration::from_millis(100), Box::new(|_| Ok(PassOutcome::Synced)));
        let (handle, _task) = start(fake.clone(), config());

        for _ in 0..3 {
            handle.enqueue(key("eng")).await.unwrap();
        }
        handle.enqueue(key("ops")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;

        // First pass plus one re-run for the triggers that arrived meanwhile.
        assert_eq!(fake.calls(&key("eng")), 2);
        assert_eq!(fake.calls(&key("ops")), 1);
        assert_eq!(fake.max_overlap.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit() {
        let fake = FakeReconciler::new(Duration::from_millis(100), Box::new(|_| Ok(PassOutcome::Synced)));
        let (handle, _task) = start(fake.clone(), config());

        for name in ["a", "b", "c", "d"] {
            handle.enqueue(key(name)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = handle.stats().await;
        assert_eq!(stats.running, 2);
        assert_eq!(stats.queued, 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.stats().await.succeeded, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_backs_off() {
        let fake = FakeReconciler::new(
            Duration::from_millis(10),
            Box::new(|call| {
                if call < 3 {
                    Err(ReconcileError::Connection("secret ml/gw not found".to_string()))
                } else {
                    Ok(PassOutcome::Synced)
                }
            }),
        );
        let (handle, _task) = start(fake.clone(), config());

        handle.enqueue(key("eng")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(fake.calls(&key("eng")), 3);
        let stats = handle.stats().await;
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_waits_for_change() {
        let fake = FakeReconciler::new(
            Duration::from_millis(10),
            Box::new(|_| {
                Err(ReconcileError::RemoteEntityMissing {
                    remote_id: "t-1".to_string(),
                })
            }),
        );
        let (handle, _task) = start(fake.clone(), config());

        handle.enqueue(key("eng")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fake.calls(&key("eng")), 1);

        handle.enqueue(key("eng")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fake.calls(&key("eng")), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drift_revisits_synced_records() {
        let fake = FakeReconciler::new(Duration::from_millis(10), Box::new(|_| Ok(PassOutcome::Synced)));
        let config = DispatchConfig {
            drift_interval: Duration::from_secs(60),
            ..config()
        };
        let (handle, _task) = start(fake.clone(), config);

        handle.enqueue(key("eng")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(100)).await;

        // One revisit within [54s, 66s]; the next is due after 108s.
        assert_eq!(fake.calls(&key("eng")), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_records_are_not_revisited() {
        let fake = FakeReconciler::new(Duration::from_millis(10), Box::new(|_| Ok(PassOutcome::Deleted)));
        let config = DispatchConfig {
            drift_interval: Duration::from_secs(60),
            ..config()
        };
        let (handle, _task) = start(fake.clone(), config);

        handle.enqueue(key("eng")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(fake.calls(&key("eng")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_timeout_is_retryable() {
        let fake = FakeReconciler::new(Duration::from_secs(30), Box::new(|_| Ok(PassOutcome::Synced)));
        let config = DispatchConfig {
            pass_timeout: Duration::from_secs(1),
            ..config()
        };
        let (handle, _task) = start(fake.clone(), config);

        handle.enqueue(key("eng")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(handle.stats().await.failed, 1);
        // Retried after backoff.
        assert_eq!(fake.calls(&key("eng")), 2);

        let recorded = fake.recorded.lock().unwrap().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, key("eng"));
        assert!(recorded[0].1.contains("timed out"));
    }

    #[test]
    fn test_first_backoff_honours_initial_interval() {
        let fake = FakeReconciler::new(Duration::ZERO, Box::new(|_| Ok(PassOutcome::Synced)));
        let config = DispatchConfig {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            ..config()
        };

        for i in 0..200 {
            let (mut dispatcher, _handle) = Dispatcher::new(fake.clone(), config.clone());
            let first = dispatcher.next_backoff(&key(&format!("k{}", i)));
            // Default randomization is +-50%.
            assert!(first >= Duration::from_millis(50), "first backoff {:?}", first);
            assert!(first <= Duration::from_millis(150), "first backoff {:?}", first);
        }
    }

    #[test]
    fn test_backoff_grows_and_resets() {
        let fake = FakeReconciler::new(Duration::ZERO, Box::new(|_| Ok(PassOutcome::Synced)));
        let (mut dispatcher, _handle) = Dispatcher::new(fake, config());
        let eng = key("eng");

        let first = dispatcher.next_backoff(&eng);
        let second = dispatcher.next_backoff(&eng);
        let third = dispatcher.next_backoff(&eng);
        assert!(first <= Duration::from_millis(150));
        assert!(second >= Duration::from_millis(100) && second <= Duration::from_millis(300));
        assert!(third >= Duration::from_millis(200) && third <= Duration::from_millis(600));

        dispatcher.state(&eng).backoff = None;
        assert!(dispatcher.next_backoff(&eng) <= Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight() {
        let fake = FakeReconciler::new(Duration::from_millis(500), Box::new(|_| Ok(PassOutcome::Synced)));
        let (handle, task) = start(fake.clone(), config());

        handle.enqueue(key("eng")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let stats = handle.stats().await;
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.running, 0);
        assert!(handle.enqueue(key("eng")).await.is_err());
    }
}
