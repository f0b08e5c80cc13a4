//! Background refresh loop and emergency mode

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::emergency::{EmergencyState, InstanceStatus};
use crate::error::RefreshError;
use crate::member::MemberId;
use crate::refresher::TopologyRefresher;
use crate::source::{GroupStatusSource, MetadataSource};
use crate::store::SnapshotStore;
use crate::topology::{AvailabilityState, RoutingSnapshot};

/// Default time between regular refresh passes
const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Default tick granularity of the refresh loop
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest tick the loop will sleep for
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// How long `stop` waits for the worker to exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the refresh scheduler
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshSchedulerConfig {
    /// Time between regular refresh passes
    pub ttl: Duration,

    /// Tick granularity; emergency mode refreshes on every tick.
    ///
    /// Values below 10ms are raised to 10ms.
    pub tick_interval: Duration,
}

impl Default for RefreshSchedulerConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl RefreshSchedulerConfig {
    /// Tick interval the loop actually sleeps for
    pub fn effective_tick_interval(&self) -> Duration {
        self.tick_interval.max(MIN_TICK_INTERVAL)
    }

    /// Number of ticks making up one TTL, at least one
    pub fn ticks_per_ttl(&self) -> u64 {
        let tick = self.effective_tick_interval().as_nanos();
        let ticks = self.ttl.as_nanos().div_ceil(tick).max(1);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

/// Result of one completed refresh pass
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RefreshOutcome {
    /// Whether the published members changed
    pub changed: bool,

    /// Availability of the new topology
    pub availability: AvailabilityState,
}

/// Point-in-time refresh statistics
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RefreshStats {
    /// Passes that produced a snapshot
    pub refresh_succeeded: u64,

    /// Passes that failed to read the metadata
    pub refresh_failed: u64,

    /// Member whose group view was last adopted
    pub last_quorum_source: Option<MemberId>,
}

#[derive(Debug, Default)]
struct RefreshCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    last_quorum_source: Mutex<Option<MemberId>>,
}

impl RefreshCounters {
    fn record_success(&self, quorum_source: Option<MemberId>) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        *self.last_quorum_source.lock() = quorum_source;
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RefreshStats {
        RefreshStats {
            refresh_succeeded: self.succeeded.load(Ordering::Relaxed),
            refresh_failed: self.failed.load(Ordering::Relaxed),
            last_quorum_source: self.last_quorum_source.lock().clone(),
        }
    }
}

/// Bootable state for the background worker
struct BootableState {
    refresh_task: Option<JoinHandle<()>>,
    shutdown_signal: Option<oneshot::Sender<()>>,
}

/// Decides when to refresh, publishes the results and owns emergency mode.
///
/// Emergency mode is entered on a routing failure report and only left once a
/// pass both changes the published members and leaves at least one member
/// writable. A cluster kept read-only on purpose, or one that only looked
/// unreachable because of a local probe error, therefore stays in emergency
/// mode until its topology changes. A report that arrives while a pass is
/// running is never cleared by that pass.
pub struct RefreshScheduler<M, G>
where
    M: MetadataSource,
    G: GroupStatusSource,
{
    refresher: Arc<TopologyRefresher<M, G>>,
    store: Arc<SnapshotStore>,
    emergency: Arc<EmergencyState>,
    /// Wakes the worker for an out-of-cadence pass
    wake: Arc<Notify>,
    /// Coalesces wake requests until the worker consumes them
    wake_requested: Arc<AtomicBool>,
    /// Serializes passes so a snapshot is published by one pass at a time
    pass_lock: Arc<tokio::sync::Mutex<()>>,
    counters: Arc<RefreshCounters>,
    bootable_state: Arc<RwLock<BootableState>>,
    config: RefreshSchedulerConfig,
}

impl<M, G> RefreshScheduler<M, G>
where
    M: MetadataSource,
    G: GroupStatusSource,
{
    /// Create a new scheduler publishing into `store`
    pub fn new(
        refresher: TopologyRefresher<M, G>,
        store: Arc<SnapshotStore>,
        emergency: Arc<EmergencyState>,
        config: RefreshSchedulerConfig,
    ) -> Self {
        info!(
            "Creating refresh scheduler with ttl {:?} and tick interval {:?}",
            config.ttl, config.tick_interval
        );

        if config.tick_interval < MIN_TICK_INTERVAL {
            warn!(
                "Tick interval {:?} is too short, using {:?}",
                config.tick_interval, MIN_TICK_INTERVAL
            );
        }

        Self {
            refresher: Arc::new(refresher),
            store,
            emergency,
            wake: Arc::new(Notify::new()),
            wake_requested: Arc::new(AtomicBool::new(false)),
            pass_lock: Arc::new(tokio::sync::Mutex::new(())),
            counters: Arc::new(RefreshCounters::default()),
            bootable_state: Arc::new(RwLock::new(BootableState {
                refresh_task: None,
                shutdown_signal: None,
            })),
            config,
        }
    }

    /// Start the background refresh worker. Calling it again while running does nothing.
    pub async fn start(&self) {
        let mut bootable_state = self.bootable_state.write().await;

        if bootable_state
            .refresh_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            debug!("Refresh scheduler already running");
            return;
        }

        info!("Starting refresh scheduler");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let scheduler = self.clone();
        let task = tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        });

        bootable_state.refresh_task = Some(task);
        bootable_state.shutdown_signal = Some(shutdown_tx);
    }

    /// Stop the background refresh worker. Calling it again after it stopped does nothing.
    ///
    /// A pass already talking to a collaborator is allowed to finish.
    pub async fn stop(&self) {
        let mut bootable_state = self.bootable_state.write().await;

        if let Some(shutdown_signal) = bootable_state.shutdown_signal.take() {
            info!("Stopping refresh scheduler");
            let _ = shutdown_signal.send(());
        }

        if let Some(task) = bootable_state.refresh_task.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Refresh task shut down cleanly"),
                Ok(Err(e)) => error!("Refresh task panicked: {}", e),
                Err(_) => error!("Refresh task did not shut down within timeout"),
            }
        }
    }

    /// Wait for the background worker to exit
    pub async fn wait(&self) {
        let task_handle = {
            let state = self.bootable_state.read().await;
            state.refresh_task.as_ref().map(JoinHandle::abort_handle)
        };

        if let Some(handle) = task_handle {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    /// Request a refresh outside the TTL cadence.
    ///
    /// Requests made before the worker picks one up are coalesced into a single pass.
    pub fn notify(&self) {
        if !self.wake_requested.swap(true, Ordering::AcqRel) {
            self.wake.notify_one();
        }
    }

    /// Report a routing failure; the worker refreshes on every tick until emergency mode clears
    pub fn report_unreachable(&self) {
        if self.emergency.activate() {
            warn!("Routing failure reported, entering emergency mode");
        }
    }

    /// Report the reachability the data plane observed for `member`.
    ///
    /// Only failures against members of the published topology enter emergency mode.
    pub fn mark_instance_reachability(&self, member: &MemberId, status: InstanceStatus) {
        if !status.triggers_emergency() {
            return;
        }

        if self.store.current().topology.member(member).is_none() {
            debug!(
                "Ignoring {:?} report for {}, not part of the published topology",
                status, member
            );
            return;
        }

        if self.emergency.activate() {
            warn!(
                "Member {} reported {:?}, increasing metadata refresh frequency",
                member, status
            );
        }
    }

    /// Whether emergency mode is active
    pub fn is_emergency_active(&self) -> bool {
        self.emergency.is_active()
    }

    /// The currently published snapshot
    pub fn current(&self) -> Arc<RoutingSnapshot> {
        self.store.current()
    }

    /// Get the snapshot store
    pub const fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Get the refresher
    pub const fn refresher(&self) -> &Arc<TopologyRefresher<M, G>> {
        &self.refresher
    }

    /// Refresh statistics so far
    pub fn stats(&self) -> RefreshStats {
        self.counters.snapshot()
    }

    /// Run exactly one refresh pass and publish its result.
    ///
    /// On failure the published snapshot is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshError`] of a pass that could not read the metadata.
    pub async fn refresh_once(&self) -> Result<RefreshOutcome, RefreshError> {
        let _pass = self.pass_lock.lock().await;

        // Reports arriving after this point postdate the data the pass reads
        let emergency_generation = self.emergency.generation();

        let previous = self.store.current();
        let snapshot = match self.refresher.refresh(&previous.metadata_servers).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.counters.record_failure();
                warn!(
                    "Failed to refresh cluster topology, keeping last known routing: {}",
                    e
                );
                return Err(e);
            }
        };

        self.counters.record_success(snapshot.quorum_source.clone());

        let availability = snapshot.availability();
        let writable = snapshot.topology.has_writable_member();
        let changed = self.store.publish(snapshot);

        if changed {
            Self::log_transition(&previous, &self.store.current());

            if writable && self.emergency.clear_if_unchanged(emergency_generation) {
                info!("Cluster is writable again, leaving emergency mode");
            } else if writable && self.emergency.is_active() {
                debug!("Routing failure reported during the pass, staying in emergency mode");
            }
        } else {
            debug!("Cluster topology unchanged ({})", availability);
        }

        Ok(RefreshOutcome {
            changed,
            availability,
        })
    }

    async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) {
        let ticks_per_ttl = self.config.ticks_per_ttl();
        let tick_interval = self.config.effective_tick_interval();

        loop {
            // Failures are logged by the pass and retried on the next trigger
            let _ = self.refresh_once().await;

            let mut countdown = ticks_per_ttl;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        info!("Refresh scheduler received shutdown signal");
                        return;
                    }
                    () = self.wake.notified() => {
                        self.wake_requested.store(false, Ordering::Release);
                        debug!("Refresh requested outside the TTL cadence");
                        break;
                    }
                    () = tokio::time::sleep(tick_interval) => {
                        if self.emergency.is_active() {
                            countdown = countdown.min(1);
                        }
                        countdown = countdown.saturating_sub(1);
                        if countdown == 0 {
                            break;
                        }
                    }
                }
            }
        }
    }

    fn log_transition(previous: &RoutingSnapshot, current: &RoutingSnapshot) {
        info!(
            "Cluster '{}' topology changed ({} -> {}), {} member(s):",
            current.topology.cluster_identity,
            previous.availability(),
            current.availability(),
            current.topology.members.len()
        );

        for member in &current.topology.members {
            match member.alternate_port {
                Some(alternate_port) => info!(
                    "    {} (alternate port {}) mode={:?}",
                    member.id, alternate_port, member.mode
                ),
                None => info!("    {} mode={:?}", member.id, member.mode),
            }
        }
    }
}

impl<M, G> Clone for RefreshScheduler<M, G>
where
    M: MetadataSource,
    G: GroupStatusSource,
{
    fn clone(&self) -> Self {
        Self {
            refresher: Arc::clone(&self.refresher),
            store: Arc::clone(&self.store),
            emergency: Arc::clone(&self.emergency),
            wake: Arc::clone(&self.wake),
            wake_requested: Arc::clone(&self.wake_requested),
            pass_lock: Arc::clone(&self.pass_lock),
            counters: Arc::clone(&self.counters),
            bootable_state: Arc::clone(&self.bootable_state),
            config: self.config.clone(),
        }
    }
}

impl<M, G> Debug for RefreshScheduler<M, G>
where
    M: MetadataSource,
    G: GroupStatusSource,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("config", &self.config)
            .field("emergency", &self.emergency)
            .finish_non_exhaustive()
    }
}
