//! Long-running domain monitor with change detection.
//!
//! The monitor owns the watched domain set, the result cache and the
//! last known status of every domain. Each check result goes through one
//! serialized step that compares it with the last known non-error status,
//! emits a [`StatusChangeEvent`] on a real transition, and caches the result
//! for as long as its status warrants.
//!
//! ```rust,no_run
//! use domain_watch_lib::{Monitor, MonitorConfig, StaticTldRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = Arc::new(Monitor::new(
//!         MonitorConfig::default(),
//!         Arc::new(StaticTldRegistry::builtin()),
//!     )?);
//!     monitor.set_domains(&["example.com".to_string()]);
//!     let mut events = monitor.take_events().expect("first caller gets the stream");
//!     monitor.start()?;
//!     while let Some(event) = events.recv().await {
//!         println!("{}", event.message);
//!     }
//!     Ok(())
//! }
//! ```

use crate::cache::{CacheStats, DomainCache, SWEEP_INTERVAL};
use crate::checker::DomainChecker;
use crate::error::DomainWatchError;
use crate::protocols::TldRegistry;
use crate::status::{cache_key, cache_policy, DomainStatus, ERROR_CACHE_DURATION};
use crate::types::{DomainInfo, MonitorConfig, StatusChangeEvent};
use crate::utils::{normalize_domain, validate_domain};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the status change event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 1000;

/// How long a full batch snapshot is served by `get_all_domain_info`.
pub const SNAPSHOT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

#[derive(Default)]
struct MonitorState {
    domains: Vec<String>,
    last_status: HashMap<String, DomainStatus>,
    snapshot: Vec<DomainInfo>,
    snapshot_at: Option<Instant>,
    last_check_at: Option<DateTime<Utc>>,
    running: bool,
    /// Stop signal of the current run
    stop: Option<Arc<Notify>>,
}

impl MonitorState {
    fn invalidate_snapshot(&mut self) {
        self.snapshot.clear();
        self.snapshot_at = None;
    }
}

/// Monitor statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub domain_count: usize,
    pub is_running: bool,
    pub tracked_domains: usize,
    /// Status counts from the most recent full batch
    pub status_counts: BTreeMap<DomainStatus, usize>,
    pub cache: CacheStats,
    pub pending_events: usize,
    pub event_capacity: usize,
    pub dropped_events: u64,
    pub uptime_secs: u64,
    pub check_interval_secs: u64,
    pub concurrent_limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check_at: Option<DateTime<Utc>>,
}

/// Periodically checks a set of domains and reports status transitions.
pub struct Monitor {
    checker: DomainChecker,
    config: MonitorConfig,
    state: RwLock<MonitorState>,
    cache: Arc<DomainCache>,
    events_tx: mpsc::Sender<StatusChangeEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<StatusChangeEvent>>>,
    dropped_events: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    created_at: Instant,
}

impl Monitor {
    /// Create a stopped monitor with an empty domain set.
    pub fn new(
        config: MonitorConfig,
        registry: Arc<dyn TldRegistry>,
    ) -> Result<Self, DomainWatchError> {
        let checker = DomainChecker::new(config.check_config(), registry)?;
        Ok(Self::with_checker(config, checker))
    }

    /// Create a monitor around an existing checker.
    pub fn with_checker(config: MonitorConfig, checker: DomainChecker) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let cache = Arc::new(DomainCache::new(
            config.cache_capacity,
            config.cache_duration,
        ));

        Self {
            checker,
            config,
            state: RwLock::new(MonitorState::default()),
            cache,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            dropped_events: AtomicU64::new(0),
            sweeper: Mutex::new(None),
            created_at: Instant::now(),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MonitorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MonitorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn checker(&self) -> &DomainChecker {
        &self.checker
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Take the status change event stream.
    ///
    /// There is a single consumer; later calls return `None`.
    pub fn take_events(&self) -> Option<mpsc::Receiver<StatusChangeEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // ── Domain set ───────────────────────────────────────────────────────

    /// Replace the watched domain set.
    ///
    /// Entries are normalized and validated; invalid names are skipped with
    /// a warning and duplicates collapse. The cache is cleared.
    ///
    /// # Returns
    ///
    /// The number of domains accepted.
    pub fn set_domains(&self, domains: &[String]) -> usize {
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(domains.len());

        for raw in domains {
            let name = normalize_domain(raw);
            if let Err(e) = validate_domain(&name) {
                warn!(domain = %raw, error = %e, "skipping invalid domain");
                continue;
            }
            if seen.insert(name.clone()) {
                accepted.push(name);
            }
        }

        let count = accepted.len();
        {
            let mut state = self.write_state();
            state.last_status.retain(|domain, _| seen.contains(domain));
            state.domains = accepted;
            state.invalidate_snapshot();
        }
        self.cache.clear();

        info!(domains = count, skipped = domains.len() - count, "domain set loaded");
        count
    }

    /// Add a single domain to the watched set.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDomain` for a malformed name and `MonitorError` if
    /// the domain is already watched.
    pub fn add_domain(&self, domain: &str) -> Result<(), DomainWatchError> {
        let name = normalize_domain(domain);
        validate_domain(&name)?;

        let mut state = self.write_state();
        if state.domains.contains(&name) {
            return Err(DomainWatchError::monitor(format!(
                "domain '{}' is already monitored",
                name
            )));
        }
        state.domains.push(name.clone());
        state.invalidate_snapshot();
        self.cache.invalidate(&cache_key(&name));
        debug!(domain = %name, "domain added");
        Ok(())
    }

    /// Remove a domain from the watched set and forget its history.
    pub fn remove_domain(&self, domain: &str) -> Result<(), DomainWatchError> {
        let name = normalize_domain(domain);

        let mut state = self.write_state();
        let Some(position) = state.domains.iter().position(|d| *d == name) else {
            return Err(DomainWatchError::monitor(format!(
                "domain '{}' is not monitored",
                name
            )));
        };
        state.domains.remove(position);
        state.last_status.remove(&name);
        state.invalidate_snapshot();
        self.cache.invalidate(&cache_key(&name));
        debug!(domain = %name, "domain removed");
        Ok(())
    }

    /// Watched domains in insertion order.
    pub fn domains(&self) -> Vec<String> {
        self.read_state().domains.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.read_state().running
    }

    /// Start periodic checking.
    ///
    /// One full check runs immediately, then one per `check_interval`.
    ///
    /// # Errors
    ///
    /// Fails if the monitor is already running or has no domains.
    pub fn start(self: &Arc<Self>) -> Result<(), DomainWatchError> {
        let stop = Arc::new(Notify::new());
        {
            let mut state = self.write_state();
            if state.running {
                return Err(DomainWatchError::monitor("monitor is already running"));
            }
            if state.domains.is_empty() {
                return Err(DomainWatchError::monitor("no domains to monitor"));
            }
            state.running = true;
            state.stop = Some(Arc::clone(&stop));
        }

        {
            let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
            if sweeper.as_ref().map_or(true, |h| h.is_finished()) {
                *sweeper = Some(self.cache.spawn_sweeper(SWEEP_INTERVAL));
            }
        }

        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run_loop(stop).await });

        info!(
            domains = self.domains().len(),
            interval_secs = self.config.check_interval.as_secs(),
            "monitor started"
        );
        Ok(())
    }

    /// Stop periodic checking. A cycle already in progress completes first.
    ///
    /// Does nothing if the monitor is not running.
    pub fn stop(&self) {
        let stop = {
            let mut state = self.write_state();
            if !state.running {
                return;
            }
            state.running = false;
            state.stop.take()
        };
        if let Some(stop) = stop {
            stop.notify_one();
        }
        info!("monitor stopped");
    }

    async fn run_loop(self: Arc<Self>, stop: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop.notified() => break,
                _ = ticker.tick() => {
                    self.check_all().await;
                }
            }
        }
        debug!("monitor loop exited");
    }

    // ── Checks ───────────────────────────────────────────────────────────

    /// Run one full batch over the watched set and process every result.
    pub async fn check_all(&self) -> Vec<DomainInfo> {
        let domains = self.domains();
        if domains.is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        let results = self.checker.check_domains(&domains).await;

        let mut changed = 0usize;
        let mut errors = 0usize;
        {
            let mut state = self.write_state();
            for info in &results {
                if info.is_error() {
                    errors += 1;
                    debug!(
                        domain = %info.name,
                        error = info.error_message.as_deref().unwrap_or_default(),
                        "check failed"
                    );
                }
                if self.apply_result(&mut state, info) {
                    changed += 1;
                }
            }
            state.snapshot = results.clone();
            state.snapshot_at = Some(Instant::now());
            state.last_check_at = Some(Utc::now());
        }

        info!(
            domains = results.len(),
            changed,
            errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "check cycle complete"
        );
        results
    }

    /// Status of one domain, served from cache when fresh.
    pub async fn get_domain_info(&self, domain: &str) -> DomainInfo {
        let name = normalize_domain(domain);
        if let Some(info) = self.cache.get(&cache_key(&name)) {
            debug!(domain = %name, "cache hit");
            return info;
        }

        debug!(domain = %name, "cache miss, checking");
        let info = self.checker.check_domain(&name).await;
        self.process_result(&info);
        info
    }

    /// Re-check one domain, bypassing the cache.
    pub async fn force_check(&self, domain: &str) -> DomainInfo {
        let name = normalize_domain(domain);
        self.cache.invalidate(&cache_key(&name));

        let info = self.checker.check_domain(&name).await;
        self.process_result(&info);
        info
    }

    /// Status of every watched domain.
    ///
    /// Returns the last full batch if it is younger than five minutes,
    /// otherwise runs a fresh batch.
    pub async fn get_all_domain_info(&self) -> Vec<DomainInfo> {
        {
            let state = self.read_state();
            let fresh = state
                .snapshot_at
                .map(|at| at.elapsed() < SNAPSHOT_MAX_AGE)
                .unwrap_or(false);
            if fresh && !state.snapshot.is_empty() {
                return state.snapshot.clone();
            }
        }
        self.check_all().await
    }

    /// Feed one result through change detection and caching.
    ///
    /// # Returns
    ///
    /// `true` if the result changed the domain's last known status.
    pub fn process_result(&self, info: &DomainInfo) -> bool {
        let mut state = self.write_state();
        self.apply_result(&mut state, info)
    }

    fn apply_result(&self, state: &mut MonitorState, info: &DomainInfo) -> bool {
        let key = cache_key(&info.name);

        if info.is_error() {
            self.cache
                .set_with_duration(&key, info.clone(), ERROR_CACHE_DURATION);
            return false;
        }

        self.cache
            .set_with_duration(&key, info.clone(), info.cache_duration());

        match state.last_status.insert(info.name.clone(), info.status) {
            Some(previous) if previous != info.status => {
                self.emit(StatusChangeEvent::new(&info.name, previous, info.status));
                true
            }
            _ => false,
        }
    }

    fn emit(&self, event: StatusChangeEvent) {
        info!(
            domain = %event.domain,
            from = %event.old_status,
            to = %event.new_status,
            "status changed"
        );
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                warn!(domain = %event.domain, "event queue full, dropping status change");
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                debug!(domain = %event.domain, "event stream closed, dropping status change");
            }
        }
    }

    // ── State export and stats ───────────────────────────────────────────

    /// Last known non-error status of every tracked domain.
    pub fn last_known_statuses(&self) -> HashMap<String, DomainStatus> {
        self.read_state().last_status.clone()
    }

    /// Seed last known statuses, e.g. from state persisted by the caller.
    ///
    /// Error entries are ignored. Existing entries are overwritten.
    pub fn restore_last_known(&self, statuses: HashMap<String, DomainStatus>) {
        let mut state = self.write_state();
        for (domain, status) in statuses {
            if !status.is_error() {
                state.last_status.insert(normalize_domain(&domain), status);
            }
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remaining cache lifetime of a domain's result, if cached.
    pub fn cached_ttl(&self, domain: &str) -> Option<Duration> {
        self.cache.remaining_ttl(&cache_key(&normalize_domain(domain)))
    }

    /// Human-readable cache lifetime per status.
    pub fn cache_policy(&self) -> Vec<(&'static str, &'static str)> {
        cache_policy()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        self.write_state().invalidate_snapshot();
        info!("domain cache cleared");
    }

    pub fn stats(&self) -> MonitorStats {
        let state = self.read_state();
        let mut status_counts = BTreeMap::new();
        for info in &state.snapshot {
            *status_counts.entry(info.status).or_insert(0) += 1;
        }

        MonitorStats {
            domain_count: state.domains.len(),
            is_running: state.running,
            tracked_domains: state.last_status.len(),
            status_counts,
            cache: self.cache.stats(),
            pending_events: EVENT_QUEUE_CAPACITY - self.events_tx.capacity(),
            event_capacity: EVENT_QUEUE_CAPACITY,
            dropped_events: self.dropped_events(),
            uptime_secs: self.created_at.elapsed().as_secs(),
            check_interval_secs: self.config.check_interval.as_secs(),
            concurrent_limit: self.config.concurrent_limit,
            last_check_at: state.last_check_at,
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(handle) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
