//! Notification queue, deduplication and fan-out.
//!
//! Events go into a bounded queue drained by a single dispatcher task. The
//! dispatcher renders each event once and sends it to all enabled notifiers
//! concurrently. `status_change` events are deduplicated per
//! (domain, status): a repeat within 24 hours is treated as confirmation of
//! a known fact and suppressed.

use super::format::{format_message, format_subject};
use super::{NotificationEvent, NotificationKind, Notifier};
use crate::error::DomainWatchError;
use crate::status::DomainStatus;
use crate::types::StatusChangeEvent;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Capacity of the outbound queue.
pub const QUEUE_CAPACITY: usize = 1000;

/// Repeats of the same (domain, status) inside this window are suppressed.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Sent-history entries older than this are pruned.
pub const HISTORY_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How often the dispatcher prunes sent-history.
pub const HISTORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// What happened to an event handed to [`NotificationManager::send_notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted into the queue
    Queued,
    /// Same (domain, status) already notified within the dedup window
    Suppressed,
    /// Queue full
    Dropped,
    /// Manager stopped
    Disabled,
}

/// Notification counters and queue state.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationStats {
    pub enabled: bool,
    pub notifier_count: usize,
    pub enabled_notifiers: Vec<String>,
    pub queue_length: usize,
    pub queue_capacity: usize,
    pub delivered: u64,
    pub failed: u64,
    pub suppressed: u64,
    pub dropped: u64,
    pub tracked_domains: usize,
}

type SentHistory = HashMap<String, HashMap<DomainStatus, Instant>>;

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    suppressed: AtomicU64,
    dropped: AtomicU64,
}

struct Shared {
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
    history: Mutex<SentHistory>,
    counters: Counters,
}

impl Shared {
    fn history(&self) -> MutexGuard<'_, SentHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notifiers(&self) -> Vec<Arc<dyn Notifier>> {
        self.notifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn deliver(&self, event: NotificationEvent) {
        let subject = format_subject(&event);
        let message = format_message(&event);

        let targets: Vec<_> = self
            .notifiers()
            .into_iter()
            .filter(|n| n.is_enabled())
            .collect();
        if targets.is_empty() {
            debug!(domain = %event.domain, "no enabled notifiers");
            return;
        }

        let sends = targets.iter().map(|notifier| {
            let (subject, message) = (&subject, &message);
            async move {
                let result = notifier.send_message(subject, message).await;
                (notifier.notifier_type().to_string(), result)
            }
        });

        for (kind, result) in join_all(sends).await {
            match result {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(notifier = %kind, domain = %event.domain, error = %e, "notification failed");
                }
            }
        }
    }

    fn prune_history(&self) -> usize {
        let now = Instant::now();
        let mut history = self.history();
        for statuses in history.values_mut() {
            statuses.retain(|_, sent| now.saturating_duration_since(*sent) < HISTORY_RETENTION);
        }
        history.retain(|_, statuses| !statuses.is_empty());
        history.len()
    }
}

/// Deduplicates notification events and fans them out to notifiers.
///
/// # Example
///
/// ```rust,no_run
/// use domain_watch_lib::{LogNotifier, NotificationManager};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), domain_watch_lib::DomainWatchError> {
/// let manager = NotificationManager::new();
/// manager.add_notifier(Arc::new(LogNotifier::new()));
/// manager.start()?;
/// // ... send_notification(...) ...
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct NotificationManager {
    shared: Arc<Shared>,
    enabled: AtomicBool,
    queue_tx: Mutex<Option<mpsc::Sender<NotificationEvent>>>,
    queue_rx: Mutex<Option<mpsc::Receiver<NotificationEvent>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                notifiers: RwLock::new(Vec::new()),
                history: Mutex::new(HashMap::new()),
                counters: Counters::default(),
            }),
            enabled: AtomicBool::new(true),
            queue_tx: Mutex::new(Some(tx)),
            queue_rx: Mutex::new(Some(rx)),
            dispatcher: Mutex::new(None),
        }
    }

    /// Register a notifier. Disabled notifiers are ignored.
    ///
    /// # Returns
    ///
    /// Whether the notifier was registered.
    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) -> bool {
        if !notifier.is_enabled() {
            debug!(notifier = notifier.notifier_type(), "skipping disabled notifier");
            return false;
        }
        info!(notifier = notifier.notifier_type(), "notifier registered");
        self.shared
            .notifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notifier);
        true
    }

    /// Spawn the dispatcher task.
    ///
    /// # Errors
    ///
    /// Fails if the dispatcher was already started.
    pub fn start(&self) -> Result<(), DomainWatchError> {
        let rx = self
            .queue_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| DomainWatchError::internal("notification dispatcher already started"))?;

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(dispatch(shared, rx));
        *self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        debug!("notification dispatcher started");
        Ok(())
    }

    /// Stop accepting events. Events already queued are still delivered.
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.queue_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Stop and wait for the dispatcher to drain the queue.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "notification dispatcher terminated abnormally");
            }
        }
        info!("notification manager stopped");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Queue an event for delivery without blocking.
    ///
    /// `status_change` events whose (domain, status) was already queued
    /// within [`DEDUP_WINDOW`] are suppressed; otherwise the send is
    /// recorded at enqueue time.
    pub fn send_notification(&self, event: NotificationEvent) -> DispatchOutcome {
        if !self.is_enabled() {
            return DispatchOutcome::Disabled;
        }
        let Some(tx) = self
            .queue_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            return DispatchOutcome::Disabled;
        };

        let dedup = event.kind == NotificationKind::StatusChange;
        let mut history = self.shared.history();

        if dedup {
            let recent = history
                .get(&event.domain)
                .and_then(|statuses| statuses.get(&event.status))
                .map_or(false, |sent| sent.elapsed() < DEDUP_WINDOW);
            if recent {
                self.shared.counters.suppressed.fetch_add(1, Ordering::Relaxed);
                debug!(domain = %event.domain, status = %event.status, "suppressing repeat notification");
                return DispatchOutcome::Suppressed;
            }
        }

        let (domain, status) = (event.domain.clone(), event.status);
        match tx.try_send(event) {
            Ok(()) => {
                if dedup {
                    history
                        .entry(domain)
                        .or_default()
                        .insert(status, Instant::now());
                }
                DispatchOutcome::Queued
            }
            Err(TrySendError::Full(event)) => {
                self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(domain = %event.domain, "notification queue full, dropping event");
                DispatchOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => DispatchOutcome::Disabled,
        }
    }

    /// Forward monitor status changes as `status_change` notifications.
    ///
    /// The task ends when the event stream closes.
    pub fn spawn_forwarder(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<StatusChangeEvent>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(change) = events.recv().await {
                let outcome = manager.send_notification(NotificationEvent::from(&change));
                debug!(domain = %change.domain, ?outcome, "forwarded status change");
            }
        })
    }

    /// Prune sent-history older than [`HISTORY_RETENTION`].
    ///
    /// # Returns
    ///
    /// The number of domains still tracked.
    pub fn clear_history(&self) -> usize {
        let tracked = self.shared.prune_history();
        debug!(tracked, "pruned notification history");
        tracked
    }

    /// Run every registered notifier's self-test.
    pub async fn test_all_notifiers(&self) -> Vec<(String, Result<(), DomainWatchError>)> {
        let notifiers = self.shared.notifiers();
        let tests = notifiers.iter().map(|notifier| async move {
            (notifier.notifier_type().to_string(), notifier.test().await)
        });
        join_all(tests).await
    }

    pub fn enabled_notifiers(&self) -> Vec<String> {
        self.shared
            .notifiers()
            .iter()
            .filter(|n| n.is_enabled())
            .map(|n| n.notifier_type().to_string())
            .collect()
    }

    pub fn stats(&self) -> NotificationStats {
        let queue_length = self
            .queue_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |tx| QUEUE_CAPACITY - tx.capacity());
        let counters = &self.shared.counters;

        NotificationStats {
            enabled: self.is_enabled(),
            notifier_count: self.shared.notifiers().len(),
            enabled_notifiers: self.enabled_notifiers(),
            queue_length,
            queue_capacity: QUEUE_CAPACITY,
            delivered: counters.delivered.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            suppressed: counters.suppressed.load(Ordering::Relaxed),
            dropped: counters.dropped.load(Ordering::Relaxed),
            tracked_domains: self.shared.history().len(),
        }
    }
}

async fn dispatch(shared: Arc<Shared>, mut rx: mpsc::Receiver<NotificationEvent>) {
    let mut sweep = tokio::time::interval_at(
        Instant::now() + HISTORY_SWEEP_INTERVAL,
        HISTORY_SWEEP_INTERVAL,
    );

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => shared.deliver(event).await,
                None => break,
            },
            _ = sweep.tick() => {
                let tracked = shared.prune_history();
                debug!(tracked, "pruned notification history");
            }
        }
    }
    debug!("notification dispatcher exited");
}
