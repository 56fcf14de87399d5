//! Change notifications.
//!
//! Status change events from the monitor are turned into
//! [`NotificationEvent`]s, deduplicated by the [`NotificationManager`] and
//! fanned out to every registered [`Notifier`].

use crate::error::DomainWatchError;
use crate::status::DomainStatus;
use crate::types::StatusChangeEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shell command and log notifiers
pub mod command;

/// Subject and body templates
pub mod format;

/// Queueing, deduplication and fan-out
pub mod manager;

pub use command::{CommandNotifier, LogNotifier};
pub use format::{format_message, format_subject};
pub use manager::{DispatchOutcome, NotificationManager, NotificationStats};

/// A delivery channel for notifications.
///
/// Implementations must be cheap to call concurrently; the manager sends
/// each event to all enabled notifiers at once.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    async fn send_message(&self, subject: &str, message: &str) -> Result<(), DomainWatchError>;

    fn is_enabled(&self) -> bool;

    /// Send a test message to verify the channel works.
    async fn test(&self) -> Result<(), DomainWatchError>;

    /// Short identifier, e.g. `"log"` or `"command"`.
    fn notifier_type(&self) -> &str;
}

/// Kind of notification; selects the message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StatusChange,
    Available,
    Redemption,
    PendingDelete,
    Error,
    Other,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::StatusChange => "status_change",
            NotificationKind::Available => "available",
            NotificationKind::Redemption => "redemption",
            NotificationKind::PendingDelete => "pending_delete",
            NotificationKind::Error => "error",
            NotificationKind::Other => "other",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub domain: String,
    /// Current status
    pub status: DomainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<DomainStatus>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new<D: Into<String>>(kind: NotificationKind, domain: D, status: DomainStatus) -> Self {
        Self {
            kind,
            domain: domain.into(),
            status,
            old_status: None,
            message: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_message<M: Into<String>>(mut self, message: M) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_old_status(mut self, old_status: DomainStatus) -> Self {
        self.old_status = Some(old_status);
        self
    }
}

impl From<&StatusChangeEvent> for NotificationEvent {
    fn from(event: &StatusChangeEvent) -> Self {
        Self {
            kind: NotificationKind::StatusChange,
            domain: event.domain.clone(),
            status: event.new_status,
            old_status: Some(event.old_status),
            message: event.message.clone(),
            timestamp: event.timestamp,
        }
    }
}
