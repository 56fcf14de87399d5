//! Core data types for domain status checking and monitoring.
//!
//! This module defines the result record produced by every check, the
//! change event emitted by the monitor, and the configuration structs.

use crate::status::{smart_cache_duration, DomainStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result of a single domain status check.
///
/// Created fresh on every check and never mutated afterwards. A failed check
/// is still a `DomainInfo`: `status` is [`DomainStatus::Error`] and
/// `error_message` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainInfo {
    /// Normalized (trimmed, lowercase) domain name
    pub name: String,

    /// Classified registration status
    pub status: DomainStatus,

    /// The registrar that manages this domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,

    /// When the domain was first registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,

    /// When the domain registration expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,

    /// Last update date of the domain record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,

    /// Nameservers, lowercase, deduplicated, in the order reported
    #[serde(default)]
    pub name_servers: Vec<String>,

    /// When this check completed
    pub last_checked: DateTime<Utc>,

    /// Which protocol produced this result; absent for synthetic errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_method: Option<QueryMethod>,

    /// Present exactly when `status` is `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DomainInfo {
    /// Create an empty result with the given status, stamped now.
    pub fn new<N: Into<String>>(name: N, status: DomainStatus, method: QueryMethod) -> Self {
        Self {
            name: name.into(),
            status,
            registrar: None,
            created_date: None,
            expiry_date: None,
            updated_date: None,
            name_servers: Vec::new(),
            last_checked: Utc::now(),
            query_method: Some(method),
            error_message: None,
        }
    }

    /// Create an error result.
    ///
    /// An empty message is replaced so that `error_message` is never blank
    /// on an error result.
    pub fn error<N: Into<String>, M: Into<String>>(
        name: N,
        message: M,
        method: Option<QueryMethod>,
    ) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        Self {
            name: name.into(),
            status: DomainStatus::Error,
            registrar: None,
            created_date: None,
            expiry_date: None,
            updated_date: None,
            name_servers: Vec::new(),
            last_checked: Utc::now(),
            query_method: method,
            error_message: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Cache lifetime for this result relative to `now`.
    pub fn cache_duration_at(&self, now: DateTime<Utc>) -> Duration {
        smart_cache_duration(self.status, self.expiry_date, now)
    }

    /// Cache lifetime for this result relative to the current time.
    pub fn cache_duration(&self) -> Duration {
        self.cache_duration_at(Utc::now())
    }

    /// Days until expiry, rounded down; negative once expired.
    pub fn days_until_expiry(&self) -> Option<i64> {
        self.expiry_date.map(|d| (d - Utc::now()).num_days())
    }
}

/// Protocol that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMethod {
    Rdap,
    Whois,
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rdap => write!(f, "rdap"),
            Self::Whois => write!(f, "whois"),
        }
    }
}

/// Emitted when a domain moves from one non-error status to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    pub domain: String,
    pub old_status: DomainStatus,
    pub new_status: DomainStatus,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl StatusChangeEvent {
    pub fn new<D: Into<String>>(domain: D, old_status: DomainStatus, new_status: DomainStatus) -> Self {
        let domain = domain.into();
        let message = format!(
            "Domain {} status changed: from [{}] to [{}]",
            domain,
            old_status.description(),
            new_status.description()
        );
        Self {
            domain,
            old_status,
            new_status,
            timestamp: Utc::now(),
            message,
        }
    }
}

/// Settings for the protocol clients and the batch scheduler.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Maximum number of domains checked at once
    /// Default: 50
    pub concurrent_limit: usize,

    /// Deadline for each RDAP request and each WHOIS exchange
    /// Default: 30 seconds
    pub timeout: Duration,

    /// User-Agent header sent with RDAP requests
    pub user_agent: String,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            concurrent_limit: 50,
            timeout: Duration::from_secs(30),
            user_agent: format!("domain-watch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CheckConfig {
    /// Set the concurrency level (clamped to at least 1).
    pub fn with_concurrent_limit(mut self, limit: usize) -> Self {
        self.concurrent_limit = limit.max(1);
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Settings for a [`Monitor`](crate::Monitor).
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between full check cycles
    /// Default: 5 minutes, minimum 1 minute
    pub check_interval: Duration,

    /// Maximum number of domains checked at once
    /// Default: 50
    pub concurrent_limit: usize,

    /// Per-request deadline
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Cache lifetime used when no status-specific lifetime applies
    /// Default: 1 hour
    pub cache_duration: Duration,

    /// Maximum number of cached results
    /// Default: 1000
    pub cache_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5 * 60),
            concurrent_limit: 50,
            timeout: Duration::from_secs(30),
            cache_duration: Duration::from_secs(60 * 60),
            cache_capacity: 1000,
        }
    }
}

impl MonitorConfig {
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_concurrent_limit(mut self, limit: usize) -> Self {
        self.concurrent_limit = limit.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    /// Checker settings derived from this monitor configuration.
    pub fn check_config(&self) -> CheckConfig {
        CheckConfig::default()
            .with_concurrent_limit(self.concurrent_limit)
            .with_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_info_always_has_message() {
        let info = DomainInfo::error("example.com", "", None);
        assert!(info.is_error());
        assert_eq!(info.error_message.as_deref(), Some("unknown error"));
        assert!(info.query_method.is_none());
    }

    #[test]
    fn test_change_event_message() {
        let event = StatusChangeEvent::new(
            "example.com",
            DomainStatus::Registered,
            DomainStatus::Available,
        );
        assert_eq!(
            event.message,
            "Domain example.com status changed: from [Registered] to [Available for registration]"
        );
    }

    #[test]
    fn test_domain_info_json_shape() {
        let mut info = DomainInfo::new("example.com", DomainStatus::Registered, QueryMethod::Rdap);
        info.registrar = Some("Example Registrar".to_string());
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["status"], "registered");
        assert_eq!(json["query_method"], "rdap");
        assert!(json.get("error_message").is_none());
        assert!(json.get("expiry_date").is_none());
    }

    #[test]
    fn test_monitor_config_builders() {
        let config = MonitorConfig::default()
            .with_concurrent_limit(0)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.concurrent_limit, 1);
        let check = config.check_config();
        assert_eq!(check.timeout, Duration::from_secs(5));
        assert_eq!(check.concurrent_limit, 1);
    }
}
