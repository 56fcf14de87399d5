//! Domain registration status and the policy attached to each status.
//!
//! Every status maps to a fixed descriptor (display priority, whether a
//! transition into it is worth notifying about, a human description) and to
//! a cache lifetime tuned to how quickly that status tends to change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Registration status of a domain.
///
/// Variants are declared in display priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainStatus {
    Available,
    Redemption,
    PendingDelete,
    Expired,
    Registered,
    TransferLocked,
    Hold,
    Unknown,
    Error,
}

/// Static properties of a [`DomainStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDescriptor {
    /// Lower sorts first in listings
    pub priority: u8,
    /// Whether entering this status is notification-worthy
    pub should_notify: bool,
    /// Human-readable description
    pub description: &'static str,
}

const STATUS_TABLE: [StatusDescriptor; 9] = [
    StatusDescriptor {
        priority: 1,
        should_notify: true,
        description: "Available for registration",
    },
    StatusDescriptor {
        priority: 2,
        should_notify: true,
        description: "Redemption period",
    },
    StatusDescriptor {
        priority: 3,
        should_notify: true,
        description: "Pending deletion",
    },
    StatusDescriptor {
        priority: 4,
        should_notify: true,
        description: "Expired",
    },
    StatusDescriptor {
        priority: 5,
        should_notify: false,
        description: "Registered",
    },
    StatusDescriptor {
        priority: 6,
        should_notify: false,
        description: "Transfer locked",
    },
    StatusDescriptor {
        priority: 7,
        should_notify: false,
        description: "On hold",
    },
    StatusDescriptor {
        priority: 8,
        should_notify: false,
        description: "Unknown status",
    },
    StatusDescriptor {
        priority: 9,
        should_notify: false,
        description: "Query failed",
    },
];

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Cache lifetime for failed lookups.
pub const ERROR_CACHE_DURATION: Duration = Duration::from_secs(10 * MINUTE);

impl DomainStatus {
    /// All statuses in priority order.
    pub const ALL: [DomainStatus; 9] = [
        Self::Available,
        Self::Redemption,
        Self::PendingDelete,
        Self::Expired,
        Self::Registered,
        Self::TransferLocked,
        Self::Hold,
        Self::Unknown,
        Self::Error,
    ];

    pub fn descriptor(self) -> &'static StatusDescriptor {
        &STATUS_TABLE[self as usize]
    }

    pub fn priority(self) -> u8 {
        self.descriptor().priority
    }

    pub fn should_notify(self) -> bool {
        self.descriptor().should_notify
    }

    pub fn description(self) -> &'static str {
        self.descriptor().description
    }

    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    /// Wire name, as used in JSON output and config files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Redemption => "redemption",
            Self::PendingDelete => "pending_delete",
            Self::Expired => "expired",
            Self::Registered => "registered",
            Self::TransferLocked => "transfer_locked",
            Self::Hold => "hold",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute how long a result with this status may be served from cache.
///
/// Registered domains are re-checked more often as their expiry approaches:
/// within 3 days (or already past) every 6 hours, within 30 days every
/// 12 hours, otherwise daily.
///
/// # Arguments
///
/// * `status` - Classified status of the result
/// * `expiry` - Expiry date, when the registry reported one
/// * `now` - Reference instant for the expiry comparison
pub fn smart_cache_duration(
    status: DomainStatus,
    expiry: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Duration {
    match status {
        DomainStatus::Error => ERROR_CACHE_DURATION,
        DomainStatus::PendingDelete => Duration::from_secs(5 * MINUTE),
        DomainStatus::Redemption => Duration::from_secs(HOUR),
        DomainStatus::Available => Duration::from_secs(30 * MINUTE),
        DomainStatus::Expired => Duration::from_secs(6 * HOUR),
        DomainStatus::Registered => match expiry {
            None => Duration::from_secs(24 * HOUR),
            Some(expiry) => {
                let remaining = expiry - now;
                if remaining <= chrono::Duration::days(3) {
                    Duration::from_secs(6 * HOUR)
                } else if remaining <= chrono::Duration::days(30) {
                    Duration::from_secs(12 * HOUR)
                } else {
                    Duration::from_secs(24 * HOUR)
                }
            }
        },
        DomainStatus::TransferLocked | DomainStatus::Hold | DomainStatus::Unknown => {
            Duration::from_secs(2 * HOUR)
        }
    }
}

/// Human-readable summary of the cache policy, one line per rule.
pub fn cache_policy() -> Vec<(&'static str, &'static str)> {
    vec![
        ("error", "10 minutes"),
        ("pending_delete", "5 minutes"),
        ("available", "30 minutes"),
        ("redemption", "1 hour"),
        ("expired", "6 hours"),
        ("registered (expires within 3 days)", "6 hours"),
        ("registered (expires within 30 days)", "12 hours"),
        ("registered (otherwise)", "24 hours"),
        ("other", "2 hours"),
    ]
}

/// Cache key for a normalized domain name.
pub fn cache_key(domain: &str) -> String {
    format!("domain:{}", domain)
}
