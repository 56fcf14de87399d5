//! # Domain Watch Library
//!
//! Domain registration status monitoring over RDAP and WHOIS.
//!
//! The library determines the status of a domain (available, registered,
//! redemption, pending delete, ...) by querying RDAP first and falling back
//! to WHOIS, checks large batches through a bounded worker pool, caches
//! results for a status-dependent lifetime, and reports status transitions
//! as deduplicated notifications.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_watch_lib::{CheckConfig, DomainChecker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = DomainChecker::with_builtin_registry(CheckConfig::default())?;
//!     let info = checker.check_domain("example.com").await;
//!
//!     println!("{} - {} ({})", info.name, info.status, info.status.description());
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - **DomainChecker**: validation, RDAP-then-WHOIS fallback, batch checks
//! - **Monitor**: periodic checks, adaptive cache, change detection
//! - **NotificationManager**: 24h deduplication and fan-out to notifiers
//! - **TldRegistry**: injected TLD to server routing

// Re-export main public API types and functions
// This makes them available as domain_watch_lib::TypeName
pub use cache::{Cache, CacheStats, DomainCache};
pub use checker::DomainChecker;
pub use concurrent::ConcurrentProcessor;
pub use config::{
    load_env_config, parse_duration_string, validate_monitor_config, ConfigManager, EnvConfig,
    FileConfig,
};
pub use error::DomainWatchError;
pub use monitor::{Monitor, MonitorStats};
pub use notification::{
    CommandNotifier, DispatchOutcome, LogNotifier, NotificationEvent, NotificationKind,
    NotificationManager, NotificationStats, Notifier,
};
pub use protocols::{StaticTldRegistry, TldRegistry, WhoisServer};
pub use status::{cache_key, smart_cache_duration, DomainStatus};
pub use types::{CheckConfig, DomainInfo, MonitorConfig, QueryMethod, StatusChangeEvent};
pub use utils::{load_domains_file, normalize_domain, parse_domain_list, validate_domain};

// Public modules
pub mod notification;
pub mod protocols;
pub mod status;

// Internal modules - these are not part of the public API
mod cache;
mod checker;
mod concurrent;
mod config;
mod error;
mod monitor;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DomainWatchError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
