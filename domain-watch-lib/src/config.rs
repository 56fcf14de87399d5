//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `DW_*`
//! environment variables, and merging them with proper precedence rules:
//! CLI flags > environment > config files > defaults.

use crate::error::DomainWatchError;
use crate::protocols::{StaticTldRegistry, WhoisServer, WHOIS_PORT};
use crate::types::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shortest accepted check interval.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Largest accepted concurrency limit.
pub const MAX_CONCURRENT_LIMIT: usize = 200;

/// Configuration loaded from TOML files.
///
/// ```toml
/// [monitor]
/// check_interval = "5m"
/// concurrent_limit = 50
/// timeout = "30s"
/// cache_duration = "1h"
/// cache_capacity = 1000
///
/// [notifications]
/// command = "notify-send \"$DW_SUBJECT\" \"$DW_MESSAGE\""
///
/// [domains]
/// list = ["example.com"]
/// file = "domains.txt"
///
/// [servers.dev]
/// rdap = "https://rdap.example.net"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Monitor timing and sizing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitor: Option<MonitorSection>,

    /// Notification delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationsSection>,

    /// Domains to watch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<DomainsSection>,

    /// Per-TLD server overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<HashMap<String, ServerOverride>>,
}

/// `[monitor]` section. Durations are strings such as `"30s"` or `"5m"`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitorSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Default cache lifetime
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_duration: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_capacity: Option<usize>,
}

/// `[notifications]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationsSection {
    /// Master switch; defaults to enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Shell command run for every notification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// `[domains]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<String>>,

    /// Path to a domain list file, one domain per line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// `[servers.<tld>]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_port: Option<u16>,

    /// RDAP base URL, without the `/domain/` suffix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap: Option<String>,
}

impl FileConfig {
    /// Overlay the `[monitor]` section onto `config`.
    ///
    /// Values are validated when the file is loaded, so unparsable entries
    /// here are simply skipped.
    pub fn apply_monitor(&self, mut config: MonitorConfig) -> MonitorConfig {
        let Some(section) = &self.monitor else {
            return config;
        };

        if let Some(interval) = section.check_interval.as_deref().and_then(parse_duration_string) {
            config.check_interval = interval;
        }
        if let Some(limit) = section.concurrent_limit {
            config.concurrent_limit = limit;
        }
        if let Some(timeout) = section.timeout.as_deref().and_then(parse_duration_string) {
            config.timeout = timeout;
        }
        if let Some(duration) = section.cache_duration.as_deref().and_then(parse_duration_string) {
            config.cache_duration = duration;
        }
        if let Some(capacity) = section.cache_capacity {
            config.cache_capacity = capacity;
        }
        config
    }

    /// Apply `[servers.<tld>]` overrides to a registry.
    pub fn apply_servers(&self, registry: &mut StaticTldRegistry) {
        let Some(servers) = &self.servers else {
            return;
        };

        for (tld, server) in servers {
            if let Some(host) = &server.whois {
                registry.set_whois(
                    tld,
                    WhoisServer::new(host.clone(), server.whois_port.unwrap_or(WHOIS_PORT)),
                );
            }
            if let Some(rdap) = &server.rdap {
                registry.set_rdap(tld, rdap.clone());
            }
            debug!(tld = %tld, "applied server override");
        }
    }

    /// Inline `[domains] list` entries.
    pub fn domain_list(&self) -> Vec<String> {
        self.domains
            .as_ref()
            .and_then(|d| d.list.clone())
            .unwrap_or_default()
    }

    /// `[domains] file`, if set.
    pub fn domain_file(&self) -> Option<&str> {
        self.domains.as_ref().and_then(|d| d.file.as_deref())
    }

    /// `[notifications] command`, unless notifications are disabled.
    pub fn notify_command(&self) -> Option<&str> {
        let section = self.notifications.as_ref()?;
        if section.enabled == Some(false) {
            return None;
        }
        section.command.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications
            .as_ref()
            .and_then(|n| n.enabled)
            .unwrap_or(true)
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which config files were found
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if reading, parsing or
    /// validation fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, DomainWatchError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DomainWatchError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            DomainWatchError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            DomainWatchError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config, then the home directory, then the current directory;
    /// later files win per field.
    pub fn discover_and_load(&self) -> Result<FileConfig, DomainWatchError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring configuration file"),
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            let files: Vec<String> = loaded_files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            info!(files = ?files, "merged multiple configuration files, last wins");
        }

        Ok(merged_config)
    }

    /// Get the local configuration file path.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./domain-watch.toml", "./.domain-watch.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Get the global configuration file path in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-watch.toml", "domain-watch.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Get the XDG configuration file path.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-watch").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            monitor: match (lower.monitor, higher.monitor) {
                (Some(mut lower_monitor), Some(higher_monitor)) => {
                    if higher_monitor.check_interval.is_some() {
                        lower_monitor.check_interval = higher_monitor.check_interval;
                    }
                    if higher_monitor.concurrent_limit.is_some() {
                        lower_monitor.concurrent_limit = higher_monitor.concurrent_limit;
                    }
                    if higher_monitor.timeout.is_some() {
                        lower_monitor.timeout = higher_monitor.timeout;
                    }
                    if higher_monitor.cache_duration.is_some() {
                        lower_monitor.cache_duration = higher_monitor.cache_duration;
                    }
                    if higher_monitor.cache_capacity.is_some() {
                        lower_monitor.cache_capacity = higher_monitor.cache_capacity;
                    }
                    Some(lower_monitor)
                }
                (lower_monitor, higher_monitor) => higher_monitor.or(lower_monitor),
            },
            notifications: match (lower.notifications, higher.notifications) {
                (Some(mut lower_notify), Some(higher_notify)) => {
                    if higher_notify.enabled.is_some() {
                        lower_notify.enabled = higher_notify.enabled;
                    }
                    if higher_notify.command.is_some() {
                        lower_notify.command = higher_notify.command;
                    }
                    Some(lower_notify)
                }
                (lower_notify, higher_notify) => higher_notify.or(lower_notify),
            },
            domains: higher.domains.or(lower.domains),
            servers: match (lower.servers, higher.servers) {
                (Some(mut lower_servers), Some(higher_servers)) => {
                    lower_servers.extend(higher_servers);
                    Some(lower_servers)
                }
                (lower_servers, higher_servers) => higher_servers.or(lower_servers),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), DomainWatchError> {
        if let Some(monitor) = &config.monitor {
            let durations = [
                ("check_interval", &monitor.check_interval),
                ("timeout", &monitor.timeout),
                ("cache_duration", &monitor.cache_duration),
            ];
            for (field, value) in durations {
                if let Some(value) = value {
                    if parse_duration_string(value).is_none() {
                        return Err(DomainWatchError::config(format!(
                            "Invalid {} '{}'. Use a format like '30s', '5m', '1h' or '1d'",
                            field, value
                        )));
                    }
                }
            }

            validate_monitor_config(&config.apply_monitor(MonitorConfig::default()))?;
        }

        if let Some(servers) = &config.servers {
            for (tld, server) in servers {
                if tld.trim().trim_start_matches('.').is_empty() {
                    return Err(DomainWatchError::config("Server override TLDs cannot be empty"));
                }
                if let Some(host) = &server.whois {
                    if host.trim().is_empty() {
                        return Err(DomainWatchError::config(format!(
                            "Empty WHOIS host for TLD '{}'",
                            tld
                        )));
                    }
                }
                if let Some(rdap) = &server.rdap {
                    if !(rdap.starts_with("https://") || rdap.starts_with("http://")) {
                        return Err(DomainWatchError::config(format!(
                            "RDAP URL for TLD '{}' must start with http:// or https://",
                            tld
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Check the final, merged monitor settings.
///
/// # Errors
///
/// Returns `ConfigError` if the interval is under one minute, the
/// concurrency limit is outside `1..=200`, the timeout is zero or the cache
/// capacity is zero.
pub fn validate_monitor_config(config: &MonitorConfig) -> Result<(), DomainWatchError> {
    if config.check_interval < MIN_CHECK_INTERVAL {
        return Err(DomainWatchError::config(format!(
            "Check interval must be at least {}s, got {}s",
            MIN_CHECK_INTERVAL.as_secs(),
            config.check_interval.as_secs()
        )));
    }
    if config.concurrent_limit == 0 || config.concurrent_limit > MAX_CONCURRENT_LIMIT {
        return Err(DomainWatchError::config(format!(
            "Concurrency must be between 1 and {}",
            MAX_CONCURRENT_LIMIT
        )));
    }
    if config.timeout.is_zero() {
        return Err(DomainWatchError::config("Timeout must be greater than zero"));
    }
    if config.cache_capacity == 0 {
        return Err(DomainWatchError::config("Cache capacity must be at least 1"));
    }
    Ok(())
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via `DW_*`
/// environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub check_interval: Option<Duration>,
    pub concurrent_limit: Option<usize>,
    pub timeout: Option<Duration>,
    pub cache_duration: Option<Duration>,
    pub notify_command: Option<String>,
    pub file: Option<String>,
    pub config: Option<String>,
}

impl EnvConfig {
    /// Overlay the environment values onto `config`.
    pub fn apply_monitor(&self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(interval) = self.check_interval {
            config.check_interval = interval;
        }
        if let Some(limit) = self.concurrent_limit {
            config.concurrent_limit = limit;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(duration) = self.cache_duration {
            config.cache_duration = duration;
        }
        config
    }
}

fn env_duration(name: &str) -> Option<Duration> {
    let raw = env::var(name).ok()?;
    match parse_duration_string(&raw) {
        Some(duration) => {
            debug!(var = name, value = %raw, "using environment override");
            Some(duration)
        }
        None => {
            warn!(var = name, value = %raw, "invalid duration, use a format like '30s', '5m', '1h'");
            None
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    if value.trim().is_empty() {
        return None;
    }
    debug!(var = name, value = %value, "using environment override");
    Some(value)
}

/// Load configuration from environment variables.
///
/// Reads `DW_CHECK_INTERVAL`, `DW_CONCURRENT_LIMIT`, `DW_TIMEOUT`,
/// `DW_CACHE_DURATION`, `DW_NOTIFY_COMMAND`, `DW_FILE` and `DW_CONFIG`.
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    let concurrent_limit = env::var("DW_CONCURRENT_LIMIT").ok().and_then(|val| {
        match val.parse::<usize>() {
            Ok(limit) if (1..=MAX_CONCURRENT_LIMIT).contains(&limit) => Some(limit),
            _ => {
                warn!(
                    value = %val,
                    "invalid DW_CONCURRENT_LIMIT, must be 1-{}",
                    MAX_CONCURRENT_LIMIT
                );
                None
            }
        }
    });

    EnvConfig {
        check_interval: env_duration("DW_CHECK_INTERVAL"),
        concurrent_limit,
        timeout: env_duration("DW_TIMEOUT"),
        cache_duration: env_duration("DW_CACHE_DURATION"),
        notify_command: env_string("DW_NOTIFY_COMMAND"),
        file: env_string("DW_FILE"),
        config: env_string("DW_CONFIG"),
    }
}

/// Parse a duration string like `"30s"`, `"5m"`, `"1h"` or `"1d"`.
///
/// A bare number is taken as seconds.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();
    let (number, multiplier) = match value.chars().last()? {
        's' => (&value[..value.len() - 1], 1),
        'm' => (&value[..value.len() - 1], 60),
        'h' => (&value[..value.len() - 1], 60 * 60),
        'd' => (&value[..value.len() - 1], 24 * 60 * 60),
        _ => (value.as_str(), 1),
    };

    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .map(Duration::from_secs)
}
