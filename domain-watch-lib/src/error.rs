//! Error handling for domain status operations.
//!
//! Checks themselves never fail: a failed lookup becomes a `DomainInfo` with
//! `status = error`. This type is what the protocol clients, configuration
//! loading and the monitor lifecycle return before that folding happens.

use std::fmt;
use std::time::Duration;

/// Main error type for the library.
#[derive(Debug, Clone)]
pub enum DomainWatchError {
    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// Network-related errors (connect, read, write)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// RDAP protocol specific errors
    RdapError {
        domain: String,
        message: String,
        status_code: Option<u16>,
    },

    /// WHOIS protocol specific errors
    WhoisError { domain: String, message: String },

    /// No server is known for a TLD over the given protocol
    UnsupportedTld { tld: String, protocol: String },

    /// Configuration errors (invalid settings, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading domain lists or config files
    FileError { path: String, message: String },

    /// Timeout errors when operations take too long
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Monitor lifecycle misuse (start twice, empty domain set, ...)
    MonitorError { message: String },

    /// A notifier failed to deliver or self-test
    NotifierError { notifier: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl DomainWatchError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new RDAP error.
    pub fn rdap<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new RDAP error with HTTP status code.
    pub fn rdap_with_status<D: Into<String>, M: Into<String>>(
        domain: D,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::RdapError {
            domain: domain.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new WHOIS error.
    pub fn whois<D: Into<String>, M: Into<String>>(domain: D, message: M) -> Self {
        Self::WhoisError {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a new unsupported TLD error.
    pub fn unsupported_tld<T: Into<String>, P: Into<String>>(tld: T, protocol: P) -> Self {
        Self::UnsupportedTld {
            tld: tld.into(),
            protocol: protocol.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new monitor lifecycle error.
    pub fn monitor<M: Into<String>>(message: M) -> Self {
        Self::MonitorError {
            message: message.into(),
        }
    }

    /// Create a new notifier error.
    pub fn notifier<N: Into<String>, M: Into<String>>(notifier: N, message: M) -> Self {
        Self::NotifierError {
            notifier: notifier.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for input validation failures; these never reach the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidDomain { .. })
    }

    /// True for failures of the query itself (transport, server, or missing route).
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. }
                | Self::Timeout { .. }
                | Self::UnsupportedTld { .. }
                | Self::RdapError { .. }
                | Self::WhoisError { .. }
        )
    }
}

impl fmt::Display for DomainWatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::RdapError {
                domain,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "RDAP error for '{}' (HTTP {}): {}", domain, code, message)
                } else {
                    write!(f, "RDAP error for '{}': {}", domain, message)
                }
            }
            Self::WhoisError { domain, message } => {
                write!(f, "WHOIS error for '{}': {}", domain, message)
            }
            Self::UnsupportedTld { tld, protocol } => {
                write!(f, "No {} server known for TLD '{}'", protocol, tld)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::MonitorError { message } => {
                write!(f, "Monitor error: {}", message)
            }
            Self::NotifierError { notifier, message } => {
                write!(f, "Notifier '{}' failed: {}", notifier, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for DomainWatchError {}

impl From<reqwest::Error> for DomainWatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("HTTP request timed out", err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<toml::de::Error> for DomainWatchError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert!(DomainWatchError::invalid_domain("a", "bad").is_validation());
        assert!(!DomainWatchError::invalid_domain("a", "bad").is_protocol());
        assert!(DomainWatchError::unsupported_tld("zz", "RDAP").is_protocol());
        assert!(DomainWatchError::timeout("WHOIS query", Duration::from_secs(1)).is_protocol());
        assert!(!DomainWatchError::config("nope").is_protocol());
    }

    #[test]
    fn test_display_includes_status_code() {
        let err = DomainWatchError::rdap_with_status("example.com", "server said no", 503);
        let text = err.to_string();
        assert!(text.contains("HTTP 503"));
        assert!(text.contains("example.com"));
    }

    #[test]
    fn test_whois_error_names_domain() {
        let err = DomainWatchError::whois("example.com", "connection refused");
        assert!(err.is_protocol());
        assert_eq!(
            err.to_string(),
            "WHOIS error for 'example.com': connection refused"
        );
    }
}
