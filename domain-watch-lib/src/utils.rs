//! Utility functions for domain processing and validation.

use crate::error::DomainWatchError;
use std::fs;
use std::path::Path;

/// Maximum length of a full domain name.
const MAX_DOMAIN_LENGTH: usize = 253;

/// Maximum length of a single label.
const MAX_LABEL_LENGTH: usize = 63;

/// Validate a domain name format.
///
/// Rules are checked in order and the first violation is reported:
/// empty name, overall length, character set (`a-z A-Z 0-9 . -`), label
/// count, per-label shape, and an all-numeric TLD.
///
/// # Arguments
///
/// * `domain` - The domain name to validate, already normalized
///
/// # Returns
///
/// `Ok(())` if valid, `Err(DomainWatchError::InvalidDomain)` otherwise.
pub fn validate_domain(domain: &str) -> Result<(), DomainWatchError> {
    if domain.is_empty() {
        return Err(DomainWatchError::invalid_domain(
            domain,
            "domain name cannot be empty",
        ));
    }

    if domain.len() > MAX_DOMAIN_LENGTH {
        return Err(DomainWatchError::invalid_domain(
            domain,
            format!("domain name exceeds {} characters", MAX_DOMAIN_LENGTH),
        ));
    }

    if let Some(c) = domain
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
    {
        return Err(DomainWatchError::invalid_domain(
            domain,
            format!("invalid character '{}'", c),
        ));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(DomainWatchError::invalid_domain(
            domain,
            "domain name must have at least two labels",
        ));
    }

    for label in &labels {
        if label.is_empty() {
            return Err(DomainWatchError::invalid_domain(
                domain,
                "domain name contains an empty label",
            ));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(DomainWatchError::invalid_domain(
                domain,
                format!("label '{}' exceeds {} characters", label, MAX_LABEL_LENGTH),
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(DomainWatchError::invalid_domain(
                domain,
                format!("label '{}' cannot start or end with a hyphen", label),
            ));
        }
    }

    // Non-empty: the label loop above rejected empty labels.
    let tld = labels[labels.len() - 1];
    if tld.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainWatchError::invalid_domain(
            domain,
            "top-level domain cannot be all numeric",
        ));
    }

    Ok(())
}

/// Trim and lowercase a domain name.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// Extract the TLD (last label) from a domain.
///
/// Multi-level public suffixes like `co.uk` are not special-cased; the
/// registry is keyed by the last label only.
pub fn extract_tld(domain: &str) -> Result<String, DomainWatchError> {
    match domain.rsplit_once('.') {
        Some((rest, tld)) if !rest.is_empty() && !tld.is_empty() => Ok(tld.to_lowercase()),
        _ => Err(DomainWatchError::invalid_domain(
            domain,
            "domain must contain at least one dot",
        )),
    }
}

/// Parse a domain list: one domain per line, `#` starts a comment.
///
/// Entries are normalized but not validated; callers decide what to do with
/// invalid names.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let domain = line.split('#').next().unwrap_or("").trim();
            if domain.is_empty() {
                None
            } else {
                Some(normalize_domain(domain))
            }
        })
        .collect()
}

/// Read a domain list from a file.
///
/// # Arguments
///
/// * `path` - Path to a text file with one domain per line
///
/// # Returns
///
/// The normalized entries, or a `FileError` if the file cannot be read.
pub fn load_domains_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, DomainWatchError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        DomainWatchError::file_error(
            path.to_string_lossy(),
            format!("Failed to read domain list: {}", e),
        )
    })?;
    Ok(parse_domain_list(&content))
}
