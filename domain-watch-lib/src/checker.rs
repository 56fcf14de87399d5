//! Main domain checker implementation.
//!
//! `DomainChecker` validates a name, routes it through the injected TLD
//! registry, tries RDAP first and falls back to WHOIS. It never returns an
//! error: every failure is folded into a `DomainInfo` with `status = error`.

use crate::concurrent::ConcurrentProcessor;
use crate::error::DomainWatchError;
use crate::protocols::{RdapClient, StaticTldRegistry, TldRegistry, WhoisClient};
use crate::status::DomainStatus;
use crate::types::{CheckConfig, DomainInfo};
use crate::utils::{extract_tld, normalize_domain, validate_domain};
use std::sync::Arc;
use tracing::{debug, info};

/// Coordinates status lookups for single domains and batches.
///
/// Cheap to clone; clones share the HTTP connection pool and registry.
///
/// # Example
///
/// ```rust,no_run
/// use domain_watch_lib::{CheckConfig, DomainChecker};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = DomainChecker::with_builtin_registry(CheckConfig::default())?;
///     let info = checker.check_domain("example.com").await;
///     println!("{}: {}", info.name, info.status);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DomainChecker {
    /// Configuration settings for this checker instance
    config: CheckConfig,
    /// TLD to server routing
    registry: Arc<dyn TldRegistry>,
    rdap_client: RdapClient,
    whois_client: WhoisClient,
}

impl DomainChecker {
    /// Create a checker over the given registry.
    ///
    /// # Errors
    ///
    /// Fails only if the HTTP client for RDAP cannot be built.
    pub fn new(
        config: CheckConfig,
        registry: Arc<dyn TldRegistry>,
    ) -> Result<Self, DomainWatchError> {
        let rdap_client = RdapClient::with_config(config.timeout, config.user_agent.clone())?;
        let whois_client = WhoisClient::with_timeout(config.timeout);

        Ok(Self {
            config,
            registry,
            rdap_client,
            whois_client,
        })
    }

    /// Create a checker over [`StaticTldRegistry::builtin`].
    pub fn with_builtin_registry(config: CheckConfig) -> Result<Self, DomainWatchError> {
        Self::new(config, Arc::new(StaticTldRegistry::builtin()))
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn TldRegistry> {
        &self.registry
    }

    /// Check the status of a single domain.
    ///
    /// The checking process:
    /// 1. Normalizes (trim, lowercase) and validates the name; invalid names
    ///    never touch the network
    /// 2. Queries RDAP; a successful answer is returned as is
    /// 3. Otherwise queries WHOIS
    /// 4. If both fail, returns an `error` result naming both failures
    ///
    /// # Arguments
    ///
    /// * `domain` - The domain name to check (e.g., "example.com")
    pub async fn check_domain(&self, domain: &str) -> DomainInfo {
        let name = normalize_domain(domain);

        if let Err(e) = validate_domain(&name) {
            debug!(domain = %name, error = %e, "rejected invalid domain");
            return DomainInfo::error(name, e.to_string(), None);
        }

        let tld = match extract_tld(&name) {
            Ok(tld) => tld,
            Err(e) => return DomainInfo::error(name, e.to_string(), None),
        };

        let rdap_error = match self.query_rdap(&name, &tld).await {
            Ok(info) => return info,
            Err(e) => e,
        };
        debug!(domain = %name, error = %rdap_error, "RDAP lookup failed, trying WHOIS");

        match self.query_whois(&name, &tld).await {
            Ok(info) => info,
            Err(whois_error) => {
                debug!(domain = %name, error = %whois_error, "WHOIS lookup failed");
                DomainInfo::error(
                    name,
                    format!(
                        "both RDAP and WHOIS failed (RDAP: {}; WHOIS: {})",
                        rdap_error, whois_error
                    ),
                    None,
                )
            }
        }
    }

    /// Look a domain up over RDAP only.
    pub async fn query_rdap(&self, domain: &str, tld: &str) -> Result<DomainInfo, DomainWatchError> {
        let base_url = self
            .registry
            .lookup_rdap_server(tld)
            .ok_or_else(|| DomainWatchError::unsupported_tld(tld, "RDAP"))?;
        let response = self.rdap_client.query(domain, &base_url).await?;
        Ok(self.rdap_client.parse(domain, &response))
    }

    /// Look a domain up over WHOIS only.
    pub async fn query_whois(&self, domain: &str, tld: &str) -> Result<DomainInfo, DomainWatchError> {
        let server = self
            .registry
            .lookup_whois_server(tld)
            .ok_or_else(|| DomainWatchError::unsupported_tld(tld, "WHOIS"))?;
        let raw = self
            .whois_client
            .query(domain, &server.host, server.port)
            .await?;
        Ok(self.whois_client.parse(domain, &raw))
    }

    /// Check many domains concurrently.
    ///
    /// At most `concurrent_limit` checks run at once. The result at index
    /// `i` always belongs to `domains[i]`.
    ///
    /// # Arguments
    ///
    /// * `domains` - Domain names to check
    ///
    /// # Returns
    ///
    /// One `DomainInfo` per input, in input order.
    pub async fn check_domains(&self, domains: &[String]) -> Vec<DomainInfo> {
        if domains.is_empty() {
            return Vec::new();
        }

        let processor = ConcurrentProcessor::new(self.config.concurrent_limit);
        let checker = self.clone();
        let slots = processor
            .run(domains.to_vec(), move |domain: String| {
                let checker = checker.clone();
                async move { checker.check_domain(&domain).await }
            })
            .await;

        let results: Vec<DomainInfo> = slots
            .into_iter()
            .zip(domains)
            .map(|(slot, domain)| {
                slot.unwrap_or_else(|| {
                    DomainInfo::error(
                        normalize_domain(domain),
                        "check worker terminated unexpectedly",
                        None,
                    )
                })
            })
            .collect();

        let errors = results.iter().filter(|r| r.is_error()).count();
        let available = results
            .iter()
            .filter(|r| r.status == DomainStatus::Available)
            .count();
        info!(
            domains = results.len(),
            available,
            errors,
            workers = processor.worker_count(domains.len()),
            "batch check complete"
        );

        results
    }
}
