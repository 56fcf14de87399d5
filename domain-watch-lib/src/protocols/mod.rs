//! Protocol implementations for domain status lookups.
//!
//! This module contains the RDAP and WHOIS clients, the rule tables that
//! turn their answers into a status, and the TLD registry that routes a
//! domain to its servers.

/// Ordered status classification rules
pub mod classify;

/// RDAP (Registration Data Access Protocol) implementation
pub mod rdap;

/// WHOIS protocol implementation
pub mod whois;

/// TLD to server mappings
pub mod registry;

pub use classify::{classify_text, classify_tokens, StatusRule, RDAP_RULES, WHOIS_RULES};
pub use rdap::{RdapClient, RdapResponse};
pub use registry::{StaticTldRegistry, TldRegistry, WhoisServer};
pub use whois::{WhoisClient, WHOIS_PORT};
