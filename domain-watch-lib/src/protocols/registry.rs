//! TLD to server mappings.
//!
//! The checker never hardcodes servers: it asks a [`TldRegistry`] which
//! WHOIS host and RDAP base URL serve a TLD. [`StaticTldRegistry`] ships a
//! built-in table of common TLDs that configuration can extend or override.

use crate::protocols::whois::WHOIS_PORT;
use std::collections::HashMap;

/// Address of a WHOIS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoisServer {
    pub host: String,
    pub port: u16,
}

impl WhoisServer {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Lookup table from TLD to protocol servers.
///
/// TLDs are passed lowercase and without a leading dot.
pub trait TldRegistry: Send + Sync {
    /// WHOIS server for a TLD, if any.
    fn lookup_whois_server(&self, tld: &str) -> Option<WhoisServer>;

    /// RDAP base URL for a TLD, if any. The checker appends `/domain/{name}`.
    fn lookup_rdap_server(&self, tld: &str) -> Option<String>;

    /// Every TLD this registry can route over at least one protocol.
    fn supported_tlds(&self) -> Vec<String>;
}

/// Built-in RDAP base URLs.
const BUILTIN_RDAP: &[(&str, &str)] = &[
    // Popular gTLDs
    ("com", "https://rdap.verisign.com/com/v1"),
    ("net", "https://rdap.verisign.com/net/v1"),
    ("org", "https://rdap.publicinterestregistry.org/rdap"),
    ("info", "https://rdap.identitydigital.services/rdap"),
    ("biz", "https://rdap.nic.biz"),
    // Google TLDs
    ("app", "https://pubapi.registry.google/rdap"),
    ("dev", "https://pubapi.registry.google/rdap"),
    ("page", "https://pubapi.registry.google/rdap"),
    // CentralNic managed gTLDs
    ("xyz", "https://rdap.centralnic.com/xyz"),
    ("tech", "https://rdap.centralnic.com/tech"),
    ("online", "https://rdap.centralnic.com/online"),
    ("site", "https://rdap.centralnic.com/site"),
    ("website", "https://rdap.centralnic.com/website"),
    ("blog", "https://rdap.blog.fury.ca/rdap"),
    ("shop", "https://rdap.gmoregistry.net/rdap"),
    // Identity Digital managed TLDs
    ("ai", "https://rdap.identitydigital.services/rdap"),
    ("io", "https://rdap.identitydigital.services/rdap"),
    ("me", "https://rdap.identitydigital.services/rdap"),
    ("zone", "https://rdap.identitydigital.services/rdap"),
    ("digital", "https://rdap.identitydigital.services/rdap"),
    // ccTLDs
    ("us", "https://rdap.nic.us"),
    ("uk", "https://rdap.nominet.uk"),
    ("de", "https://rdap.denic.de"),
    ("ca", "https://rdap.ca.fury.ca/rdap"),
    ("au", "https://rdap.cctld.au/rdap"),
    ("fr", "https://rdap.nic.fr"),
    ("nl", "https://rdap.sidn.nl"),
    ("br", "https://rdap.registro.br"),
    ("in", "https://rdap.nixiregistry.in/rdap"),
    ("tv", "https://rdap.nic.tv"),
    ("cc", "https://tld-rdap.verisign.com/cc/v1"),
    ("cloud", "https://rdap.registry.cloud/rdap"),
];

/// Built-in WHOIS hosts, all on port 43.
///
/// co, eu, it, jp, es and cn have no working RDAP service and are reachable
/// over WHOIS only.
const BUILTIN_WHOIS: &[(&str, &str)] = &[
    ("com", "whois.verisign-grs.com"),
    ("net", "whois.verisign-grs.com"),
    ("org", "whois.pir.org"),
    ("info", "whois.nic.info"),
    ("biz", "whois.nic.biz"),
    ("app", "whois.nic.google"),
    ("dev", "whois.nic.google"),
    ("page", "whois.nic.google"),
    ("xyz", "whois.nic.xyz"),
    ("tech", "whois.nic.tech"),
    ("online", "whois.nic.online"),
    ("site", "whois.nic.site"),
    ("website", "whois.nic.website"),
    ("blog", "whois.nic.blog"),
    ("shop", "whois.nic.shop"),
    ("ai", "whois.nic.ai"),
    ("io", "whois.nic.io"),
    ("me", "whois.nic.me"),
    ("zone", "whois.nic.zone"),
    ("digital", "whois.nic.digital"),
    ("us", "whois.nic.us"),
    ("uk", "whois.nic.uk"),
    ("de", "whois.denic.de"),
    ("ca", "whois.cira.ca"),
    ("au", "whois.auda.org.au"),
    ("fr", "whois.nic.fr"),
    ("nl", "whois.domain-registry.nl"),
    ("br", "whois.registro.br"),
    ("in", "whois.registry.in"),
    ("tv", "whois.nic.tv"),
    ("cc", "ccwhois.verisign-grs.com"),
    ("cloud", "whois.nic.cloud"),
    ("co", "whois.nic.co"),
    ("eu", "whois.eu"),
    ("it", "whois.nic.it"),
    ("jp", "whois.jprs.jp"),
    ("es", "whois.nic.es"),
    ("cn", "whois.cnnic.cn"),
];

/// In-memory [`TldRegistry`].
#[derive(Debug, Clone, Default)]
pub struct StaticTldRegistry {
    whois: HashMap<String, WhoisServer>,
    rdap: HashMap<String, String>,
}

impl StaticTldRegistry {
    /// An empty registry: every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in table.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (tld, url) in BUILTIN_RDAP {
            registry.set_rdap(tld, *url);
        }
        for (tld, host) in BUILTIN_WHOIS {
            registry.set_whois(tld, WhoisServer::new(*host, WHOIS_PORT));
        }
        registry
    }

    /// Add or replace the WHOIS server for a TLD.
    pub fn with_whois<H: Into<String>>(mut self, tld: &str, host: H, port: u16) -> Self {
        self.set_whois(tld, WhoisServer::new(host, port));
        self
    }

    /// Add or replace the RDAP base URL for a TLD.
    pub fn with_rdap<U: Into<String>>(mut self, tld: &str, base_url: U) -> Self {
        self.set_rdap(tld, base_url);
        self
    }

    pub fn set_whois(&mut self, tld: &str, server: WhoisServer) {
        self.whois.insert(normalize_tld(tld), server);
    }

    pub fn set_rdap<U: Into<String>>(&mut self, tld: &str, base_url: U) {
        self.rdap.insert(normalize_tld(tld), base_url.into());
    }

    /// Stop routing a TLD over RDAP, leaving WHOIS as the only path.
    pub fn remove_rdap(&mut self, tld: &str) {
        self.rdap.remove(&normalize_tld(tld));
    }
}

impl TldRegistry for StaticTldRegistry {
    fn lookup_whois_server(&self, tld: &str) -> Option<WhoisServer> {
        self.whois.get(&normalize_tld(tld)).cloned()
    }

    fn lookup_rdap_server(&self, tld: &str) -> Option<String> {
        self.rdap.get(&normalize_tld(tld)).cloned()
    }

    fn supported_tlds(&self) -> Vec<String> {
        let mut tlds: Vec<String> = self
            .whois
            .keys()
            .chain(self.rdap.keys())
            .cloned()
            .collect();
        tlds.sort();
        tlds.dedup();
        tlds
    }
}

fn normalize_tld(tld: &str) -> String {
    tld.trim().trim_start_matches('.').to_lowercase()
}
