//! WHOIS protocol implementation.
//!
//! WHOIS is a line-oriented TCP protocol: send the domain followed by CRLF,
//! read until the server closes the connection. Responses are unstructured
//! text, so status and registration details are recovered heuristically.

use crate::error::DomainWatchError;
use crate::protocols::classify::classify_text;
use crate::types::{DomainInfo, QueryMethod};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Standard WHOIS port.
pub const WHOIS_PORT: u16 = 43;

/// Responses are truncated beyond this many bytes.
pub const MAX_RESPONSE_BYTES: usize = 100 * 1024;

const REGISTRAR_LABELS: &[&str] = &[
    "registrar",
    "registrar organization",
    "sponsoring registrar",
];
const CREATED_LABELS: &[&str] = &["creation date", "created", "registered"];
const EXPIRY_LABELS: &[&str] = &[
    "expiry date",
    "expires",
    "expiration date",
    "registry expiry date",
];
const UPDATED_LABELS: &[&str] = &["updated date", "last updated", "modified"];
const NAME_SERVER_LABELS: &[&str] = &["name server", "nameserver", "nserver", "dns"];

/// Date-time layouts, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.3fZ",
];

/// Date-only layouts, tried in order after the date-time layouts.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%B %d %Y",
    "%b %d %Y",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
];

fn label_patterns(labels: &[&str], value: &str) -> Vec<Regex> {
    labels
        .iter()
        .map(|label| {
            Regex::new(&format!(r"(?i){}:\s*{}", regex::escape(label), value))
                .expect("label pattern is a valid regex")
        })
        .collect()
}

lazy_static::lazy_static! {
    static ref REGISTRAR_PATTERNS: Vec<Regex> = label_patterns(REGISTRAR_LABELS, "(.+)");
    static ref CREATED_PATTERNS: Vec<Regex> = label_patterns(CREATED_LABELS, r"([^\r\n]+)");
    static ref EXPIRY_PATTERNS: Vec<Regex> = label_patterns(EXPIRY_LABELS, r"([^\r\n]+)");
    static ref UPDATED_PATTERNS: Vec<Regex> = label_patterns(UPDATED_LABELS, r"([^\r\n]+)");
    static ref NAME_SERVER_PATTERNS: Vec<Regex> = label_patterns(NAME_SERVER_LABELS, r"([^\r\n]+)");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern is a valid regex");
}

/// WHOIS client speaking the wire protocol directly over TCP.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    /// Deadline for a whole exchange: connect, write, and read
    timeout: Duration,
}

impl WhoisClient {
    /// Create a new WHOIS client with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a new WHOIS client with custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a WHOIS query and return the raw response text.
    ///
    /// # Arguments
    ///
    /// * `domain` - The domain name to query
    /// * `server` - WHOIS server host name or address
    /// * `port` - WHOIS server port, normally [`WHOIS_PORT`]
    ///
    /// # Errors
    ///
    /// Returns a `WhoisError` if connecting, writing or reading fails, and
    /// a `Timeout` if the exchange does not finish within the deadline. The
    /// payload itself is never interpreted here.
    pub async fn query(
        &self,
        domain: &str,
        server: &str,
        port: u16,
    ) -> Result<String, DomainWatchError> {
        debug!(domain, server, port, "sending WHOIS query");
        match tokio::time::timeout(self.timeout, exchange(domain, server, port)).await {
            Ok(result) => result,
            Err(_) => Err(DomainWatchError::timeout(
                format!("WHOIS query to {}:{}", server, port),
                self.timeout,
            )),
        }
    }

    /// Interpret a raw WHOIS response.
    ///
    /// Always produces a result; text that matches no rule is `unknown`.
    pub fn parse(&self, domain: &str, raw: &str) -> DomainInfo {
        parse_response(domain, raw, Utc::now())
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn exchange(domain: &str, server: &str, port: u16) -> Result<String, DomainWatchError> {
    let mut stream = TcpStream::connect((server, port)).await.map_err(|e| {
        DomainWatchError::whois(
            domain,
            format!("failed to connect to {}:{}: {}", server, port, e),
        )
    })?;

    stream
        .write_all(format!("{}\r\n", domain).as_bytes())
        .await
        .map_err(|e| DomainWatchError::whois(domain, format!("failed to send query: {}", e)))?;

    let mut body = Vec::with_capacity(8 * 1024);
    stream
        .take(MAX_RESPONSE_BYTES as u64)
        .read_to_end(&mut body)
        .await
        .map_err(|e| DomainWatchError::whois(domain, format!("failed to read response: {}", e)))?;

    debug!(domain, server, bytes = body.len(), "WHOIS response received");
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Parse a WHOIS response relative to a fixed `now`.
pub(crate) fn parse_response(domain: &str, raw: &str, now: DateTime<Utc>) -> DomainInfo {
    let expiry_date = find_date(raw, &EXPIRY_PATTERNS);
    let expiry_passed = expiry_date.map(|d| d < now).unwrap_or(false);
    let status = classify_text(&raw.to_lowercase(), expiry_passed);

    let mut info = DomainInfo::new(domain, status, QueryMethod::Whois);
    info.registrar = find_registrar(raw);
    info.created_date = find_date(raw, &CREATED_PATTERNS);
    info.expiry_date = expiry_date;
    info.updated_date = find_date(raw, &UPDATED_PATTERNS);
    info.name_servers = find_name_servers(raw);
    info
}

fn find_registrar(raw: &str) -> Option<String> {
    REGISTRAR_PATTERNS.iter().find_map(|re| {
        re.captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn find_date(raw: &str, patterns: &[Regex]) -> Option<DateTime<Utc>> {
    patterns.iter().find_map(|re| {
        re.captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| parse_date(m.as_str()))
    })
}

fn find_name_servers(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut servers = Vec::new();

    for re in NAME_SERVER_PATTERNS.iter() {
        for caps in re.captures_iter(raw) {
            if let Some(m) = caps.get(1) {
                let ns = m.as_str().trim().to_lowercase();
                if !ns.is_empty() && seen.insert(ns.clone()) {
                    servers.push(ns);
                }
            }
        }
    }

    servers
}

/// Parse a WHOIS date value against the known layouts.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = WHITESPACE.replace_all(value.trim(), " ");

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&value, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
    }

    DateTime::parse_from_rfc3339(&value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::DomainStatus;
    use chrono::Datelike;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    const REGISTERED_RESPONSE: &str = "\
Domain Name: EXAMPLE.COM\r
Registry Domain ID: 2336799_DOMAIN_COM-VRSN\r
Registrar WHOIS Server: whois.iana.org\r
Updated Date: 2024-08-14T07:01:34Z\r
Creation Date: 1995-08-14T04:00:00Z\r
Registry Expiry Date: 2099-08-13T04:00:00Z\r
Registrar: RESERVED-Internet Assigned Numbers Authority\r
Domain Status: clientDeleteProhibited\r
Name Server: A.IANA-SERVERS.NET\r
Name Server: B.IANA-SERVERS.NET\r
Name Server: a.iana-servers.net\r
";

    #[test]
    fn test_parse_registered_details() {
        let info = WhoisClient::new().parse("example.com", REGISTERED_RESPONSE);
        assert_eq!(info.status, DomainStatus::Registered);
        assert_eq!(
            info.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(info.created_date.unwrap().year(), 1995);
        assert_eq!(info.expiry_date.unwrap().year(), 2099);
        assert_eq!(info.updated_date.unwrap().year(), 2024);
        assert_eq!(
            info.name_servers,
            vec!["a.iana-servers.net", "b.iana-servers.net"]
        );
        assert_eq!(info.query_method, Some(QueryMethod::Whois));
    }

    #[test]
    fn test_parse_expired_requires_past_date() {
        let raw = "Domain Name: old.com\nRegistrar: Some Registrar\nExpiry Date: 2001-02-03\n";
        let info = WhoisClient::new().parse("old.com", raw);
        assert_eq!(info.status, DomainStatus::Expired);

        let raw = "Domain Name: new.com\nRegistrar: Some Registrar\nExpiry Date: 2199-02-03\n";
        let info = WhoisClient::new().parse("new.com", raw);
        assert_eq!(info.status, DomainStatus::Registered);
    }

    #[test]
    fn test_parse_available_and_pending_delete() {
        let client = WhoisClient::new();
        let info = client.parse("free.com", "No match for \"FREE.COM\".\nNo entries found.");
        assert_eq!(info.status, DomainStatus::Available);
        assert!(info.registrar.is_none());

        let info = client.parse("gone.com", "Domain: gone.com\nStatus: pending delete\n");
        assert_eq!(info.status, DomainStatus::PendingDelete);
    }

    #[test]
    fn test_parse_available_still_extracts_details() {
        let raw = "Domain: spare.io\nStatus: free\nRegistrar: Holding Registry\n\
Updated Date: 2023-05-06\nName Server: NS1.PARKING.NET\n";
        let info = WhoisClient::new().parse("spare.io", raw);
        assert_eq!(info.status, DomainStatus::Available);
        assert_eq!(info.registrar.as_deref(), Some("Holding Registry"));
        assert_eq!(info.updated_date.unwrap().year(), 2023);
        assert_eq!(info.name_servers, vec!["ns1.parking.net"]);
    }

    #[test]
    fn test_parse_available_for_registration_phrasing() {
        let info = WhoisClient::new().parse(
            "freebie.xyz",
            "The domain freebie.xyz is available for registration.\r\n",
        );
        assert_eq!(info.status, DomainStatus::Available);
    }

    #[test]
    fn test_parse_date_formats() {
        let cases = [
            ("2020-01-02T03:04:05Z", (2020, 1, 2)),
            ("2020-01-02 03:04:05", (2020, 1, 2)),
            ("2020-01-02T03:04:05.123Z", (2020, 1, 2)),
            ("2020-01-02", (2020, 1, 2)),
            ("02-Jan-2020", (2020, 1, 2)),
            ("January  02   2020", (2020, 1, 2)),
            ("Jan 02 2020", (2020, 1, 2)),
            ("2020/01/02", (2020, 1, 2)),
            ("02/01/2020", (2020, 1, 2)),
            ("12/25/2020", (2020, 12, 25)),
            ("2020-01-02T03:04:05+02:00", (2020, 1, 2)),
        ];
        for (input, (y, m, d)) in cases {
            let parsed = parse_date(input).unwrap_or_else(|| panic!("failed to parse {}", input));
            assert_eq!((parsed.year(), parsed.month(), parsed.day()), (y, m, d), "{}", input);
        }
        assert!(parse_date("not a date").is_none());
    }

    #[tokio::test]
    async fn test_query_sends_crlf_line_and_reads_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let mut socket = reader.into_inner();
            socket.write_all(b"Registrar: Test\r\n").await.unwrap();
            line
        });

        let client = WhoisClient::with_timeout(Duration::from_secs(5));
        let body = client.query("example.com", "127.0.0.1", port).await.unwrap();
        assert_eq!(body, "Registrar: Test\r\n");
        assert_eq!(server.await.unwrap(), "example.com\r\n");
    }

    #[tokio::test]
    async fn test_query_caps_response_size() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let payload = vec![b'x'; 2 * MAX_RESPONSE_BYTES];
            let _ = socket.write_all(&payload).await;
        });

        let client = WhoisClient::with_timeout(Duration::from_secs(5));
        let body = client.query("example.com", "127.0.0.1", port).await.unwrap();
        assert_eq!(body.len(), MAX_RESPONSE_BYTES);
    }

    #[tokio::test]
    async fn test_query_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = WhoisClient::with_timeout(Duration::from_millis(200));
        let err = client
            .query("example.com", "127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainWatchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_query_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = WhoisClient::with_timeout(Duration::from_secs(2));
        let err = client
            .query("example.com", "127.0.0.1", port)
            .await
            .unwrap_err();
        assert!(err.is_protocol());
        match err {
            DomainWatchError::WhoisError { domain, message } => {
                assert_eq!(domain, "example.com");
                assert!(message.contains("failed to connect"), "{}", message);
            }
            other => panic!("expected a WHOIS error, got {:?}", other),
        }
    }
}
