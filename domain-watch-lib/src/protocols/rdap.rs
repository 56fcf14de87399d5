//! RDAP (Registration Data Access Protocol) implementation.
//!
//! RDAP is the JSON-over-HTTPS successor to WHOIS. A lookup is a GET of
//! `{base}/domain/{name}`; 404 means the registry has no record, 200 carries
//! a domain object with status tokens, entities, events and nameservers.

use crate::error::DomainWatchError;
use crate::protocols::classify::classify_tokens;
use crate::protocols::whois::parse_date;
use crate::status::DomainStatus;
use crate::types::{DomainInfo, QueryMethod};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// Media type requested from RDAP servers.
pub const RDAP_MEDIA_TYPE: &str = "application/rdap+json";

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Outcome of an RDAP request that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub enum RdapResponse {
    /// HTTP 404: the registry has no such domain
    NotFound,
    /// HTTP 200 with a JSON object body
    Record(Value),
    /// HTTP 200 whose body is not an RDAP JSON object
    Malformed(String),
}

/// RDAP client for querying domain registration data.
#[derive(Clone)]
pub struct RdapClient {
    /// HTTP client for making RDAP requests
    http_client: reqwest::Client,
    /// Deadline for a whole request including the body
    timeout: Duration,
    user_agent: String,
}

impl RdapClient {
    /// Create a new RDAP client with default settings.
    pub fn new() -> Result<Self, DomainWatchError> {
        Self::with_config(
            Duration::from_secs(30),
            format!("domain-watch/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Create a new RDAP client with custom settings.
    pub fn with_config<U: Into<String>>(
        timeout: Duration,
        user_agent: U,
    ) -> Result<Self, DomainWatchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout + Duration::from_secs(2)) // Add buffer for HTTP timeout
            .build()
            .map_err(|e| {
                DomainWatchError::network_with_source(
                    "Failed to create RDAP HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            timeout,
            user_agent: user_agent.into(),
        })
    }

    /// Query an RDAP server for a domain.
    ///
    /// # Arguments
    ///
    /// * `domain` - The normalized domain name
    /// * `base_url` - Server base URL, with or without a trailing slash
    ///
    /// # Returns
    ///
    /// [`RdapResponse::NotFound`] for HTTP 404, otherwise the decoded body.
    ///
    /// # Errors
    ///
    /// Returns `DomainWatchError` if:
    /// - The request cannot be sent or times out
    /// - The server answers with any status other than 200 or 404
    pub async fn query(
        &self,
        domain: &str,
        base_url: &str,
    ) -> Result<RdapResponse, DomainWatchError> {
        let url = format!("{}/domain/{}", base_url.trim_end_matches('/'), domain);
        debug!(domain, url = %url, "sending RDAP request");

        match tokio::time::timeout(self.timeout, self.make_request(&url, domain)).await {
            Ok(result) => result,
            Err(_) => Err(DomainWatchError::timeout(
                format!("RDAP request to {}", url),
                self.timeout,
            )),
        }
    }

    async fn make_request(
        &self,
        url: &str,
        domain: &str,
    ) -> Result<RdapResponse, DomainWatchError> {
        let response = self
            .http_client
            .get(url)
            .header(ACCEPT, RDAP_MEDIA_TYPE)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DomainWatchError::timeout(format!("RDAP request to {}", url), self.timeout)
                } else {
                    DomainWatchError::from(e)
                }
            })?;

        let status = response.status();
        debug!(domain, status = status.as_u16(), "RDAP response received");

        match status {
            StatusCode::NOT_FOUND => Ok(RdapResponse::NotFound),
            StatusCode::OK => {
                let body = response.text().await.map_err(|e| {
                    DomainWatchError::rdap(domain, format!("failed to read response body: {}", e))
                })?;
                Ok(decode_body(&body))
            }
            code => {
                let body = response.text().await.unwrap_or_default();
                let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
                Err(DomainWatchError::rdap_with_status(
                    domain,
                    format!("RDAP server returned {}: {}", code, body.trim()),
                    code.as_u16(),
                ))
            }
        }
    }

    /// Interpret an RDAP response.
    pub fn parse(&self, domain: &str, response: &RdapResponse) -> DomainInfo {
        parse_response(domain, response)
    }
}

fn decode_body(body: &str) -> RdapResponse {
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.is_object() => RdapResponse::Record(value),
        Ok(_) => RdapResponse::Malformed("RDAP body is not a JSON object".to_string()),
        Err(e) => RdapResponse::Malformed(format!("invalid RDAP JSON: {}", e)),
    }
}

/// Build a [`DomainInfo`] from an RDAP response.
pub fn parse_response(domain: &str, response: &RdapResponse) -> DomainInfo {
    match response {
        RdapResponse::NotFound => DomainInfo::new(domain, DomainStatus::Available, QueryMethod::Rdap),
        RdapResponse::Malformed(reason) => {
            debug!(domain, reason = %reason, "unparsable RDAP response");
            DomainInfo::new(domain, DomainStatus::Unknown, QueryMethod::Rdap)
        }
        RdapResponse::Record(json) => extract_domain_info(domain, json),
    }
}

/// Extract domain information from an RDAP domain object.
pub fn extract_domain_info(domain: &str, json: &Value) -> DomainInfo {
    let tokens: Vec<&str> = json
        .get("status")
        .and_then(|s| s.as_array())
        .map(|list| list.iter().filter_map(|s| s.as_str()).collect())
        .unwrap_or_default();

    let mut info = DomainInfo::new(domain, classify_tokens(&tokens), QueryMethod::Rdap);

    // Registrar from the first entity carrying the registrar role
    if let Some(entities) = json.get("entities").and_then(|e| e.as_array()) {
        info.registrar = entities
            .iter()
            .find(|entity| has_role(entity, "registrar"))
            .and_then(|entity| {
                extract_vcard_property(entity, "org")
                    .or_else(|| extract_vcard_property(entity, "fn"))
                    .or_else(|| {
                        entity
                            .get("handle")
                            .and_then(|h| h.as_str())
                            .map(String::from)
                    })
            })
            .filter(|name| !name.trim().is_empty());
    }

    if let Some(events) = json.get("events").and_then(|e| e.as_array()) {
        let mut last_update = None;
        for event in events {
            let (Some(action), Some(date)) = (
                event.get("eventAction").and_then(|a| a.as_str()),
                event.get("eventDate").and_then(|d| d.as_str()),
            ) else {
                continue;
            };
            let Some(date) = parse_event_date(date) else {
                continue;
            };
            match action.to_lowercase().as_str() {
                "registration" => info.created_date = Some(date),
                "expiration" => info.expiry_date = Some(date),
                "last changed" => info.updated_date = Some(date),
                "last update of rdap database" => last_update = Some(date),
                _ => {}
            }
        }
        if info.updated_date.is_none() {
            info.updated_date = last_update;
        }
    }

    if let Some(nameservers) = json.get("nameservers").and_then(|ns| ns.as_array()) {
        let mut seen = HashSet::new();
        for nameserver in nameservers {
            if let Some(ldh_name) = nameserver.get("ldhName").and_then(|n| n.as_str()) {
                let name = ldh_name.trim().to_lowercase();
                if !name.is_empty() && seen.insert(name.clone()) {
                    info.name_servers.push(name);
                }
            }
        }
    }

    info
}

fn has_role(entity: &Value, role: &str) -> bool {
    entity
        .get("roles")
        .and_then(|r| r.as_array())
        .map(|roles| {
            roles
                .iter()
                .filter_map(|r| r.as_str())
                .any(|r| r.eq_ignore_ascii_case(role))
        })
        .unwrap_or(false)
}

/// Extract a text property from the vCard of an RDAP entity.
///
/// vCards are `["vcard", [[name, params, type, value], ...]]`.
fn extract_vcard_property(entity: &Value, property: &str) -> Option<String> {
    entity
        .get("vcardArray")
        .and_then(|v| v.as_array())
        .and_then(|a| a.get(1))
        .and_then(|a| a.as_array())
        .and_then(|items| {
            items.iter().find_map(|item| {
                let item = item.as_array()?;
                if item.len() < 4 {
                    return None;
                }
                let name = item.first()?.as_str()?;
                if !name.eq_ignore_ascii_case(property) {
                    return None;
                }
                // org values may be structured as a list of units
                match item.get(3)? {
                    Value::String(s) => Some(s.clone()),
                    Value::Array(parts) => parts.first()?.as_str().map(String::from),
                    _ => None,
                }
            })
        })
        .filter(|s| !s.trim().is_empty())
}

fn parse_event_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_date(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "objectClassName": "domain",
            "ldhName": "EXAMPLE.COM",
            "status": ["client delete prohibited", "client transfer prohibited"],
            "entities": [
                {
                    "roles": ["technical"],
                    "vcardArray": ["vcard", [["fn", {}, "text", "Tech Person"]]]
                },
                {
                    "handle": "376",
                    "roles": ["registrar"],
                    "vcardArray": ["vcard", [
                        ["version", {}, "text", "4.0"],
                        ["fn", {}, "text", "Example Registrar Inc."],
                        ["org", {}, "text", "Example Registrar Org"]
                    ]]
                }
            ],
            "events": [
                {"eventAction": "registration", "eventDate": "1995-08-14T04:00:00Z"},
                {"eventAction": "expiration", "eventDate": "2030-08-13T04:00:00Z"},
                {"eventAction": "last update of RDAP database", "eventDate": "2024-01-01T00:00:00Z"},
                {"eventAction": "last changed", "eventDate": "2023-08-14T07:01:34Z"}
            ],
            "nameservers": [
                {"ldhName": "A.IANA-SERVERS.NET"},
                {"ldhName": "b.iana-servers.net"},
                {"ldhName": "a.iana-servers.net"}
            ]
        })
    }

    #[test]
    fn test_extract_domain_info_full_record() {
        let info = extract_domain_info("example.com", &sample_record());
        assert_eq!(info.status, DomainStatus::TransferLocked);
        assert_eq!(info.registrar.as_deref(), Some("Example Registrar Org"));
        assert_eq!(info.created_date.unwrap().year(), 1995);
        assert_eq!(info.expiry_date.unwrap().year(), 2030);
        assert_eq!(info.updated_date.unwrap().year(), 2023);
        assert_eq!(
            info.name_servers,
            vec!["a.iana-servers.net", "b.iana-servers.net"]
        );
        assert_eq!(info.query_method, Some(QueryMethod::Rdap));
    }

    #[test]
    fn test_registrar_falls_back_to_fn_then_handle() {
        let with_fn = json!({
            "status": ["active"],
            "entities": [{
                "handle": "9999",
                "roles": ["registrar"],
                "vcardArray": ["vcard", [["fn", {}, "text", "Only FN Registrar"]]]
            }]
        });
        let info = extract_domain_info("a.com", &with_fn);
        assert_eq!(info.registrar.as_deref(), Some("Only FN Registrar"));
        assert_eq!(info.status, DomainStatus::Registered);

        let handle_only = json!({
            "status": ["active"],
            "entities": [{"handle": "9999", "roles": ["Registrar"]}]
        });
        let info = extract_domain_info("a.com", &handle_only);
        assert_eq!(info.registrar.as_deref(), Some("9999"));
    }

    #[test]
    fn test_parse_not_found_and_malformed() {
        let info = parse_response("free.com", &RdapResponse::NotFound);
        assert_eq!(info.status, DomainStatus::Available);

        let info = parse_response("odd.com", &decode_body("<html>oops</html>"));
        assert_eq!(info.status, DomainStatus::Unknown);
        assert!(info.error_message.is_none());
    }

    #[test]
    fn test_empty_status_list_is_unknown() {
        let info = extract_domain_info("a.com", &json!({"status": []}));
        assert_eq!(info.status, DomainStatus::Unknown);
        let info = extract_domain_info("a.com", &json!({}));
        assert_eq!(info.status, DomainStatus::Unknown);
    }

    #[test]
    fn test_decode_body_requires_object() {
        assert!(matches!(decode_body("[1,2]"), RdapResponse::Malformed(_)));
        assert!(matches!(decode_body("{\"status\":[]}"), RdapResponse::Record(_)));
    }

    #[tokio::test]
    async fn test_rdap_client_creation() {
        assert!(RdapClient::new().is_ok());
    }
}
