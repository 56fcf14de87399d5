//! In-process mock WHOIS and RDAP servers.

#![allow(dead_code)]

use domain_watch_lib::StaticTldRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// TLD routed to the mock servers.
pub const TEST_TLD: &str = "test";

/// WHOIS server answering from a per-domain response table.
pub struct MockWhois {
    pub port: u16,
    responses: Arc<Mutex<HashMap<String, String>>>,
    queries: Arc<AtomicUsize>,
}

impl MockWhois {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let responses: Arc<Mutex<HashMap<String, String>>> = Arc::default();
        let queries = Arc::new(AtomicUsize::new(0));

        let (table, counter) = (Arc::clone(&responses), Arc::clone(&queries));
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let table = Arc::clone(&table);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream);
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.is_err() {
                        return;
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    let domain = line.trim().to_string();
                    let body = table
                        .lock()
                        .unwrap()
                        .get(&domain)
                        .cloned()
                        .unwrap_or_else(|| format!("Domain {} not found.\r\n", domain));
                    let mut stream = reader.into_inner();
                    let _ = stream.write_all(body.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            port,
            responses,
            queries,
        }
    }

    pub fn respond(&self, domain: &str, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(domain.to_string(), body.to_string());
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

/// Minimal HTTP/1.1 RDAP server; unknown domains get 404.
pub struct MockRdap {
    pub port: u16,
    responses: Arc<Mutex<HashMap<String, (u16, String)>>>,
    requests: Arc<AtomicUsize>,
}

impl MockRdap {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let responses: Arc<Mutex<HashMap<String, (u16, String)>>> = Arc::default();
        let requests = Arc::new(AtomicUsize::new(0));

        let (table, counter) = (Arc::clone(&responses), Arc::clone(&requests));
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let table = Arc::clone(&table);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    counter.fetch_add(1, Ordering::SeqCst);

                    let request = String::from_utf8_lossy(&buf);
                    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let domain = path.rsplit('/').next().unwrap_or_default().to_string();

                    let (status, body) = table
                        .lock()
                        .unwrap()
                        .get(&domain)
                        .cloned()
                        .unwrap_or((404, "{\"errorCode\":404}".to_string()));
                    let reason = match status {
                        200 => "OK",
                        404 => "Not Found",
                        _ => "Error",
                    };
                    let response = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: application/rdap+json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        reason,
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            port,
            responses,
            requests,
        }
    }

    pub fn respond(&self, domain: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(domain.to_string(), (status, body.to_string()));
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Registry routing [`TEST_TLD`] to the given mock servers.
pub fn registry(rdap: &MockRdap, whois: &MockWhois) -> StaticTldRegistry {
    StaticTldRegistry::new()
        .with_rdap(TEST_TLD, rdap.base_url())
        .with_whois(TEST_TLD, "127.0.0.1", whois.port)
}

/// RDAP body for an active domain expiring in `days` days.
pub fn active_record(domain: &str, days: i64) -> String {
    let expiry = chrono::Utc::now() + chrono::Duration::days(days);
    serde_json::json!({
        "objectClassName": "domain",
        "ldhName": domain,
        "status": ["active"],
        "events": [
            { "eventAction": "registration", "eventDate": "2015-03-01T00:00:00Z" },
            { "eventAction": "expiration", "eventDate": expiry.to_rfc3339() }
        ],
        "nameservers": [
            { "ldhName": "NS1.EXAMPLE.NET" },
            { "ldhName": "ns1.example.net" }
        ]
    })
    .to_string()
}
