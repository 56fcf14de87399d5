//! Terminal display logic for domain-watch CLI.
//!
//! Colored result lines, the spinner shown during one-shot checks, the
//! monitor banner and summaries. Uses only the `console` crate.

use console::{pad_str, style, Alignment, StyledObject, Term};
use domain_watch_lib::{DomainInfo, DomainStatus, MonitorConfig, MonitorStats, NotificationStats};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a new spinner with the given message (e.g. "Checking 8 domains...").
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print the banner shown when the monitor starts.
pub fn print_monitor_header(domain_count: usize, config: &MonitorConfig, notifiers: &[String]) {
    println!(
        "{} {} {}",
        style("domain-watch").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Watching {} domain{}",
            domain_count,
            if domain_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let meta_parts = [
        format!("Interval: {}", format_duration(config.check_interval)),
        format!("Concurrency: {}", config.concurrent_limit),
        format!("Timeout: {}", format_duration(config.timeout)),
        format!("Notifiers: {}", notifiers.join(", ")),
    ];
    println!("{}", style(meta_parts.join(" | ")).dim());
    println!("{}", style("Press Ctrl-C to stop").dim());
    println!();
}

// ── Single result line ───────────────────────────────────────────────────────

fn status_label(status: DomainStatus) -> StyledObject<String> {
    let label = status.as_str().to_uppercase();
    match status {
        DomainStatus::Available => style(label).green().bold(),
        DomainStatus::Redemption | DomainStatus::PendingDelete | DomainStatus::Expired => {
            style(label).cyan().bold()
        }
        DomainStatus::Registered | DomainStatus::TransferLocked | DomainStatus::Hold => {
            style(label).red().bold()
        }
        DomainStatus::Unknown | DomainStatus::Error => style(label).yellow(),
    }
}

/// Format and print a single domain result with colors and alignment.
pub fn print_result(info: &DomainInfo, show_info: bool) {
    let domain_width = 30;
    let padded_domain = pad_str(&info.name, domain_width, Alignment::Left, Some(".."));

    let detail = if info.is_error() {
        format!("  {}", style(brief_error(info)).dim())
    } else if show_info {
        format!("  {}", style(format_domain_info(info)).dim())
    } else {
        String::new()
    };

    println!(
        "  {}  {}{}",
        style(&padded_domain).white(),
        status_label(info.status),
        detail,
    );
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Count results per status, in status priority order.
pub fn count_statuses(results: &[DomainInfo]) -> BTreeMap<DomainStatus, usize> {
    let mut counts = BTreeMap::new();
    for info in results {
        *counts.entry(info.status).or_insert(0) += 1;
    }
    counts
}

/// Print the final summary bar with colored counts.
pub fn print_summary(results: &[DomainInfo], duration: Duration) {
    let total = results.len();
    let counts = count_statuses(results);
    let parts: Vec<String> = counts
        .iter()
        .map(|(status, count)| format!("{} {}", count, status_label(*status)))
        .collect();

    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        parts.join(&format!("  {}  ", style("|").dim())),
    );
}

/// Print monitor and notification counters on shutdown.
pub fn print_shutdown_summary(monitor: &MonitorStats, notifications: &NotificationStats) {
    println!();
    println!("{}", style("Monitor stopped").bold());
    println!(
        "  {} {} domains tracked, cache hit rate {:.1}%",
        style("•").dim(),
        monitor.tracked_domains,
        monitor.cache.hit_rate,
    );
    println!(
        "  {} {} notification{} delivered, {} failed, {} suppressed, {} dropped",
        style("•").dim(),
        notifications.delivered,
        if notifications.delivered == 1 { "" } else { "s" },
        notifications.failed,
        notifications.suppressed,
        notifications.dropped + monitor.dropped_events,
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Format domain info (registrar, dates) into a concise string.
pub fn format_domain_info(info: &DomainInfo) -> String {
    let mut parts = Vec::new();
    if let Some(registrar) = &info.registrar {
        parts.push(format!("Registrar: {}", registrar));
    }
    if let Some(created) = &info.created_date {
        parts.push(format!("Created: {}", created.format("%Y-%m-%d")));
    }
    if let Some(expires) = &info.expiry_date {
        let remaining = match info.days_until_expiry() {
            Some(days) if days < 0 => " (expired)".to_string(),
            Some(days) if days <= 30 => format!(" ({} days left)", days),
            _ => String::new(),
        };
        parts.push(format!("Expires: {}{}", expires.format("%Y-%m-%d"), remaining));
    }
    if let Some(method) = &info.query_method {
        parts.push(format!("via {}", method));
    }
    if parts.is_empty() {
        "No info available".to_string()
    } else {
        parts.join(", ")
    }
}

/// Extract a brief error reason from an error result.
fn brief_error(info: &DomainInfo) -> &'static str {
    match &info.error_message {
        Some(msg) => {
            let m = msg.to_lowercase();
            if m.contains("invalid domain") {
                "(invalid domain)"
            } else if m.contains("timeout") || m.contains("timed out") {
                "(timeout)"
            } else if m.contains("no rdap server") || m.contains("no whois server") {
                "(unsupported TLD)"
            } else if m.contains("network") || m.contains("dns") || m.contains("connect") {
                "(network error)"
            } else {
                "(error)"
            }
        }
        None => "(unknown status)",
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
