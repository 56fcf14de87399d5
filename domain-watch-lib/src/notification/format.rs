//! Fixed notification templates.

use super::{NotificationEvent, NotificationKind};
use std::fmt::Write;

const SUBJECT_PREFIX: &str = "[Domain Watch]";
const FOOTER: &str = "---\nSent automatically by domain-watch";

/// Subject line for an event.
pub fn format_subject(event: &NotificationEvent) -> String {
    let domain = &event.domain;
    match event.kind {
        NotificationKind::StatusChange => format!("{} {} status changed", SUBJECT_PREFIX, domain),
        NotificationKind::Available => format!("{} {} is available!", SUBJECT_PREFIX, domain),
        NotificationKind::Redemption => {
            format!("{} {} entered redemption period", SUBJECT_PREFIX, domain)
        }
        NotificationKind::PendingDelete => {
            format!("{} {} is pending deletion", SUBJECT_PREFIX, domain)
        }
        NotificationKind::Error => format!("{} {} check failed", SUBJECT_PREFIX, domain),
        NotificationKind::Other => format!("{} {} notification", SUBJECT_PREFIX, domain),
    }
}

/// Plain-text body for an event.
pub fn format_message(event: &NotificationEvent) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "Domain: {}", event.domain);
    let _ = writeln!(
        body,
        "Time: {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );

    match event.kind {
        NotificationKind::StatusChange => {
            let old = event
                .old_status
                .map(|s| s.description())
                .unwrap_or("Unknown status");
            let _ = writeln!(
                body,
                "Status change: {} -> {}",
                old,
                event.status.description()
            );
        }
        NotificationKind::Available => {
            body.push_str("Status: available\n");
            body.push_str("This domain can be registered now!\n");
        }
        NotificationKind::Redemption => {
            body.push_str("Status: redemption period\n");
            body.push_str("This domain is in its redemption period and may be restored.\n");
        }
        NotificationKind::PendingDelete => {
            body.push_str("Status: pending deletion\n");
            body.push_str("This domain is about to be deleted and released.\n");
        }
        NotificationKind::Error => {
            body.push_str("Status: check failed\n");
            let _ = writeln!(body, "Error: {}", event.message);
        }
        NotificationKind::Other => {}
    }

    if !event.message.is_empty() && event.kind != NotificationKind::Error {
        let _ = write!(body, "\nDetails: {}\n", event.message);
    }

    body.push('\n');
    body.push_str(FOOTER);
    body
}
