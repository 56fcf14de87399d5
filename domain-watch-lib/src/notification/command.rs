//! Built-in notifiers.

use super::Notifier;
use crate::error::DomainWatchError;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

const TEST_SUBJECT: &str = "[Domain Watch] Test notification";
const TEST_MESSAGE: &str =
    "This is a test message to verify notification delivery.\n\nIf you received it, the notifier is configured correctly.";

/// Default time limit for a notification command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Writes notifications to the `tracing` log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, subject: &str, message: &str) -> Result<(), DomainWatchError> {
        info!(target: "domain_watch::notify", %subject, %message, "notification");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn test(&self) -> Result<(), DomainWatchError> {
        self.send_message(TEST_SUBJECT, TEST_MESSAGE).await
    }

    fn notifier_type(&self) -> &str {
        "log"
    }
}

/// Runs a shell command for every notification.
///
/// The command is executed with `sh -c`; the subject and body are passed in
/// the `DW_SUBJECT` and `DW_MESSAGE` environment variables. A non-zero exit
/// status counts as a failed delivery.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    command: String,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new<C: Into<String>>(command: C) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn send_message(&self, subject: &str, message: &str) -> Result<(), DomainWatchError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("DW_SUBJECT", subject)
            .env("DW_MESSAGE", message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| DomainWatchError::timeout("notification command", self.timeout))?
            .map_err(|e| DomainWatchError::notifier("command", format!("failed to spawn: {}", e)))?;

        if output.status.success() {
            debug!(command = %self.command, "notification command succeeded");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.trim();
        Err(DomainWatchError::notifier(
            "command",
            if detail.is_empty() {
                format!("command exited with {}", output.status)
            } else {
                format!("command exited with {}: {}", output.status, detail)
            },
        ))
    }

    fn is_enabled(&self) -> bool {
        !self.command.trim().is_empty()
    }

    async fn test(&self) -> Result<(), DomainWatchError> {
        self.send_message(TEST_SUBJECT, TEST_MESSAGE).await
    }

    fn notifier_type(&self) -> &str {
        "command"
    }
}
