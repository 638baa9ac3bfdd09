//! Run progress events.
//!
//! Each event is emitted through `tracing` and published on a process-wide
//! broadcast channel. An embedding host can [`subscribe`] to follow a run
//! without installing its own subscriber.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events kept for slow subscribers before they start lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One progress event of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth under the previous top-level event
    #[serde(default)]
    pub depth: u8,
    pub emitted_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            depth: 0,
            emitted_at: Utc::now(),
        }
    }

    pub fn nested(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }
}

static EVENTS: Lazy<broadcast::Sender<LogEntry>> =
    Lazy::new(|| broadcast::channel(CHANNEL_CAPACITY).0);

/// Receive every event published from now on.
pub fn subscribe() -> broadcast::Receiver<LogEntry> {
    EVENTS.subscribe()
}

/// Emit `entry` as a tracing event and publish it.
pub fn publish(entry: LogEntry) {
    let pad = "  ".repeat(usize::from(entry.depth));
    match entry.level {
        LogLevel::Info => tracing::info!("{}{}", pad, entry.message),
        LogLevel::Success => tracing::info!(outcome = "ok", "{}{}", pad, entry.message),
        LogLevel::Warning => tracing::warn!("{}{}", pad, entry.message),
        LogLevel::Error => tracing::error!("{}{}", pad, entry.message),
    }
    // Sending fails only when nobody subscribed.
    let _ = EVENTS.send(entry);
}

pub fn log_info(msg: impl Into<String>) {
    publish(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    publish(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    publish(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_info_indent(msg: impl Into<String>, depth: u8) {
    publish(LogEntry::new(LogLevel::Info, msg).nested(depth));
}
