//! Human-readable event log.
//!
//! An append-only, timestamped log stream intended for direct rendering by
//! a presentation layer. Developer diagnostics go through `tracing`
//! instead; this log is part of the public contract.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use tokio::sync::broadcast;

/// One timestamped log line.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogEntry {
    /// Local time at which the entry was appended.
    pub timestamp: DateTime<Local>,
    /// Human-readable message.
    pub message: String,
}

impl LogEntry {
    fn new(message: String) -> Self {
        Self {
            timestamp: Local::now(),
            message,
        }
    }
}

impl std::fmt::Display for LogEntry {
    /// Renders as `[<long-date> <medium-time>] <message>`,
    /// e.g. `[February 7, 2018 3:04:05 PM] Discovered BoardX`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%B %-d, %Y %-I:%M:%S %p"),
            self.message
        )
    }
}

/// Append-only log of lifecycle events and errors.
///
/// Entries are monotonic for the lifetime of the process and broadcast to
/// subscribers as they are appended.
pub struct EventLog {
    entries: RwLock<Vec<LogEntry>>,
    event_tx: broadcast::Sender<LogEntry>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);

        Self {
            entries: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    /// Append a message, stamping it with the current local time.
    pub fn append(&self, message: impl Into<String>) {
        let entry = LogEntry::new(message.into());
        self.entries.write().push(entry.clone());
        let _ = self.event_tx.send(entry);
    }

    /// Get a snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().clone()
    }

    /// Render the whole log as one newline-separated string.
    pub fn render(&self) -> String {
        let entries = self.entries.read();
        let mut out = String::new();
        for entry in entries.iter() {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }

    /// Subscribe to entries as they are appended.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.event_tx.subscribe()
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_append_preserves_order() {
        let log = EventLog::new();
        assert!(log.is_empty());

        log.append("first");
        log.append("second");
        log.append(String::from("third"));

        let entries = log.entries();
        assert_eq!(log.len(), 3);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].message, "second");
        assert_eq!(entries[2].message, "third");
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_append_broadcasts() {
        let log = EventLog::new();
        let mut rx = log.subscribe();

        log.append("hello");

        let entry = rx.try_recv().expect("entry should be broadcast");
        assert_eq!(entry.message, "hello");
    }

    #[test]
    fn test_entry_render_format() {
        let entry = LogEntry {
            timestamp: Local
                .with_ymd_and_hms(2018, 2, 7, 15, 4, 5)
                .single()
                .expect("valid timestamp"),
            message: "Discovered BoardX".to_string(),
        };

        assert_eq!(
            entry.to_string(),
            "[February 7, 2018 3:04:05 PM] Discovered BoardX"
        );
    }

    #[test]
    fn test_render_joins_lines() {
        let log = EventLog::new();
        log.append("one");
        log.append("two");

        let rendered = log.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("one"));
        assert!(lines[1].ends_with("two"));
    }
}
