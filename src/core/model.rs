// LogTally - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// storage dependencies.
//
// These types are the shared vocabulary across all layers.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::path::PathBuf;

// =============================================================================
// Log Event (output of line parsing)
// =============================================================================

/// One parsed access-log line.
///
/// Ephemeral: produced by the parser, handed to the store, then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// Client address as it appeared in the line (four digit groups).
    pub ip_address: String,

    /// Request time with the offset recorded in the log.
    pub timestamp: DateTime<FixedOffset>,

    /// First token of the request field, if any.
    pub method: Option<String>,

    /// Second token of the request field, if any.
    pub path: Option<String>,

    /// HTTP status code (always three digits in the source line).
    pub status_code: u16,

    /// Response size; `-` in the source line becomes 0. Never above
    /// `i64::MAX`, so every value fits a SQLite INTEGER unchanged.
    pub bytes_sent: u64,

    /// Referrer header; `None` only for the literal `-`.
    pub referrer: Option<String>,

    /// Raw user-agent string, never empty.
    pub user_agent: String,
}

// =============================================================================
// User-agent dimension
// =============================================================================

/// Coarse labels derived from a raw user-agent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserAgentLabels {
    pub os: &'static str,
    pub browser: &'static str,
    pub device_type: &'static str,
}

/// A persisted, deduplicated user-agent row.
///
/// Labels are computed once when the row is created and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAgentDimension {
    pub id: i64,
    pub user_agent_string: String,
    pub os: Option<String>,
    pub browser: Option<String>,
    pub device_type: Option<String>,
}

// =============================================================================
// Stored fact row
// =============================================================================

/// A persisted `log_entries` row as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub id: i64,
    pub ip_address: String,
    /// Normalised to UTC on insert.
    pub timestamp: DateTime<Utc>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub status_code: u16,
    pub bytes_sent: u64,
    pub referrer: Option<String>,
    pub user_agent_id: i64,
}

// =============================================================================
// Report rows
// =============================================================================

/// A label with a request count (top IPs, top pages, hourly, by OS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    /// Grouping key. `None` only for requests whose path was absent.
    pub key: Option<String>,
    pub count: u64,
}

impl CountRow {
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self {
            key: Some(key.into()),
            count,
        }
    }
}

/// One status code with its share of all requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShareRow {
    pub status_code: u16,
    pub count: u64,
    /// Percentage of all fact rows, rounded to two decimals.
    pub percentage: f64,
}

/// One error response on the requested day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLogRow {
    pub ip_address: String,
    pub timestamp: DateTime<Utc>,
    pub path: Option<String>,
    pub status_code: u16,
    pub user_agent: String,
}

// =============================================================================
// Ingest summary
// =============================================================================

/// Counters for one ingested file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub lines_read: u64,
    pub events_inserted: u64,
    /// Lines that did not match the combined-log-format grammar
    /// (including lines that are not valid UTF-8).
    pub malformed_lines: u64,
    /// Lines that matched structurally but carried an unparsable timestamp.
    pub bad_timestamp_lines: u64,
}

impl FileSummary {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub fn skipped_lines(&self) -> u64 {
        self.malformed_lines + self.bad_timestamp_lines
    }
}

/// Aggregated counters for one `process_logs` run.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    pub files: Vec<FileSummary>,
    /// Wall-clock ingest duration.
    pub duration: std::time::Duration,
}

impl IngestSummary {
    pub fn lines_read(&self) -> u64 {
        self.files.iter().map(|f| f.lines_read).sum()
    }

    pub fn events_inserted(&self) -> u64 {
        self.files.iter().map(|f| f.events_inserted).sum()
    }

    pub fn malformed_lines(&self) -> u64 {
        self.files.iter().map(|f| f.malformed_lines).sum()
    }

    pub fn bad_timestamp_lines(&self) -> u64 {
        self.files.iter().map(|f| f.bad_timestamp_lines).sum()
    }
}
