// LogTally - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; every variant keeps its cause so the
// binary can log the full chain.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all LogTally operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum LogTallyError {
    /// Ingestion input could not be located or read.
    Ingest(IngestError),

    /// The relational store failed.
    Store(StoreError),

    /// A report request was rejected before any query ran.
    Report(ReportError),

    /// Writing a report in an export format failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl LogTallyError {
    /// True for errors caused by how the command was invoked rather than by
    /// the data or the environment. The binary maps these to exit code 2.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Report(_))
            || matches!(self, Self::Ingest(IngestError::NoInputFiles))
    }
}

impl fmt::Display for LogTallyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest(e) => write!(f, "Ingest error: {e}"),
            Self::Store(e) => write!(f, "Store error: {e}"),
            Self::Report(e) => write!(f, "Usage error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for LogTallyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ingest(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Report(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Why a single access-log line was rejected.
///
/// Both variants are skip-worthy during ingestion; they are kept apart so
/// the ingest summary can report lines with a bad timestamp separately
/// from lines that never matched the grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The line does not have the combined-log-format structure.
    Malformed { reason: &'static str },

    /// The line matched structurally but its timestamp is not
    /// `dd/Mon/YYYY:HH:MM:SS ±HHMM`.
    Timestamp {
        raw_timestamp: String,
        source: chrono::ParseError,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => write!(f, "malformed access-log line: {reason}"),
            Self::Timestamp {
                raw_timestamp,
                source,
            } => write!(f, "cannot parse timestamp '{raw_timestamp}': {source}"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timestamp { source, .. } => Some(source),
            Self::Malformed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ingest errors
// ---------------------------------------------------------------------------

/// Errors locating or reading ingestion input.
#[derive(Debug)]
pub enum IngestError {
    /// An input path given on the command line does not exist.
    InputNotFound { path: PathBuf },

    /// The input paths expanded to zero log files.
    NoInputFiles,

    /// Walkdir traversal error inside an input directory.
    Traversal {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// An input file could not be opened or read.
    Read { path: PathBuf, source: io::Error },

    /// The parallel ingest worker pool could not be created.
    WorkerPool { source: rayon::ThreadPoolBuildError },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputNotFound { path } => {
                write!(f, "Input path '{}' does not exist", path.display())
            }
            Self::NoInputFiles => write!(f, "No log files found in the given input paths"),
            Self::Traversal { path, source } => {
                write!(f, "Error traversing '{}': {source}", path.display())
            }
            Self::Read { path, source } => {
                write!(f, "Cannot read '{}': {source}", path.display())
            }
            Self::WorkerPool { source } => {
                write!(f, "Cannot start ingest worker pool: {source}")
            }
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Traversal { source, .. } => Some(source),
            Self::Read { source, .. } => Some(source),
            Self::WorkerPool { source } => Some(source),
            _ => None,
        }
    }
}

impl From<IngestError> for LogTallyError {
    fn from(e: IngestError) -> Self {
        Self::Ingest(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors raised by the SQLite-backed store.
#[derive(Debug)]
pub enum StoreError {
    /// The database could not be opened (missing directory, permissions,
    /// not a database file).
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// A connection setting (busy timeout, journal mode, foreign keys)
    /// could not be applied.
    Setup {
        setting: &'static str,
        source: rusqlite::Error,
    },

    /// Schema creation failed.
    Schema { source: rusqlite::Error },

    /// The database opened but does not contain the LogTally tables.
    MissingSchema { path: PathBuf },

    /// A statement failed while executing `operation`.
    Query {
        operation: &'static str,
        source: rusqlite::Error,
    },

    /// A unique-constraint conflict was reported for a user agent, but the
    /// winning row could not be read back.
    UserAgentVanished { user_agent: String },

    /// A stored value does not have the shape this crate writes.
    CorruptValue {
        operation: &'static str,
        column: &'static str,
        value: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open database '{}': {source}", path.display())
            }
            Self::Setup { setting, source } => {
                write!(f, "Cannot apply connection setting '{setting}': {source}")
            }
            Self::Schema { source } => write!(f, "Cannot initialise schema: {source}"),
            Self::MissingSchema { path } => write!(
                f,
                "'{}' is not a LogTally database (run process_logs first)",
                path.display()
            ),
            Self::Query { operation, source } => write!(f, "{operation} failed: {source}"),
            Self::UserAgentVanished { user_agent } => write!(
                f,
                "User agent '{user_agent}' conflicted on insert but cannot be re-read"
            ),
            Self::CorruptValue {
                operation,
                column,
                value,
            } => write!(
                f,
                "{operation}: unexpected value '{value}' in column '{column}'"
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Setup { source, .. } => Some(source),
            Self::Schema { source } => Some(source),
            Self::Query { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<StoreError> for LogTallyError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

/// Usage errors detected while validating a report request.
#[derive(Debug)]
pub enum ReportError {
    /// The report identifier is not one of the six known reports.
    UnknownReport { name: String },

    /// A top-N report was requested without `-n`.
    MissingCount { report: &'static str },

    /// `-n` was zero or negative.
    InvalidCount { report: &'static str, value: i64 },

    /// `error_logs_by_date` was requested without a date.
    MissingDate,

    /// The supplied date is not `YYYY-MM-DD`.
    InvalidDate {
        input: String,
        source: chrono::ParseError,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownReport { name } => write!(
                f,
                "Unknown report type '{name}'. Expected one of: top_n_ips, \
                 status_code_distribution, hourly_traffic, top_n_pages, \
                 traffic_by_os, error_logs_by_date"
            ),
            Self::MissingCount { report } => {
                write!(f, "Report '{report}' requires -n <N>")
            }
            Self::InvalidCount { report, value } => {
                write!(f, "Report '{report}' requires a positive -n, got {value}")
            }
            Self::MissingDate => write!(f, "Report 'error_logs_by_date' requires a date"),
            Self::InvalidDate { input, source } => {
                write!(f, "Date '{input}' is not in YYYY-MM-DD form: {source}")
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidDate { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ReportError> for LogTallyError {
    fn from(e: ReportError) -> Self {
        Self::Report(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to writing reports as CSV or JSON.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export output.
    Io { target: String, source: io::Error },

    /// CSV serialisation error.
    Csv { target: String, source: csv::Error },

    /// JSON serialisation error.
    Json {
        target: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { target, source } => write!(f, "Export I/O error '{target}': {source}"),
            Self::Csv { target, source } => write!(f, "CSV export error '{target}': {source}"),
            Self::Json { target, source } => {
                write!(f, "JSON export error '{target}': {source}")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for LogTallyError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
///
/// Only raised for a config file named explicitly with `--config`; the
/// implicit platform config degrades to defaults with warnings instead.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for LogTallyError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for LogTally results.
pub type Result<T> = std::result::Result<T, LogTallyError>;
