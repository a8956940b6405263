// LogTally - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "LogTally";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "LogTally";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Line grammar
// =============================================================================

/// chrono format of the bracketed access-log timestamp,
/// e.g. `10/Oct/2023:13:55:36 +0000`.
pub const ACCESS_LOG_TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Sentinel used by the combined log format for "no value" in the
/// bytes and referrer fields.
pub const ABSENT_FIELD: &str = "-";

// =============================================================================
// Store
// =============================================================================

/// Text layout of timestamps persisted in `log_entries.timestamp` (UTC).
/// Lexicographic order equals chronological order, and SQLite's `date()`
/// and `strftime()` accept it directly.
pub const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Calendar-date layout accepted for `error_logs_by_date`.
pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default database file name inside the platform data directory.
pub const DATABASE_FILE_NAME: &str = "logtally.db";

/// Default SQLite busy timeout in milliseconds. Parallel ingest workers
/// contend for the write lock; this is how long a writer waits.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Minimum user-configurable busy timeout (ms).
pub const MIN_BUSY_TIMEOUT_MS: u64 = 100;

/// Maximum user-configurable busy timeout (ms).
pub const MAX_BUSY_TIMEOUT_MS: u64 = 120_000;

/// Maximum number of raw user-agent strings memoised per store handle.
/// Once reached, further lookups go to the database.
pub const MAX_CACHED_USER_AGENTS: usize = 100_000;

// =============================================================================
// Ingestion
// =============================================================================

/// Default number of worker threads for multi-file ingestion.
/// 0 means auto-detect (use available CPU cores).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Hard upper bound on ingest worker threads.
pub const MAX_WORKER_THREADS: usize = 64;

/// Maximum directory recursion depth when an input path is a directory.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Hard upper bound on max depth (prevents runaway traversal).
pub const ABSOLUTE_MAX_DEPTH: usize = 50;

/// Default include glob patterns applied to files found inside input
/// directories. Files named explicitly on the command line are always taken.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &["*.log", "*.log.[0-9]*", "access*", "*.txt"];

/// Maximum number of per-line skip diagnostics logged per file before
/// further skips are only counted.
pub const MAX_SKIP_DIAGNOSTICS_PER_FILE: usize = 100;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
/// Prevents accidental exposure of sensitive data in long lines.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Prompt shown when `error_logs_by_date` is requested without `--date`.
pub const DATE_PROMPT: &str = "Enter date (YYYY-MM-DD): ";
