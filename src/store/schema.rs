// LogTally - store/schema.rs
//
// SQLite schema for the access-log star schema: one deduplicated
// user-agent dimension table and one append-only fact table.

/// User-agent dimension. `user_agent_string` is the dedup key; its UNIQUE
/// constraint is what keeps concurrent writers from creating duplicates.
pub const CREATE_USER_AGENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_agents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_agent_string TEXT NOT NULL UNIQUE,
    os TEXT,
    browser TEXT,
    device_type TEXT
)
"#;

/// Fact table, one row per accepted log line. `timestamp` holds UTC text
/// in `STORED_TIMESTAMP_FORMAT`.
pub const CREATE_LOG_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS log_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ip_address TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    method TEXT,
    path TEXT,
    status_code INTEGER NOT NULL,
    bytes_sent INTEGER NOT NULL DEFAULT 0,
    referrer TEXT,
    user_agent_id INTEGER NOT NULL REFERENCES user_agents(id)
)
"#;

// === REPORT INDEXES ===

// top_n_ips
pub const CREATE_INDEX_IP: &str =
    "CREATE INDEX IF NOT EXISTS idx_log_entries_ip ON log_entries(ip_address)";

// top_n_pages
pub const CREATE_INDEX_PATH: &str =
    "CREATE INDEX IF NOT EXISTS idx_log_entries_path ON log_entries(path)";

// hourly_traffic, error_logs_by_date ordering
pub const CREATE_INDEX_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_log_entries_ts ON log_entries(timestamp)";

// traffic_by_os join
pub const CREATE_INDEX_USER_AGENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_log_entries_ua ON log_entries(user_agent_id)";

/// All schema statements in creation order. Every statement is idempotent.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USER_AGENTS_TABLE,
    CREATE_LOG_ENTRIES_TABLE,
    CREATE_INDEX_IP,
    CREATE_INDEX_PATH,
    CREATE_INDEX_TIMESTAMP,
    CREATE_INDEX_USER_AGENT,
];
