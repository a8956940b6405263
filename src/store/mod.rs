// LogTally - store/mod.rs
//
// SQLite-backed persistence for parsed access-log events.
// Dependencies: core (model, classify), util. Owns the only rusqlite
// connection in the process path; the handle is constructed explicitly
// by the caller and the connection closes when the Store is dropped.
//
// Dimension uniqueness:
//   - `user_agents.user_agent_string` is UNIQUE in the schema.
//   - resolve_or_create_user_agent does SELECT, then INSERT; a constraint
//     violation on INSERT means another connection created the row first,
//     so the row is re-read instead of failing.
//   - An in-process map memoises resolved ids; dimension rows are never
//     updated or deleted, so a memoised id stays valid.

mod queries;
pub mod schema;

use crate::core::classify::classify;
use crate::core::model::{LogEvent, StoredEntry, UserAgentDimension};
use crate::util::constants;
use crate::util::error::StoreError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings applied when a store is opened.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a writer waits for the database lock before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(constants::DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

/// Handle to one open database connection plus the user-agent id memo.
pub struct Store {
    conn: Connection,
    /// `None` for in-memory databases.
    path: Option<PathBuf>,
    user_agent_ids: HashMap<String, i64>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("cached_user_agents", &self.user_agent_ids.len())
            .finish()
    }
}

impl Store {
    /// Open (creating if needed) the database file at `path` and ensure the
    /// schema exists.
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(
                    dir = %parent.display(),
                    error = %e,
                    "Could not create database directory"
                );
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        conn.busy_timeout(config.busy_timeout)
            .map_err(setup_err("busy_timeout"))?;

        // WAL lets report readers run while an ingest is writing.
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(setup_err("journal_mode"))?;

        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;

        tracing::debug!(
            path = %path.display(),
            journal_mode = %journal_mode,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Store opened"
        );
        Ok(store)
    }

    /// Open an existing database read-only, for reporting.
    ///
    /// Nothing is created: a missing file is [`StoreError::Open`] and a
    /// database without the LogTally tables is [`StoreError::MissingSchema`].
    pub fn open_existing(path: &Path, config: &StoreConfig) -> Result<Self, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn =
            Connection::open_with_flags(path, flags).map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        conn.busy_timeout(config.busy_timeout)
            .map_err(setup_err("busy_timeout"))?;

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type = 'table' AND name IN ('user_agents', 'log_entries')",
                [],
                |row| row.get(0),
            )
            .map_err(|source| StoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        if tables != 2 {
            return Err(StoreError::MissingSchema {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(path = %path.display(), "Store opened read-only");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            user_agent_ids: HashMap::new(),
        })
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(setup_err("foreign_keys"))?;
        for statement in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(statement)
                .map_err(|source| StoreError::Schema { source })?;
        }
        Ok(Self {
            conn,
            path,
            user_agent_ids: HashMap::new(),
        })
    }

    /// Database file path, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Return the dimension id for `raw`, creating the row on first sight.
    ///
    /// Labels are computed by [`classify`] only when the row is created.
    pub fn resolve_or_create_user_agent(&mut self, raw: &str) -> Result<i64, StoreError> {
        if let Some(&id) = self.user_agent_ids.get(raw) {
            return Ok(id);
        }

        let id = match self.find_user_agent_id(raw)? {
            Some(id) => id,
            None => self.create_user_agent(raw)?,
        };

        if self.user_agent_ids.len() < constants::MAX_CACHED_USER_AGENTS {
            self.user_agent_ids.insert(raw.to_string(), id);
        }
        Ok(id)
    }

    fn find_user_agent_id(&self, raw: &str) -> Result<Option<i64>, StoreError> {
        self.conn
            .prepare_cached("SELECT id FROM user_agents WHERE user_agent_string = ?1")
            .and_then(|mut stmt| stmt.query_row(params![raw], |row| row.get(0)).optional())
            .map_err(query_err("user agent lookup"))
    }

    fn create_user_agent(&self, raw: &str) -> Result<i64, StoreError> {
        let labels = classify(raw);
        let inserted = self
            .conn
            .prepare_cached(
                "INSERT INTO user_agents (user_agent_string, os, browser, device_type) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![raw, labels.os, labels.browser, labels.device_type])
            });

        match inserted {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                tracing::debug!(
                    id,
                    os = labels.os,
                    browser = labels.browser,
                    device_type = labels.device_type,
                    "New user agent"
                );
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                tracing::debug!("User agent created concurrently; re-reading");
                self.find_user_agent_id(raw)?
                    .ok_or_else(|| StoreError::UserAgentVanished {
                        user_agent: raw.to_string(),
                    })
            }
            Err(source) => Err(StoreError::Query {
                operation: "user agent insert",
                source,
            }),
        }
    }

    /// Resolve the event's user agent, then append one fact row.
    /// Returns the new `log_entries.id`.
    pub fn insert_event(&mut self, event: &LogEvent) -> Result<i64, StoreError> {
        let user_agent_id = self.resolve_or_create_user_agent(&event.user_agent)?;

        self.conn
            .prepare_cached(
                "INSERT INTO log_entries (ip_address, timestamp, method, path, status_code, \
                 bytes_sent, referrer, user_agent_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    event.ip_address,
                    format_stored_timestamp(&event.timestamp),
                    event.method,
                    event.path,
                    event.status_code,
                    to_sql_count(event.bytes_sent),
                    event.referrer,
                    user_agent_id,
                ])
            })
            .map_err(query_err("log entry insert"))?;

        Ok(self.conn.last_insert_rowid())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Total fact rows.
    pub fn entry_count(&self) -> Result<u64, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM log_entries", [], |row| row.get(0))
            .map(from_sql_count)
            .map_err(query_err("log entry count"))
    }

    /// Total dimension rows.
    pub fn user_agent_count(&self) -> Result<u64, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM user_agents", [], |row| row.get(0))
            .map(from_sql_count)
            .map_err(query_err("user agent count"))
    }

    /// Fetch one dimension row by id.
    pub fn user_agent(&self, id: i64) -> Result<Option<UserAgentDimension>, StoreError> {
        self.conn
            .query_row(
                "SELECT id, user_agent_string, os, browser, device_type \
                 FROM user_agents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserAgentDimension {
                        id: row.get(0)?,
                        user_agent_string: row.get(1)?,
                        os: row.get(2)?,
                        browser: row.get(3)?,
                        device_type: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(query_err("user agent fetch"))
    }

    /// Most recent fact row with this ip, instant and path (`None` path
    /// matches rows without a path).
    pub fn latest_entry(
        &self,
        ip_address: &str,
        timestamp: &DateTime<FixedOffset>,
        path: Option<&str>,
    ) -> Result<Option<StoredEntry>, StoreError> {
        const OPERATION: &str = "log entry fetch";
        let raw = self
            .conn
            .query_row(
                "SELECT id, ip_address, timestamp, method, path, status_code, bytes_sent, \
                 referrer, user_agent_id FROM log_entries \
                 WHERE ip_address = ?1 AND timestamp = ?2 AND path IS ?3 \
                 ORDER BY id DESC LIMIT 1",
                params![ip_address, format_stored_timestamp(timestamp), path],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, u16>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(query_err(OPERATION))?;

        let Some((id, ip_address, ts, method, path, status_code, bytes, referrer, ua_id)) = raw
        else {
            return Ok(None);
        };

        Ok(Some(StoredEntry {
            id,
            ip_address,
            timestamp: parse_stored_timestamp(OPERATION, &ts)?,
            method,
            path,
            status_code,
            bytes_sent: from_sql_count(bytes),
            referrer,
            user_agent_id: ua_id,
        }))
    }
}

// =============================================================================
// Value conversion helpers
// =============================================================================

fn query_err(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Query { operation, source }
}

fn setup_err(setting: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Setup { setting, source }
}

/// UTC text form written to `log_entries.timestamp`.
pub fn format_stored_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp
        .with_timezone(&Utc)
        .format(constants::STORED_TIMESTAMP_FORMAT)
        .to_string()
}

fn parse_stored_timestamp(
    operation: &'static str,
    raw: &str,
) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw, constants::STORED_TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| StoreError::CorruptValue {
            operation,
            column: "timestamp",
            value: raw.to_string(),
        })
}

/// SQLite integers are signed; counts and byte sizes above i64::MAX saturate.
fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// COUNT(*) and stored sizes are never negative; anything else reads as 0.
fn from_sql_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
