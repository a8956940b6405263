// LogTally - store/queries.rs
//
// Read-only aggregate queries backing the six reports.
//
// Every ORDER BY carries a secondary key so results are fully determined
// by the stored data, including ties on count.

use super::{from_sql_count, parse_stored_timestamp, query_err, Store};
use crate::core::model::{CountRow, ErrorLogRow, StatusShareRow};
use crate::util::constants;
use crate::util::error::StoreError;
use chrono::NaiveDate;
use rusqlite::params;

const TOP_IPS_SQL: &str = "\
    SELECT ip_address, COUNT(*) AS request_count
    FROM log_entries
    GROUP BY ip_address
    ORDER BY request_count DESC, ip_address ASC
    LIMIT ?1";

const STATUS_DISTRIBUTION_SQL: &str = "\
    SELECT
        status_code,
        COUNT(*) AS request_count,
        ROUND(COUNT(*) * 100.0 / (SELECT COUNT(*) FROM log_entries), 2) AS percentage
    FROM log_entries
    GROUP BY status_code
    ORDER BY request_count DESC, status_code ASC";

const HOURLY_TRAFFIC_SQL: &str = "\
    SELECT strftime('%H:00', timestamp) AS hour, COUNT(*) AS request_count
    FROM log_entries
    GROUP BY hour
    ORDER BY hour ASC";

const TOP_PAGES_SQL: &str = "\
    SELECT path, COUNT(*) AS request_count
    FROM log_entries
    GROUP BY path
    ORDER BY request_count DESC, path ASC
    LIMIT ?1";

const TRAFFIC_BY_OS_SQL: &str = "\
    SELECT COALESCE(ua.os, 'Unknown') AS os_label, COUNT(le.id) AS request_count
    FROM log_entries le
    JOIN user_agents ua ON le.user_agent_id = ua.id
    GROUP BY os_label
    ORDER BY request_count DESC, os_label ASC";

const ERROR_LOGS_BY_DATE_SQL: &str = "\
    SELECT le.ip_address, le.timestamp, le.path, le.status_code, ua.user_agent_string
    FROM log_entries le
    JOIN user_agents ua ON le.user_agent_id = ua.id
    WHERE date(le.timestamp) = ?1 AND le.status_code >= 400
    ORDER BY le.timestamp ASC, le.id ASC";

impl Store {
    /// Addresses with the most requests, busiest first.
    pub fn top_n_by_ip(&self, n: u32) -> Result<Vec<CountRow>, StoreError> {
        self.count_rows("top IPs query", TOP_IPS_SQL, Some(n))
    }

    /// Request count and share of the total per status code.
    pub fn status_code_distribution(&self) -> Result<Vec<StatusShareRow>, StoreError> {
        let operation = "status code distribution query";
        let mut stmt = self
            .conn
            .prepare_cached(STATUS_DISTRIBUTION_SQL)
            .map_err(query_err(operation))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StatusShareRow {
                    status_code: row.get(0)?,
                    count: from_sql_count(row.get(1)?),
                    percentage: row.get(2)?,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(query_err(operation))?;
        Ok(rows)
    }

    /// Requests per `HH:00` hour of day (UTC), all dates folded together.
    pub fn hourly_traffic(&self) -> Result<Vec<CountRow>, StoreError> {
        self.count_rows("hourly traffic query", HOURLY_TRAFFIC_SQL, None)
    }

    /// Most requested paths. Requests without a path form one group with
    /// a `None` key.
    pub fn top_n_pages(&self, n: u32) -> Result<Vec<CountRow>, StoreError> {
        self.count_rows("top pages query", TOP_PAGES_SQL, Some(n))
    }

    /// Requests per operating-system label of the user-agent dimension.
    pub fn traffic_by_os(&self) -> Result<Vec<CountRow>, StoreError> {
        self.count_rows("traffic by OS query", TRAFFIC_BY_OS_SQL, None)
    }

    /// Responses with status >= 400 on `date` (UTC calendar day), oldest
    /// first.
    pub fn error_logs_by_date(&self, date: NaiveDate) -> Result<Vec<ErrorLogRow>, StoreError> {
        let operation = "error logs query";
        let day = date.format(constants::REPORT_DATE_FORMAT).to_string();

        let mut stmt = self
            .conn
            .prepare_cached(ERROR_LOGS_BY_DATE_SQL)
            .map_err(query_err(operation))?;
        let raw_rows = stmt
            .query_map(params![day], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, u16>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(query_err(operation))?;

        raw_rows
            .into_iter()
            .map(|(ip_address, ts, path, status_code, user_agent)| {
                Ok(ErrorLogRow {
                    ip_address,
                    timestamp: parse_stored_timestamp(operation, &ts)?,
                    path,
                    status_code,
                    user_agent,
                })
            })
            .collect()
    }

    /// Run a two-column `key, count` query, optionally bound to a LIMIT.
    fn count_rows(
        &self,
        operation: &'static str,
        sql: &str,
        limit: Option<u32>,
    ) -> Result<Vec<CountRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(query_err(operation))?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CountRow> {
            Ok(CountRow {
                key: row.get(0)?,
                count: from_sql_count(row.get(1)?),
            })
        };
        let rows = match limit {
            Some(n) => stmt.query_map(params![n], map_row),
            None => stmt.query_map([], map_row),
        }
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(query_err(operation))?;

        tracing::debug!(operation, rows = rows.len(), "Query complete");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::model::CountRow;
    use crate::core::parser::parse;
    use crate::store::Store;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn line(ip: &str, ts: &str, path: &str, status: u16, ua: &str) -> String {
        format!("{ip} - - [{ts}] \"GET {path} HTTP/1.1\" {status} 100 \"-\" \"{ua}\"")
    }

    fn store_with(lines: &[String]) -> Store {
        let mut store = Store::open_in_memory().unwrap();
        for l in lines {
            let event = parse(l).unwrap_or_else(|| panic!("fixture line should parse: {l}"));
            store.insert_event(&event).unwrap();
        }
        store
    }

    const WIN: &str = "Mozilla/5.0 (Windows NT 10.0) Chrome/115.0";
    const MAC: &str = "Mozilla/5.0 (Macintosh) Safari/605.1";
    const BOT: &str = "curl/8.4.0";

    #[test]
    fn test_top_n_by_ip() {
        let ts = "10/Oct/2023:13:55:36 +0000";
        let store = store_with(&[
            line("10.0.0.1", ts, "/", 200, WIN),
            line("10.0.0.2", ts, "/", 200, WIN),
            line("10.0.0.1", ts, "/", 200, WIN),
            line("10.0.0.1", ts, "/", 200, WIN),
        ]);
        assert_eq!(
            store.top_n_by_ip(2).unwrap(),
            vec![CountRow::new("10.0.0.1", 3), CountRow::new("10.0.0.2", 1)]
        );
        assert_eq!(store.top_n_by_ip(1).unwrap().len(), 1);
    }

    #[test]
    fn test_top_n_by_ip_ties_break_by_address() {
        let ts = "10/Oct/2023:13:55:36 +0000";
        let store = store_with(&[
            line("10.0.0.9", ts, "/", 200, WIN),
            line("10.0.0.3", ts, "/", 200, WIN),
            line("10.0.0.5", ts, "/", 200, WIN),
        ]);
        let keys: Vec<_> = store
            .top_n_by_ip(10)
            .unwrap()
            .into_iter()
            .map(|r| r.key.unwrap())
            .collect();
        assert_eq!(keys, vec!["10.0.0.3", "10.0.0.5", "10.0.0.9"]);
    }

    #[test]
    fn test_status_code_distribution_percentages() {
        let ts = "10/Oct/2023:13:55:36 +0000";
        let store = store_with(&[
            line("10.0.0.1", ts, "/", 200, WIN),
            line("10.0.0.1", ts, "/", 200, WIN),
            line("10.0.0.1", ts, "/x", 404, WIN),
        ]);
        let rows = store.status_code_distribution().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].status_code, rows[0].count), (200, 2));
        assert!((rows[0].percentage - 66.67).abs() < 1e-9);
        assert_eq!((rows[1].status_code, rows[1].count), (404, 1));
        assert!((rows[1].percentage - 33.33).abs() < 1e-9);

        let total: f64 = rows.iter().map(|r| r.percentage).sum();
        assert!((total - 100.0).abs() <= rows.len() as f64 * 0.005 + 1e-9);
    }

    #[test]
    fn test_status_code_distribution_empty_store() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.status_code_distribution().unwrap().is_empty());
    }

    #[test]
    fn test_hourly_traffic_folds_dates_and_uses_utc() {
        let store = store_with(&[
            line("10.0.0.1", "10/Oct/2023:13:00:00 +0000", "/", 200, WIN),
            line("10.0.0.1", "11/Oct/2023:13:59:59 +0000", "/", 200, WIN),
            line("10.0.0.1", "11/Oct/2023:09:30:00 -0400", "/", 200, WIN),
            line("10.0.0.1", "12/Oct/2023:02:15:00 +0000", "/", 200, WIN),
        ]);
        assert_eq!(
            store.hourly_traffic().unwrap(),
            vec![CountRow::new("02:00", 1), CountRow::new("13:00", 3)]
        );
    }

    #[test]
    fn test_top_n_pages_groups_missing_path() {
        let ts = "10/Oct/2023:13:55:36 +0000";
        let mut lines = vec![
            line("10.0.0.1", ts, "/a", 200, WIN),
            line("10.0.0.1", ts, "/b", 200, WIN),
            line("10.0.0.1", ts, "/a", 200, WIN),
        ];
        let no_path = format!("10.0.0.1 - - [{ts}] \"PING\" 400 0 \"-\" \"{BOT}\"");
        lines.push(no_path.clone());
        lines.push(no_path);
        let store = store_with(&lines);
        let rows = store.top_n_pages(3).unwrap();
        assert_eq!(rows.len(), 3);
        // Equal counts: NULL sorts before text in SQLite.
        assert_eq!(rows[0], CountRow { key: None, count: 2 });
        assert_eq!(rows[1], CountRow::new("/a", 2));
        assert_eq!(rows[2], CountRow::new("/b", 1));
    }

    #[test]
    fn test_traffic_by_os() {
        let ts = "10/Oct/2023:13:55:36 +0000";
        let store = store_with(&[
            line("10.0.0.1", ts, "/", 200, WIN),
            line("10.0.0.2", ts, "/", 200, MAC),
            line("10.0.0.3", ts, "/", 200, MAC),
            line("10.0.0.4", ts, "/", 200, BOT),
        ]);
        assert_eq!(
            store.traffic_by_os().unwrap(),
            vec![
                CountRow::new("macOS", 2),
                CountRow::new("Unknown OS", 1),
                CountRow::new("Windows", 1),
            ]
        );
    }

    #[test]
    fn test_error_logs_by_date() {
        let store = store_with(&[
            line("10.0.0.1", "10/Oct/2023:18:00:00 +0000", "/late", 500, BOT),
            line("10.0.0.2", "10/Oct/2023:08:00:00 +0000", "/early", 404, WIN),
            line("10.0.0.3", "10/Oct/2023:09:00:00 +0000", "/ok", 200, WIN),
            line("10.0.0.4", "10/Oct/2023:10:00:00 +0000", "/redirect", 399, WIN),
            line("10.0.0.5", "11/Oct/2023:08:00:00 +0000", "/other-day", 500, WIN),
        ]);
        let rows = store
            .error_logs_by_date(NaiveDate::from_ymd_opt(2023, 10, 10).unwrap())
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ip_address, "10.0.0.2");
        assert_eq!(rows[0].path.as_deref(), Some("/early"));
        assert_eq!(rows[0].status_code, 404);
        assert_eq!(rows[0].user_agent, WIN);
        assert_eq!(
            rows[0].timestamp,
            Utc.with_ymd_and_hms(2023, 10, 10, 8, 0, 0).unwrap()
        );
        assert_eq!(rows[1].ip_address, "10.0.0.1");
        assert_eq!(rows[1].status_code, 500);
    }
}
