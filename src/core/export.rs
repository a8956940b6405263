// LogTally - core/export.rs
//
// CSV and JSON export of report rows.
// Core layer: writes to any Write trait object; the caller owns the target.

use crate::core::model::CountRow;
use crate::core::report::Report;
use crate::util::error::ExportError;
use serde::Serialize;
use std::io::Write;

/// Output formats accepted by `generate_report --format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Console layout (the report's `Display` impl).
    #[default]
    Text,
    Csv,
    Json,
}

/// Write `report` in `format`. `target` names the destination in errors.
pub fn export_report<W: Write>(
    report: &Report,
    format: ExportFormat,
    mut writer: W,
    target: &str,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Text => write!(writer, "{report}")
            .and_then(|_| writer.flush())
            .map_err(|source| ExportError::Io {
                target: target.to_string(),
                source,
            }),
        ExportFormat::Csv => export_csv(report, writer, target),
        ExportFormat::Json => export_json(report, writer, target),
    }
}

/// Export report rows as CSV with a header row.
///
/// Count reports use the columns `<key>,requests` where the key column is
/// named after the grouping (ip_address, hour, path, os).
pub fn export_csv<W: Write>(report: &Report, writer: W, target: &str) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    write_rows(&mut csv_writer, report).map_err(|source| ExportError::Csv {
        target: target.to_string(),
        source,
    })?;

    csv_writer.flush().map_err(|source| ExportError::Io {
        target: target.to_string(),
        source,
    })
}

fn write_rows<W: Write>(csv_writer: &mut csv::Writer<W>, report: &Report) -> csv::Result<()> {
    match report {
        Report::TopIps { rows, .. } => write_counts(csv_writer, "ip_address", rows),
        Report::HourlyTraffic { rows } => write_counts(csv_writer, "hour", rows),
        Report::TopPages { rows, .. } => write_counts(csv_writer, "path", rows),
        Report::TrafficByOs { rows } => write_counts(csv_writer, "os", rows),
        Report::StatusCodeDistribution { rows } => {
            csv_writer.write_record(["status_code", "count", "percentage"])?;
            for row in rows {
                csv_writer.write_record([
                    row.status_code.to_string(),
                    row.count.to_string(),
                    format!("{:.2}", row.percentage),
                ])?;
            }
            Ok(())
        }
        Report::ErrorLogsByDate { rows, .. } => {
            csv_writer.write_record([
                "ip_address",
                "timestamp",
                "path",
                "status_code",
                "user_agent",
            ])?;
            for row in rows {
                let timestamp = row.timestamp.to_rfc3339();
                let status = row.status_code.to_string();
                csv_writer.write_record([
                    row.ip_address.as_str(),
                    timestamp.as_str(),
                    row.path.as_deref().unwrap_or(""),
                    status.as_str(),
                    row.user_agent.as_str(),
                ])?;
            }
            Ok(())
        }
    }
}

fn write_counts<W: Write>(
    csv_writer: &mut csv::Writer<W>,
    key_column: &str,
    rows: &[CountRow],
) -> csv::Result<()> {
    csv_writer.write_record([key_column, "requests"])?;
    for row in rows {
        let count = row.count.to_string();
        csv_writer.write_record([row.key.as_deref().unwrap_or(""), count.as_str()])?;
    }
    Ok(())
}

/// JSON document shape: `{"report": "<name>", "rows": [...]}`.
#[derive(Serialize)]
struct JsonReport<'a, T: Serialize> {
    report: &'a str,
    rows: &'a [T],
}

/// Export report rows as a pretty-printed JSON object.
pub fn export_json<W: Write>(report: &Report, writer: W, target: &str) -> Result<(), ExportError> {
    let name = report.kind().name();
    let result = match report {
        Report::TopIps { rows, .. }
        | Report::HourlyTraffic { rows }
        | Report::TopPages { rows, .. }
        | Report::TrafficByOs { rows } => {
            serde_json::to_writer_pretty(
                writer,
                &JsonReport {
                    report: name,
                    rows: rows.as_slice(),
                },
            )
        }
        Report::StatusCodeDistribution { rows } => {
            serde_json::to_writer_pretty(
                writer,
                &JsonReport {
                    report: name,
                    rows: rows.as_slice(),
                },
            )
        }
        Report::ErrorLogsByDate { rows, .. } => {
            serde_json::to_writer_pretty(
                writer,
                &JsonReport {
                    report: name,
                    rows: rows.as_slice(),
                },
            )
        }
    };
    result.map_err(|source| ExportError::Json {
        target: target.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ErrorLogRow, StatusShareRow};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn top_ips() -> Report {
        Report::TopIps {
            limit: 2,
            rows: vec![CountRow::new("10.0.0.1", 3), CountRow::new("10.0.0.2", 1)],
        }
    }

    #[test]
    fn test_csv_count_report() {
        let mut buf = Vec::new();
        export_csv(&top_ips(), &mut buf, "out.csv").unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(output, "ip_address,requests\n10.0.0.1,3\n10.0.0.2,1\n");
    }

    #[test]
    fn test_csv_status_report() {
        let report = Report::StatusCodeDistribution {
            rows: vec![StatusShareRow {
                status_code: 404,
                count: 1,
                percentage: 33.33,
            }],
        };
        let mut buf = Vec::new();
        export_csv(&report, &mut buf, "out.csv").unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.starts_with("status_code,count,percentage\n"));
        assert!(output.contains("404,1,33.33"));
    }

    #[test]
    fn test_csv_error_logs_quotes_user_agent() {
        let report = Report::ErrorLogsByDate {
            date: NaiveDate::from_ymd_opt(2023, 10, 10).unwrap(),
            rows: vec![ErrorLogRow {
                ip_address: "10.0.0.1".to_string(),
                timestamp: Utc.with_ymd_and_hms(2023, 10, 10, 1, 2, 3).unwrap(),
                path: None,
                status_code: 500,
                user_agent: "Mozilla/5.0 (X11, Linux)".to_string(),
            }],
        };
        let mut buf = Vec::new();
        export_csv(&report, &mut buf, "out.csv").unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.contains("\"Mozilla/5.0 (X11, Linux)\""));
        assert!(output.contains("2023-10-10T01:02:03+00:00"));
    }

    #[test]
    fn test_json_export() {
        let mut buf = Vec::new();
        export_json(&top_ips(), &mut buf, "out.json").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["report"], "top_n_ips");
        assert_eq!(value["rows"][0]["key"], "10.0.0.1");
        assert_eq!(value["rows"][0]["count"], 3);
    }

    #[test]
    fn test_text_export_matches_display() {
        let mut buf = Vec::new();
        export_report(&top_ips(), ExportFormat::Text, &mut buf, "stdout").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), top_ips().to_string());
    }
}
