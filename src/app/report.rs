// LogTally - app/report.rs
//
// `generate_report` dispatch: turns a validated ReportRequest into the
// matching store query and wraps the rows in a Report.

use crate::core::report::{Report, ReportKind, ReportRequest};
use crate::store::Store;
use crate::util::error::{ReportError, Result};

/// Runs canned reports against one store.
#[derive(Debug)]
pub struct ReportEngine<'a> {
    store: &'a Store,
}

impl<'a> ReportEngine<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Execute `request`. Reports are read-only.
    pub fn run(&self, request: &ReportRequest) -> Result<Report> {
        let kind = request.kind();
        let report = match kind {
            ReportKind::TopIps => {
                let limit = require_limit(request)?;
                Report::TopIps {
                    limit,
                    rows: self.store.top_n_by_ip(limit)?,
                }
            }
            ReportKind::StatusCodeDistribution => Report::StatusCodeDistribution {
                rows: self.store.status_code_distribution()?,
            },
            ReportKind::HourlyTraffic => Report::HourlyTraffic {
                rows: self.store.hourly_traffic()?,
            },
            ReportKind::TopPages => {
                let limit = require_limit(request)?;
                Report::TopPages {
                    limit,
                    rows: self.store.top_n_pages(limit)?,
                }
            }
            ReportKind::TrafficByOs => Report::TrafficByOs {
                rows: self.store.traffic_by_os()?,
            },
            ReportKind::ErrorLogsByDate => {
                let date = request.date().ok_or(ReportError::MissingDate)?;
                Report::ErrorLogsByDate {
                    date,
                    rows: self.store.error_logs_by_date(date)?,
                }
            }
        };

        tracing::debug!(report = %kind, rows = report.len(), "Report generated");
        Ok(report)
    }
}

fn require_limit(request: &ReportRequest) -> std::result::Result<u32, ReportError> {
    request.limit().ok_or(ReportError::MissingCount {
        report: request.kind().name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::CountRow;
    use crate::core::parser;
    use chrono::NaiveDate;

    fn line(ip: &str, ts: &str, path: &str, status: u16, ua: &str) -> String {
        format!(r#"{ip} - - [{ts}] "GET {path} HTTP/1.1" {status} 10 "-" "{ua}""#)
    }

    fn seeded_store() -> Store {
        let linux = "Mozilla/5.0 (X11; Linux x86_64) Firefox/119.0";
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile Safari/604.1";
        let lines = [
            line("10.0.0.1", "10/Oct/2023:13:55:36 +0000", "/", 200, linux),
            line("10.0.0.1", "10/Oct/2023:14:01:00 +0000", "/a", 404, linux),
            line("10.0.0.2", "10/Oct/2023:14:02:00 +0000", "/a", 500, iphone),
            line("10.0.0.1", "11/Oct/2023:09:00:00 +0000", "/", 200, iphone),
        ];
        let mut store = Store::open_in_memory().unwrap();
        for l in &lines {
            let event = parser::parse(l).expect("fixture line parses");
            store.insert_event(&event).unwrap();
        }
        store
    }

    #[test]
    fn test_top_ips_report() {
        let store = seeded_store();
        let request = ReportRequest::new(ReportKind::TopIps, Some(1), None).unwrap();
        let report = ReportEngine::new(&store).run(&request).unwrap();
        assert_eq!(
            report,
            Report::TopIps {
                limit: 1,
                rows: vec![CountRow::new("10.0.0.1", 3)],
            }
        );
    }

    #[test]
    fn test_every_kind_runs() {
        let store = seeded_store();
        let engine = ReportEngine::new(&store);
        let date = NaiveDate::from_ymd_opt(2023, 10, 10);
        for &kind in ReportKind::all() {
            let request = ReportRequest::new(kind, Some(5), date).unwrap();
            let report = engine.run(&request).unwrap();
            assert_eq!(report.kind(), kind);
            assert!(!report.is_empty(), "{kind} returned no rows");
        }
    }

    #[test]
    fn test_error_logs_report_filters_date_and_status() {
        let store = seeded_store();
        let request = ReportRequest::new(
            ReportKind::ErrorLogsByDate,
            None,
            NaiveDate::from_ymd_opt(2023, 10, 10),
        )
        .unwrap();
        let report = ReportEngine::new(&store).run(&request).unwrap();
        match report {
            Report::ErrorLogsByDate { rows, .. } => {
                let statuses: Vec<u16> = rows.iter().map(|r| r.status_code).collect();
                assert_eq!(statuses, vec![404, 500]);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }

    #[test]
    fn test_traffic_by_os_report() {
        let store = seeded_store();
        let request = ReportRequest::new(ReportKind::TrafficByOs, None, None).unwrap();
        let report = ReportEngine::new(&store).run(&request).unwrap();
        match report {
            Report::TrafficByOs { rows } => {
                let total: u64 = rows.iter().map(|r| r.count).sum();
                assert_eq!(total, 4);
                assert_eq!(rows.len(), 2);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }
}
