// LogTally - core/report.rs
//
// Report vocabulary: the six report kinds, request validation, result
// shapes, and the plain-text console rendering.
// Core layer: no store access. Dispatch to the store lives in app::report.

use crate::core::model::{CountRow, ErrorLogRow, StatusShareRow};
use crate::util::constants::REPORT_DATE_FORMAT;
use crate::util::error::ReportError;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Report kind
// =============================================================================

/// The canned analytical reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    TopIps,
    StatusCodeDistribution,
    HourlyTraffic,
    TopPages,
    TrafficByOs,
    ErrorLogsByDate,
}

impl ReportKind {
    /// Returns all variants in command-line order.
    pub fn all() -> &'static [ReportKind] {
        &[
            ReportKind::TopIps,
            ReportKind::StatusCodeDistribution,
            ReportKind::HourlyTraffic,
            ReportKind::TopPages,
            ReportKind::TrafficByOs,
            ReportKind::ErrorLogsByDate,
        ]
    }

    /// Identifier used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::TopIps => "top_n_ips",
            ReportKind::StatusCodeDistribution => "status_code_distribution",
            ReportKind::HourlyTraffic => "hourly_traffic",
            ReportKind::TopPages => "top_n_pages",
            ReportKind::TrafficByOs => "traffic_by_os",
            ReportKind::ErrorLogsByDate => "error_logs_by_date",
        }
    }

    /// True for the reports that take `-n`.
    pub fn needs_limit(&self) -> bool {
        matches!(self, ReportKind::TopIps | ReportKind::TopPages)
    }

    pub fn needs_date(&self) -> bool {
        matches!(self, ReportKind::ErrorLogsByDate)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::all()
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ReportError::UnknownReport {
                name: s.to_string(),
            })
    }
}

// =============================================================================
// Report request
// =============================================================================

/// A validated report request. Construction is the only validation point,
/// so a `ReportRequest` that exists is always runnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    kind: ReportKind,
    limit: Option<u32>,
    date: Option<NaiveDate>,
}

impl ReportRequest {
    /// Validate parameters for `kind`.
    ///
    /// `n` is required and must be positive for the top-N reports and is
    /// ignored otherwise. `date` is required for `error_logs_by_date` and
    /// ignored otherwise.
    pub fn new(
        kind: ReportKind,
        n: Option<i64>,
        date: Option<NaiveDate>,
    ) -> Result<Self, ReportError> {
        let limit = if kind.needs_limit() {
            let n = n.ok_or(ReportError::MissingCount {
                report: kind.name(),
            })?;
            if n <= 0 {
                return Err(ReportError::InvalidCount {
                    report: kind.name(),
                    value: n,
                });
            }
            Some(u32::try_from(n).unwrap_or(u32::MAX))
        } else {
            None
        };

        let date = if kind.needs_date() {
            Some(date.ok_or(ReportError::MissingDate)?)
        } else {
            None
        };

        Ok(Self { kind, limit, date })
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    /// Row limit; `Some` exactly for the top-N reports.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Requested day; `Some` exactly for `error_logs_by_date`.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// Parse a `YYYY-MM-DD` date as typed by the user (surrounding whitespace
/// and the trailing newline from an interactive prompt are ignored).
pub fn parse_report_date(input: &str) -> Result<NaiveDate, ReportError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, REPORT_DATE_FORMAT).map_err(|source| {
        ReportError::InvalidDate {
            input: trimmed.to_string(),
            source,
        }
    })
}

// =============================================================================
// Report output
// =============================================================================

/// Rows produced by one report run, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    TopIps { limit: u32, rows: Vec<CountRow> },
    StatusCodeDistribution { rows: Vec<StatusShareRow> },
    HourlyTraffic { rows: Vec<CountRow> },
    TopPages { limit: u32, rows: Vec<CountRow> },
    TrafficByOs { rows: Vec<CountRow> },
    ErrorLogsByDate { date: NaiveDate, rows: Vec<ErrorLogRow> },
}

/// Placeholder shown for requests whose request line had no path token.
const NO_PATH_LABEL: &str = "(no path)";

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::TopIps { .. } => ReportKind::TopIps,
            Report::StatusCodeDistribution { .. } => ReportKind::StatusCodeDistribution,
            Report::HourlyTraffic { .. } => ReportKind::HourlyTraffic,
            Report::TopPages { .. } => ReportKind::TopPages,
            Report::TrafficByOs { .. } => ReportKind::TrafficByOs,
            Report::ErrorLogsByDate { .. } => ReportKind::ErrorLogsByDate,
        }
    }

    /// Number of result rows.
    pub fn len(&self) -> usize {
        match self {
            Report::TopIps { rows, .. }
            | Report::HourlyTraffic { rows }
            | Report::TopPages { rows, .. }
            | Report::TrafficByOs { rows } => rows.len(),
            Report::StatusCodeDistribution { rows } => rows.len(),
            Report::ErrorLogsByDate { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Heading line printed above the rows.
    pub fn title(&self) -> String {
        match self {
            Report::TopIps { limit, .. } => format!("Top {limit} IP Addresses:"),
            Report::StatusCodeDistribution { .. } => "Status Code Distribution:".to_string(),
            Report::HourlyTraffic { .. } => "Hourly Traffic:".to_string(),
            Report::TopPages { limit, .. } => format!("Top {limit} Requested Pages:"),
            Report::TrafficByOs { .. } => "Traffic by Operating System:".to_string(),
            Report::ErrorLogsByDate { date, .. } => {
                format!("Error Logs on {}:", date.format(REPORT_DATE_FORMAT))
            }
        }
    }
}

fn count_key(row: &CountRow) -> &str {
    row.key.as_deref().unwrap_or(NO_PATH_LABEL)
}

/// Console rendering: a blank line, the title, then one line per row.
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.title())?;
        match self {
            Report::TopIps { rows, .. }
            | Report::HourlyTraffic { rows }
            | Report::TopPages { rows, .. }
            | Report::TrafficByOs { rows } => {
                for row in rows {
                    writeln!(f, "{} → {} requests", count_key(row), row.count)?;
                }
            }
            Report::StatusCodeDistribution { rows } => {
                for row in rows {
                    writeln!(
                        f,
                        "HTTP {} → {} times ({:.2}%)",
                        row.status_code, row.count, row.percentage
                    )?;
                }
            }
            Report::ErrorLogsByDate { rows, .. } => {
                for row in rows {
                    writeln!(
                        f,
                        "{} at {} → {} on {}",
                        row.ip_address,
                        row.timestamp.format("%Y-%m-%d %H:%M:%S%:z"),
                        row.status_code,
                        row.path.as_deref().unwrap_or(NO_PATH_LABEL)
                    )?;
                    writeln!(f, "User Agent: {}", row.user_agent)?;
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
