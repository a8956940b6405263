// LogTally - core/parser.rs
//
// Combined-log-format line parser.
// Core layer: operates on one &str at a time, never touches the filesystem.
//
// Grammar (start-anchored; anything after the closing user-agent quote is
// ignored):
//
//   IP WS "-" WS "-" WS "[" TIMESTAMP "]" WS '"' REQUEST '"' WS STATUS WS
//   BYTES WS '"' REFERRER '"' WS '"' USER_AGENT '"'
//
//   IP         = DIGITS "." DIGITS "." DIGITS "." DIGITS   (octets not range-checked)
//   TIMESTAMP  = one or more chars other than "]"
//   REQUEST    = one or more chars other than '"'
//   STATUS     = exactly three ASCII digits
//   BYTES      = DIGITS | "-"
//   REFERRER   = zero or more chars other than '"'
//   USER_AGENT = one or more chars other than '"'
//   WS         = exactly one whitespace character

use crate::core::model::LogEvent;
use crate::util::constants::{ABSENT_FIELD, ACCESS_LOG_TIMESTAMP_FORMAT};
use crate::util::error::ParseError;
use chrono::{DateTime, FixedOffset};

/// Parse one access-log line, discarding the reason on failure.
///
/// This is the form ingestion uses when it only needs "event or skip".
pub fn parse(line: &str) -> Option<LogEvent> {
    parse_line(line).ok()
}

/// Parse one access-log line into a [`LogEvent`].
///
/// Returns [`ParseError::Malformed`] when the line does not have the
/// combined-log-format structure and [`ParseError::Timestamp`] when it does
/// but the bracketed timestamp is not `dd/Mon/YYYY:HH:MM:SS ±HHMM`.
pub fn parse_line(line: &str) -> Result<LogEvent, ParseError> {
    let fields = scan_fields(line)?;

    let timestamp = parse_timestamp(fields.timestamp)?;

    let mut request_tokens = fields.request.split_whitespace();
    let method = request_tokens.next().map(str::to_string);
    let path = request_tokens.next().map(str::to_string);

    // Three ASCII digits always fit.
    let status_code = fields
        .status
        .parse::<u16>()
        .map_err(|_| malformed("status code is not numeric"))?;

    // Sizes are stored as SQLite INTEGER; digits beyond i64::MAX fall into
    // the same bucket as "-".
    let bytes_sent = if fields.bytes == ABSENT_FIELD {
        0
    } else {
        fields
            .bytes
            .parse::<i64>()
            .ok()
            .and_then(|b| u64::try_from(b).ok())
            .unwrap_or(0)
    };

    let referrer = if fields.referrer == ABSENT_FIELD {
        None
    } else {
        Some(fields.referrer.to_string())
    };

    Ok(LogEvent {
        ip_address: fields.ip.to_string(),
        timestamp,
        method,
        path,
        status_code,
        bytes_sent,
        referrer,
        user_agent: fields.user_agent.to_string(),
    })
}

/// Parse the bracketed timestamp with its recorded UTC offset.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_str(raw, ACCESS_LOG_TIMESTAMP_FORMAT).map_err(|source| {
        ParseError::Timestamp {
            raw_timestamp: raw.to_string(),
            source,
        }
    })
}

// =============================================================================
// Scanner
// =============================================================================

/// Raw field slices of a structurally valid line, before conversion.
#[derive(Debug)]
struct RawFields<'a> {
    ip: &'a str,
    timestamp: &'a str,
    request: &'a str,
    status: &'a str,
    bytes: &'a str,
    referrer: &'a str,
    user_agent: &'a str,
}

fn malformed(reason: &'static str) -> ParseError {
    ParseError::Malformed { reason }
}

/// Split `line` into its raw fields, enforcing the grammar above.
fn scan_fields(line: &str) -> Result<RawFields<'_>, ParseError> {
    let mut s = Scanner::new(line);

    let ip = s.ip_address().ok_or(malformed("bad client address"))?;
    s.whitespace().ok_or(malformed("bad client address"))?;

    // Identity and auth-user fields must both be the literal "-".
    s.literal('-')
        .and_then(|_| s.whitespace())
        .and_then(|_| s.literal('-'))
        .and_then(|_| s.whitespace())
        .ok_or(malformed("missing identity fields"))?;

    s.literal('[').ok_or(malformed("missing timestamp"))?;
    let timestamp = s
        .take_until(']', false)
        .ok_or(malformed("unterminated timestamp"))?;
    s.whitespace().ok_or(malformed("missing request"))?;

    let request = s.quoted(false).ok_or(malformed("missing request"))?;
    s.whitespace().ok_or(malformed("missing status code"))?;

    let status = s.status_code().ok_or(malformed("bad status code"))?;
    s.whitespace().ok_or(malformed("bad status code"))?;

    let bytes = s.byte_count().ok_or(malformed("bad byte count"))?;
    s.whitespace().ok_or(malformed("bad byte count"))?;

    let referrer = s.quoted(true).ok_or(malformed("missing referrer"))?;
    s.whitespace().ok_or(malformed("missing user agent"))?;

    let user_agent = s.quoted(false).ok_or(malformed("missing user agent"))?;

    Ok(RawFields {
        ip,
        timestamp,
        request,
        status,
        bytes,
        referrer,
        user_agent,
    })
}

/// Forward-only cursor over a line. Every method either consumes the
/// construct it names and returns `Some`, or returns `None`; callers stop
/// at the first `None`.
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn advance(&mut self, n: usize) -> &'a str {
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        head
    }

    fn literal(&mut self, c: char) -> Option<()> {
        if self.rest.starts_with(c) {
            self.advance(c.len_utf8());
            Some(())
        } else {
            None
        }
    }

    fn whitespace(&mut self) -> Option<()> {
        let c = self.rest.chars().next().filter(|c| c.is_whitespace())?;
        self.advance(c.len_utf8());
        Some(())
    }

    /// One or more ASCII digits.
    fn digits(&mut self) -> Option<&'a str> {
        let len = self
            .rest
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if len == 0 {
            None
        } else {
            Some(self.advance(len))
        }
    }

    /// Four dot-separated digit runs, returned as one slice.
    fn ip_address(&mut self) -> Option<&'a str> {
        let start = self.rest;
        self.digits()?;
        for _ in 0..3 {
            self.literal('.')?;
            self.digits()?;
        }
        Some(&start[..start.len() - self.rest.len()])
    }

    /// Exactly three digits; a fourth digit makes the whole field invalid.
    fn status_code(&mut self) -> Option<&'a str> {
        let digits = self.digits()?;
        (digits.len() == 3).then_some(digits)
    }

    fn byte_count(&mut self) -> Option<&'a str> {
        if self.rest.starts_with(ABSENT_FIELD) {
            return Some(self.advance(ABSENT_FIELD.len()));
        }
        self.digits()
    }

    /// Everything up to the next `stop`, which is consumed but not returned.
    fn take_until(&mut self, stop: char, allow_empty: bool) -> Option<&'a str> {
        let end = self.rest.find(stop)?;
        if end == 0 && !allow_empty {
            return None;
        }
        let field = self.advance(end);
        self.advance(stop.len_utf8());
        Some(field)
    }

    /// A `"`-delimited field with no embedded quotes.
    fn quoted(&mut self, allow_empty: bool) -> Option<&'a str> {
        self.literal('"')?;
        self.take_until('"', allow_empty)
    }
}

// =============================================================================
// Tests
// =============================================================================
