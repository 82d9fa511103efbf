//! Log record and syslog payload parser
//!
//! A [`LogEntry`] is produced by parsing one syslog payload line, e.g.
//!
//! ```text
//! Oct 19 15:29:43 host-1 docker/mongo[888]: something happened
//! ```
//!
//! Two timestamp shapes are accepted at the head of the line: the classic
//! BSD `"Oct 19 15:29:43"` form (no year, resolved against the current year
//! in the configured zone) and RFC3339. The token after the timestamp is the
//! host, the next one is `service/container[pid]:`. Only a service starting
//! with `docker` yields a container; everything else is recorded under the
//! `"syslog"` pseudo-container with pid 0.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Minimal line length: the BSD timestamp alone is 15 bytes plus a space.
const MIN_LINE_LEN: usize = 16;

/// Pseudo-container assigned to lines without a `docker/NAME` tag.
pub const SYSLOG_CONTAINER: &str = "syslog";

/// A single log record flowing through the pipeline.
///
/// Created by the forwarder from a syslog line, persisted in the capped
/// store (which assigns `id`), and served back over REST.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Hex-encoded time-sortable id, assigned on insert. Empty until stored.
    #[serde(default)]
    pub id: String,

    /// Host the line originated from (syslog header).
    #[serde(default)]
    pub host: String,

    /// Container name, or `"syslog"` for non-docker lines.
    #[serde(default)]
    pub container: String,

    /// Process id from the `[NNNN]` suffix, 0 when absent.
    #[serde(default)]
    pub pid: i64,

    /// Payload text after the syslog prefix, trimmed.
    #[serde(default)]
    pub msg: String,

    /// Event timestamp as extracted from the line.
    pub ts: DateTime<Utc>,

    /// Server-side ingestion time, derived from `id` by the store.
    #[serde(rename = "cts", default, skip_serializing_if = "Option::is_none")]
    pub created_ts: Option<DateTime<Utc>>,
}

/// Line parse failures. Malformed lines are dropped by the forwarder.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    /// The line is shorter than the shortest possible timestamp prefix.
    #[error("line is too short, line=[{0}]")]
    TooShort(String),

    /// Neither timestamp shape matched the head of the line.
    #[error("can't extract time from {0:?}")]
    Time(String),
}

impl LogEntry {
    /// Parse a syslog payload line into a record.
    ///
    /// `tz` resolves the year-less BSD timestamp and normalizes RFC3339
    /// stamps; the stored `ts` is always UTC.
    pub fn parse<Z: TimeZone>(line: &str, tz: &Z) -> Result<LogEntry, ParseError> {
        if line.len() < MIN_LINE_LEN {
            return Err(ParseError::TooShort(line.to_string()));
        }

        let (ts, rest) = parse_time(line, tz)?;

        let mut entry = LogEntry {
            container: SYSLOG_CONTAINER.to_string(),
            ts,
            ..LogEntry::default()
        };

        // host is the first token after the timestamp
        let host = rest.split(' ').next().unwrap_or_default();
        entry.host = host.to_string();
        let rest = rest.get(host.len() + 1..).unwrap_or_default();

        // service/container[pid]: tag; only docker-prefixed services count
        let tag = rest.split(' ').next().unwrap_or_default();
        let mut elems = tag.split('/');
        let service = elems.next().unwrap_or_default();
        if service.starts_with("docker") {
            if let Some(container_and_pid) = elems.next() {
                let mut pid_elems = container_and_pid.split('[');
                entry.container = pid_elems.next().unwrap_or_default().to_string();
                if let Some(pid_part) = pid_elems.next() {
                    let pid_str = pid_part.trim_end_matches(':').trim_end_matches(']');
                    if let Ok(pid) = pid_str.parse::<i64>() {
                        entry.pid = pid;
                    }
                }
            }
        }

        entry.msg = rest.get(tag.len() + 1..).unwrap_or_default().trim().to_string();
        Ok(entry)
    }
}

/// Extract the timestamp from the head of the line and return it with the
/// remainder. Supports `"Oct 19 15:29:43"` (year from "now" in `tz`) and
/// RFC3339.
fn parse_time<'a, Z: TimeZone>(line: &'a str, tz: &Z) -> Result<(DateTime<Utc>, &'a str), ParseError> {
    if line.len() < MIN_LINE_LEN {
        return Err(ParseError::Time(line.to_string()));
    }

    // BSD shape first: prepend the current year so the stamp is complete
    let year = Utc::now().with_timezone(tz).year();
    if let (Some(stamp), Some(rest)) = (line.get(..15), line.get(16..)) {
        let with_year = format!("{year} {stamp}");
        if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, "%Y %b %e %H:%M:%S") {
            if let Some(local) = tz.from_local_datetime(&naive).earliest() {
                return Ok((local.with_timezone(&Utc), rest));
            }
        }
    }

    // RFC3339: the first whitespace-separated token carries its own zone
    let token = line.split(' ').next().unwrap_or_default();
    match DateTime::parse_from_rfc3339(token) {
        Ok(ts) => Ok((
            ts.with_timezone(&Utc),
            line.get(token.len() + 1..).unwrap_or_default(),
        )),
        Err(_) => Err(ParseError::Time(line.to_string())),
    }
}

impl fmt::Display for LogEntry {
    /// Render the merged-file line shape:
    /// `2017-05-30 16:13:35 -0400 : host/container [pid] - msg`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {}/{} [{}] - {}",
            self.ts.format("%Y-%m-%d %H:%M:%S %z"),
            self.host,
            self.container,
            self.pid,
            self.msg
        )
    }
}

#[cfg(test)]
#[path = "entry_test.rs"]
mod entry_test;
