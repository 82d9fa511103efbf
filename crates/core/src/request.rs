//! Query descriptor exchanged between client and server

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Filters and paging for store queries. Every filter is optional; an unset
/// filter means "any".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Cursor: only records with `id > last_id` are returned. Empty or
    /// `"0"` means "no cursor" and the newest page is served.
    #[serde(rename = "id", default)]
    pub last_id: String,

    /// Page size; 0 means the server default, capped at the server maximum.
    #[serde(rename = "max", default)]
    pub limit: usize,

    /// Host filters, exact values or `/regex/`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// Container filters, exact values or `/regex/`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<String>,

    /// Excluded containers, exact values or `/regex/`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,

    /// Half-open time range `[from_ts, to_ts)`; unset bounds are unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_ts: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_ts: Option<DateTime<Utc>>,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut elems = vec![format!(
            "hosts={:?}, containers={:?}, excludes={:?}, max={}",
            self.hosts, self.containers, self.excludes, self.limit
        )];
        if let Some(from) = self.from_ts {
            elems.push(format!("from={}", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = self.to_ts {
            elems.push(format!("to={}", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        elems.push(format!("last-id={}", self.last_id));
        f.write_str(&elems.join(", "))
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;
