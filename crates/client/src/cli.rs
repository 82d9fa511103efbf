//! Tail loop and record rendering
//!
//! The loop follows the id cursor: optionally seed it from `/last` (tail
//! mode), fetch pages from `/find`, render matching lines and advance.
//! An empty page ends a one-shot run; in follow mode the loop sleeps the
//! update interval and polls again. Cancellation (ctrl-c) is a clean exit,
//! not an error.

use std::io::Write;
use std::time::Duration;

use chrono::Timelike;
use chrono_tz::Tz;
use dkll_core::{LogEntry, Request};
use owo_colors::{OwoColorize, Style};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ApiClient, ClientError};

/// Output options.
pub struct DisplayParams {
    /// Include the `[pid]` column.
    pub show_pid: bool,
    /// Include the record timestamp.
    pub show_ts: bool,
    /// Keep polling after the backlog is drained.
    pub follow: bool,
    /// Seed the cursor from `/last` so only new records show.
    pub tail: bool,
    /// Show records of the `"syslog"` pseudo-container.
    pub show_syslog: bool,
    /// Print a line only if it contains any of these substrings.
    pub grep: Vec<String>,
    /// Drop a line if it contains any of these substrings.
    pub ungrep: Vec<String>,
    /// Zone for rendered timestamps; `None` renders in system local time.
    pub tz: Option<Tz>,
    /// Colorize fields; off when piping.
    pub color: bool,
    /// Output sink, stdout in production.
    pub out: Box<dyn Write + Send>,
}

impl Default for DisplayParams {
    fn default() -> Self {
        DisplayParams {
            show_pid: false,
            show_ts: false,
            follow: false,
            tail: false,
            show_syslog: false,
            grep: Vec::new(),
            ungrep: Vec::new(),
            tz: Some(chrono_tz::UTC),
            color: false,
            out: Box::new(std::io::stdout()),
        }
    }
}

struct FieldStyles {
    host: Style,
    container: Style,
    meta: Style,
    msg: Style,
}

impl FieldStyles {
    fn new(enabled: bool) -> FieldStyles {
        if enabled {
            FieldStyles {
                host: Style::new().red(),
                container: Style::new().green(),
                meta: Style::new().yellow(),
                msg: Style::new().white(),
            }
        } else {
            FieldStyles {
                host: Style::new(),
                container: Style::new(),
                meta: Style::new(),
                msg: Style::new(),
            }
        }
    }
}

/// Tail client: cursor-following output loop over an [`ApiClient`].
pub struct CliClient {
    api: ApiClient,
    display: DisplayParams,
    update_interval: Duration,
}

impl CliClient {
    pub fn new(api: ApiClient, display: DisplayParams, update_interval: Duration) -> CliClient {
        CliClient {
            api,
            display,
            update_interval,
        }
    }

    /// Run the tail loop. Returns the request with the final cursor so a
    /// caller could resume. Cancellation exits cleanly with `Ok`.
    pub async fn activate(
        &mut self,
        cancel: &CancellationToken,
        mut request: Request,
    ) -> Result<Request, ClientError> {
        if self.display.tail {
            match self.api.last().await {
                Ok(last) => request.last_id = last.id,
                Err(_) if cancel.is_cancelled() => return Ok(request),
                Err(e) => return Err(e),
            }
        }

        loop {
            let items = match self.api.find(&request).await {
                Ok(items) => items,
                Err(_) if cancel.is_cancelled() => return Ok(request),
                Err(e) => return Err(e),
            };

            if items.is_empty() && !self.display.follow {
                break;
            }

            for entry in &items {
                let Some(line) = self.make_line(entry) else {
                    continue;
                };
                if !self.passes_grep(&line) {
                    continue;
                }
                let _ = self.display.out.write_all(line.as_bytes());
            }
            let _ = self.display.out.flush();

            if let Some(last) = items.last() {
                request.last_id = last.id.clone();
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("tail terminated");
                    return Ok(request);
                }
                _ = tokio::time::sleep(self.update_interval) => {}
            }
        }

        Ok(request)
    }

    /// Render one record, or nothing for hidden syslog records.
    fn make_line(&self, entry: &LogEntry) -> Option<String> {
        if !self.display.show_syslog && entry.container == dkll_core::entry::SYSLOG_CONTAINER {
            return None;
        }

        let styles = FieldStyles::new(self.display.color);

        let pid = if self.display.show_pid {
            format!(" [{}]", entry.pid)
        } else {
            String::new()
        };

        let ts = if self.display.show_ts {
            format!(" - {}", format_ts(entry, self.display.tz))
        } else {
            String::new()
        };

        Some(format!(
            "{}:{}{}{} - {}\n",
            entry.host.style(styles.host),
            entry.container.style(styles.container),
            ts.style(styles.meta),
            pid.style(styles.meta),
            entry.msg.style(styles.msg)
        ))
    }

    /// A line shows iff it matches any grep (or grep is empty) and no
    /// un-grep.
    fn passes_grep(&self, line: &str) -> bool {
        let grep_ok =
            self.display.grep.is_empty() || self.display.grep.iter().any(|g| line.contains(g));
        let ungrep_ok = self.display.ungrep.is_empty()
            || !self.display.ungrep.iter().any(|g| line.contains(g));
        grep_ok && ungrep_ok
    }
}

/// Timestamp in the display zone; fractional seconds only when present.
fn format_ts(entry: &LogEntry, tz: Option<Tz>) -> String {
    let wall = match tz {
        Some(tz) => entry.ts.with_timezone(&tz).naive_local(),
        None => entry.ts.with_timezone(&chrono::Local).naive_local(),
    };
    if wall.nanosecond() == 0 {
        wall.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        let rendered = wall.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        rendered.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod cli_test;
