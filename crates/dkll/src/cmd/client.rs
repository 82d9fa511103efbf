//! Client mode: tail the server's REST API

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use dkll_client::{ApiClient, CliClient, DisplayParams, FixedDelay};
use dkll_core::Request;

/// Client mode flags. `-h` selects hosts; help stays on `--help`.
#[derive(Args, Debug)]
#[command(disable_help_flag = true)]
pub struct ClientOpts {
    /// API endpoint, e.g. http://host:8080/v1
    #[arg(short = 'a', long = "api", env = "DKLL_API")]
    pub api: String,

    /// Show container(s) only
    #[arg(short = 'c')]
    pub containers: Vec<String>,

    /// Show host(s) only
    #[arg(short = 'h')]
    pub hosts: Vec<String>,

    /// Exclude container(s)
    #[arg(short = 'x')]
    pub excludes: Vec<String>,

    /// Show syslog timestamp
    #[arg(short = 'm')]
    pub show_ts: bool,

    /// Show pid
    #[arg(short = 'p')]
    pub show_pid: bool,

    /// Show syslog messages
    #[arg(short = 's')]
    pub show_syslog: bool,

    /// Follow mode
    #[arg(short = 'f')]
    pub follow: bool,

    /// Tail mode
    #[arg(short = 't')]
    pub tail: bool,

    /// Show up to N records per page
    #[arg(short = 'n', default_value_t = 100)]
    pub max_records: usize,

    /// Grep on the entire record
    #[arg(short = 'g')]
    pub grep: Vec<String>,

    /// Un-grep on the entire record
    #[arg(short = 'G')]
    pub ungrep: Vec<String>,

    /// Time zone name, or "Local"
    #[arg(long = "tz", default_value = "Local")]
    pub timezone: String,

    #[arg(long = "help", action = clap::ArgAction::Help, help = "Print help")]
    pub help: Option<bool>,
}

/// Run the tail client until done (or interrupted).
pub async fn run(opts: ClientOpts, cancel: CancellationToken) -> Result<()> {
    let tz = resolve_tz(&opts.timezone);

    let request = Request {
        limit: opts.max_records,
        containers: opts.containers.clone(),
        hosts: opts.hosts.clone(),
        excludes: opts.excludes.clone(),
        ..Request::default()
    };

    let display = DisplayParams {
        show_pid: opts.show_pid,
        show_ts: opts.show_ts,
        follow: opts.follow,
        tail: opts.tail,
        show_syslog: opts.show_syslog,
        grep: opts.grep.clone(),
        ungrep: opts.ungrep.clone(),
        tz,
        color: std::io::stdout().is_terminal(),
        out: Box::new(std::io::stdout()),
    };

    let api = ApiClient::new(opts.api.clone(), FixedDelay::default());
    let mut cli = CliClient::new(api, display, Duration::from_secs(1));
    cli.activate(&cancel, request).await?;
    Ok(())
}

/// Resolve a zone name; "Local" (or a bad name) falls back to system time.
fn resolve_tz(name: &str) -> Option<chrono_tz::Tz> {
    if name == "Local" {
        return None;
    }
    match name.parse() {
        Ok(tz) => Some(tz),
        Err(_) => {
            warn!(tz = name, "can't use TZ, falling back to local");
            None
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod client_test;
