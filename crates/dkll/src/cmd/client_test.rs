//! Tests for client flags

use clap::Parser;

use crate::cmd::client::{resolve_tz, ClientOpts};

#[derive(Parser, Debug)]
struct TestCli {
    #[command(flatten)]
    opts: ClientOpts,
}

#[test]
fn test_short_flags() {
    let cli = TestCli::try_parse_from([
        "dkll", "-a", "http://127.0.0.1:8080/v1", "-c", "web", "-c", "db", "-h", "host1", "-x",
        "noisy", "-m", "-p", "-s", "-f", "-t", "-g", "error", "-G", "debug",
    ])
    .unwrap();

    let opts = cli.opts;
    assert_eq!(opts.api, "http://127.0.0.1:8080/v1");
    assert_eq!(opts.containers, vec!["web", "db"]);
    assert_eq!(opts.hosts, vec!["host1"], "-h selects hosts, not help");
    assert_eq!(opts.excludes, vec!["noisy"]);
    assert!(opts.show_ts);
    assert!(opts.show_pid);
    assert!(opts.show_syslog);
    assert!(opts.follow);
    assert!(opts.tail);
    assert_eq!(opts.grep, vec!["error"]);
    assert_eq!(opts.ungrep, vec!["debug"]);
    assert_eq!(opts.max_records, 100);
    assert_eq!(opts.timezone, "Local");
}

#[test]
fn test_page_size() {
    let cli =
        TestCli::try_parse_from(["dkll", "-a", "http://127.0.0.1:8080/v1", "-n", "25"]).unwrap();
    assert_eq!(cli.opts.max_records, 25);
}

#[test]
fn test_api_is_required() {
    assert!(TestCli::try_parse_from(["dkll"]).is_err());
}

#[test]
fn test_resolve_tz() {
    assert_eq!(resolve_tz("Local"), None);
    assert_eq!(
        resolve_tz("America/New_York"),
        Some(chrono_tz::Tz::America__New_York)
    );
    assert_eq!(resolve_tz("Mars/Olympus_Mons"), None, "bad zone falls back");
}
