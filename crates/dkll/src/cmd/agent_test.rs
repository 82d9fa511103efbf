//! Tests for agent flags and writer wiring

use std::sync::Arc;

use clap::Parser;
use dkll_agent::WriterFactory;
use tokio_util::sync::CancellationToken;

use crate::cmd::agent::{run, AgentOpts, AgentWriterFactory};

#[derive(Parser, Debug)]
struct TestCli {
    #[command(flatten)]
    opts: AgentOpts,
}

fn opts(args: &[&str]) -> AgentOpts {
    let mut argv = vec!["dkll"];
    argv.extend_from_slice(args);
    TestCli::try_parse_from(argv).unwrap().opts
}

#[test]
fn test_defaults() {
    let opts = opts(&[]);
    assert_eq!(opts.docker_host, "unix:///var/run/docker.sock");
    assert_eq!(opts.syslog_host, "127.0.0.1:514");
    assert_eq!(opts.syslog_prefix, "docker/");
    assert_eq!(opts.syslog_proto, "udp4");
    assert_eq!(opts.files_location, "logs");
    assert_eq!(opts.max_size, 10);
    assert_eq!(opts.max_files, 5);
    assert_eq!(opts.max_age, 30);
    assert!(!opts.mix_err);
    assert!(!opts.demo);
}

#[test]
fn test_exclude_list() {
    let opts = opts(&["-x", "noisy,worse", "--files"]);
    assert_eq!(opts.excludes, vec!["noisy", "worse"]);
}

#[tokio::test]
async fn test_includes_and_excludes_conflict() {
    let opts = opts(&["--demo", "--files", "-i", "a", "-x", "b"]);
    let err = run(opts, CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("Excludes/Includes"));
}

#[tokio::test]
async fn test_no_outputs_is_an_error() {
    let opts = opts(&["--demo"]);
    let err = run(opts, CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("files or syslog"));
}

#[tokio::test]
async fn test_non_demo_requires_runtime_adapter() {
    let opts = opts(&["--files"]);
    let err = run(opts, CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("--demo"));
}

#[tokio::test]
async fn test_factory_makes_log_and_err_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = opts(&["--demo", "--files"]);
    opts.files_location = dir.path().to_string_lossy().into_owned();

    let factory = AgentWriterFactory::new(opts);
    let pair = factory.make("web", "g1").await.unwrap();
    assert!(dir.path().join("g1/web.log").exists());
    assert!(dir.path().join("g1/web.err").exists());

    drop(pair);
}

#[tokio::test]
async fn test_factory_mix_mode_shares_one_writer() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = opts(&["--demo", "--files", "--mix-err"]);
    opts.files_location = dir.path().to_string_lossy().into_owned();

    let factory = AgentWriterFactory::new(opts);
    let pair = factory.make("web", "").await.unwrap();
    assert!(Arc::ptr_eq(&pair.log, &pair.err), "mix mode shares the writer");
    assert!(dir.path().join("web.log").exists());
    assert!(!dir.path().join("web.err").exists());
}
