//! Server mode: store + syslog intake + forwarder + REST

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dkll_rotate::{RotateConfig, RotatingFile};
use dkll_server::rest::{RestConfig, RestServer};
use dkll_server::syslog::{SyslogConfig, SyslogSource};
use dkll_server::{FileLogger, FileWriter, Forwarder, NopFileWriter};
use dkll_store::{LogStore, TursoEngine, TursoParams};

/// Server mode flags.
#[derive(Args, Debug)]
pub struct ServerOpts {
    /// Rest server port
    #[arg(long = "api-port", env = "API_PORT", default_value_t = 8080)]
    pub api_port: u16,

    /// Syslog server port (tcp+udp)
    #[arg(long = "syslog-port", env = "SYSLOG_PORT", default_value_t = 5514)]
    pub syslog_port: u16,

    /// Store database file
    #[arg(long = "db", env = "DKLL_DB", default_value = "var/dkll.db")]
    pub db: String,

    /// Store open timeout, seconds
    #[arg(long = "db-timeout", env = "DB_TIMEOUT", default_value_t = 5)]
    pub db_timeout: u64,

    /// Max store size, bytes
    #[arg(long = "db-size", env = "DB_SIZE", default_value_t = 10_000_000_000)]
    pub db_size: i64,

    /// Max number of stored records
    #[arg(long = "db-docs", env = "DB_DOCS", default_value_t = 50_000_000)]
    pub db_docs: i64,

    /// Backup log files location, empty disables backups
    #[arg(long = "backup", env = "BACK_LOG", default_value = "")]
    pub backup_location: String,

    /// Enable the merged log file
    #[arg(long = "merged", env = "BACK_MRG")]
    pub enable_merged: bool,

    /// Max per-container log size, megabytes
    #[arg(long = "limit.container.max-size", env = "LIMIT_CONTAINER_MAX_SIZE", default_value_t = 100)]
    pub container_max_size: u64,

    /// Max number of rotated per-container files
    #[arg(long = "limit.container.max-backups", env = "LIMIT_CONTAINER_MAX_BACKUPS", default_value_t = 10)]
    pub container_max_backups: usize,

    /// Max age of rotated per-container files, days
    #[arg(long = "limit.container.max-age", env = "LIMIT_CONTAINER_MAX_AGE", default_value_t = 30)]
    pub container_max_age: u32,

    /// Max merged log size, megabytes
    #[arg(long = "limit.merged.max-size", env = "LIMIT_MERGED_MAX_SIZE", default_value_t = 100)]
    pub merged_max_size: u64,

    /// Max number of rotated merged files
    #[arg(long = "limit.merged.max-backups", env = "LIMIT_MERGED_MAX_BACKUPS", default_value_t = 10)]
    pub merged_max_backups: usize,

    /// Max age of rotated merged files, days
    #[arg(long = "limit.merged.max-age", env = "LIMIT_MERGED_MAX_AGE", default_value_t = 30)]
    pub merged_max_age: u32,
}

/// Run the server until the token fires.
pub async fn run(opts: ServerOpts, cancel: CancellationToken) -> Result<()> {
    println!("dkll server {}", env!("CARGO_PKG_VERSION"));

    let engine = tokio::time::timeout(
        Duration::from_secs(opts.db_timeout),
        TursoEngine::open(
            &opts.db,
            TursoParams {
                max_bytes: opts.db_size,
                max_docs: opts.db_docs,
            },
        ),
    )
    .await
    .context("store open timed out")?
    .context("failed to open store")?;
    let store = Arc::new(LogStore::new(Arc::new(engine)));
    info!(db = %opts.db, "store prepared");

    let file_writer = make_file_writer(&opts);

    let rest = RestServer::new(
        RestConfig {
            port: opts.api_port,
            version: env!("CARGO_PKG_VERSION").into(),
            ..RestConfig::default()
        },
        store.clone(),
    );
    let rest_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = rest.run(rest_cancel).await {
            warn!(error = %e, "rest server terminated");
        }
    });

    let syslog = SyslogSource::bind(&SyslogConfig {
        port: opts.syslog_port,
        ..SyslogConfig::default()
    })
    .await
    .context("failed to bind syslog")?;

    let forwarder = Forwarder::new(store, file_writer, Arc::new(syslog), chrono_tz::UTC);
    forwarder
        .run(cancel)
        .await
        .context("forwarder failed")?;
    Ok(())
}

/// Merged + per-container rotated writers under the backup root; a
/// discarding sink when backups are off.
fn make_file_writer(opts: &ServerOpts) -> Arc<dyn FileWriter> {
    if opts.backup_location.is_empty() {
        return Arc::new(NopFileWriter);
    }
    info!(location = %opts.backup_location, "backup files enabled");

    let root = std::path::PathBuf::from(&opts.backup_location);

    let merged: Box<dyn std::io::Write + Send> = if opts.enable_merged {
        match RotatingFile::open(
            root.join("dkll.log"),
            RotateConfig {
                max_size: opts.merged_max_size * 1024 * 1024,
                max_backups: opts.merged_max_backups,
                max_age_days: opts.merged_max_age,
                compress: true,
            },
        ) {
            Ok(w) => Box::new(w),
            Err(e) => {
                warn!(error = %e, "can't open merged log, disabled");
                Box::new(std::io::sink())
            }
        }
    } else {
        Box::new(std::io::sink())
    };

    let limits = RotateConfig {
        max_size: opts.container_max_size * 1024 * 1024,
        max_backups: opts.container_max_backups,
        max_age_days: opts.container_max_age,
        compress: true,
    };
    let factory_root = root.clone();
    Arc::new(FileLogger::new(
        Box::new(move |host, container| {
            let path = factory_root.join(host).join(format!("{container}.log"));
            match RotatingFile::open(&path, limits) {
                Ok(w) => Box::new(w) as Box<dyn std::io::Write + Send>,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "can't open container log");
                    Box::new(std::io::sink())
                }
            }
        }),
        merged,
    ))
}

#[cfg(test)]
#[path = "server_test.rs"]
mod server_test;
