//! dkll - distributed container-log collector
//!
//! ```bash
//! # central server: syslog intake, capped store, REST API
//! dkll server --api-port 8080 --syslog-port 5514 --db var/dkll.db
//!
//! # host agent: stream container logs to files and remote syslog
//! dkll agent --demo --files --loc logs
//!
//! # tail the server from anywhere
//! dkll client -a http://logs.example.com:8080/v1 -f -t
//! ```

mod cmd;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "dkll", disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show debug info
    #[arg(long = "dbg", env = "DEBUG", global = true)]
    dbg: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Server mode: syslog intake, capped store and REST API
    Server(cmd::server::ServerOpts),

    /// Agent mode: stream container logs to files and remote syslog
    Agent(cmd::agent::AgentOpts),

    /// Client mode: tail the server's REST API
    Client(cmd::client::ClientOpts),
}

#[tokio::main]
async fn main() {
    // --version bypasses normal parsing and uses its own exit code
    if std::env::args().any(|a| a == "--version") {
        println!("dkll {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(2);
    }

    let cli = Cli::parse();
    init_logging(cli.dbg);

    let cancel = CancellationToken::new();
    spawn_signal_watcher(cancel.clone());

    let result = match cli.command {
        Command::Server(opts) => cmd::server::run(opts, cancel).await,
        Command::Agent(opts) => cmd::agent::run(opts, cancel).await,
        Command::Client(opts) => cmd::client::run(opts, cancel).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        std::process::exit(1);
    }
}

/// SIGINT/SIGTERM fire the shared cancellation token.
fn spawn_signal_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        warn!("interrupt signal");
        cancel.cancel();
    });
}

fn init_logging(dbg: bool) {
    let default = if dbg { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(dbg))
        .with(filter)
        .init();
}
