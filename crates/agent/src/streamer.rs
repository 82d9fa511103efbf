//! Container log streamer
//!
//! One [`ContainerStreamer`] per running container. It drives a blocking
//! "follow logs" call through the [`LogsEmitter`] seam, delivering bytes
//! straight into the stdout/stderr writers. A daemon tail that dies with
//! the `Error grabbing logs: EOF` quirk is retried after a second with an
//! unset tail; any other error ends the streamer.

use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::writer::SharedWriter;

/// Daemon error prefix marking the empty-log quirk.
const TAIL_EOF_PREFIX: &str = "Error grabbing logs: EOF";

/// Initial tail depth for a fresh stream.
const DEFAULT_TAIL: &str = "10";

/// One follow-logs call.
pub struct LogsOptions {
    /// Container to follow.
    pub container_id: String,
    /// How many trailing lines to replay; empty means "all".
    pub tail: String,
    /// Keep following after the backlog.
    pub follow: bool,
    /// Destination for the container's stdout.
    pub stdout: SharedWriter,
    /// Destination for the container's stderr.
    pub stderr: SharedWriter,
    /// Fires when the tail must stop.
    pub cancel: CancellationToken,
}

/// Tail failures surfaced by an emitter.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The cancel token fired; not an error at the boundary.
    #[error("tail canceled")]
    Canceled,

    /// Error reported by the runtime daemon, message preserved.
    #[error("error from daemon in stream: {0}")]
    Daemon(String),

    /// Transport-level failure talking to the runtime.
    #[error("runtime i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl EmitError {
    /// The daemon's empty-log quirk: retry with an unset tail.
    fn is_tail_eof(&self) -> bool {
        matches!(self, EmitError::Daemon(msg) if msg.starts_with(TAIL_EOF_PREFIX))
    }
}

/// Follows one container's output into the given writers. The call blocks
/// for as long as the container lives, honoring `opts.cancel`.
#[async_trait]
pub trait LogsEmitter: Send + Sync {
    async fn logs(&self, opts: LogsOptions) -> Result<(), EmitError>;
}

/// Everything needed to build a streamer.
pub struct StreamerParams {
    pub id: String,
    pub name: String,
    pub log_writer: SharedWriter,
    pub err_writer: SharedWriter,
    pub emitter: std::sync::Arc<dyn LogsEmitter>,
}

/// Long-running tail of one container into two writers.
pub struct ContainerStreamer {
    id: String,
    name: String,
    log_writer: SharedWriter,
    err_writer: SharedWriter,
    emitter: std::sync::Arc<dyn LogsEmitter>,
    cancel: CancellationToken,
}

impl ContainerStreamer {
    pub fn new(params: StreamerParams) -> ContainerStreamer {
        ContainerStreamer {
            id: params.id,
            name: params.name,
            log_writer: params.log_writer,
            err_writer: params.err_writer,
            emitter: params.emitter,
            cancel: CancellationToken::new(),
        }
    }

    /// Streamed container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the tail until it ends or [`ContainerStreamer::close`] fires the
    /// token. Retries the daemon's empty-log EOF quirk with an unset tail.
    pub async fn run(&self) -> Result<(), EmitError> {
        info!(container = %self.name, "start log streamer");

        let mut tail = DEFAULT_TAIL.to_string();
        let result = loop {
            let opts = LogsOptions {
                container_id: self.id.clone(),
                tail: tail.clone(),
                follow: true,
                stdout: self.log_writer.clone(),
                stderr: self.err_writer.clone(),
                cancel: self.cancel.clone(),
            };
            match self.emitter.logs(opts).await {
                Err(e) if e.is_tail_eof() => {
                    tail = String::new();
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    debug!(container = %self.name, "retry logger");
                    continue;
                }
                other => break other,
            }
        };

        match &result {
            Ok(()) | Err(EmitError::Canceled) => {
                info!(container_id = %self.id, "stream terminated");
                Ok(())
            }
            Err(e) => {
                warn!(container_id = %self.id, error = %e, "stream terminated with error");
                result
            }
        }
    }

    /// Cancel the tail, wait for the task up to `deadline` (abandoning it
    /// on overrun), then close the writers. In mix mode the two writers are
    /// the same value and are closed once.
    pub async fn close(
        &self,
        task: JoinHandle<()>,
        deadline: Duration,
    ) -> std::io::Result<()> {
        self.cancel.cancel();
        if tokio::time::timeout(deadline, task).await.is_err() {
            warn!(container = %self.name, "streamer did not stop in time, abandoning");
        }

        self.log_writer.lock().close()?;
        if !std::sync::Arc::ptr_eq(&self.log_writer, &self.err_writer) {
            self.err_writer.lock().close()?;
        }
        debug!(container_id = %self.id, "streamer closed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "streamer_test.rs"]
mod streamer_test;
