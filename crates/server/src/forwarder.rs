//! Forwarder pipeline
//!
//! Tails the syslog intake, parses each line into a [`LogEntry`] and hands
//! batches to the store and the file logger. Two tasks cooperate over a
//! bounded channel: the producer parses (dropping malformed lines with a
//! warning), the consumer batches and flushes on a high watermark, on a
//! ticker, and once more on shutdown.
//!
//! A failing publish or file write is logged and absorbed; the pipeline
//! never stops because of a single batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use dkll_core::LogEntry;
use dkll_store::StoreError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::syslog::{LineSource, SyslogError};

/// Parsed-entry channel capacity.
const ENTRIES_QUEUE: usize = 10_000;

/// Flush when the buffer reaches this many entries.
const FLUSH_WATERMARK: usize = 1000;

/// Flush at least this often.
const FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Store-side sink for parsed batches.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Insert the batch in order.
    async fn publish(&self, records: &[LogEntry]) -> Result<(), StoreError>;

    /// Newest stored record, if any.
    async fn last_published(&self) -> Result<Option<LogEntry>, StoreError>;
}

#[async_trait]
impl Publisher for dkll_store::LogStore {
    async fn publish(&self, records: &[LogEntry]) -> Result<(), StoreError> {
        dkll_store::LogStore::publish(self, records.to_vec()).await
    }

    async fn last_published(&self) -> Result<Option<LogEntry>, StoreError> {
        dkll_store::LogStore::last_published(self).await
    }
}

/// File-side sink for individual entries (merged + per-container files).
pub trait FileWriter: Send + Sync {
    fn write(&self, entry: &LogEntry) -> std::io::Result<()>;
}

/// Discarding file sink, used when backups are disabled.
pub struct NopFileWriter;

impl FileWriter for NopFileWriter {
    fn write(&self, _entry: &LogEntry) -> std::io::Result<()> {
        Ok(())
    }
}

/// Pipeline counters.
#[derive(Debug, Default)]
pub struct ForwarderMetrics {
    /// Lines parsed into entries.
    pub entries_parsed: AtomicU64,

    /// Lines dropped as unparseable.
    pub parse_failures: AtomicU64,

    /// Batches flushed to the publisher.
    pub batches_flushed: AtomicU64,

    /// Entries handed to the publisher.
    pub entries_published: AtomicU64,

    /// Failed publish calls (whole batches).
    pub publish_failures: AtomicU64,

    /// Failed per-entry file writes.
    pub file_failures: AtomicU64,
}

impl ForwarderMetrics {
    pub const fn new() -> ForwarderMetrics {
        ForwarderMetrics {
            entries_parsed: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            batches_flushed: AtomicU64::new(0),
            entries_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            file_failures: AtomicU64::new(0),
        }
    }

    /// Point-in-time snapshot.
    pub fn snapshot(&self) -> ForwarderMetricsSnapshot {
        ForwarderMetricsSnapshot {
            entries_parsed: self.entries_parsed.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            entries_published: self.entries_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            file_failures: self.file_failures.load(Ordering::Relaxed),
        }
    }
}

/// Copy of the pipeline counters at one moment.
#[derive(Debug, Clone, Copy)]
pub struct ForwarderMetricsSnapshot {
    pub entries_parsed: u64,
    pub parse_failures: u64,
    pub batches_flushed: u64,
    pub entries_published: u64,
    pub publish_failures: u64,
    pub file_failures: u64,
}

/// Syslog → parse → batched publish → file fan-out.
pub struct Forwarder {
    publisher: Arc<dyn Publisher>,
    file_writer: Arc<dyn FileWriter>,
    syslog: Arc<dyn LineSource>,
    /// Zone resolving year-less syslog timestamps.
    tz: Tz,
    metrics: Arc<ForwarderMetrics>,
}

impl Forwarder {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        file_writer: Arc<dyn FileWriter>,
        syslog: Arc<dyn LineSource>,
        tz: Tz,
    ) -> Forwarder {
        Forwarder {
            publisher,
            file_writer,
            syslog,
            tz,
            metrics: Arc::new(ForwarderMetrics::new()),
        }
    }

    /// Pipeline counters; stay valid while `run` is in flight.
    pub fn metrics(&self) -> Arc<ForwarderMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until canceled. Blocks the caller; the batching consumer is
    /// awaited before returning so the final flush always lands.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SyslogError> {
        info!("run forwarder from syslog");

        if let Ok(Some(last)) = self.publisher.last_published().await {
            debug!(id = %last.id, entry = %last, "last published");
        }

        let mut lines = self.syslog.open(cancel.clone()).await?;
        let (entries_tx, entries_rx) = mpsc::channel::<LogEntry>(ENTRIES_QUEUE);
        let writer = self.background_writer(cancel.clone(), entries_rx);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("forwarder terminated");
                    break;
                }
                line = lines.recv() => {
                    let Some(line) = line else { break };
                    match LogEntry::parse(&line, &self.tz) {
                        Ok(entry) => {
                            self.metrics.entries_parsed.fetch_add(1, Ordering::Relaxed);
                            if entries_tx.send(entry).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            self.metrics.parse_failures.fetch_add(1, Ordering::Relaxed);
                            warn!(line = %line, error = %e, "failed to make entry");
                        }
                    }
                }
            }
        }

        drop(entries_tx); // lets the writer drain and exit
        let _ = writer.await;
        Ok(())
    }

    /// Spawn the batching consumer: flush on watermark, ticker, and once on
    /// shutdown.
    fn background_writer(
        &self,
        cancel: CancellationToken,
        mut entries: mpsc::Receiver<LogEntry>,
    ) -> JoinHandle<()> {
        info!("forwarder's writer activated");
        let publisher = Arc::clone(&self.publisher);
        let file_writer = Arc::clone(&self.file_writer);
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(async move {
            let mut buffer: Vec<LogEntry> = Vec::with_capacity(FLUSH_WATERMARK + 1);
            let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let flush = |buffer: &mut Vec<LogEntry>| {
                let batch = std::mem::take(buffer);
                let publisher = Arc::clone(&publisher);
                let file_writer = Arc::clone(&file_writer);
                let metrics = Arc::clone(&metrics);
                async move {
                    if batch.is_empty() {
                        return;
                    }
                    metrics.batches_flushed.fetch_add(1, Ordering::Relaxed);
                    match publisher.publish(&batch).await {
                        Ok(()) => {
                            metrics
                                .entries_published
                                .fetch_add(batch.len() as u64, Ordering::Relaxed);
                        }
                        Err(e) => {
                            metrics.publish_failures.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %e, "failed to publish");
                        }
                    }
                    for entry in &batch {
                        if let Err(e) = file_writer.write(entry) {
                            metrics.file_failures.fetch_add(1, Ordering::Relaxed);
                            warn!(error = %e, "failed to write to logs");
                        }
                    }
                    debug!(entries = batch.len(), "wrote entries");
                }
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        // drain whatever is already queued, then flush once
                        while let Ok(entry) = entries.try_recv() {
                            buffer.push(entry);
                        }
                        flush(&mut buffer).await;
                        let snapshot = metrics.snapshot();
                        debug!(
                            published = snapshot.entries_published,
                            batches = snapshot.batches_flushed,
                            "background writer terminated"
                        );
                        return;
                    }
                    entry = entries.recv() => {
                        match entry {
                            Some(entry) => {
                                buffer.push(entry);
                                if buffer.len() >= FLUSH_WATERMARK {
                                    flush(&mut buffer).await;
                                }
                            }
                            None => {
                                flush(&mut buffer).await;
                                debug!("background writer drained");
                                return;
                            }
                        }
                    }
                    _ = ticker.tick() => flush(&mut buffer).await,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "forwarder_test.rs"]
mod forwarder_test;
