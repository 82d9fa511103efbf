//! Tests for the forwarder pipeline

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dkll_core::LogEntry;
use dkll_store::StoreError;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::forwarder::{FileWriter, Forwarder, Publisher};
use crate::syslog::{LineSource, SyslogError};

/// Line source preloading 100 good lines and one that fails the file sink.
struct MockLineSource;

#[async_trait]
impl LineSource for MockLineSource {
    async fn open(
        &self,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<String>, SyslogError> {
        let (tx, rx) = mpsc::channel(128);
        for i in 0..100 {
            tx.send(format!(
                "May 30 18:03:28 BigMac.local docker/test123[63415]: some msg {i}"
            ))
            .await
            .expect("preload");
        }
        tx.send("May 30 18:03:28 BigMac.local docker/err[63415]: some bad msg".into())
            .await
            .expect("preload");
        tx.send("bad line without a valid timestamp".into())
            .await
            .expect("preload");
        // sender dropped here, channel closes after the preload drains
        Ok(rx)
    }
}

#[derive(Default)]
struct MockPublisher {
    recs: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, records: &[LogEntry]) -> Result<(), StoreError> {
        let mut err = None;
        let mut recs = self.recs.lock();
        for rec in records {
            if rec.container == "err" {
                err = Some(StoreError::Corrupt("publisher error".into()));
                continue;
            }
            recs.push(rec.clone());
        }
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn last_published(&self) -> Result<Option<LogEntry>, StoreError> {
        Ok(None)
    }
}

#[derive(Default)]
struct MockFileWriter {
    recs: Mutex<Vec<LogEntry>>,
}

impl FileWriter for MockFileWriter {
    fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        if entry.container == "err" {
            return Err(std::io::Error::other("file write error"));
        }
        self.recs.lock().push(entry.clone());
        Ok(())
    }
}

fn forwarder(
    publisher: Arc<MockPublisher>,
    file_writer: Arc<MockFileWriter>,
) -> Forwarder {
    Forwarder::new(publisher, file_writer, Arc::new(MockLineSource), chrono_tz::UTC)
}

#[tokio::test]
async fn test_all_valid_records_forwarded() {
    let publisher = Arc::new(MockPublisher::default());
    let file_writer = Arc::new(MockFileWriter::default());
    let f = forwarder(publisher.clone(), file_writer.clone());

    let cancel = CancellationToken::new();
    let cancel_in = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        cancel_in.cancel();
    });

    let metrics = f.metrics();
    f.run(cancel).await.unwrap();

    assert_eq!(publisher.recs.lock().len(), 100, "all valid records published");
    assert_eq!(file_writer.recs.lock().len(), 100, "all valid records filed");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.entries_parsed, 101, "100 good + 1 for the err container");
    assert_eq!(snapshot.parse_failures, 1, "the timestamp-less line");
    assert!(snapshot.batches_flushed >= 1);
    assert_eq!(snapshot.publish_failures, 1, "the err-container batch");
    assert_eq!(snapshot.file_failures, 1);
}

#[tokio::test]
async fn test_fast_close_still_flushes() {
    let publisher = Arc::new(MockPublisher::default());
    let file_writer = Arc::new(MockFileWriter::default());
    let f = forwarder(publisher.clone(), file_writer.clone());

    let cancel = CancellationToken::new();
    let cancel_in = cancel.clone();
    tokio::spawn(async move {
        // before the first 500ms tick: the shutdown flush must deliver
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel_in.cancel();
    });

    f.run(cancel).await.unwrap();

    assert_eq!(publisher.recs.lock().len(), 100);
    assert_eq!(file_writer.recs.lock().len(), 100);
}

#[tokio::test]
async fn test_publish_error_does_not_stop_pipeline() {
    // the "err" record fails both sinks, the rest must still arrive
    let publisher = Arc::new(MockPublisher::default());
    let file_writer = Arc::new(MockFileWriter::default());
    let f = forwarder(publisher.clone(), file_writer.clone());

    let cancel = CancellationToken::new();
    let cancel_in = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel_in.cancel();
    });

    f.run(cancel).await.unwrap();

    let published = publisher.recs.lock();
    assert_eq!(published.len(), 100);
    assert!(published.iter().all(|r| r.container == "test123"));
}
