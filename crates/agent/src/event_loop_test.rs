//! Tests for the event loop supervisor

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::{Event, EventStatus};
use crate::event_loop::{EventLoop, WriterFactory, WriterPair};
use crate::streamer::{EmitError, LogsEmitter, LogsOptions};
use crate::writer::{shared, WriteCloser};

struct SinkMock;

impl Write for SinkMock {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteCloser for SinkMock {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct SinkFactory;

#[async_trait]
impl WriterFactory for SinkFactory {
    async fn make(&self, _container_name: &str, _group: &str) -> io::Result<WriterPair> {
        Ok(WriterPair {
            log: shared(Box::new(SinkMock)),
            err: shared(Box::new(SinkMock)),
        })
    }
}

struct FailingFactory;

#[async_trait]
impl WriterFactory for FailingFactory {
    async fn make(&self, _container_name: &str, _group: &str) -> io::Result<WriterPair> {
        Err(io::Error::other("no writers for you"))
    }
}

/// Emitter that returns immediately, like a container with no more output.
struct NopEmitter;

#[async_trait]
impl LogsEmitter for NopEmitter {
    async fn logs(&self, _opts: LogsOptions) -> Result<(), EmitError> {
        Ok(())
    }
}

fn event(status: EventStatus, id: &str, name: &str, group: &str) -> Event {
    Event {
        status,
        container_id: id.into(),
        container_name: name.into(),
        group: group.into(),
    }
}

#[tokio::test]
async fn test_dedup_and_stop() {
    let (tx, rx) = mpsc::channel(10);
    tx.send(event(EventStatus::Started, "id1", "c1", "g1")).await.unwrap();
    tx.send(event(EventStatus::Started, "id2", "c2", "g1")).await.unwrap();
    tx.send(event(EventStatus::Started, "id3", "c3", "g2")).await.unwrap();
    tx.send(event(EventStatus::Started, "id3", "c3", "g2")).await.unwrap();
    tx.send(event(EventStatus::Stopped, "id1", "c1", "g1")).await.unwrap();
    drop(tx);

    let mut el = EventLoop::new(Arc::new(SinkFactory), Arc::new(NopEmitter), rx);

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });
    el.run(cancel).await;

    assert_eq!(el.active(), 2, "2 streams in, 1 removed, 1 dbl-start ignored");
    assert_eq!(el.streamer_name("id2"), Some("c2"));
    assert_eq!(el.streamer_name("id3"), Some("c3"));
    assert_eq!(el.streamer_name("id1"), None);
}

#[tokio::test]
async fn test_writer_factory_failure_ignores_event() {
    let (tx, rx) = mpsc::channel(10);
    tx.send(event(EventStatus::Started, "id1", "c1", "")).await.unwrap();
    drop(tx);

    let mut el = EventLoop::new(Arc::new(FailingFactory), Arc::new(NopEmitter), rx);

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });
    el.run(cancel).await;

    assert_eq!(el.active(), 0, "event with failing writers is ignored");
}

#[tokio::test]
async fn test_stop_for_unknown_container_ignored() {
    let (tx, rx) = mpsc::channel(10);
    tx.send(event(EventStatus::Stopped, "ghost", "c1", "")).await.unwrap();
    drop(tx);

    let mut el = EventLoop::new(Arc::new(SinkFactory), Arc::new(NopEmitter), rx);

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });
    el.run(cancel).await;

    assert_eq!(el.active(), 0);
}
