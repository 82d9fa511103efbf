//! Tests for demo mode

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::demo::{DemoEmitter, DemoEvents};
use crate::event::EventStatus;
use crate::event_loop::{EventLoop, WriterFactory, WriterPair};
use crate::writer::{shared, WriteCloser};

#[derive(Clone, Default)]
struct BufMock {
    data: Arc<Mutex<Vec<u8>>>,
}

impl BufMock {
    fn lines(&self) -> usize {
        self.data.lock().iter().filter(|&&b| b == b'\n').count()
    }
}

impl Write for BufMock {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteCloser for BufMock {
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_demo_events_announce_three_containers() {
    let cancel = CancellationToken::new();
    let mut events = DemoEvents::channel(cancel.clone());

    let mut names = Vec::new();
    for _ in 0..3 {
        let event = events.recv().await.unwrap();
        assert_eq!(event.status, EventStatus::Started);
        names.push(event.container_name);
    }
    names.sort();
    assert_eq!(names, ["mongo", "nginx", "rest"]);

    cancel.cancel();
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn test_demo_pipeline_produces_lines() {
    struct SharedBufFactory {
        buf: BufMock,
    }

    #[async_trait]
    impl WriterFactory for SharedBufFactory {
        async fn make(&self, _container_name: &str, _group: &str) -> io::Result<WriterPair> {
            let w = shared(Box::new(self.buf.clone()) as Box<dyn WriteCloser>);
            Ok(WriterPair {
                log: w.clone(),
                err: w,
            })
        }
    }

    let buf = BufMock::default();
    let cancel = CancellationToken::new();
    let events = DemoEvents::channel(cancel.clone());
    let mut el = EventLoop::new(
        Arc::new(SharedBufFactory { buf: buf.clone() }),
        Arc::new(DemoEmitter {
            every: Duration::from_millis(50),
        }),
        events,
    );

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        canceller.cancel();
    });
    el.run(cancel).await;

    assert_eq!(el.active(), 3, "three demo streamers");
    assert!(
        buf.lines() >= 9,
        "expected a steady stream of demo lines, got {}",
        buf.lines()
    );
}
