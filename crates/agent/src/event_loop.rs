//! Agent event loop
//!
//! Supervises one streamer per container id. A `started` event builds a
//! writer pair, constructs a [`ContainerStreamer`] and spawns its tail; a
//! `stopped` event (or loop shutdown) closes the streamer with a short
//! deadline. A duplicate `started` for an already-mapped id is a no-op.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::{Event, EventStatus};
use crate::streamer::{ContainerStreamer, LogsEmitter, StreamerParams};
use crate::writer::SharedWriter;

/// Streamer teardown budget.
const CLOSE_DEADLINE: Duration = Duration::from_millis(500);

/// Writers for one container's stdout and stderr. In mix mode both fields
/// hold the same value.
pub struct WriterPair {
    pub log: SharedWriter,
    pub err: SharedWriter,
}

/// Builds the writer pair for a starting container.
#[async_trait]
pub trait WriterFactory: Send + Sync {
    async fn make(&self, container_name: &str, group: &str) -> io::Result<WriterPair>;
}

struct StreamerHandle {
    streamer: Arc<ContainerStreamer>,
    /// Taken on close; `None` once the streamer was shut down.
    task: Option<JoinHandle<()>>,
}

/// Dynamic supervisor for container log streamers.
pub struct EventLoop {
    writer_factory: Arc<dyn WriterFactory>,
    emitter: Arc<dyn LogsEmitter>,
    events: mpsc::Receiver<Event>,
    streamers: HashMap<String, StreamerHandle>,
}

impl EventLoop {
    pub fn new(
        writer_factory: Arc<dyn WriterFactory>,
        emitter: Arc<dyn LogsEmitter>,
        events: mpsc::Receiver<Event>,
    ) -> EventLoop {
        EventLoop {
            writer_factory,
            emitter,
            events,
            streamers: HashMap::new(),
        }
    }

    /// Number of active streamers.
    pub fn active(&self) -> usize {
        self.streamers.len()
    }

    /// Name of the streamer mapped to a container id, if any.
    pub fn streamer_name(&self, container_id: &str) -> Option<&str> {
        self.streamers
            .get(container_id)
            .map(|h| h.streamer.name())
    }

    /// Blocking loop: react to events until the token fires, then close
    /// every active streamer with a short deadline each.
    pub async fn run(&mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!("event loop terminated");
                    self.close_all().await;
                    return;
                }
                event = self.events.recv() => {
                    match event {
                        Some(event) => {
                            debug!(?event, "received event");
                            self.on_event(event).await;
                        }
                        None => {
                            // source gone; hold the registry until shutdown
                            cancel.cancelled().await;
                            warn!("event loop terminated");
                            self.close_all().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn on_event(&mut self, event: Event) {
        match event.status {
            EventStatus::Started => self.on_started(event).await,
            EventStatus::Stopped => self.on_stopped(event).await,
        }
    }

    async fn on_started(&mut self, event: Event) {
        let pair = match self
            .writer_factory
            .make(&event.container_name, &event.group)
            .await
        {
            Ok(pair) => pair,
            Err(e) => {
                warn!(?event, error = %e, "ignore event, writers failed");
                return;
            }
        };

        if self.streamers.contains_key(&event.container_id) {
            warn!(?event, "ignore dbl-start");
            close_pair(&pair);
            return;
        }

        let streamer = Arc::new(ContainerStreamer::new(StreamerParams {
            id: event.container_id.clone(),
            name: event.container_name.clone(),
            log_writer: pair.log,
            err_writer: pair.err,
            emitter: Arc::clone(&self.emitter),
        }));

        let task_streamer = Arc::clone(&streamer);
        let task = tokio::spawn(async move {
            if let Err(e) = task_streamer.run().await {
                warn!(container = %task_streamer.name(), error = %e, "streamer terminated");
            }
        });

        self.streamers.insert(
            event.container_id,
            StreamerHandle {
                streamer,
                task: Some(task),
            },
        );
        debug!(active = self.streamers.len(), "streaming containers");
    }

    async fn on_stopped(&mut self, event: Event) {
        let Some(mut handle) = self.streamers.remove(&event.container_id) else {
            debug!(?event, "close for non-mapped container ignored");
            return;
        };

        debug!(?event, "close loggers");
        if let Some(task) = handle.task.take() {
            if let Err(e) = handle.streamer.close(task, CLOSE_DEADLINE).await {
                warn!(container = %event.container_name, error = %e, "close failed");
            }
        }
        debug!(active = self.streamers.len(), "streaming containers");
    }

    /// Close every streamer; registry entries stay mapped.
    async fn close_all(&mut self) {
        for (id, handle) in self.streamers.iter_mut() {
            let Some(task) = handle.task.take() else { continue };
            match handle.streamer.close(task, CLOSE_DEADLINE).await {
                Ok(()) => info!(container = %handle.streamer.name(), "closed logger stream"),
                Err(e) => warn!(container_id = %id, error = %e, "failed to close streamer"),
            }
        }
    }
}

/// Close the writers of a pair that never got a streamer.
fn close_pair(pair: &WriterPair) {
    if let Err(e) = pair.log.lock().close() {
        debug!(error = %e, "failed to close unused log writer");
    }
    if !Arc::ptr_eq(&pair.log, &pair.err) {
        if let Err(e) = pair.err.lock().close() {
            debug!(error = %e, "failed to close unused err writer");
        }
    }
}

#[cfg(test)]
#[path = "event_loop_test.rs"]
mod event_loop_test;
