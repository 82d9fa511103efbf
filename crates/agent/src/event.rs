//! Container lifecycle events and the discovery filter

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What happened to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Started,
    Stopped,
}

/// Normalized container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub status: EventStatus,
    pub container_id: String,
    pub container_name: String,
    /// Optional label placing the container's log files in a subdirectory.
    pub group: String,
}

/// Name-based include/exclude filter over raw runtime events.
///
/// A non-empty include list admits only listed names; otherwise a non-empty
/// exclude list rejects listed names; with both empty everything passes.
/// The two lists are mutually exclusive at the CLI.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl EventFilter {
    pub fn new(includes: Vec<String>, excludes: Vec<String>) -> EventFilter {
        EventFilter { includes, excludes }
    }

    /// Should events for this container be forwarded?
    pub fn allows(&self, container_name: &str) -> bool {
        if !self.includes.is_empty() {
            return self.includes.iter().any(|n| n == container_name);
        }
        if !self.excludes.is_empty() {
            return !self.excludes.iter().any(|n| n == container_name);
        }
        true
    }

    /// Apply the filter and name normalization to a raw event stream.
    /// Returns the filtered channel; the forwarding task stops with the
    /// token or when the raw stream closes.
    pub fn apply(
        self,
        mut raw: mpsc::Receiver<Event>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = raw.recv() => {
                        let Some(mut event) = event else { return };
                        normalize(&mut event);
                        if !self.allows(&event.container_name) {
                            debug!(container = %event.container_name, "event filtered out");
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        rx
    }
}

/// Strip the runtime's leading slash; a `group/name` shape fills the group
/// when the event has none.
fn normalize(event: &mut Event) {
    let name = event.container_name.trim_start_matches('/').to_string();
    match name.split_once('/') {
        Some((group, short)) if event.group.is_empty() => {
            event.group = group.to_string();
            event.container_name = short.to_string();
        }
        _ => event.container_name = name,
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;
