//! Capped append-only record store
//!
//! [`LogStore`] implements the pipeline's query model on top of a pluggable
//! [`Engine`]:
//!
//! - `publish` inserts batches in order, assigning time-sortable ids to
//!   records that don't carry one, and caches the newest record
//! - `last_published` serves the cached record, falling back to an engine
//!   read on cold start
//! - `find` builds the filter set from a [`Request`]: id cursor, half-open
//!   time window, `/regex/`-or-literal host/container/exclude filters and a
//!   capped limit. An empty cursor means "newest page": the engine scans
//!   descending and the result is flipped to ascending before returning.
//!
//! Shipped engines: [`TursoEngine`] (persistent, capped SQLite-compatible
//! file) and [`MemEngine`] (capped ring, used by tests).

pub mod db;
pub mod engine;
pub mod error;
pub mod mem;

pub use db::{TursoEngine, TursoParams};
pub use engine::{Engine, Order, ScanQuery};
pub use error::StoreError;
pub use mem::MemEngine;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use dkll_core::{EntryId, IdGenerator, LogEntry, Pattern, Request};
use parking_lot::Mutex;
use tracing::debug;

/// Hard cap on one page of results, and the default when a request asks
/// for 0.
pub const MAX_FIND_LIMIT: usize = 1000;

/// Record store with the pipeline's query semantics.
pub struct LogStore {
    engine: Arc<dyn Engine>,
    ids: IdGenerator,
    last_published: Mutex<Option<LogEntry>>,
    limit: usize,
}

impl LogStore {
    /// Create a store over an engine with the default page cap.
    pub fn new(engine: Arc<dyn Engine>) -> LogStore {
        LogStore {
            engine,
            ids: IdGenerator::new(),
            last_published: Mutex::new(None),
            limit: MAX_FIND_LIMIT,
        }
    }

    /// Insert a batch in order. Records without an id get one assigned;
    /// `created_ts` is derived from the id. On success the newest record is
    /// cached for `last_published` and the `find` fast path.
    pub async fn publish(&self, mut records: Vec<LogEntry>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &mut records {
            if record.id.is_empty() {
                record.id = self.ids.next().to_string();
            }
            if record.created_ts.is_none() {
                record.created_ts = Some(EntryId::decode(&record.id).timestamp());
            }
        }
        self.engine.append(&records).await?;
        *self.last_published.lock() = records.last().cloned();
        debug!(records = records.len(), "published batch");
        Ok(())
    }

    /// Latest published record: the cached value, or an engine read when the
    /// cache is cold (fresh process over an existing database).
    pub async fn last_published(&self) -> Result<Option<LogEntry>, StoreError> {
        if let Some(entry) = self.last_published.lock().clone() {
            return Ok(Some(entry));
        }
        self.engine.last().await
    }

    /// Query records matching the request.
    pub async fn find(&self, req: &Request) -> Result<Vec<LogEntry>, StoreError> {
        let limit = match req.limit {
            0 => self.limit,
            n => n.min(self.limit),
        };

        let no_cursor = req.last_id.is_empty() || req.last_id == "0";

        // cursor at or past the cached tail: nothing new, skip the engine
        if !no_cursor {
            if let Some(cached) = self.last_published.lock().clone() {
                if !cached.id.is_empty() && req.last_id.as_str() >= cached.id.as_str() {
                    return Ok(Vec::new());
                }
            }
        }

        let query = ScanQuery {
            after: EntryId::decode(&req.last_id),
            from_ts: req.from_ts.unwrap_or_else(unbounded_from),
            to_ts: req.to_ts.unwrap_or_else(unbounded_to),
            hosts: Pattern::parse_all(&req.hosts)?,
            containers: Pattern::parse_all(&req.containers)?,
            excludes: Pattern::parse_all(&req.excludes)?,
            limit,
            order: if no_cursor { Order::Desc } else { Order::Asc },
        };

        let mut records = self.engine.scan(&query).await?;
        if no_cursor {
            // newest page was collected tail-first; present it ascending
            records.reverse();
        }
        debug!(req = %req, records = records.len(), "find");
        Ok(records)
    }
}

/// Lower time sentinel standing in for "unbounded".
fn unbounded_from() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

/// Upper time sentinel standing in for "unbounded".
fn unbounded_to() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap()
}
