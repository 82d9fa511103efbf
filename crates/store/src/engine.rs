//! Storage engine seam
//!
//! The store's query model is engine-agnostic; an [`Engine`] only has to
//! append batches in order, scan by id with pushed-down bounds, and return
//! the newest record. Pattern filters are part of the scan so an engine can
//! stop reading once `limit` matches are collected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dkll_core::{pattern, EntryId, LogEntry, Pattern};

use crate::error::StoreError;

/// Scan direction, in id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// One scan over the store: id cursor, half-open time range, field filters
/// and a match limit.
pub struct ScanQuery {
    /// Only records with `id > after` qualify.
    pub after: EntryId,
    /// Inclusive lower time bound.
    pub from_ts: DateTime<Utc>,
    /// Exclusive upper time bound.
    pub to_ts: DateTime<Utc>,
    /// Host must match at least one element; empty disables the filter.
    pub hosts: Vec<Pattern>,
    /// Container must match at least one element; empty disables the filter.
    pub containers: Vec<Pattern>,
    /// Container must match no element.
    pub excludes: Vec<Pattern>,
    /// Stop after this many matches.
    pub limit: usize,
    /// Scan direction.
    pub order: Order,
}

impl ScanQuery {
    /// Apply the pattern filters to one record's fields. The id and time
    /// bounds are expected to be pushed down by the engine.
    pub fn fields_match(&self, host: &str, container: &str) -> bool {
        if !self.hosts.is_empty() && !pattern::any_match(&self.hosts, host) {
            return false;
        }
        if !self.containers.is_empty() && !pattern::any_match(&self.containers, container) {
            return false;
        }
        if pattern::any_match(&self.excludes, container) {
            return false;
        }
        true
    }
}

/// Ordered append-only record storage with capped retention.
///
/// Implementations drop oldest records once the configured byte or document
/// budget is exceeded.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Insert a batch in the given order. Records arrive with ids assigned.
    async fn append(&self, entries: &[LogEntry]) -> Result<(), StoreError>;

    /// Return up to `query.limit` matching records in `query.order`.
    async fn scan(&self, query: &ScanQuery) -> Result<Vec<LogEntry>, StoreError>;

    /// The record with the maximum id, if any.
    async fn last(&self) -> Result<Option<LogEntry>, StoreError>;
}
