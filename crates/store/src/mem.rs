//! In-memory capped engine
//!
//! A ring of records bounded by byte and document budgets, used by unit
//! tests and as a no-persistence fallback. Semantics match the persistent
//! engine: append order is id order, oldest records are evicted first.

use std::collections::VecDeque;

use async_trait::async_trait;
use dkll_core::{EntryId, LogEntry};
use parking_lot::Mutex;

use crate::engine::{Engine, Order, ScanQuery};
use crate::error::StoreError;

/// Default byte budget: 10 GB, matching the persistent engine default.
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024 * 1024;

/// Default document budget.
pub const DEFAULT_MAX_DOCS: usize = 50_000_000;

/// Capped in-memory record ring.
pub struct MemEngine {
    max_bytes: usize,
    max_docs: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: VecDeque<LogEntry>,
    bytes: usize,
}

impl MemEngine {
    /// Create an engine with the default budgets.
    pub fn new() -> MemEngine {
        MemEngine::with_caps(DEFAULT_MAX_BYTES, DEFAULT_MAX_DOCS)
    }

    /// Create an engine with explicit byte and document budgets.
    pub fn with_caps(max_bytes: usize, max_docs: usize) -> MemEngine {
        MemEngine {
            max_bytes,
            max_docs,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemEngine {
    fn default() -> Self {
        MemEngine::new()
    }
}

/// Approximate retained size of one record.
pub(crate) fn entry_size(entry: &LogEntry) -> usize {
    64 + entry.id.len() + entry.host.len() + entry.container.len() + entry.msg.len()
}

#[async_trait]
impl Engine for MemEngine {
    async fn append(&self, entries: &[LogEntry]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        for entry in entries {
            inner.bytes += entry_size(entry);
            inner.entries.push_back(entry.clone());
        }
        while inner.entries.len() > self.max_docs || inner.bytes > self.max_bytes {
            match inner.entries.pop_front() {
                Some(evicted) => inner.bytes -= entry_size(&evicted),
                None => break,
            }
        }
        Ok(())
    }

    async fn scan(&self, query: &ScanQuery) -> Result<Vec<LogEntry>, StoreError> {
        let inner = self.inner.lock();

        let qualifies = |entry: &LogEntry| -> bool {
            EntryId::decode(&entry.id) > query.after
                && entry.ts >= query.from_ts
                && entry.ts < query.to_ts
                && query.fields_match(&entry.host, &entry.container)
        };

        let mut result = Vec::new();
        match query.order {
            Order::Asc => {
                for entry in inner.entries.iter() {
                    if qualifies(entry) {
                        result.push(entry.clone());
                        if result.len() >= query.limit {
                            break;
                        }
                    }
                }
            }
            Order::Desc => {
                for entry in inner.entries.iter().rev() {
                    if qualifies(entry) {
                        result.push(entry.clone());
                        if result.len() >= query.limit {
                            break;
                        }
                    }
                }
            }
        }
        Ok(result)
    }

    async fn last(&self) -> Result<Option<LogEntry>, StoreError> {
        Ok(self.inner.lock().entries.back().cloned())
    }
}

#[cfg(test)]
#[path = "mem_test.rs"]
mod mem_test;
