//! File fan-out
//!
//! Writes every entry twice: the rendered line to the shared merged writer
//! and the raw message to a per-(host, container) writer created lazily by
//! a factory callback. One mutex serializes both writes, since the merged
//! file is shared across all keys and ordering there must follow write
//! order.

use std::collections::HashMap;
use std::io::{self, Write};

use dkll_core::LogEntry;
use parking_lot::Mutex;

use crate::forwarder::FileWriter;

/// Creates the writer for a given (host, container) pair.
pub type WritersFactory = Box<dyn Fn(&str, &str) -> Box<dyn Write + Send> + Send + Sync>;

/// Merged + per-container file fan-out.
pub struct FileLogger {
    inner: Mutex<Inner>,
}

struct Inner {
    merged: Box<dyn Write + Send>,
    factory: WritersFactory,
    writers: HashMap<(String, String), Box<dyn Write + Send>>,
}

impl FileLogger {
    /// Create the fan-out over a merged writer and a per-key factory.
    pub fn new(factory: WritersFactory, merged: Box<dyn Write + Send>) -> FileLogger {
        FileLogger {
            inner: Mutex::new(Inner {
                merged,
                factory,
                writers: HashMap::new(),
            }),
        }
    }
}

impl FileWriter for FileLogger {
    /// Both writes are always attempted; their errors are combined.
    fn write(&self, entry: &LogEntry) -> io::Result<()> {
        let mut inner = self.inner.lock();
        let mut failures: Vec<String> = Vec::new();

        let line = format!("{entry}\n");
        if let Err(e) = inner.merged.write_all(line.as_bytes()) {
            failures.push(format!("merged: {e}"));
        }

        let key = (entry.host.clone(), entry.container.clone());
        if !inner.writers.contains_key(&key) {
            let writer = (inner.factory)(&entry.host, &entry.container);
            inner.writers.insert(key.clone(), writer);
        }
        let writer = inner.writers.get_mut(&key).expect("writer just inserted");
        if let Err(e) = writer.write_all(format!("{}\n", entry.msg).as_bytes()) {
            failures.push(format!("{}/{}: {e}", entry.host, entry.container));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(io::Error::other(failures.join("; ")))
        }
    }
}

#[cfg(test)]
#[path = "file_logger_test.rs"]
mod file_logger_test;
