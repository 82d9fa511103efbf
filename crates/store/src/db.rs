//! Persistent capped engine on Turso (async SQLite-compatible)
//!
//! Records live in a single `entries` table keyed by the hex id; hex ids are
//! fixed-width lowercase, so text ordering on `id` is insertion ordering.
//! Timestamps are stored as fixed-precision RFC3339 UTC strings for the same
//! reason. Capped retention deletes oldest-first whenever the tracked byte
//! or document totals exceed the configured budget.
//!
//! Pattern filters are applied while streaming rows, so `limit` counts
//! matches rather than scanned rows.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dkll_core::{EntryId, LogEntry};
use parking_lot::Mutex;
use tracing::{debug, info};
use turso::{Builder, Database};

use crate::engine::{Engine, Order, ScanQuery};
use crate::error::StoreError;
use crate::mem::entry_size;

/// Default byte budget (10 GB).
pub const DEFAULT_MAX_BYTES: i64 = 10_000_000_000;

/// Default document budget.
pub const DEFAULT_MAX_DOCS: i64 = 50_000_000;

/// Oldest-first eviction granularity.
const EVICT_CHUNK: usize = 1000;

const SCHEMA_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id TEXT PRIMARY KEY,
    host TEXT NOT NULL,
    container TEXT NOT NULL,
    pid INTEGER NOT NULL DEFAULT 0,
    msg TEXT NOT NULL,
    ts TEXT NOT NULL,
    size INTEGER NOT NULL
)
"#;

const INDEX_HOST_CONTAINER_TS: &str =
    "CREATE INDEX IF NOT EXISTS idx_entries_host_container_ts ON entries(host, container, ts)";

const INDEX_TS_HOST_CONTAINER: &str =
    "CREATE INDEX IF NOT EXISTS idx_entries_ts_host_container ON entries(ts, host, container)";

const INDEX_CONTAINER_TS: &str =
    "CREATE INDEX IF NOT EXISTS idx_entries_container_ts ON entries(container, ts)";

/// Retention budgets for the capped table.
#[derive(Debug, Clone, Copy)]
pub struct TursoParams {
    pub max_bytes: i64,
    pub max_docs: i64,
}

impl Default for TursoParams {
    fn default() -> Self {
        TursoParams {
            max_bytes: DEFAULT_MAX_BYTES,
            max_docs: DEFAULT_MAX_DOCS,
        }
    }
}

/// Capped record engine backed by a local Turso database file.
pub struct TursoEngine {
    db: Database,
    params: TursoParams,
    totals: Mutex<Totals>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    docs: i64,
    bytes: i64,
}

impl TursoEngine {
    /// Open (or create) a database file and ensure schema and indexes.
    pub async fn open(path: &str, params: TursoParams) -> Result<TursoEngine, StoreError> {
        if let Some(dir) = Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        info!(path, max_bytes = params.max_bytes, max_docs = params.max_docs, "opening store");
        let db = Builder::new_local(path).build().await?;
        Self::init(db, params).await
    }

    /// In-memory database, for tests.
    pub async fn memory(params: TursoParams) -> Result<TursoEngine, StoreError> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::init(db, params).await
    }

    async fn init(db: Database, params: TursoParams) -> Result<TursoEngine, StoreError> {
        let conn = db.connect()?;
        conn.execute(SCHEMA_ENTRIES, ()).await?;
        conn.execute(INDEX_HOST_CONTAINER_TS, ()).await?;
        conn.execute(INDEX_TS_HOST_CONTAINER, ()).await?;
        conn.execute(INDEX_CONTAINER_TS, ()).await?;

        // seed retention totals from whatever is already on disk
        let mut totals = Totals::default();
        let mut rows = conn
            .query("SELECT COUNT(*), COALESCE(SUM(size), 0) FROM entries", ())
            .await?;
        if let Some(row) = rows.next().await? {
            totals.docs = *row.get_value(0)?.as_integer().unwrap_or(&0);
            totals.bytes = *row.get_value(1)?.as_integer().unwrap_or(&0);
        }
        debug!(docs = totals.docs, bytes = totals.bytes, "store totals loaded");

        Ok(TursoEngine {
            db,
            params,
            totals: Mutex::new(totals),
        })
    }

    /// Delete oldest records until both budgets hold again. Walks oldest
    /// rows in chunks and stops inside a chunk as soon as the budgets fit.
    async fn enforce_caps(&self, conn: &turso::Connection) -> Result<(), StoreError> {
        loop {
            let current = *self.totals.lock();
            if current.docs <= self.params.max_docs && current.bytes <= self.params.max_bytes {
                return Ok(());
            }

            let limit = EVICT_CHUNK.to_string();
            let mut rows = conn
                .query(
                    "SELECT id, size FROM entries ORDER BY id ASC LIMIT ?1",
                    [limit.as_str()],
                )
                .await?;

            let mut boundary = String::new();
            let mut evicted_docs = 0i64;
            let mut evicted_bytes = 0i64;
            while let Some(row) = rows.next().await? {
                if current.docs - evicted_docs <= self.params.max_docs
                    && current.bytes - evicted_bytes <= self.params.max_bytes
                {
                    break;
                }
                boundary = row.get(0)?;
                evicted_bytes += *row.get_value(1)?.as_integer().unwrap_or(&0);
                evicted_docs += 1;
            }
            if evicted_docs == 0 {
                return Ok(());
            }

            conn.execute("DELETE FROM entries WHERE id <= ?1", [boundary.as_str()])
                .await?;

            let mut totals = self.totals.lock();
            totals.docs -= evicted_docs;
            totals.bytes -= evicted_bytes;
            debug!(evicted = evicted_docs, "evicted oldest records over cap");
        }
    }

    fn row_to_entry(row: &turso::Row) -> Result<LogEntry, StoreError> {
        let id: String = row.get(0)?;
        let host: String = row.get(1)?;
        let container: String = row.get(2)?;
        let pid = *row.get_value(3)?.as_integer().unwrap_or(&0);
        let msg: String = row.get(4)?;
        let ts_raw: String = row.get(5)?;

        let ts = DateTime::parse_from_rfc3339(&ts_raw)
            .map_err(|e| StoreError::Corrupt(format!("bad ts {ts_raw:?}: {e}")))?
            .with_timezone(&Utc);

        let created_ts = Some(EntryId::decode(&id).timestamp());
        Ok(LogEntry {
            id,
            host,
            container,
            pid,
            msg,
            ts,
            created_ts,
        })
    }
}

/// Fixed-precision RFC3339 so text comparison is time comparison.
fn ts_key(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl Engine for TursoEngine {
    async fn append(&self, entries: &[LogEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let conn = self.db.connect()?;

        let mut batch_docs = 0i64;
        let mut batch_bytes = 0i64;
        for entry in entries {
            let size = entry_size(entry) as i64;
            let pid = entry.pid.to_string();
            let ts = ts_key(entry.ts);
            let size_str = size.to_string();
            conn.execute(
                r#"
                INSERT OR REPLACE INTO entries (id, host, container, pid, msg, ts, size)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                [
                    entry.id.as_str(),
                    entry.host.as_str(),
                    entry.container.as_str(),
                    pid.as_str(),
                    entry.msg.as_str(),
                    ts.as_str(),
                    size_str.as_str(),
                ],
            )
            .await?;
            batch_docs += 1;
            batch_bytes += size;
        }

        {
            let mut totals = self.totals.lock();
            totals.docs += batch_docs;
            totals.bytes += batch_bytes;
        }

        self.enforce_caps(&conn).await
    }

    async fn scan(&self, query: &ScanQuery) -> Result<Vec<LogEntry>, StoreError> {
        let conn = self.db.connect()?;

        let sql = match query.order {
            Order::Asc => {
                "SELECT id, host, container, pid, msg, ts FROM entries \
                 WHERE id > ?1 AND ts >= ?2 AND ts < ?3 ORDER BY id ASC"
            }
            Order::Desc => {
                "SELECT id, host, container, pid, msg, ts FROM entries \
                 WHERE id > ?1 AND ts >= ?2 AND ts < ?3 ORDER BY id DESC"
            }
        };

        let after = query.after.to_string();
        let from = ts_key(query.from_ts);
        let to = ts_key(query.to_ts);
        let mut rows = conn
            .query(sql, [after.as_str(), from.as_str(), to.as_str()])
            .await?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().await? {
            let entry = Self::row_to_entry(&row)?;
            if !query.fields_match(&entry.host, &entry.container) {
                continue;
            }
            result.push(entry);
            if result.len() >= query.limit {
                break;
            }
        }
        Ok(result)
    }

    async fn last(&self) -> Result<Option<LogEntry>, StoreError> {
        let conn = self.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, host, container, pid, msg, ts FROM entries ORDER BY id DESC LIMIT 1",
                (),
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::row_to_entry(&row)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "db_test.rs"]
mod db_test;
