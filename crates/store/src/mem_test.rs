//! Tests for the capped in-memory engine

use chrono::{Duration, TimeZone, Utc};
use dkll_core::{EntryId, LogEntry};

use crate::engine::{Engine, Order, ScanQuery};
use crate::mem::MemEngine;

fn rec(n: u32, msg: &str) -> LogEntry {
    LogEntry {
        id: format!("{:024x}", n + 1),
        host: "h1".into(),
        container: "c1".into(),
        msg: msg.into(),
        ts: Utc.with_ymd_and_hms(2019, 5, 24, 20, 54, 30).unwrap() + Duration::seconds(n as i64),
        ..LogEntry::default()
    }
}

fn scan_all(order: Order) -> ScanQuery {
    ScanQuery {
        after: EntryId::zero(),
        from_ts: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
        to_ts: Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap(),
        hosts: vec![],
        containers: vec![],
        excludes: vec![],
        limit: 100,
        order,
    }
}

#[tokio::test]
async fn test_evicts_over_doc_cap() {
    let engine = MemEngine::with_caps(usize::MAX, 3);
    let batch: Vec<LogEntry> = (0..5).map(|n| rec(n, &format!("m{n}"))).collect();
    engine.append(&batch).await.unwrap();

    assert_eq!(engine.len(), 3);
    let recs = engine.scan(&scan_all(Order::Asc)).await.unwrap();
    assert_eq!(recs[0].msg, "m2", "oldest two evicted");
    assert_eq!(recs[2].msg, "m4");
}

#[tokio::test]
async fn test_evicts_over_byte_cap() {
    // every record is well over 64 bytes, so a 200-byte budget keeps few
    let engine = MemEngine::with_caps(200, usize::MAX);
    let batch: Vec<LogEntry> = (0..10).map(|n| rec(n, "xxxxxxxxxx")).collect();
    engine.append(&batch).await.unwrap();

    assert!(engine.len() < 10, "byte cap must evict");
    let recs = engine.scan(&scan_all(Order::Asc)).await.unwrap();
    assert_eq!(recs.last().unwrap().msg, "xxxxxxxxxx");
}

#[tokio::test]
async fn test_desc_scan_respects_limit() {
    let engine = MemEngine::new();
    let batch: Vec<LogEntry> = (0..5).map(|n| rec(n, &format!("m{n}"))).collect();
    engine.append(&batch).await.unwrap();

    let mut query = scan_all(Order::Desc);
    query.limit = 2;
    let recs = engine.scan(&query).await.unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].msg, "m4", "descending starts at the tail");
    assert_eq!(recs[1].msg, "m3");
}

#[tokio::test]
async fn test_last() {
    let engine = MemEngine::new();
    assert!(engine.last().await.unwrap().is_none());

    let batch: Vec<LogEntry> = (0..3).map(|n| rec(n, &format!("m{n}"))).collect();
    engine.append(&batch).await.unwrap();
    assert_eq!(engine.last().await.unwrap().unwrap().msg, "m2");
}
