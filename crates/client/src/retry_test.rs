//! Tests for the retry strategy

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::retry::FixedDelay;

#[tokio::test]
async fn test_succeeds_after_failures() {
    let calls = AtomicUsize::new(0);
    let strategy = FixedDelay {
        repeats: 10,
        delay: Duration::from_millis(1),
    };

    let result: Result<usize, &str> = strategy
        .run(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 4 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result, Ok(4));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_exhausts_budget() {
    let calls = AtomicUsize::new(0);
    let strategy = FixedDelay {
        repeats: 3,
        delay: Duration::from_millis(1),
    };

    let result: Result<(), &str> = strategy
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always") }
        })
        .await;

    assert_eq!(result, Err("always"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_once_never_retries() {
    let calls = AtomicUsize::new(0);
    let result: Result<(), &str> = FixedDelay::once()
        .run(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
