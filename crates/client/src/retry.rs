//! Fixed-delay retry strategy

use std::future::Future;
use std::time::Duration;

/// Retry an operation up to `repeats` times, `delay` apart. The last
/// error wins when every attempt fails.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub repeats: usize,
    pub delay: Duration,
}

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay {
            repeats: 5,
            delay: Duration::from_millis(500),
        }
    }
}

impl FixedDelay {
    /// Run once, no retries.
    pub fn once() -> FixedDelay {
        FixedDelay {
            repeats: 1,
            delay: Duration::ZERO,
        }
    }

    /// Drive `op` until it succeeds or the attempt budget runs out.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut result = op().await;
        for _ in 1..self.repeats.max(1) {
            if result.is_ok() {
                break;
            }
            tokio::time::sleep(self.delay).await;
            result = op().await;
        }
        result
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;
