//! Minimum inter-call delay toward the external service

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum gap between consecutive calls. Callers serialize on the
/// internal lock, so the gap holds across every call sharing one `Pacer`,
/// not just within a single pipeline run.
#[derive(Debug)]
pub struct Pacer {
    min_gap: Duration,
    last: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last: Mutex::new(None),
        }
    }

    /// Wait until at least `min_gap` has passed since the previous call.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let pacer = Pacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_second_call_waits_out_the_gap() {
        let pacer = Pacer::new(Duration::from_millis(150));
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_gap_holds_across_concurrent_callers() {
        let pacer = std::sync::Arc::new(Pacer::new(Duration::from_millis(50)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pacer = pacer.clone();
            handles.push(tokio::spawn(async move { pacer.wait().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 4 calls = 3 enforced gaps
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
