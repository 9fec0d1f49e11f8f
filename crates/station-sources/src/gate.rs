//! Per-client request pacing.
//!
//! A counting semaphore bounds in-flight requests; every holder sleeps a
//! fixed delay after its request completes and only then gives the permit
//! back. With width N and delay D a client can never exceed N requests per
//! D, however fast the upstream answers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

/// Bounded-concurrency, fixed-delay gate shared by all requests of one client.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    width: usize,
    delay: Duration,
}

impl ConcurrencyGate {
    pub fn new(width: usize, delay: Duration) -> Self {
        let width = width.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(width)),
            width,
            delay,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` while holding a permit, then pace before releasing it.
    pub async fn run<T>(&self, task: impl Future<Output = T>) -> T {
        // The semaphore is never closed, so acquire only fails if that changes.
        let permit = self.semaphore.acquire().await.ok();
        let output = task.await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        drop(permit);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_width_bounds_in_flight() {
        let gate = ConcurrencyGate::new(2, Duration::ZERO);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..8).map(|_| {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tokio::spawn(async move {
                gate.run(async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            })
        });
        futures::future::join_all(tasks).await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delay_paces_release() {
        let gate = ConcurrencyGate::new(1, Duration::from_millis(30));
        let started = Instant::now();
        for _ in 0..3 {
            gate.run(async {}).await;
        }
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_zero_width_clamped() {
        let gate = ConcurrencyGate::new(0, Duration::ZERO);
        assert_eq!(gate.width(), 1);
    }
}
