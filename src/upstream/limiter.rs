//! Concurrency and start-rate limiting for upstream requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Instant, sleep_until};

use super::error::UpstreamError;

/// Runs at most `concurrency` tasks at once; excess callers wait in FIFO order.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl ConcurrencyLimiter {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<T, Fut>(&self, task: Fut) -> Result<T, UpstreamError>
    where
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| UpstreamError::LimiterClosed)?;
        task.await
    }
}

/// Spaces consecutive request starts at least `interval` apart.
///
/// Waiters queue on the mutex (FIFO) and hold it while sleeping, so start
/// times are stamped strictly one after another.
#[derive(Debug)]
pub struct RateGate {
    interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_allowed: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next start slot and claim it.
    pub async fn wait(&self) {
        let mut next_allowed = self.next_allowed.lock().await;
        if let Some(at) = *next_allowed {
            if at > Instant::now() {
                sleep_until(at).await;
            }
        }
        *next_allowed = Some(Instant::now() + self.interval);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Mutex as AsyncMutex;
    use tokio::time::sleep;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn limiter_caps_running_tasks() {
        let limiter = ConcurrencyLimiter::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    limiter
                        .run(async {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            sleep(Duration::from_millis(50)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.expect("task completes").expect("limiter open");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_releases_waiters_in_fifo_order() {
        let limiter = ConcurrencyLimiter::new(1);
        let order = Arc::new(AsyncMutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for index in 0..4 {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            tasks.push(tokio::spawn(async move {
                limiter
                    .run(async {
                        order.lock().await.push(index);
                        sleep(Duration::from_millis(10)).await;
                        Ok(())
                    })
                    .await
            }));
            // let each task reach the semaphore before spawning the next
            tokio::task::yield_now().await;
        }

        for task in tasks {
            task.await.expect("task completes").expect("limiter open");
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_to_one() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.concurrency(), 1);
        let value = limiter.run(async { Ok(7) }).await.expect("limiter open");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn limiter_propagates_task_errors() {
        let limiter = ConcurrencyLimiter::new(1);
        let result: Result<(), _> = limiter
            .run(async { Err(UpstreamError::InvalidUrl("nope".to_string())) })
            .await;
        assert!(matches!(result, Err(UpstreamError::InvalidUrl(_))));
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_spaces_concurrent_starts() {
        let gate = Arc::new(RateGate::new(Duration::from_millis(300)));
        let origin = Instant::now();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move {
                    gate.wait().await;
                    Instant::now()
                })
            })
            .collect();

        let mut starts = Vec::new();
        for task in tasks {
            starts.push(task.await.expect("task completes"));
        }
        starts.sort();

        assert_eq!(starts[0].duration_since(origin), Duration::ZERO);
        for pair in starts.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(300));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gate_does_not_wait_after_idle_period() {
        let gate = RateGate::new(Duration::from_millis(100));
        gate.wait().await;
        sleep(Duration::from_millis(500)).await;

        let before = Instant::now();
        gate.wait().await;
        assert_eq!(Instant::now().duration_since(before), Duration::ZERO);
    }
}
