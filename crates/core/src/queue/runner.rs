//! Acquisition queue implementation.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::backoff::backoff_delay;
use super::config::QueueConfig;
use super::pacer::RequestPacer;
use super::types::{JobState, QueueStats, Throttling};
use crate::metrics;

/// A job waiting for a running slot.
struct Waiter {
    id: u64,
    priority: i32,
    /// Requeued after throttling; admitted before fresh jobs.
    front: bool,
    wake: oneshot::Sender<()>,
}

#[derive(Default)]
struct Slots {
    active: usize,
    waiting: Vec<Waiter>,
}

/// Bounded, paced, retrying job queue.
///
/// Jobs are closures producing a future; the queue may call a closure
/// several times when the upstream throttles.
pub struct AcquisitionQueue {
    config: QueueConfig,
    pacer: RequestPacer,
    slots: Mutex<Slots>,
    next_id: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

impl AcquisitionQueue {
    pub fn new(config: QueueConfig) -> Self {
        let pacer = RequestPacer::new(
            config.requests_per_minute,
            config.min_request_delay(),
            config.max_domain_delay(),
        );
        Self {
            config,
            pacer,
            slots: Mutex::new(Slots::default()),
            next_id: AtomicU64::new(1),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retried: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// The pacer shared by every job.
    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// Run `task` once a slot is free and the pacer allows a request to `domain`.
    ///
    /// Throttled failures are retried up to `max_retries` times; the job
    /// leaves its slot while backing off and re-enters ahead of fresh jobs.
    /// Any other failure, or a throttle with no retries left, is returned.
    pub async fn submit<T, E, F, Fut>(&self, domain: &str, priority: i32, mut task: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Throttling + Display,
    {
        let job_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut throttles: u32 = 0;
        let mut front = false;

        loop {
            debug!(job = job_id, state = %JobState::Queued, domain, priority);
            let permit = self.admit(priority, front).await;

            let wait = self.pacer.reserve(domain).await;
            if !wait.is_zero() {
                debug!(job = job_id, wait_ms = wait.as_millis() as u64, "Pacing request");
                sleep(wait).await;
            }

            debug!(job = job_id, state = %JobState::Running, domain);
            let started = Instant::now();
            let outcome = task().await;
            drop(permit);

            match outcome {
                Ok(value) => {
                    self.pacer.record_success(domain).await;
                    self.completed.fetch_add(1, Ordering::Relaxed);
                    metrics::QUEUE_JOBS.with_label_values(&["succeeded"]).inc();
                    debug!(
                        job = job_id,
                        state = %JobState::Succeeded,
                        "Task completed in {}ms",
                        started.elapsed().as_millis()
                    );
                    return Ok(value);
                }
                Err(e) if e.is_throttled() && throttles < self.config.max_retries => {
                    throttles += 1;
                    self.pacer.record_throttle(domain).await;
                    self.retried.fetch_add(1, Ordering::Relaxed);
                    metrics::QUEUE_RETRIES.inc();
                    metrics::THROTTLE_EVENTS.with_label_values(&[domain]).inc();

                    let delay = backoff_delay(
                        self.config.retry_base(),
                        throttles,
                        self.config.jitter(),
                        self.config.max_backoff(),
                    );
                    warn!(
                        job = job_id,
                        state = %JobState::Retrying,
                        attempt = throttles,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, retrying ({} left)",
                        self.config.max_retries - throttles
                    );
                    sleep(delay).await;
                    front = true;
                }
                Err(e) => {
                    if e.is_throttled() {
                        self.pacer.record_throttle(domain).await;
                        metrics::THROTTLE_EVENTS.with_label_values(&[domain]).inc();
                    }
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    metrics::QUEUE_JOBS.with_label_values(&["failed"]).inc();
                    warn!(
                        job = job_id,
                        state = %JobState::Failed,
                        "Task failed after {}ms: {}",
                        started.elapsed().as_millis(),
                        e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Snapshot of queue activity.
    pub async fn stats(&self) -> QueueStats {
        let (queued, active) = {
            let slots = self.slots.lock().unwrap();
            (slots.waiting.len(), slots.active)
        };
        QueueStats {
            queued,
            active,
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            requests_in_window: self.pacer.requests_in_window().await,
        }
    }

    async fn admit(&self, priority: i32, front: bool) -> SlotPermit<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (wake, woken) = oneshot::channel();

        {
            let mut slots = self.slots.lock().unwrap();
            slots.waiting.push(Waiter {
                id,
                priority,
                front,
                wake,
            });
            self.dispatch(&mut slots);
        }

        let mut pending = PendingAdmission {
            queue: self,
            id,
            armed: true,
        };
        // The sender is only dropped after being used by dispatch.
        let _ = woken.await;
        pending.armed = false;

        SlotPermit { queue: self }
    }

    /// Hand free slots to the best waiters: requeued jobs first, then
    /// higher priority, then arrival order.
    fn dispatch(&self, slots: &mut Slots) {
        let cap = self.config.max_concurrent.max(1);
        while slots.active < cap && !slots.waiting.is_empty() {
            let mut best = 0;
            for (idx, waiter) in slots.waiting.iter().enumerate().skip(1) {
                let current = &slots.waiting[best];
                if (waiter.front, waiter.priority) > (current.front, current.priority) {
                    best = idx;
                }
            }
            let waiter = slots.waiting.remove(best);
            slots.active += 1;
            // A closed receiver means the waiting future was dropped;
            // its PendingAdmission guard releases the slot.
            let _ = waiter.wake.send(());
        }
    }

    fn release(&self) {
        let mut slots = self.slots.lock().unwrap();
        slots.active = slots.active.saturating_sub(1);
        self.dispatch(&mut slots);
    }
}

/// Held while a job occupies a running slot.
struct SlotPermit<'a> {
    queue: &'a AcquisitionQueue,
}

impl Drop for SlotPermit<'_> {
    fn drop(&mut self) {
        self.queue.release();
    }
}

/// Cleans up when a job is dropped while waiting for admission.
struct PendingAdmission<'a> {
    queue: &'a AcquisitionQueue,
    id: u64,
    armed: bool,
}

impl Drop for PendingAdmission<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.queue.slots.lock().unwrap();
        if let Some(pos) = slots.waiting.iter().position(|w| w.id == self.id) {
            slots.waiting.remove(pos);
        } else {
            // Already dispatched; give the slot back.
            slots.active = slots.active.saturating_sub(1);
            self.queue.dispatch(&mut slots);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct TestError {
        throttled: bool,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            if self.throttled {
                write!(f, "HTTP 429")
            } else {
                write!(f, "boom")
            }
        }
    }

    impl Throttling for TestError {
        fn is_throttled(&self) -> bool {
            self.throttled
        }
    }

    fn fast_config(max_concurrent: usize) -> QueueConfig {
        QueueConfig {
            max_concurrent,
            requests_per_minute: 1000,
            min_request_delay_ms: 0,
            jitter_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_cap() {
        let queue = AcquisitionQueue::new(fast_config(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..8).map(|i| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            queue.submit("subs.ro", 0, move || {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(100)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, TestError>(i)
                }
            })
        });

        let results = futures::future::join_all(jobs).await;
        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(peak.load(Ordering::SeqCst), 2);

        let stats = queue.stats().await;
        assert_eq!(stats.completed, 8);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_order_among_queued() {
        let queue = AcquisitionQueue::new(fast_config(1));
        let order = Arc::new(Mutex::new(Vec::new()));

        let job = |name: &'static str, priority: i32| {
            let order = Arc::clone(&order);
            queue.submit("subs.ro", priority, move || {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(name);
                    sleep(Duration::from_millis(50)).await;
                    Ok::<_, TestError>(())
                }
            })
        };

        let (a, b, c, d) = tokio::join!(
            job("blocker", 0),
            job("low", 0),
            job("high", 5),
            job("mid", 2)
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());
        assert_eq!(
            *order.lock().unwrap(),
            vec!["blocker", "high", "mid", "low"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_job_retries_then_succeeds() {
        let queue = AcquisitionQueue::new(fast_config(2));
        let attempts = AtomicUsize::new(0);

        let result = queue
            .submit("subs.ro", 0, || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError { throttled: true })
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let stats = queue.stats().await;
        assert_eq!(stats.retried, 2);
        assert_eq!(stats.completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let queue = AcquisitionQueue::new(fast_config(1));
        let attempts = AtomicUsize::new(0);

        let result: Result<(), TestError> = queue
            .submit("subs.ro", 0, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { throttled: true }) }
            })
            .await;

        assert!(result.unwrap_err().is_throttled());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);

        let stats = queue.stats().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.retried, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_throttle_failure_not_retried() {
        let queue = AcquisitionQueue::new(fast_config(1));
        let attempts = AtomicUsize::new(0);

        let result: Result<(), TestError> = queue
            .submit("subs.ro", 0, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError { throttled: false }) }
            })
            .await;

        assert!(!result.unwrap_err().is_throttled());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().await.retried, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_releases_slot() {
        let queue = AcquisitionQueue::new(fast_config(1));
        let throttled_once = AtomicUsize::new(0);
        let order = Mutex::new(Vec::new());

        let flaky = queue.submit("subs.ro", 0, || {
            let n = throttled_once.fetch_add(1, Ordering::SeqCst);
            order.lock().unwrap().push(format!("flaky-{}", n));
            async move {
                if n == 0 {
                    Err(TestError { throttled: true })
                } else {
                    Ok(())
                }
            }
        });
        let other = queue.submit("subs.ro", 0, || {
            order.lock().unwrap().push("other".to_string());
            async { Ok::<_, TestError>(()) }
        });

        let (a, b) = tokio::join!(flaky, other);
        assert!(a.is_ok() && b.is_ok());
        // The other job ran while the flaky one backed off.
        assert_eq!(*order.lock().unwrap(), vec!["flaky-0", "other", "flaky-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_job_releases_slot() {
        let queue = AcquisitionQueue::new(fast_config(1));
        let blocker = queue.submit("subs.ro", 0, || async {
            sleep(Duration::from_millis(100)).await;
            Ok::<_, TestError>(())
        });

        tokio::select! {
            _ = blocker => panic!("blocker should still be running"),
            _ = sleep(Duration::from_millis(10)) => {}
        }

        // The blocker future was dropped mid-run; its slot must come back.
        let stats = queue.stats().await;
        assert_eq!(stats.active, 0);

        let result = queue
            .submit("subs.ro", 0, || async { Ok::<_, TestError>(1) })
            .await;
        assert_eq!(result.unwrap(), 1);
    }
}
