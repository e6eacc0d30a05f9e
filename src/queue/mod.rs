//! In-Process Job Queue
//!
//! Minimal time-sliced task queue decoupling the fast synchronous request
//! path from slow multi-call enrichment. No durable broker: jobs live only
//! in memory and die with the process.
//!
//! ## Semantics
//!
//! - Strictly sequential: at most one job is in flight at any moment. The
//!   drain loop is a single task, and a boolean in-flight flag guards the
//!   tick path against the on-enqueue trigger.
//! - Bounded retry: a failing job is reinserted at the FRONT of the queue
//!   (priority retry) until its attempts are exhausted, then dropped with
//!   an error log. The orchestrator is responsible for any terminal status
//!   write on the word record itself.
//! - No duplicate detection: callers must avoid double-enqueue.
//!
//! Per-job state machine: `queued -> processing -> (done | requeued | abandoned)`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::types::{Result, WallError};

// =============================================================================
// Jobs
// =============================================================================

/// Job kinds the queue can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    EnrichWord,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnrichWord => "enrich-word",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strongly-typed job payloads, one variant per kind.
#[derive(Debug, Clone)]
pub enum JobPayload {
    EnrichWord { word_id: i64, word: String },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::EnrichWord { .. } => JobKind::EnrichWord,
        }
    }
}

/// One queued unit of work. Ephemeral: owned exclusively by the queue, and
/// handed to the drain loop by value while in flight.
#[derive(Debug, Clone)]
struct Job {
    id: Uuid,
    payload: JobPayload,
    attempts: u32,
    max_attempts: u32,
    created_at: DateTime<Utc>,
    not_before: DateTime<Utc>,
}

/// Options for [`JobQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Hold the job back for this long before it becomes eligible.
    pub delay: Option<Duration>,
    /// Override the queue's default attempt bound.
    pub max_attempts: Option<u32>,
}

/// Snapshot of queue state for status probes.
#[derive(Debug, Clone, Copy)]
pub struct QueueStatus {
    pub queue_size: usize,
    pub processing: bool,
}

// =============================================================================
// Handler Trait
// =============================================================================

/// Handler for one job kind. Registered with the queue by the composition
/// root after construction.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn handle(&self, payload: &JobPayload) -> Result<()>;
}

// =============================================================================
// Queue
// =============================================================================

struct QueueInner {
    jobs: Mutex<VecDeque<Job>>,
    handlers: RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>,
    notify: Notify,
    /// In-flight guard: the tick path and the on-enqueue trigger must never
    /// run the dequeue-and-process step concurrently with itself.
    processing: AtomicBool,
    shutdown: AtomicBool,
    tick_interval: Duration,
    default_max_attempts: u32,
}

/// In-process job queue with explicit lifecycle (`start`, `enqueue`,
/// `shutdown`), owned by the composition root and passed by reference to
/// the orchestrator.
pub struct JobQueue {
    inner: Arc<QueueInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                jobs: Mutex::new(VecDeque::new()),
                handlers: RwLock::new(HashMap::new()),
                notify: Notify::new(),
                processing: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                tick_interval: Duration::from_millis(config.tick_interval_ms),
                default_max_attempts: config.max_attempts,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Register the handler for a job kind. Later registrations for the
    /// same kind replace earlier ones.
    pub fn register(&self, handler: Arc<dyn JobHandler>) {
        let kind = handler.kind();
        if let Ok(mut handlers) = self.inner.handlers.write() {
            handlers.insert(kind, handler);
        }
    }

    /// Start the background drain loop: a fixed-interval tick plus an
    /// immediate wake on enqueue, draining at most one job per wake.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            info!("Job queue started");
            let mut tick = tokio::time::interval(inner.tick_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    _ = inner.notify.notified() => {}
                }
                if inner.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                QueueInner::process_next(&inner).await;
            }
            info!("Job queue stopped");
        });

        if let Ok(mut worker) = self.worker.lock() {
            *worker = Some(handle);
        }
    }

    /// Append a job to the queue. Does not block the caller; the drain
    /// loop is woken immediately. Fails only when the queue is shut down,
    /// in which case the caller may fall back to running the work inline.
    pub fn enqueue(&self, payload: JobPayload, options: EnqueueOptions) -> Result<()> {
        if self.inner.shutdown.load(Ordering::SeqCst) {
            return Err(WallError::Queue("queue is shut down".to_string()));
        }

        let now = Utc::now();
        let not_before = options
            .delay
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now + d)
            .unwrap_or(now);
        let job = Job {
            id: Uuid::new_v4(),
            payload,
            attempts: 0,
            max_attempts: options
                .max_attempts
                .unwrap_or(self.inner.default_max_attempts),
            created_at: now,
            not_before,
        };

        let queue_size = {
            let mut jobs = self
                .inner
                .jobs
                .lock()
                .map_err(|_| WallError::Queue("queue mutex poisoned".to_string()))?;
            jobs.push_back(job);
            jobs.len()
        };
        debug!(queue_size, "Job enqueued");

        self.inner.notify.notify_one();
        Ok(())
    }

    /// Queue size and in-flight flag, for status probes.
    pub fn status(&self) -> QueueStatus {
        let queue_size = self.inner.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0);
        QueueStatus {
            queue_size,
            processing: self.inner.processing.load(Ordering::SeqCst),
        }
    }

    /// Stop the drain loop. Pending jobs are discarded (the queue is not
    /// durable); a job currently in flight finishes its attempt.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();

        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl QueueInner {
    /// Dequeue and process at most one eligible job.
    async fn process_next(inner: &Arc<QueueInner>) {
        // In-flight guard: never run concurrently with ourselves.
        if inner
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let job = {
            match inner.jobs.lock() {
                Ok(mut jobs) => {
                    // Delayed jobs hold their place in line until eligible.
                    let eligible = jobs
                        .front()
                        .map(|job| job.not_before <= Utc::now())
                        .unwrap_or(false);
                    if eligible { jobs.pop_front() } else { None }
                }
                Err(_) => None,
            }
        };

        let Some(mut job) = job else {
            inner.processing.store(false, Ordering::SeqCst);
            return;
        };

        job.attempts += 1;
        let kind = job.payload.kind();
        info!(job_id = %job.id, %kind, attempt = job.attempts, "Processing job");

        let handler = inner
            .handlers
            .read()
            .ok()
            .and_then(|handlers| handlers.get(&kind).cloned());

        match handler {
            None => {
                warn!(%kind, "No handler registered, skipping job");
            }
            Some(handler) => match handler.handle(&job.payload).await {
                Ok(()) => {
                    debug!(job_id = %job.id, %kind, "Job completed");
                }
                Err(e) => {
                    error!(job_id = %job.id, %kind, attempt = job.attempts, "Job failed: {}", e);
                    if job.attempts < job.max_attempts {
                        info!(
                            job_id = %job.id,
                            %kind,
                            "Retrying job (attempt {}/{})",
                            job.attempts + 1,
                            job.max_attempts
                        );
                        if let Ok(mut jobs) = inner.jobs.lock() {
                            jobs.push_front(job);
                        }
                    } else {
                        error!(
                            job_id = %job.id,
                            %kind,
                            age_ms = (Utc::now() - job.created_at).num_milliseconds(),
                            "Job failed after {} attempts. Giving up.",
                            job.attempts
                        );
                    }
                }
            },
        }

        inner.processing.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn test_queue(tick_ms: u64, max_attempts: u32) -> JobQueue {
        JobQueue::new(&QueueConfig {
            tick_interval_ms: tick_ms,
            max_attempts,
        })
    }

    fn payload(word_id: i64) -> JobPayload {
        JobPayload::EnrichWord {
            word_id,
            word: format!("word-{word_id}"),
        }
    }

    /// Handler that records each invocation and fails the first
    /// `failures_before_success` calls per word.
    struct RecordingHandler {
        calls: Mutex<Vec<i64>>,
        in_flight: AtomicU32,
        max_observed_in_flight: AtomicU32,
        failures_before_success: HashMap<i64, u32>,
        attempts_seen: Mutex<HashMap<i64, u32>>,
    }

    impl RecordingHandler {
        fn new(failures_before_success: HashMap<i64, u32>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicU32::new(0),
                max_observed_in_flight: AtomicU32::new(0),
                failures_before_success,
                attempts_seen: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self) -> Vec<i64> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        fn kind(&self) -> JobKind {
            JobKind::EnrichWord
        }

        async fn handle(&self, payload: &JobPayload) -> Result<()> {
            let JobPayload::EnrichWord { word_id, .. } = payload;

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed_in_flight
                .fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;

            self.calls.lock().expect("calls lock").push(*word_id);
            let attempt = {
                let mut seen = self.attempts_seen.lock().expect("attempts lock");
                let entry = seen.entry(*word_id).or_insert(0);
                *entry += 1;
                *entry
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let failures = self.failures_before_success.get(word_id).copied().unwrap_or(0);
            if attempt <= failures {
                Err(WallError::Queue(format!("induced failure {attempt}")))
            } else {
                Ok(())
            }
        }
    }

    async fn wait_until_drained(queue: &JobQueue) {
        for _ in 0..200 {
            let status = queue.status();
            if status.queue_size == 0 && !status.processing {
                // One extra tick so a just-finished attempt can't requeue behind us
                tokio::time::sleep(Duration::from_millis(30)).await;
                let status = queue.status();
                if status.queue_size == 0 && !status.processing {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue did not drain");
    }

    #[tokio::test]
    async fn test_success_path_single_attempt() {
        let queue = test_queue(10, 3);
        let handler = Arc::new(RecordingHandler::new(HashMap::new()));
        queue.register(handler.clone());
        queue.start();

        queue.enqueue(payload(1), EnqueueOptions::default()).expect("enqueue");
        wait_until_drained(&queue).await;

        assert_eq!(handler.calls(), vec![1]);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_retry_bound_exactly_three_attempts() {
        let queue = test_queue(10, 3);
        // Fails forever
        let handler = Arc::new(RecordingHandler::new(HashMap::from([(1, u32::MAX)])));
        queue.register(handler.clone());
        queue.start();

        queue.enqueue(payload(1), EnqueueOptions::default()).expect("enqueue");
        wait_until_drained(&queue).await;

        assert_eq!(handler.calls(), vec![1, 1, 1]);
        assert_eq!(queue.status().queue_size, 0);

        // No fourth attempt shows up later
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.calls().len(), 3);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_job_retries_before_next_job() {
        let queue = test_queue(10, 3);
        // Word 1 fails once, then succeeds; word 2 is queued behind it
        let handler = Arc::new(RecordingHandler::new(HashMap::from([(1, 1)])));
        queue.register(handler.clone());
        queue.start();

        queue.enqueue(payload(1), EnqueueOptions::default()).expect("enqueue");
        queue.enqueue(payload(2), EnqueueOptions::default()).expect("enqueue");
        wait_until_drained(&queue).await;

        // Front-of-queue reinsertion: the retry runs before job 2
        assert_eq!(handler.calls(), vec![1, 1, 2]);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_strictly_sequential_processing() {
        let queue = test_queue(5, 3);
        let handler = Arc::new(RecordingHandler::new(HashMap::new()));
        queue.register(handler.clone());
        queue.start();

        for id in 1..=5 {
            queue.enqueue(payload(id), EnqueueOptions::default()).expect("enqueue");
        }
        wait_until_drained(&queue).await;

        assert_eq!(handler.calls(), vec![1, 2, 3, 4, 5]);
        assert_eq!(handler.max_observed_in_flight.load(Ordering::SeqCst), 1);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_unhandled_kind_is_dropped() {
        let queue = test_queue(10, 3);
        queue.start();

        queue.enqueue(payload(1), EnqueueOptions::default()).expect("enqueue");
        wait_until_drained(&queue).await;

        assert_eq!(queue.status().queue_size, 0);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let queue = test_queue(10, 3);
        queue.start();
        queue.shutdown().await;

        let result = queue.enqueue(payload(1), EnqueueOptions::default());
        assert!(matches!(result, Err(WallError::Queue(_))));
    }

    #[tokio::test]
    async fn test_delayed_job_waits_for_eligibility() {
        let queue = test_queue(10, 3);
        let handler = Arc::new(RecordingHandler::new(HashMap::new()));
        queue.register(handler.clone());
        queue.start();

        queue
            .enqueue(
                payload(1),
                EnqueueOptions {
                    delay: Some(Duration::from_millis(80)),
                    ..Default::default()
                },
            )
            .expect("enqueue");

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(handler.calls().is_empty());

        wait_until_drained(&queue).await;
        assert_eq!(handler.calls(), vec![1]);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_max_attempts_override() {
        let queue = test_queue(10, 3);
        let handler = Arc::new(RecordingHandler::new(HashMap::from([(1, u32::MAX)])));
        queue.register(handler.clone());
        queue.start();

        queue
            .enqueue(
                payload(1),
                EnqueueOptions {
                    max_attempts: Some(1),
                    ..Default::default()
                },
            )
            .expect("enqueue");
        wait_until_drained(&queue).await;

        assert_eq!(handler.calls(), vec![1]);
        queue.shutdown().await;
    }
}
