//! Asynchronous job dispatch decoupling request latency from reconciliation
//! and e-mail cost.
//!
//! Producers only hold a [`JobQueue`] handle; the worker pool drains a shared
//! mpsc channel and routes each job to the handler registered for its kind.
//! Delivery is at-least-once: a failed job is re-enqueued up to the retry
//! policy, then parked on the dead-letter buffer for operators. Handlers must
//! therefore be idempotent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use super::email::EmailMessage;
use super::reconcile::ConflictJob;
use super::repository::{NotifyError, StoreError};

/// Named job types carried by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ConflictDetection,
    NotificationEmail,
}

impl JobKind {
    pub const fn name(self) -> &'static str {
        match self {
            JobKind::ConflictDetection => "conflict-detection",
            JobKind::NotificationEmail => "notification-email",
        }
    }
}

/// Queue payloads. Flat serde structs so an external broker could carry them
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Job {
    ConflictDetection(ConflictJob),
    NotificationEmail(EmailMessage),
}

impl Job {
    pub const fn kind(&self) -> JobKind {
        match self {
            Job::ConflictDetection(_) => JobKind::ConflictDetection,
            Job::NotificationEmail(_) => JobKind::NotificationEmail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

/// Enqueue side of the dispatcher. Never blocks the caller on job completion.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<JobId, QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
}

/// Failure raised by a job handler; drives the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("no handler registered for {0}")]
    Unroutable(&'static str),
}

/// Consumer side: one handler per job kind, safe to re-execute.
pub trait JobHandler: Send + Sync {
    fn handle(&self, job: &Job) -> Result<(), JobError>;
}

/// Re-delivery budget for failing jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delivery attempts before a job is dead-lettered.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// A job that exhausted its retries, kept for operator inspection.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub id: JobId,
    pub job: Job,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug)]
struct Envelope {
    id: JobId,
    job: Job,
    attempt: u32,
}

/// Builder registering handlers before the worker pool starts.
pub struct DispatcherBuilder {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    retry: RetryPolicy,
    workers: usize,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            retry: RetryPolicy::default(),
            workers: 1,
        }
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    pub fn register(mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Start the worker pool. Must be called within a tokio runtime.
    pub fn spawn(self) -> JobDispatcher {
        let (tx, rx) = mpsc::unbounded_channel::<Envelope>();
        let rx = Arc::new(AsyncMutex::new(rx));
        let handlers = Arc::new(self.handlers);
        let dead_letters = Arc::new(Mutex::new(Vec::new()));
        let pending = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            workers.push(tokio::spawn(worker_loop(
                rx.clone(),
                tx.clone(),
                handlers.clone(),
                self.retry,
                dead_letters.clone(),
                pending.clone(),
            )));
        }

        JobDispatcher {
            tx,
            sequence: AtomicU64::new(1),
            pending,
            dead_letters,
            workers: Mutex::new(workers),
        }
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn worker_loop(
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Envelope>>>,
    tx: mpsc::UnboundedSender<Envelope>,
    handlers: Arc<HashMap<JobKind, Arc<dyn JobHandler>>>,
    retry: RetryPolicy,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
    pending: Arc<AtomicU64>,
) {
    loop {
        let envelope = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(envelope) = envelope else {
            break;
        };

        let kind = envelope.job.kind();
        let outcome = match handlers.get(&kind) {
            Some(handler) => handler.handle(&envelope.job),
            None => Err(JobError::Unroutable(kind.name())),
        };

        match outcome {
            Ok(()) => {
                pending.fetch_sub(1, Ordering::Release);
            }
            Err(err) if envelope.attempt < retry.max_attempts => {
                warn!(
                    job_id = envelope.id.0,
                    kind = kind.name(),
                    attempt = envelope.attempt,
                    %err,
                    "job failed, re-enqueueing"
                );
                let retry_envelope = Envelope {
                    attempt: envelope.attempt + 1,
                    ..envelope
                };
                if tx.send(retry_envelope).is_err() {
                    pending.fetch_sub(1, Ordering::Release);
                }
            }
            Err(err) => {
                error!(
                    job_id = envelope.id.0,
                    kind = kind.name(),
                    attempts = envelope.attempt,
                    %err,
                    "job exhausted retries, dead-lettering"
                );
                dead_letters
                    .lock()
                    .expect("dead letter mutex poisoned")
                    .push(DeadLetter {
                        id: envelope.id,
                        job: envelope.job,
                        attempts: envelope.attempt,
                        error: err.to_string(),
                    });
                pending.fetch_sub(1, Ordering::Release);
            }
        }
    }
}

/// Handle owning the queue channel and worker pool.
pub struct JobDispatcher {
    tx: mpsc::UnboundedSender<Envelope>,
    sequence: AtomicU64,
    pending: Arc<AtomicU64>,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Jobs that exhausted their retries since startup.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .expect("dead letter mutex poisoned")
            .clone()
    }

    /// Wait until every enqueued job has either succeeded or dead-lettered.
    /// Test and shutdown aid; production callers never wait on the queue.
    pub async fn drain(&self) {
        while self.pending.load(Ordering::Acquire) > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Stop accepting work and wait for the workers to finish the backlog.
    pub async fn shutdown(self) {
        self.drain().await;
        drop(self.tx);
        let workers = {
            let mut guard = self.workers.lock().expect("worker mutex poisoned");
            std::mem::take(&mut *guard)
        };
        for worker in workers {
            let _ = worker.await;
        }
    }
}

impl JobQueue for JobDispatcher {
    fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        let id = JobId(self.sequence.fetch_add(1, Ordering::Relaxed));
        self.pending.fetch_add(1, Ordering::Release);
        let envelope = Envelope {
            id,
            job,
            attempt: 1,
        };
        if self.tx.send(envelope).is_err() {
            self.pending.fetch_sub(1, Ordering::Release);
            return Err(QueueError::Closed);
        }
        Ok(id)
    }
}
