use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::scheduling::dispatch::{Job, JobId, JobQueue, QueueError};
use crate::workflows::scheduling::domain::{
    Application, ApplicationId, ConfirmationMode, PharmacistId, PharmacyId, Shift, ShiftDraft,
    ShiftId, TimeWindow, Urgency,
};
use crate::workflows::scheduling::email::EmailMessage;
use crate::workflows::scheduling::reconcile::{ConflictJob, ConflictReconciler, ReconcileOutcome};
use crate::workflows::scheduling::repository::{
    ApplicationStore, NotificationSink, NotifyError, PharmacistContact, PharmacyContact,
    ShiftQuery, ShiftStore, StoreError,
};
use crate::workflows::scheduling::service::ShiftBoardService;
use crate::workflows::scheduling::storage::{
    MemoryApplicationStore, MemoryDirectory, MemoryShiftStore,
};

pub(super) fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 5).expect("valid date")
}

/// Fixed "now" a few days before [`day`], so posting checks never trip.
pub(super) fn clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0)
        .single()
        .expect("valid clock")
}

pub(super) fn window(start_hour: u32, end_hour: u32) -> TimeWindow {
    TimeWindow {
        start: Utc
            .with_ymd_and_hms(2026, 10, 5, start_hour, 0, 0)
            .single()
            .expect("valid start"),
        end: Utc
            .with_ymd_and_hms(2026, 10, 5, end_hour, 0, 0)
            .single()
            .expect("valid end"),
    }
}

pub(super) fn draft(window: TimeWindow, confirmation: ConfirmationMode) -> ShiftDraft {
    ShiftDraft {
        date: day(),
        window,
        hourly_rate: 62,
        confirmation,
        urgency: Urgency::Normal,
        description: String::new(),
        max_applicants: 0,
    }
}

pub(super) fn pharmacy_a() -> PharmacyId {
    PharmacyId("pharmacy-a".to_string())
}

pub(super) fn pharmacy_b() -> PharmacyId {
    PharmacyId("pharmacy-b".to_string())
}

pub(super) fn pharmacist_1() -> PharmacistId {
    PharmacistId("pharmacist-1".to_string())
}

pub(super) fn pharmacist_2() -> PharmacistId {
    PharmacistId("pharmacist-2".to_string())
}

/// Capturing queue so tests can assert on enqueued jobs and feed the
/// reconciler by hand instead of racing a worker pool.
#[derive(Default)]
pub(super) struct RecordingQueue {
    jobs: Mutex<Vec<Job>>,
    sequence: AtomicU64,
}

impl RecordingQueue {
    pub(super) fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().expect("queue mutex poisoned").clone()
    }

    pub(super) fn conflict_jobs(&self) -> Vec<ConflictJob> {
        self.jobs()
            .into_iter()
            .filter_map(|job| match job {
                Job::ConflictDetection(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub(super) fn email_jobs(&self) -> Vec<EmailMessage> {
        self.jobs()
            .into_iter()
            .filter_map(|job| match job {
                Job::NotificationEmail(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Remove and return the recorded conflict jobs, leaving other kinds.
    pub(super) fn drain_conflicts(&self) -> Vec<ConflictJob> {
        let mut guard = self.jobs.lock().expect("queue mutex poisoned");
        let mut drained = Vec::new();
        guard.retain(|job| match job {
            Job::ConflictDetection(payload) => {
                drained.push(payload.clone());
                false
            }
            _ => true,
        });
        drained
    }
}

impl JobQueue for RecordingQueue {
    fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        self.jobs.lock().expect("queue mutex poisoned").push(job);
        Ok(JobId(self.sequence.fetch_add(1, Ordering::Relaxed)))
    }
}

#[derive(Default)]
pub(super) struct RecordingSink {
    events: Mutex<Vec<(String, String, Value)>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub(super) fn events(&self) -> Vec<(String, String, Value)> {
        self.events.lock().expect("sink mutex poisoned").clone()
    }

    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub(super) fn has_event(&self, channel: &str, event: &str) -> bool {
        self.events()
            .iter()
            .any(|(c, e, _)| c == channel && e == event)
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, channel: &str, event: &str, payload: Value) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(NotifyError::Transport("sink offline".to_string()));
        }
        self.events
            .lock()
            .expect("sink mutex poisoned")
            .push((channel.to_string(), event.to_string(), payload));
        Ok(())
    }
}

/// Shift store wrapper whose updates can be told to fail, for exercising the
/// rollback of committed application writes.
#[derive(Default)]
pub(super) struct FlakyShiftStore {
    inner: MemoryShiftStore,
    failing_updates: AtomicU64,
}

impl FlakyShiftStore {
    pub(super) fn fail_next_update(&self) {
        self.failing_updates.store(1, Ordering::Relaxed);
    }
}

impl ShiftStore for FlakyShiftStore {
    fn insert(&self, shift: Shift) -> Result<Shift, StoreError> {
        self.inner.insert(shift)
    }

    fn fetch(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError> {
        self.inner.fetch(id)
    }

    fn update(&self, shift: Shift) -> Result<Shift, StoreError> {
        if self.failing_updates.load(Ordering::Relaxed) > 0 {
            self.failing_updates.fetch_sub(1, Ordering::Relaxed);
            return Err(StoreError::StaleRevision);
        }
        self.inner.update(shift)
    }

    fn delete(&self, id: &ShiftId) -> Result<Option<Shift>, StoreError> {
        self.inner.delete(id)
    }

    fn search(&self, query: &ShiftQuery) -> Result<Vec<Shift>, StoreError> {
        self.inner.search(query)
    }
}

pub(super) struct Harness<S: ShiftStore + 'static = MemoryShiftStore> {
    pub(super) service: Arc<ShiftBoardService<S, MemoryApplicationStore>>,
    pub(super) shifts: Arc<S>,
    pub(super) applications: Arc<MemoryApplicationStore>,
    pub(super) queue: Arc<RecordingQueue>,
    pub(super) sink: Arc<RecordingSink>,
}

pub(super) fn harness() -> Harness {
    harness_with(MemoryShiftStore::default())
}

pub(super) fn flaky_harness() -> Harness<FlakyShiftStore> {
    harness_with(FlakyShiftStore::default())
}

fn harness_with<S: ShiftStore + 'static>(shifts: S) -> Harness<S> {
    let shifts = Arc::new(shifts);
    let applications = Arc::new(MemoryApplicationStore::default());
    let directory = Arc::new(MemoryDirectory::default());
    let queue = Arc::new(RecordingQueue::default());
    let sink = Arc::new(RecordingSink::default());

    directory.add_pharmacy(
        pharmacy_a(),
        PharmacyContact {
            name: "Corner Pharmacy".to_string(),
            email: "ops@corner.example".to_string(),
        },
    );
    directory.add_pharmacy(
        pharmacy_b(),
        PharmacyContact {
            name: "Harbor Pharmacy".to_string(),
            email: "ops@harbor.example".to_string(),
        },
    );
    directory.add_pharmacist(
        pharmacist_1(),
        PharmacistContact {
            name: "Riley Ward".to_string(),
            email: "riley@example.com".to_string(),
            license_number: "RX-1001".to_string(),
        },
    );
    directory.add_pharmacist(
        pharmacist_2(),
        PharmacistContact {
            name: "Sam Okafor".to_string(),
            email: "sam@example.com".to_string(),
            license_number: "RX-1002".to_string(),
        },
    );

    let service = Arc::new(ShiftBoardService::new(
        shifts.clone(),
        applications.clone(),
        directory,
        queue.clone(),
        sink.clone(),
    ));

    Harness {
        service,
        shifts,
        applications,
        queue,
        sink,
    }
}

impl<S: ShiftStore + 'static> Harness<S> {
    pub(super) fn post(
        &self,
        pharmacy: &PharmacyId,
        window: TimeWindow,
        confirmation: ConfirmationMode,
    ) -> Shift {
        self.service
            .post_shift(pharmacy, draft(window, confirmation), clock())
            .expect("shift posts")
    }

    pub(super) fn reconciler(&self) -> ConflictReconciler<S, MemoryApplicationStore> {
        ConflictReconciler::new(self.shifts.clone(), self.applications.clone(), self.sink.clone())
    }

    /// Run every recorded conflict job through a reconciler, as the worker
    /// pool would, and collect the combined outcome.
    pub(super) fn run_conflicts(&self) -> ReconcileOutcome {
        let reconciler = self.reconciler();
        let mut withdrawn = Vec::new();
        for job in self.queue.drain_conflicts() {
            let outcome = reconciler.reconcile(&job).expect("reconciliation succeeds");
            withdrawn.extend(outcome.withdrawn);
        }
        ReconcileOutcome { withdrawn }
    }

    pub(super) fn fetch_shift(&self, id: &ShiftId) -> Shift {
        self.shifts
            .fetch(id)
            .expect("shift store readable")
            .expect("shift exists")
    }

    pub(super) fn fetch_application(&self, id: &ApplicationId) -> Application {
        self.applications
            .fetch(id)
            .expect("application store readable")
            .expect("application exists")
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
