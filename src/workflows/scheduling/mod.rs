//! Shift coverage scheduling: shift postings, the application state machine,
//! and asynchronous conflict reconciliation.
//!
//! The service layer performs every status transition synchronously within a
//! request, while scheduling conflicts between a pharmacist's applications are
//! resolved off the request path by the [`reconcile::ConflictReconciler`]
//! consuming jobs from the [`dispatch::JobDispatcher`].

pub mod dispatch;
pub mod domain;
pub mod email;
pub mod reconcile;
pub mod repository;
pub mod router;
pub mod service;
pub mod storage;

#[cfg(test)]
mod tests;

pub use dispatch::{
    DeadLetter, DispatcherBuilder, Job, JobDispatcher, JobError, JobHandler, JobId, JobKind,
    JobQueue, QueueError, RetryPolicy,
};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, ConfirmationMode, PharmacistId, PharmacyId,
    Shift, ShiftDraft, ShiftId, ShiftStatus, TimeWindow, Urgency,
};
pub use email::{
    compose_application_email, ApplicationEmailFields, EmailAction, EmailMessage, EmailRelay,
};
pub use reconcile::{ConflictAction, ConflictJob, ConflictReconciler, ReconcileOutcome};
pub use repository::{
    ApplicationStore, ContactDirectory, EmailTransport, NotificationSink, NotifyError,
    PharmacistContact, PharmacyContact, ShiftQuery, ShiftStore, StoreError,
};
pub use router::scheduling_router;
pub use service::{
    OfferDecision, PharmacyDecision, ServiceError, ShiftBoardService, ShiftSearchEntry,
    ShiftUpdate,
};
pub use storage::{MemoryApplicationStore, MemoryDirectory, MemoryShiftStore};
