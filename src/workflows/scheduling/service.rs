use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};

use super::dispatch::{Job, JobQueue, QueueError};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, ConfirmationMode, PharmacistId, PharmacyId,
    Shift, ShiftDraft, ShiftId, ShiftStatus, Urgency,
};
use super::email::{compose_application_email, ApplicationEmailFields, EmailAction, EmailMessage};
use super::reconcile::{ConflictAction, ConflictJob};
use super::repository::{
    ApplicationStore, ContactDirectory, NotificationSink, ShiftQuery, ShiftStore, StoreError,
};

/// Minimum lead time before a same-day shift may start.
const SAME_DAY_LEAD_MINUTES: i64 = 3;

static SHIFT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_shift_id() -> ShiftId {
    let id = SHIFT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ShiftId(format!("shift-{id:06}"))
}

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Pharmacist response to an offered application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferDecision {
    Confirm,
    Reject,
}

/// Pharmacy verdict on an applied application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PharmacyDecision {
    Accept,
    Reject,
}

/// Partial update of mutable shift attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftUpdate {
    pub hourly_rate: Option<u32>,
    pub description: Option<String>,
    pub urgency: Option<Urgency>,
    pub max_applicants: Option<u32>,
}

/// Search result row annotated for the viewing pharmacist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftSearchEntry {
    #[serde(flatten)]
    pub shift: Shift,
    pub is_applied: bool,
}

/// Errors surfaced synchronously to the caller. Reconciliation-job failures
/// never appear here; they are retried and dead-lettered by the queue.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// The application state machine plus the shift posting surface.
///
/// Every operation re-validates current persisted state on entry; stale
/// writes are rejected by the stores' revision checks. Actions that can
/// create scheduling conflicts enqueue a `conflict-detection` job instead of
/// resolving conflicts inline.
pub struct ShiftBoardService<S, A> {
    shifts: Arc<S>,
    applications: Arc<A>,
    directory: Arc<dyn ContactDirectory>,
    queue: Arc<dyn JobQueue>,
    notifications: Arc<dyn NotificationSink>,
}

impl<S, A> ShiftBoardService<S, A>
where
    S: ShiftStore + 'static,
    A: ApplicationStore + 'static,
{
    pub fn new(
        shifts: Arc<S>,
        applications: Arc<A>,
        directory: Arc<dyn ContactDirectory>,
        queue: Arc<dyn JobQueue>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            shifts,
            applications,
            directory,
            queue,
            notifications,
        }
    }

    /// Post a new shift for coverage.
    pub fn post_shift(
        &self,
        pharmacy_id: &PharmacyId,
        draft: ShiftDraft,
        now: DateTime<Utc>,
    ) -> Result<Shift, ServiceError> {
        if !draft.window.is_well_formed() {
            return Err(ServiceError::InvalidState(
                "shift start must be before its end".to_string(),
            ));
        }
        if draft.window.start.date_naive() != draft.date
            || draft.window.end.date_naive() != draft.date
        {
            return Err(ServiceError::InvalidState(
                "shift window must fall on the posted date".to_string(),
            ));
        }
        if draft.date < now.date_naive() {
            return Err(ServiceError::InvalidState(
                "shift date cannot be in the past".to_string(),
            ));
        }
        if draft.date == now.date_naive()
            && draft.window.start < now + Duration::minutes(SAME_DAY_LEAD_MINUTES)
        {
            return Err(ServiceError::InvalidState(format!(
                "same-day shift must start at least {SAME_DAY_LEAD_MINUTES} minutes from now"
            )));
        }

        let same_day = self.shifts.search(&ShiftQuery {
            pharmacy_id: Some(pharmacy_id.clone()),
            date: Some(draft.date),
            ..ShiftQuery::default()
        })?;
        if same_day
            .iter()
            .any(|existing| existing.window.overlaps(&draft.window))
        {
            return Err(ServiceError::Conflict(
                "shift overlaps an existing shift for this pharmacy".to_string(),
            ));
        }

        let shift = Shift {
            id: next_shift_id(),
            pharmacy_id: pharmacy_id.clone(),
            date: draft.date,
            window: draft.window,
            hourly_rate: draft.hourly_rate,
            status: ShiftStatus::Open,
            confirmation: draft.confirmation,
            urgency: draft.urgency,
            description: draft.description,
            max_applicants: draft.max_applicants,
            confirmed_pharmacist_id: None,
            applications: Vec::new(),
            revision: 0,
        };
        Ok(self.shifts.insert(shift)?)
    }

    /// All shifts posted by the pharmacy.
    pub fn my_shifts(&self, pharmacy_id: &PharmacyId) -> Result<Vec<Shift>, ServiceError> {
        Ok(self.shifts.search(&ShiftQuery {
            pharmacy_id: Some(pharmacy_id.clone()),
            ..ShiftQuery::default()
        })?)
    }

    /// Filtered shift search. When a pharmacist is viewing, each row carries
    /// whether they currently hold an active application on it.
    pub fn search_shifts(
        &self,
        query: &ShiftQuery,
        viewer: Option<&PharmacistId>,
    ) -> Result<Vec<ShiftSearchEntry>, ServiceError> {
        let shifts = self.shifts.search(query)?;
        let applied: Vec<ShiftId> = match viewer {
            Some(pharmacist_id) => self
                .applications
                .find_active_for_pharmacist(pharmacist_id)?
                .into_iter()
                .map(|application| application.shift_id)
                .collect(),
            None => Vec::new(),
        };
        Ok(shifts
            .into_iter()
            .map(|shift| {
                let is_applied = applied.contains(&shift.id);
                ShiftSearchEntry { shift, is_applied }
            })
            .collect())
    }

    /// Update mutable attributes of an owned shift.
    pub fn update_shift(
        &self,
        pharmacy_id: &PharmacyId,
        shift_id: &ShiftId,
        update: ShiftUpdate,
    ) -> Result<Shift, ServiceError> {
        let mut shift = self
            .shifts
            .fetch(shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;
        if &shift.pharmacy_id != pharmacy_id {
            return Err(ServiceError::Forbidden("shift belongs to another pharmacy"));
        }

        if let Some(hourly_rate) = update.hourly_rate {
            shift.hourly_rate = hourly_rate;
        }
        if let Some(description) = update.description {
            shift.description = description;
        }
        if let Some(urgency) = update.urgency {
            shift.urgency = urgency;
        }
        if let Some(max_applicants) = update.max_applicants {
            shift.max_applicants = max_applicants;
        }
        Ok(self.shifts.update(shift)?)
    }

    /// Delete an owned shift. Refused while active applications reference it
    /// so terminal records never point at a vanished shift.
    pub fn delete_shift(
        &self,
        pharmacy_id: &PharmacyId,
        shift_id: &ShiftId,
    ) -> Result<Shift, ServiceError> {
        let shift = self
            .shifts
            .fetch(shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;
        if &shift.pharmacy_id != pharmacy_id {
            return Err(ServiceError::Forbidden("shift belongs to another pharmacy"));
        }
        let has_active = self
            .applications
            .find_for_shift(shift_id)?
            .iter()
            .any(Application::is_active);
        if has_active {
            return Err(ServiceError::InvalidState(
                "shift still has active applications".to_string(),
            ));
        }
        self.shifts
            .delete(shift_id)?
            .ok_or(ServiceError::NotFound("shift"))
    }

    /// Applications received on an owned shift.
    pub fn applicants(
        &self,
        pharmacy_id: &PharmacyId,
        shift_id: &ShiftId,
    ) -> Result<Vec<Application>, ServiceError> {
        let shift = self
            .shifts
            .fetch(shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;
        if &shift.pharmacy_id != pharmacy_id {
            return Err(ServiceError::Forbidden("shift belongs to another pharmacy"));
        }
        Ok(self.applications.find_for_shift(shift_id)?)
    }

    /// Apply to an open shift.
    ///
    /// Conflict policy: the apply path only enforces local invariants; time
    /// overlaps with the pharmacist's other applications are resolved
    /// asynchronously by the reconciler consuming the enqueued job.
    pub fn apply(
        &self,
        pharmacist_id: &PharmacistId,
        shift_id: &ShiftId,
        notes: &str,
    ) -> Result<Application, ServiceError> {
        let mut shift = self
            .shifts
            .fetch(shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;
        if !shift.is_open() {
            return Err(ServiceError::InvalidState(format!(
                "shift is {}",
                shift.status.label()
            )));
        }

        let pair_records = self.applications.find_for_pair(shift_id, pharmacist_id)?;
        if pair_records.iter().any(Application::is_active) {
            return Err(ServiceError::Conflict(
                "already applied to this shift".to_string(),
            ));
        }
        if shift.max_applicants > 0 {
            let active_count = self
                .applications
                .find_for_shift(shift_id)?
                .iter()
                .filter(|application| application.is_active())
                .count();
            if active_count as u32 >= shift.max_applicants {
                return Err(ServiceError::Conflict(
                    "shift applicant limit reached".to_string(),
                ));
            }
        }

        // Reuse a terminal record for the pair instead of inserting, which
        // preserves the storage-level uniqueness constraint.
        let reusable = pair_records
            .into_iter()
            .find(|record| record.status.is_terminal());
        let prior = reusable.clone();
        let application = match reusable {
            Some(mut record) => {
                record.status = ApplicationStatus::Applied;
                record.notes = notes.to_string();
                self.applications.update(record)?
            }
            None => self.applications.insert(Application {
                id: next_application_id(),
                shift_id: shift_id.clone(),
                pharmacist_id: pharmacist_id.clone(),
                status: ApplicationStatus::Applied,
                notes: notes.to_string(),
                revision: 0,
            })?,
        };

        shift.link_application(application.id.clone());
        let shift = match self.shifts.update(shift) {
            Ok(shift) => shift,
            Err(shift_error) => {
                // The application write already committed; compensate so it
                // does not stay active behind a failed shift write.
                let (status, notes) = match prior {
                    Some(record) => (record.status, Some(record.notes)),
                    None => (ApplicationStatus::Withdrawn, None),
                };
                self.revert_application(&application.id, status, notes);
                return Err(shift_error.into());
            }
        };

        self.queue.enqueue(Job::ConflictDetection(ConflictJob {
            pharmacist_id: pharmacist_id.clone(),
            shift_id: shift_id.clone(),
            action: ConflictAction::Apply,
        }))?;
        self.queue_application_email(&shift, pharmacist_id, &application.notes, EmailAction::Applied)?;
        self.notify(
            &shift.pharmacy_id.channel_key(),
            "new_application",
            json!({
                "shift_id": shift.id.0,
                "pharmacist_id": pharmacist_id.0,
                "application_id": application.id.0,
            }),
        );

        Ok(application)
    }

    /// Withdraw an owned application.
    pub fn withdraw(
        &self,
        pharmacist_id: &PharmacistId,
        application_id: &ApplicationId,
    ) -> Result<Application, ServiceError> {
        let (application, shift) = self.withdraw_record(pharmacist_id, application_id)?;

        self.queue_application_email(
            &shift,
            pharmacist_id,
            &application.notes,
            EmailAction::Withdrawn,
        )?;
        self.notify(
            &shift.pharmacy_id.channel_key(),
            "application_withdrawn",
            json!({
                "shift_id": shift.id.0,
                "pharmacist_id": pharmacist_id.0,
                "application_id": application.id.0,
            }),
        );

        Ok(application)
    }

    /// Validation and record mutation shared by `withdraw` and `switch`.
    /// Side effects stay with the callers so a rolled-back switch never
    /// announces a withdrawal that did not stick.
    fn withdraw_record(
        &self,
        pharmacist_id: &PharmacistId,
        application_id: &ApplicationId,
    ) -> Result<(Application, Shift), ServiceError> {
        let mut application = self
            .applications
            .fetch(application_id)?
            .ok_or(ServiceError::NotFound("application"))?;
        if &application.pharmacist_id != pharmacist_id {
            return Err(ServiceError::Forbidden(
                "applications can only be withdrawn by their owner",
            ));
        }
        let mut shift = self
            .shifts
            .fetch(&application.shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;

        match application.status {
            ApplicationStatus::Applied | ApplicationStatus::Offered => {}
            ApplicationStatus::Accepted
                if shift.confirmation == ConfirmationMode::RequiresConfirmation => {}
            ApplicationStatus::Accepted => {
                return Err(ServiceError::InvalidState(
                    "accepted application on an auto-confirm shift is locked in".to_string(),
                ));
            }
            other => {
                return Err(ServiceError::InvalidState(format!(
                    "cannot withdraw application with status '{}'",
                    other.label()
                )));
            }
        }

        let prior_status = application.status;
        application.status = ApplicationStatus::Withdrawn;
        let application = self.applications.update(application)?;
        shift.unlink_application(&application.id);
        // A confirmed pharmacist backing out puts the shift back on the board.
        if shift.confirmed_pharmacist_id.as_ref() == Some(pharmacist_id) {
            shift.status = ShiftStatus::Open;
            shift.confirmed_pharmacist_id = None;
        }
        let shift = match self.shifts.update(shift) {
            Ok(shift) => shift,
            Err(shift_error) => {
                self.revert_application(&application.id, prior_status, None);
                return Err(shift_error.into());
            }
        };

        Ok((application, shift))
    }

    /// Withdraw one application and apply to another shift as a single
    /// operation. The withdrawal is compensated if the apply step fails, so
    /// the pharmacist is never left holding neither application. The
    /// withdrawal notice to the old pharmacy is held back until the apply
    /// step commits.
    pub fn switch(
        &self,
        pharmacist_id: &PharmacistId,
        old_application_id: &ApplicationId,
        new_shift_id: &ShiftId,
        notes: &str,
    ) -> Result<Application, ServiceError> {
        let (withdrawn, old_shift) = self.withdraw_record(pharmacist_id, old_application_id)?;

        match self.apply(pharmacist_id, new_shift_id, notes) {
            Ok(new_application) => {
                self.queue_application_email(
                    &old_shift,
                    pharmacist_id,
                    &withdrawn.notes,
                    EmailAction::Withdrawn,
                )?;
                self.notify(
                    &old_shift.pharmacy_id.channel_key(),
                    "application_withdrawn",
                    json!({
                        "shift_id": old_shift.id.0,
                        "pharmacist_id": pharmacist_id.0,
                        "application_id": withdrawn.id.0,
                    }),
                );
                Ok(new_application)
            }
            Err(apply_error) => {
                // Compensating step: restore the old application. Its failure
                // is reported separately and never masks the original error.
                if let Err(rollback_error) = self.restore_application(&withdrawn.id) {
                    error!(
                        application = %withdrawn.id.0,
                        %rollback_error,
                        "switch rollback failed, application left withdrawn"
                    );
                }
                Err(apply_error)
            }
        }
    }

    /// Compensating step after a failed shift write: put the already-committed
    /// application record back to its prior state. Failures here are reported
    /// separately so they never mask the error that triggered the rollback.
    fn revert_application(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
        notes: Option<String>,
    ) {
        let rollback = self
            .applications
            .fetch(application_id)
            .and_then(|found| found.ok_or(StoreError::NotFound))
            .and_then(|mut application| {
                application.status = status;
                if let Some(notes) = notes {
                    application.notes = notes;
                }
                self.applications.update(application)
            });
        if let Err(rollback_error) = rollback {
            error!(
                application = %application_id.0,
                %rollback_error,
                "rollback failed, application record left inconsistent"
            );
        }
    }

    fn restore_application(&self, application_id: &ApplicationId) -> Result<(), ServiceError> {
        let mut application = self
            .applications
            .fetch(application_id)?
            .ok_or(ServiceError::NotFound("application"))?;
        if application.status != ApplicationStatus::Withdrawn {
            return Ok(());
        }
        application.status = ApplicationStatus::Applied;
        let application = self.applications.update(application)?;

        let mut shift = self
            .shifts
            .fetch(&application.shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;
        shift.link_application(application.id);
        self.shifts.update(shift)?;
        Ok(())
    }

    /// Pharmacist response to an offer on a requires-confirmation shift.
    pub fn respond_to_offer(
        &self,
        pharmacist_id: &PharmacistId,
        application_id: &ApplicationId,
        decision: OfferDecision,
    ) -> Result<Application, ServiceError> {
        let mut application = self
            .applications
            .fetch(application_id)?
            .ok_or(ServiceError::NotFound("application"))?;
        if &application.pharmacist_id != pharmacist_id {
            return Err(ServiceError::Forbidden(
                "only the offered pharmacist can respond to this offer",
            ));
        }
        if application.status != ApplicationStatus::Offered {
            return Err(ServiceError::InvalidState(format!(
                "only offered applications can be responded to, status is '{}'",
                application.status.label()
            )));
        }
        let mut shift = self
            .shifts
            .fetch(&application.shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;

        match decision {
            OfferDecision::Confirm => {
                application.status = ApplicationStatus::Accepted;
                let application = self.applications.update(application)?;

                shift.fill(pharmacist_id.clone());
                let shift = match self.shifts.update(shift) {
                    Ok(shift) => shift,
                    Err(shift_error) => {
                        self.revert_application(
                            &application.id,
                            ApplicationStatus::Offered,
                            None,
                        );
                        return Err(shift_error.into());
                    }
                };

                self.reject_siblings(&shift.id, &application.id)?;
                self.queue.enqueue(Job::ConflictDetection(ConflictJob {
                    pharmacist_id: pharmacist_id.clone(),
                    shift_id: shift.id.clone(),
                    action: ConflictAction::Confirm,
                }))?;
                self.notify(
                    &shift.pharmacy_id.channel_key(),
                    "offer_confirmed",
                    json!({
                        "shift_id": shift.id.0,
                        "pharmacist_id": pharmacist_id.0,
                    }),
                );
                Ok(application)
            }
            OfferDecision::Reject => {
                application.status = ApplicationStatus::Rejected;
                let application = self.applications.update(application)?;
                // Shift stays open; other applicants are untouched.
                self.notify(
                    &shift.pharmacy_id.channel_key(),
                    "offer_declined",
                    json!({
                        "shift_id": shift.id.0,
                        "pharmacist_id": pharmacist_id.0,
                    }),
                );
                Ok(application)
            }
        }
    }

    /// Pharmacy verdict on an application to an owned shift.
    pub fn decide(
        &self,
        pharmacy_id: &PharmacyId,
        application_id: &ApplicationId,
        decision: PharmacyDecision,
    ) -> Result<Application, ServiceError> {
        let mut application = self
            .applications
            .fetch(application_id)?
            .ok_or(ServiceError::NotFound("application"))?;
        let mut shift = self
            .shifts
            .fetch(&application.shift_id)?
            .ok_or(ServiceError::NotFound("shift"))?;
        if &shift.pharmacy_id != pharmacy_id {
            return Err(ServiceError::Forbidden("shift belongs to another pharmacy"));
        }
        if shift.status == ShiftStatus::Filled {
            return Err(ServiceError::InvalidState(
                "shift is already filled".to_string(),
            ));
        }
        if application.status != ApplicationStatus::Applied {
            return Err(ServiceError::InvalidState(format!(
                "only applied applications can be decided, status is '{}'",
                application.status.label()
            )));
        }

        match decision {
            PharmacyDecision::Reject => {
                application.status = ApplicationStatus::Rejected;
                let application = self.applications.update(application)?;
                self.notify(
                    &application.pharmacist_id.channel_key(),
                    "application_rejected",
                    json!({
                        "shift_id": shift.id.0,
                        "application_id": application.id.0,
                    }),
                );
                Ok(application)
            }
            PharmacyDecision::Accept => match shift.confirmation {
                ConfirmationMode::AutoConfirm => {
                    application.status = ApplicationStatus::Accepted;
                    let application = self.applications.update(application)?;

                    shift.fill(application.pharmacist_id.clone());
                    let shift = match self.shifts.update(shift) {
                        Ok(shift) => shift,
                        Err(shift_error) => {
                            self.revert_application(
                                &application.id,
                                ApplicationStatus::Applied,
                                None,
                            );
                            return Err(shift_error.into());
                        }
                    };

                    self.reject_siblings(&shift.id, &application.id)?;
                    self.queue.enqueue(Job::ConflictDetection(ConflictJob {
                        pharmacist_id: application.pharmacist_id.clone(),
                        shift_id: shift.id.clone(),
                        action: ConflictAction::Accept,
                    }))?;
                    self.notify(
                        &application.pharmacist_id.channel_key(),
                        "application_accepted",
                        json!({
                            "shift_id": shift.id.0,
                            "application_id": application.id.0,
                        }),
                    );
                    Ok(application)
                }
                ConfirmationMode::RequiresConfirmation => {
                    application.status = ApplicationStatus::Offered;
                    let application = self.applications.update(application)?;

                    self.queue_application_email(
                        &shift,
                        &application.pharmacist_id,
                        &application.notes,
                        EmailAction::Offered,
                    )?;
                    self.notify(
                        &application.pharmacist_id.channel_key(),
                        "offer_received",
                        json!({
                            "shift_id": shift.id.0,
                            "application_id": application.id.0,
                        }),
                    );
                    Ok(application)
                }
            },
        }
    }

    fn reject_siblings(
        &self,
        shift_id: &ShiftId,
        keep: &ApplicationId,
    ) -> Result<(), ServiceError> {
        for mut sibling in self.applications.find_for_shift(shift_id)? {
            if &sibling.id == keep || !sibling.is_active() {
                continue;
            }
            sibling.status = ApplicationStatus::Rejected;
            let sibling = self.applications.update(sibling)?;
            self.notify(
                &sibling.pharmacist_id.channel_key(),
                "application_rejected",
                json!({
                    "shift_id": shift_id.0,
                    "application_id": sibling.id.0,
                }),
            );
        }
        Ok(())
    }

    fn queue_application_email(
        &self,
        shift: &Shift,
        pharmacist_id: &PharmacistId,
        notes: &str,
        action: EmailAction,
    ) -> Result<(), ServiceError> {
        let pharmacy = self.directory.pharmacy(&shift.pharmacy_id)?;
        let pharmacist = self.directory.pharmacist(pharmacist_id)?;
        let (Some(pharmacy), Some(pharmacist)) = (pharmacy, pharmacist) else {
            // Contacts are managed outside this crate; a missing entry only
            // costs the courtesy e-mail.
            warn!(
                shift = %shift.id.0,
                pharmacist = %pharmacist_id.0,
                "skipping notification e-mail, contact details missing"
            );
            return Ok(());
        };

        let to = match action {
            EmailAction::Applied | EmailAction::Withdrawn => pharmacy.email.clone(),
            EmailAction::Offered => pharmacist.email.clone(),
        };
        let fields = ApplicationEmailFields {
            pharmacy_name: pharmacy.name,
            pharmacist_name: pharmacist.name,
            license_number: pharmacist.license_number,
            shift_date: shift.date,
            notes: notes.to_string(),
            action,
        };
        let message = EmailMessage {
            to,
            subject: action.subject().to_string(),
            body: compose_application_email(&fields),
        };
        self.queue.enqueue(Job::NotificationEmail(message))?;
        Ok(())
    }

    fn notify(&self, channel: &str, event: &str, payload: Value) {
        if let Err(err) = self.notifications.publish(channel, event, payload) {
            warn!(%err, channel, event, "push notification failed");
        }
    }
}
