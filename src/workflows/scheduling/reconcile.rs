//! Background reconciliation of a pharmacist's overlapping applications.
//!
//! Consumes `conflict-detection` jobs emitted by the state machine. The
//! routine is idempotent: only active siblings are touched, so re-running a
//! job against an already-reconciled schedule withdraws nothing further.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use super::dispatch::{Job, JobError, JobHandler};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, PharmacistId, Shift, ShiftId, ShiftStatus,
};
use super::repository::{ApplicationStore, NotificationSink, ShiftStore, StoreError};

/// The state-machine event that triggered the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    Apply,
    Accept,
    Confirm,
}

impl ConflictAction {
    /// Accept and confirm both lock the triggering assignment in, which
    /// widens the withdrawal policy to any overlapping sibling.
    pub const fn locks_in(self) -> bool {
        matches!(self, ConflictAction::Accept | ConflictAction::Confirm)
    }
}

/// Payload of a `conflict-detection` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictJob {
    pub pharmacist_id: PharmacistId,
    pub shift_id: ShiftId,
    pub action: ConflictAction,
}

/// What a reconciliation pass changed, for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub withdrawn: Vec<ApplicationId>,
}

/// Scans the pharmacist's other active applications after a state-changing
/// event and withdraws the ones that conflict per policy.
pub struct ConflictReconciler<S, A> {
    shifts: Arc<S>,
    applications: Arc<A>,
    notifications: Arc<dyn NotificationSink>,
}

impl<S, A> ConflictReconciler<S, A>
where
    S: ShiftStore,
    A: ApplicationStore,
{
    pub fn new(shifts: Arc<S>, applications: Arc<A>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            shifts,
            applications,
            notifications,
        }
    }

    pub fn reconcile(&self, job: &ConflictJob) -> Result<ReconcileOutcome, StoreError> {
        let Some(trigger) = self.shifts.fetch(&job.shift_id)? else {
            warn!(shift = %job.shift_id.0, "triggering shift vanished, skipping conflict check");
            return Ok(ReconcileOutcome::default());
        };

        let mut outcome = ReconcileOutcome::default();
        let active = self.applications.find_active_for_pharmacist(&job.pharmacist_id)?;
        for application in active {
            // Applications on the triggering shift itself are never touched here.
            if application.shift_id == job.shift_id {
                continue;
            }
            let Some(sibling_shift) = self.shifts.fetch(&application.shift_id)? else {
                continue;
            };
            if !trigger.window.overlaps(&sibling_shift.window) {
                continue;
            }

            let both_auto_confirm = trigger.confirmation.is_auto_confirm()
                && sibling_shift.confirmation.is_auto_confirm();
            if both_auto_confirm || job.action.locks_in() {
                let withdrawn = self.withdraw(application, sibling_shift)?;
                outcome.withdrawn.push(withdrawn);
            }
        }

        info!(
            pharmacist = %job.pharmacist_id.0,
            shift = %job.shift_id.0,
            action = ?job.action,
            withdrawn = outcome.withdrawn.len(),
            "conflict reconciliation finished"
        );
        Ok(outcome)
    }

    fn withdraw(
        &self,
        mut application: Application,
        mut shift: Shift,
    ) -> Result<ApplicationId, StoreError> {
        let prior_status = application.status;
        application.status = ApplicationStatus::Withdrawn;
        let mut application = self.applications.update(application)?;
        shift.unlink_application(&application.id);
        // Withdrawing a confirmed assignment reopens the losing shift.
        if shift.confirmed_pharmacist_id.as_ref() == Some(&application.pharmacist_id) {
            shift.status = ShiftStatus::Open;
            shift.confirmed_pharmacist_id = None;
        }
        if let Err(shift_error) = self.shifts.update(shift) {
            // Put the application back to its prior active status so the
            // redelivered job still finds a conflict it can resolve.
            application.status = prior_status;
            if let Err(rollback_error) = self.applications.update(application) {
                error!(
                    %rollback_error,
                    "rollback failed, application record left inconsistent"
                );
            }
            return Err(shift_error);
        }

        let channel = application.pharmacist_id.channel_key();
        let payload = json!({
            "application_id": application.id.0,
            "shift_id": application.shift_id.0,
            "reason": "schedule_conflict",
        });
        if let Err(err) = self
            .notifications
            .publish(&channel, "application_withdrawn", payload)
        {
            warn!(%err, %channel, "failed to publish withdrawal notification");
        }
        Ok(application.id)
    }
}

impl<S, A> JobHandler for ConflictReconciler<S, A>
where
    S: ShiftStore,
    A: ApplicationStore,
{
    fn handle(&self, job: &Job) -> Result<(), JobError> {
        match job {
            Job::ConflictDetection(payload) => {
                self.reconcile(payload)?;
                Ok(())
            }
            other => Err(JobError::Unroutable(other.kind().name())),
        }
    }
}
