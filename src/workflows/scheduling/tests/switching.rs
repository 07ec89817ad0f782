use super::common::*;

use crate::workflows::scheduling::domain::{ApplicationStatus, ConfirmationMode, ShiftId};
use crate::workflows::scheduling::email::EmailAction;
use crate::workflows::scheduling::service::{PharmacyDecision, ServiceError};

#[test]
fn switch_moves_the_application_to_the_new_shift() {
    let harness = harness();
    let old_shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let new_shift = harness.post(&pharmacy_b(), window(13, 17), ConfirmationMode::AutoConfirm);
    let old = harness
        .service
        .apply(&pharmacist_1(), &old_shift.id, "")
        .expect("application succeeds");

    let new = harness
        .service
        .switch(&pharmacist_1(), &old.id, &new_shift.id, "moving over")
        .expect("switch succeeds");

    assert_eq!(new.shift_id, new_shift.id);
    assert_eq!(new.status, ApplicationStatus::Applied);
    assert_eq!(
        harness.fetch_application(&old.id).status,
        ApplicationStatus::Withdrawn
    );
    assert!(harness.fetch_shift(&old_shift.id).applications.is_empty());
    assert_eq!(
        harness.fetch_shift(&new_shift.id).applications,
        vec![new.id]
    );
}

#[test]
fn failed_switch_restores_the_original_application() {
    let harness = harness();
    let old_shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let target = harness.post(&pharmacy_b(), window(13, 17), ConfirmationMode::AutoConfirm);
    let old = harness
        .service
        .apply(&pharmacist_1(), &old_shift.id, "")
        .expect("application succeeds");

    // Fill the target so the apply leg fails.
    let occupier = harness
        .service
        .apply(&pharmacist_2(), &target.id, "")
        .expect("application succeeds");
    harness
        .service
        .decide(&pharmacy_b(), &occupier.id, PharmacyDecision::Accept)
        .expect("acceptance succeeds");

    let result = harness
        .service
        .switch(&pharmacist_1(), &old.id, &target.id, "");
    assert!(matches!(result, Err(ServiceError::InvalidState(_))));

    let restored = harness.fetch_application(&old.id);
    assert_eq!(restored.status, ApplicationStatus::Applied);
    assert_eq!(
        harness.fetch_shift(&old_shift.id).applications,
        vec![old.id]
    );
}

#[test]
fn completed_switch_notifies_the_old_pharmacy() {
    let harness = harness();
    let old_shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let new_shift = harness.post(&pharmacy_b(), window(13, 17), ConfirmationMode::AutoConfirm);
    let old = harness
        .service
        .apply(&pharmacist_1(), &old_shift.id, "")
        .expect("application succeeds");

    harness
        .service
        .switch(&pharmacist_1(), &old.id, &new_shift.id, "")
        .expect("switch succeeds");

    assert!(harness
        .queue
        .email_jobs()
        .iter()
        .any(|message| message.subject == EmailAction::Withdrawn.subject()));
    assert!(harness
        .sink
        .has_event(&pharmacy_a().channel_key(), "application_withdrawn"));
}

#[test]
fn rolled_back_switch_sends_no_withdrawal_notice() {
    let harness = harness();
    let old_shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let target = harness.post(&pharmacy_b(), window(13, 17), ConfirmationMode::AutoConfirm);
    let old = harness
        .service
        .apply(&pharmacist_1(), &old_shift.id, "")
        .expect("application succeeds");

    // Fill the target so the apply leg fails and the switch rolls back.
    let occupier = harness
        .service
        .apply(&pharmacist_2(), &target.id, "")
        .expect("application succeeds");
    harness
        .service
        .decide(&pharmacy_b(), &occupier.id, PharmacyDecision::Accept)
        .expect("acceptance succeeds");

    assert!(harness
        .service
        .switch(&pharmacist_1(), &old.id, &target.id, "")
        .is_err());

    // The old pharmacy must not hear about a withdrawal that did not stick.
    assert!(harness
        .queue
        .email_jobs()
        .iter()
        .all(|message| message.subject != EmailAction::Withdrawn.subject()));
    assert!(!harness
        .sink
        .has_event(&pharmacy_a().channel_key(), "application_withdrawn"));
}

#[test]
fn switch_to_a_missing_shift_restores_and_reports_not_found() {
    let harness = harness();
    let old_shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let old = harness
        .service
        .apply(&pharmacist_1(), &old_shift.id, "")
        .expect("application succeeds");

    let result = harness.service.switch(
        &pharmacist_1(),
        &old.id,
        &ShiftId("shift-missing".to_string()),
        "",
    );
    assert!(matches!(result, Err(ServiceError::NotFound(_))));

    assert_eq!(
        harness.fetch_application(&old.id).status,
        ApplicationStatus::Applied
    );
}

#[test]
fn switch_to_a_shift_already_applied_to_restores_the_original() {
    let harness = harness();
    let old_shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let target = harness.post(&pharmacy_b(), window(13, 17), ConfirmationMode::AutoConfirm);
    let old = harness
        .service
        .apply(&pharmacist_1(), &old_shift.id, "")
        .expect("application succeeds");
    let existing = harness
        .service
        .apply(&pharmacist_1(), &target.id, "")
        .expect("application succeeds");

    let result = harness
        .service
        .switch(&pharmacist_1(), &old.id, &target.id, "");
    assert!(matches!(result, Err(ServiceError::Conflict(_))));

    // No orphaned withdrawn-but-unlinked state: the old application is back
    // in `applied` and re-linked, the existing one is untouched.
    assert_eq!(
        harness.fetch_application(&old.id).status,
        ApplicationStatus::Applied
    );
    assert_eq!(
        harness.fetch_shift(&old_shift.id).applications,
        vec![old.id]
    );
    assert!(harness.fetch_application(&existing.id).is_active());
}

#[test]
fn switch_requires_owning_the_withdrawn_application() {
    let harness = harness();
    let old_shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let new_shift = harness.post(&pharmacy_b(), window(13, 17), ConfirmationMode::AutoConfirm);
    let old = harness
        .service
        .apply(&pharmacist_1(), &old_shift.id, "")
        .expect("application succeeds");

    let result = harness
        .service
        .switch(&pharmacist_2(), &old.id, &new_shift.id, "");
    assert!(matches!(result, Err(ServiceError::Forbidden(_))));

    // The withdraw leg never ran, so nothing changed.
    assert_eq!(
        harness.fetch_application(&old.id).status,
        ApplicationStatus::Applied
    );
}
