use super::common::*;

use crate::workflows::scheduling::domain::{ApplicationStatus, ConfirmationMode, ShiftId};
use crate::workflows::scheduling::reconcile::{ConflictAction, ConflictJob};
use crate::workflows::scheduling::service::PharmacyDecision;

#[test]
fn overlapping_auto_confirm_pair_resolves_on_apply() {
    let harness = harness();
    let first = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let second = harness.post(&pharmacy_b(), window(10, 13), ConfirmationMode::AutoConfirm);

    let kept = harness
        .service
        .apply(&pharmacist_1(), &first.id, "")
        .expect("application succeeds");
    harness.run_conflicts();

    let newer = harness
        .service
        .apply(&pharmacist_1(), &second.id, "")
        .expect("application succeeds");
    let outcome = harness.run_conflicts();

    // The later application triggered the check; the earlier one loses.
    assert_eq!(outcome.withdrawn, vec![kept.id.clone()]);
    assert_eq!(
        harness.fetch_application(&kept.id).status,
        ApplicationStatus::Withdrawn
    );
    assert_eq!(
        harness.fetch_application(&newer.id).status,
        ApplicationStatus::Applied
    );
    assert!(harness.fetch_shift(&first.id).applications.is_empty());
    assert!(harness
        .sink
        .has_event(&pharmacist_1().channel_key(), "application_withdrawn"));
}

#[test]
fn withdrawal_notification_names_the_conflict() {
    let harness = harness();
    let first = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let second = harness.post(&pharmacy_b(), window(10, 13), ConfirmationMode::AutoConfirm);
    harness
        .service
        .apply(&pharmacist_1(), &first.id, "")
        .expect("application succeeds");
    harness
        .service
        .apply(&pharmacist_1(), &second.id, "")
        .expect("application succeeds");

    harness.run_conflicts();

    let reason = harness
        .sink
        .events()
        .into_iter()
        .filter(|(channel, event, _)| {
            channel == &pharmacist_1().channel_key() && event == "application_withdrawn"
        })
        .filter_map(|(_, _, payload)| {
            payload
                .get("reason")
                .and_then(|value| value.as_str())
                .map(str::to_string)
        })
        .next();
    assert_eq!(reason.as_deref(), Some("schedule_conflict"));
}

#[test]
fn mixed_modes_coexist_until_a_lock_in() {
    let harness = harness();
    let auto = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let manual = harness.post(
        &pharmacy_b(),
        window(10, 13),
        ConfirmationMode::RequiresConfirmation,
    );

    let on_auto = harness
        .service
        .apply(&pharmacist_1(), &auto.id, "")
        .expect("application succeeds");
    let on_manual = harness
        .service
        .apply(&pharmacist_1(), &manual.id, "")
        .expect("application succeeds");
    let outcome = harness.run_conflicts();

    assert!(outcome.withdrawn.is_empty());
    assert!(harness.fetch_application(&on_auto.id).is_active());
    assert!(harness.fetch_application(&on_manual.id).is_active());
}

#[test]
fn lock_in_withdraws_any_overlapping_sibling() {
    let harness = harness();
    let auto = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let manual = harness.post(
        &pharmacy_b(),
        window(10, 13),
        ConfirmationMode::RequiresConfirmation,
    );

    let winner = harness
        .service
        .apply(&pharmacist_1(), &auto.id, "")
        .expect("application succeeds");
    let sibling = harness
        .service
        .apply(&pharmacist_1(), &manual.id, "")
        .expect("application succeeds");
    harness.run_conflicts();

    harness
        .service
        .decide(&pharmacy_a(), &winner.id, PharmacyDecision::Accept)
        .expect("acceptance succeeds");
    let outcome = harness.run_conflicts();

    assert_eq!(outcome.withdrawn, vec![sibling.id.clone()]);
    assert_eq!(
        harness.fetch_application(&sibling.id).status,
        ApplicationStatus::Withdrawn
    );
    assert_eq!(
        harness.fetch_application(&winner.id).status,
        ApplicationStatus::Accepted
    );
}

#[test]
fn non_overlapping_applications_are_untouched() {
    let harness = harness();
    let morning = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let evening = harness.post(&pharmacy_b(), window(12, 17), ConfirmationMode::AutoConfirm);

    let first = harness
        .service
        .apply(&pharmacist_1(), &morning.id, "")
        .expect("application succeeds");
    let second = harness
        .service
        .apply(&pharmacist_1(), &evening.id, "")
        .expect("application succeeds");
    let outcome = harness.run_conflicts();

    assert!(outcome.withdrawn.is_empty());
    assert!(harness.fetch_application(&first.id).is_active());
    assert!(harness.fetch_application(&second.id).is_active());
}

#[test]
fn other_pharmacists_are_never_affected() {
    let harness = harness();
    let first = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let second = harness.post(&pharmacy_b(), window(10, 13), ConfirmationMode::AutoConfirm);

    let bystander = harness
        .service
        .apply(&pharmacist_2(), &first.id, "")
        .expect("application succeeds");
    harness
        .service
        .apply(&pharmacist_1(), &second.id, "")
        .expect("application succeeds");
    let outcome = harness.run_conflicts();

    assert!(outcome.withdrawn.is_empty());
    assert!(harness.fetch_application(&bystander.id).is_active());
}

#[test]
fn reconciliation_is_idempotent() {
    let harness = harness();
    let first = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let second = harness.post(&pharmacy_b(), window(10, 13), ConfirmationMode::AutoConfirm);
    harness
        .service
        .apply(&pharmacist_1(), &first.id, "")
        .expect("application succeeds");
    harness
        .service
        .apply(&pharmacist_1(), &second.id, "")
        .expect("application succeeds");

    let jobs = harness.queue.drain_conflicts();
    let reconciler = harness.reconciler();
    let mut first_pass = Vec::new();
    for job in &jobs {
        first_pass.extend(reconciler.reconcile(job).expect("first pass succeeds").withdrawn);
    }
    assert_eq!(first_pass.len(), 1);

    // Re-delivery of the same jobs finds nothing left to withdraw.
    for job in &jobs {
        let outcome = reconciler.reconcile(job).expect("second pass succeeds");
        assert!(outcome.withdrawn.is_empty());
    }
}

#[test]
fn vanished_trigger_shift_short_circuits() {
    let harness = harness();
    let reconciler = harness.reconciler();

    let outcome = reconciler
        .reconcile(&ConflictJob {
            pharmacist_id: pharmacist_1(),
            shift_id: ShiftId("shift-gone".to_string()),
            action: ConflictAction::Accept,
        })
        .expect("missing shift is not an error");
    assert!(outcome.withdrawn.is_empty());
}

#[test]
fn the_triggering_shifts_own_application_is_kept() {
    let harness = harness();
    let shift = harness.post(&pharmacy_a(), window(9, 12), ConfirmationMode::AutoConfirm);
    let application = harness
        .service
        .apply(&pharmacist_1(), &shift.id, "")
        .expect("application succeeds");

    let outcome = harness.run_conflicts();
    assert!(outcome.withdrawn.is_empty());
    assert!(harness.fetch_application(&application.id).is_active());
}
