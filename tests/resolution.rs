//! Tests for creating new fields and resolving them through the catalog.
mod common;
use common::*;
use formflow::prelude::*;
use tokio_test::block_on;

const NEW_FIELD: FieldId = 5;

fn lagging(lag: u32) -> InMemoryBackend {
    InMemoryBackend::from_snapshot(&create_snapshot()).with_visibility_lag(lag)
}

fn parking_config(max_poll_attempts: u32) -> EngineConfig {
    EngineConfig {
        max_poll_attempts,
        exhaustion_policy: ExhaustionPolicy::Park,
        ..fast_config()
    }
}

#[test]
fn test_new_field_resolved_on_third_poll_is_attached_once() {
    let (mut snapshot, backend, engine) = setup_with(lagging(2), fast_config());

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Date of birth", FieldType::Date),
    ))
    .unwrap();

    let attachment = outcome.value.as_ref().expect("field was created");
    assert_eq!(attachment.name, "date_of_birth");
    assert_eq!(
        attachment.resolution,
        Resolution::Resolved {
            field_id: NEW_FIELD,
            attempts: 3
        }
    );
    assert!(attachment.attached);
    assert!(outcome.is_clean());

    assert_eq!(backend.call_count(Operation::ListFields), 3);
    assert_eq!(backend.call_count(Operation::UpdateView), 1);
    assert_eq!(
        outcome.effects,
        vec![
            Effect::CreateField {
                label: "Date of birth".to_string()
            },
            Effect::ListFields,
            Effect::ListFields,
            Effect::ListFields,
            Effect::ReadView(APPLICANT_VIEW),
            Effect::UpdateView(APPLICANT_VIEW),
        ]
    );
    assert_eq!(view_fields(&snapshot, APPLICANT_VIEW), vec![FULL_NAME, EMAIL, NEW_FIELD]);
    assert!(snapshot.catalog.contains(NEW_FIELD));
}

#[test]
fn test_visible_field_resolves_on_first_poll() {
    let (mut snapshot, _backend, engine) = setup_with(lagging(0), fast_config());

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Nickname", FieldType::Text).required(true),
    ))
    .unwrap();

    assert_eq!(
        outcome.value.unwrap().resolution,
        Resolution::Resolved {
            field_id: NEW_FIELD,
            attempts: 1
        }
    );
    let fields = &snapshot.views.get(APPLICANT_VIEW).unwrap().model.fields;
    assert_eq!(fields.last(), Some(&FieldReference::required(NEW_FIELD)));
}

#[test]
fn test_returned_id_skips_polling() {
    let backend = lagging(5).with_revealed_ids(true);
    let (mut snapshot, backend, engine) = setup_with(backend, fast_config());

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::Step(CONSENT_STEP),
        FieldDraft::new("Signature date", FieldType::Date),
    ))
    .unwrap();

    assert_eq!(
        outcome.value.unwrap().resolution,
        Resolution::Resolved {
            field_id: NEW_FIELD,
            attempts: 0
        }
    );
    assert_eq!(backend.call_count(Operation::ListFields), 0);
    assert_eq!(
        outcome.effects,
        vec![Effect::CreateField {
            label: "Signature date".to_string()
        }]
    );
    assert_eq!(
        ids(step(&snapshot, CONSENT_STEP).binding.local_fields()),
        vec![CONSENT, NEW_FIELD]
    );
}

#[test]
fn test_exhausted_resolution_leaves_field_unattached() {
    let (mut snapshot, backend, engine) = setup_with(lagging(50), fast_config());

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Middle name", FieldType::Text),
    ))
    .unwrap();

    let attachment = outcome.value.unwrap();
    assert_eq!(attachment.resolution, Resolution::Exhausted { attempts: 5 });
    assert!(!attachment.attached);
    assert_eq!(
        outcome.warnings,
        vec![Warning::ResolutionExhausted {
            name: "middle_name".to_string(),
            attempts: 5
        }]
    );
    assert_eq!(backend.call_count(Operation::ListFields), 5);
    assert_eq!(backend.call_count(Operation::UpdateView), 0);
    assert_eq!(view_fields(&snapshot, APPLICANT_VIEW), vec![FULL_NAME, EMAIL]);
    assert!(snapshot.pending.is_empty());
    // The field exists in storage even though nothing references it.
    assert!(backend.fields().iter().any(|f| f.name == "middle_name"));
}

#[test]
fn test_parked_attachment_completes_on_retry() {
    let (mut snapshot, backend, engine) = setup_with(lagging(3), parking_config(3));

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Tax number", FieldType::Text),
    ))
    .unwrap();
    assert!(!outcome.value.unwrap().attached);
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.pending[0].owner, Some(APPLICANT));

    let retried = block_on(engine.retry_pending(&mut snapshot));

    assert_eq!(retried.value, 1);
    assert!(retried.is_clean());
    assert!(snapshot.pending.is_empty());
    assert_eq!(backend.call_count(Operation::ListFields), 4);
    assert_eq!(view_fields(&snapshot, APPLICANT_VIEW), vec![FULL_NAME, EMAIL, NEW_FIELD]);
}

#[test]
fn test_failed_retry_write_keeps_attachment_parked() {
    let (mut snapshot, backend, engine) = setup_with(lagging(3), parking_config(3));

    block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Tax number", FieldType::Text),
    ))
    .unwrap();
    assert_eq!(snapshot.pending.len(), 1);

    backend.fail_next(
        Operation::UpdateView,
        PersistenceError::Transport("down".to_string()),
    );
    let retried = block_on(engine.retry_pending(&mut snapshot));

    assert_eq!(retried.value, 0);
    assert_eq!(
        retried.warnings,
        vec![Warning::persistence(
            "update view",
            PersistenceError::Transport("down".to_string())
        )]
    );
    assert_eq!(snapshot.pending.len(), 1);
    assert_eq!(snapshot.pending[0].name, "tax_number");
    assert_eq!(view_fields(&snapshot, APPLICANT_VIEW), vec![FULL_NAME, EMAIL]);

    let retried = block_on(engine.retry_pending(&mut snapshot));

    assert_eq!(retried.value, 1);
    assert!(snapshot.pending.is_empty());
    assert_eq!(view_fields(&snapshot, APPLICANT_VIEW), vec![FULL_NAME, EMAIL, NEW_FIELD]);
}

#[test]
fn test_retry_keeps_attachment_parked_while_still_hidden() {
    let (mut snapshot, _backend, engine) = setup_with(lagging(10), parking_config(2));

    block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::Step(CONSENT_STEP),
        FieldDraft::new("Witness", FieldType::Text),
    ))
    .unwrap();

    let retried = block_on(engine.retry_pending(&mut snapshot));
    assert_eq!(retried.value, 0);
    assert_eq!(retried.effects, vec![Effect::ListFields]);
    assert_eq!(snapshot.pending.len(), 1);
}

#[test]
fn test_retry_falls_back_to_owning_step_when_view_is_gone() {
    let (mut snapshot, _backend, engine) = setup_with(lagging(3), parking_config(3));

    block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Tax number", FieldType::Text),
    ))
    .unwrap();

    snapshot.views.remove(APPLICANT_VIEW);
    snapshot.workflow.step_mut(APPLICANT).unwrap().binding =
        FieldBinding::Unlinked(refs(&[FULL_NAME, EMAIL]));

    let retried = block_on(engine.retry_pending(&mut snapshot));

    assert_eq!(retried.value, 1);
    assert_eq!(
        ids(step(&snapshot, APPLICANT).binding.local_fields()),
        vec![FULL_NAME, EMAIL, NEW_FIELD]
    );
}

#[test]
fn test_retry_without_parked_attachments_does_nothing() {
    let (mut snapshot, backend, engine) = setup();
    let outcome = block_on(engine.retry_pending(&mut snapshot));
    assert_eq!(outcome.value, 0);
    assert!(outcome.effects.is_empty());
    assert!(backend.calls().is_empty());
}

#[test]
fn test_invalid_draft_is_rejected_before_creation() {
    let (mut snapshot, backend, engine) = setup();

    let err = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Country", FieldType::Dropdown),
    ))
    .unwrap_err();
    assert_eq!(err, ValidationError::MissingOptions("Country".to_string()));

    let err = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("   ", FieldType::Text),
    ))
    .unwrap_err();
    assert_eq!(err, ValidationError::EmptyLabel);

    let err = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::Step(REVIEW),
        FieldDraft::new("Comment", FieldType::Paragraph),
    ))
    .unwrap_err();
    assert_eq!(err, ValidationError::NotCollecting(REVIEW));

    assert!(backend.calls().is_empty());
}

#[test]
fn test_dropdown_with_options_is_created() {
    let (mut snapshot, backend, engine) = setup_with(lagging(0), fast_config());

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Country", FieldType::Dropdown).with_options(&["NL", "BE"]),
    ))
    .unwrap();

    assert!(outcome.value.unwrap().attached);
    let stored = backend
        .fields()
        .into_iter()
        .find(|f| f.name == "country")
        .unwrap();
    assert_eq!(stored.options, Some(vec!["NL".to_string(), "BE".to_string()]));
}

#[test]
fn test_failed_creation_is_a_warning() {
    let backend = lagging(0);
    backend.fail_next(
        Operation::CreateField,
        PersistenceError::Transport("offline".to_string()),
    );
    let (mut snapshot, backend, engine) = setup_with(backend, fast_config());

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Nickname", FieldType::Text),
    ))
    .unwrap();

    assert_eq!(outcome.value, None);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(backend.call_count(Operation::ListFields), 0);
    assert_eq!(view_fields(&snapshot, APPLICANT_VIEW), vec![FULL_NAME, EMAIL]);
}

#[test]
fn test_failed_polls_count_as_attempts() {
    let backend = lagging(0);
    backend.fail_next(
        Operation::ListFields,
        PersistenceError::Transport("flaky".to_string()),
    );
    let (mut snapshot, _backend, engine) = setup_with(backend, fast_config());

    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(APPLICANT_VIEW),
        FieldDraft::new("Nickname", FieldType::Text),
    ))
    .unwrap();

    assert_eq!(
        outcome.value.as_ref().unwrap().resolution,
        Resolution::Resolved {
            field_id: NEW_FIELD,
            attempts: 2
        }
    );
    assert!(outcome.is_clean());
}

#[test]
fn test_refresh_catalog_replaces_local_copy() {
    let (mut snapshot, backend, engine) = setup();
    block_on(backend.delete_field(PHONE)).unwrap();

    let outcome = block_on(engine.refresh_catalog(&mut snapshot));

    assert!(outcome.value);
    assert!(!snapshot.catalog.contains(PHONE));
    assert_eq!(snapshot.catalog.len(), 3);
}
