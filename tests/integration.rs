//! Integration tests running whole editing sessions against JSON workspaces.
mod common;
use common::*;
use formflow::prelude::*;
use std::sync::Arc;
use tokio_test::block_on;

const WORKSPACE: &str = r#"{
  "workflow": {
    "stages": [
      {
        "id": 1,
        "name": "Claims",
        "processes": [
          {
            "id": 7,
            "name": "Intake",
            "steps": [
              { "id": 11, "name": "Report damage", "type": "Collect information", "viewId": 3,
                "fields": [{ "fieldId": 21 }, { "fieldId": 22, "required": true }] },
              { "id": 12, "name": "Photos", "type": "Collect information",
                "fields": [{ "fieldId": 23 }] },
              { "id": 13, "name": "Assess", "type": "Approve/Reject" }
            ]
          }
        ]
      }
    ]
  },
  "views": [
    { "id": 3, "name": "Damage report", "objectId": 5,
      "model": { "fields": [{ "fieldId": 21 }, { "fieldId": 22, "required": true }],
                 "layout": { "type": "form", "columns": 2 } } }
  ],
  "fields": [
    { "id": 21, "name": "date", "label": "Date", "type": "date" },
    { "id": 22, "name": "description", "label": "Description", "type": "paragraph" },
    { "id": 23, "name": "photo", "label": "Photo", "type": "attachment" },
    { "id": 24, "name": "severity", "label": "Severity", "type": "dropdown",
      "options": ["low", "high"] }
  ]
}"#;

fn workspace() -> (Snapshot, Arc<InMemoryBackend>, ReconciliationEngine) {
    let snapshot = Snapshot::from_json(WORKSPACE).expect("workspace parses");
    let backend = Arc::new(InMemoryBackend::from_snapshot(&snapshot).with_visibility_lag(1));
    let engine = build_engine(backend.clone(), fast_config());
    (snapshot, backend, engine)
}

#[test]
fn test_workspace_document_is_loaded() {
    let (snapshot, backend, _engine) = workspace();

    let report = snapshot.workflow.step(11).unwrap();
    assert_eq!(report.view_id(), Some(3));
    assert!(report.binding.local_fields()[1].required);
    assert_eq!(snapshot.workflow.step(12).unwrap().view_id(), None);
    assert_eq!(snapshot.catalog.len(), 4);
    assert_eq!(snapshot.views.get(3).unwrap().model.layout.columns, 2);
    assert!(snapshot.check_invariants().is_empty());
    assert_eq!(backend.views().len(), 1);
}

#[test]
fn test_step_wire_shape_survives_round_trip() {
    let (snapshot, _backend, _engine) = workspace();

    let json = snapshot.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let steps = &value["workflow"]["stages"][0]["processes"][0]["steps"];
    assert_eq!(steps[0]["viewId"], 3);
    assert_eq!(steps[0]["type"], "Collect information");
    assert!(steps[1]["viewId"].is_null());
    assert_eq!(steps[1]["fields"][0]["fieldId"], 23);

    let reloaded = Snapshot::from_json(&json).unwrap();
    assert_eq!(reloaded.workflow, snapshot.workflow);
    assert_eq!(reloaded.views, snapshot.views);
}

#[test]
fn test_full_editing_session() {
    let (mut snapshot, backend, engine) = workspace();

    // The approval step starts collecting data with one existing field.
    let outcome = block_on(engine.on_step_type_change(
        &mut snapshot,
        13,
        StepType::Approval,
        StepType::CollectInformation,
        Some(vec![FieldReference::required(24)]),
    ))
    .unwrap();
    assert!(outcome.is_clean());
    let assess_view = snapshot.workflow.step(13).unwrap().view_id().unwrap();
    assert_eq!(backend.view(assess_view).unwrap().object_id, 5);

    // A new field shows up in the catalog on the second poll.
    let outcome = block_on(engine.attach_new_field(
        &mut snapshot,
        EditTarget::View(assess_view),
        FieldDraft::new("Estimated cost", FieldType::Decimal),
    ))
    .unwrap();
    let attachment = outcome.value.unwrap();
    assert!(attachment.attached);
    assert!(matches!(
        attachment.resolution,
        Resolution::Resolved { attempts: 2, .. }
    ));
    let cost = snapshot.catalog.resolve_name("estimated_cost").unwrap();

    // Reorder through the attach-existing path, then move one field back.
    block_on(engine.attach_existing_fields(
        &mut snapshot,
        EditTarget::View(assess_view),
        &[cost, 24],
    ))
    .unwrap();
    assert_eq!(view_fields(&snapshot, assess_view), vec![cost, 24]);
    block_on(engine.reorder_fields(&mut snapshot, EditTarget::Step(13), 1, 0)).unwrap();
    assert_eq!(view_fields(&snapshot, assess_view), vec![24, cost]);

    // The photo step owns its field; removing it deletes the field.
    block_on(engine.remove_field(&mut snapshot, EditTarget::Step(12), 23)).unwrap();
    assert!(!snapshot.catalog.contains(23));

    // The damage report leaves "Collect information".
    block_on(engine.on_step_type_change(
        &mut snapshot,
        11,
        StepType::CollectInformation,
        StepType::Notification,
        None,
    ))
    .unwrap();
    assert!(!snapshot.views.contains(3));

    assert!(snapshot.check_invariants().is_empty());
    let groups = snapshot.groups();
    assert_eq!(
        groups.iter().map(|g| g.source).collect::<Vec<_>>(),
        vec![GroupSource::View(assess_view), GroupSource::Step(12)]
    );
    assert_eq!(engine.observe(&snapshot), 0);

    // Storage and the snapshot agree on every view.
    for view in snapshot.views.iter() {
        assert_eq!(backend.view(view.id).as_ref(), Some(view));
    }
}

#[test]
fn test_storage_state_persists_to_disk() {
    let (mut snapshot, backend, engine) = workspace();
    block_on(engine.attach_existing_fields(&mut snapshot, EditTarget::View(3), &[24])).unwrap();

    let path = std::env::temp_dir().join(format!("formflow-store-{}.bin", std::process::id()));
    let path = path.to_string_lossy().to_string();
    backend.save(&path).unwrap();
    let restored = InMemoryBackend::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.views(), backend.views());
    assert_eq!(restored.fields().len(), 4);
    assert_eq!(
        ids(&restored.view(3).unwrap().model.fields),
        vec![21, 22, 24]
    );
}

#[test]
fn test_invalid_workspace_is_reported() {
    let err = Snapshot::from_json(r#"{ "workflow": { "stages": [ { "id": "x" } ] } }"#)
        .unwrap_err();
    assert!(matches!(err, SnapshotError::Json(_)));

    let err = Snapshot::from_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, SnapshotError::Io { .. }));
}
