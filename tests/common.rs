//! Common test utilities for building workflows, views and catalogs.
use formflow::prelude::*;
use std::sync::Arc;

/// Catalog ids used by the fixtures.
#[allow(dead_code)]
pub const FULL_NAME: FieldId = 1;
#[allow(dead_code)]
pub const EMAIL: FieldId = 2;
#[allow(dead_code)]
pub const CONSENT: FieldId = 3;
#[allow(dead_code)]
pub const PHONE: FieldId = 4;

/// Step ids used by the fixtures.
#[allow(dead_code)]
pub const KICK_OFF: StepId = 100;
#[allow(dead_code)]
pub const APPLICANT: StepId = 101;
#[allow(dead_code)]
pub const CONSENT_STEP: StepId = 102;
#[allow(dead_code)]
pub const REVIEW: StepId = 103;

#[allow(dead_code)]
pub const APPLICANT_VIEW: ViewId = 1;
#[allow(dead_code)]
pub const ARCHIVE_VIEW: ViewId = 2;
#[allow(dead_code)]
pub const OBJECT_ID: u64 = 12;

#[allow(dead_code)]
pub fn refs(ids: &[FieldId]) -> Vec<FieldReference> {
    ids.iter().map(|id| FieldReference::new(*id)).collect()
}

#[allow(dead_code)]
pub fn ids(fields: &[FieldReference]) -> Vec<FieldId> {
    fields.iter().map(|r| r.field_id).collect()
}

#[allow(dead_code)]
pub fn field(id: FieldId, name: &str, label: &str, field_type: FieldType) -> Field {
    Field {
        id: Some(id),
        name: name.to_string(),
        label: label.to_string(),
        field_type,
        options: None,
        primary: None,
        sample_value: None,
        ref_object_id: None,
        ref_multiplicity: None,
    }
}

#[allow(dead_code)]
pub fn view(id: ViewId, name: &str, fields: &[FieldId]) -> View {
    View {
        id,
        name: name.to_string(),
        object_id: OBJECT_ID,
        model: ViewModel {
            fields: refs(fields),
            layout: Default::default(),
        },
    }
}

/// One stage, one process, four steps:
///
/// - 100 "Kick-off" (Automation)
/// - 101 "Applicant details" (Collect information, linked to view 1 with `[1, 2]`)
/// - 102 "Consent" (Collect information, unlinked, local `[3]`)
/// - 103 "Review" (Approve/Reject)
#[allow(dead_code)]
pub fn create_workflow() -> Workflow {
    let mut applicant = Step::new(APPLICANT, "Applicant details", StepType::CollectInformation);
    applicant.binding = FieldBinding::Linked {
        view_id: APPLICANT_VIEW,
        cached: refs(&[FULL_NAME, EMAIL]),
    };
    let mut consent = Step::new(CONSENT_STEP, "Consent", StepType::CollectInformation);
    consent.binding = FieldBinding::Unlinked(refs(&[CONSENT]));

    Workflow {
        stages: vec![Stage {
            id: 1,
            name: "Intake".to_string(),
            processes: vec![Process {
                id: 10,
                name: "Onboarding".to_string(),
                steps: vec![
                    Step::new(KICK_OFF, "Kick-off", StepType::Automation),
                    applicant,
                    consent,
                    Step::new(REVIEW, "Review", StepType::Approval),
                ],
            }],
        }],
    }
}

#[allow(dead_code)]
pub fn create_catalog() -> FieldCatalog {
    FieldCatalog::from(vec![
        field(FULL_NAME, "full_name", "Full name", FieldType::Text),
        field(EMAIL, "email", "Email", FieldType::Email),
        field(CONSENT, "consent", "Consent", FieldType::Boolean),
        field(PHONE, "phone", "Phone", FieldType::Phone),
    ])
}

#[allow(dead_code)]
pub fn create_snapshot() -> Snapshot {
    Snapshot::new(
        create_workflow(),
        vec![
            view(APPLICANT_VIEW, "Applicant form", &[FULL_NAME, EMAIL]),
            view(ARCHIVE_VIEW, "archive", &[]),
        ],
        create_catalog(),
    )
}

/// Polls every millisecond so resolution tests stay fast.
#[allow(dead_code)]
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval_ms: 1,
        max_poll_attempts: 5,
        ..EngineConfig::default()
    }
}

#[allow(dead_code)]
pub fn build_engine(backend: Arc<InMemoryBackend>, config: EngineConfig) -> ReconciliationEngine {
    ReconciliationEngine::builder(backend).with_config(config).build()
}

/// The standard snapshot, an in-memory storage seeded from it, and an engine on top.
#[allow(dead_code)]
pub fn setup() -> (Snapshot, Arc<InMemoryBackend>, ReconciliationEngine) {
    setup_with(InMemoryBackend::from_snapshot(&create_snapshot()), fast_config())
}

#[allow(dead_code)]
pub fn setup_with(
    backend: InMemoryBackend,
    config: EngineConfig,
) -> (Snapshot, Arc<InMemoryBackend>, ReconciliationEngine) {
    let backend = Arc::new(backend);
    let engine = build_engine(backend.clone(), config);
    (create_snapshot(), backend, engine)
}

#[allow(dead_code)]
pub fn view_fields(snapshot: &Snapshot, view_id: ViewId) -> Vec<FieldId> {
    snapshot
        .views
        .get(view_id)
        .map(|v| ids(&v.model.fields))
        .unwrap_or_default()
}

#[allow(dead_code)]
pub fn step(snapshot: &Snapshot, step_id: StepId) -> &Step {
    snapshot.workflow.step(step_id).expect("fixture step exists")
}
