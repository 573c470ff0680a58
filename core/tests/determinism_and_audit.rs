use cardionote_core::adapters::cancel::CancelFlag;
use cardionote_core::adapters::interface::{GenerationClient, GenerationRequest};
use cardionote_core::audit::event::{finalize_event, Actor, AuditEvent, ZERO_HASH_64};
use cardionote_core::audit::log::{read_events, verify_chain, AuditLog};
use cardionote_core::determinism::json_canonical::to_canonical_bytes;
use cardionote_core::intake::note::ClinicalNote;
use cardionote_core::intake::profile::ProfileInput;
use cardionote_core::persistence::MemoryRunStore;
use cardionote_core::{CoreConfig, CoreResult, RawGenerationResult, WorkflowController};

struct TextClient;

impl GenerationClient for TextClient {
    fn endpoint(&self) -> &str {
        "http://localhost:11434"
    }

    fn generate(&self, _req: &GenerationRequest) -> CoreResult<RawGenerationResult> {
        Ok(RawGenerationResult::Text("Summary: rest and take your medicines.".to_string()))
    }
}

#[test]
fn canonical_json_is_stable_for_key_order() {
    let a = serde_json::json!({"b": 1, "a": {"y": 2, "x": 3}});
    let b = serde_json::json!({"a": {"x": 3, "y": 2}, "b": 1});
    assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
}

#[test]
fn event_hash_is_stable() {
    let ev = AuditEvent {
        ts_utc: "2026-10-18T00:00:00Z".to_string(),
        event_type: "RUN_STATE_CHANGED".to_string(),
        run_id: "wr_01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
        actor: Actor::System,
        details: serde_json::json!({"from_state": "generate", "to_state": "approve", "action": "complete_generation"}),
        prev_event_hash: ZERO_HASH_64.to_string(),
        event_hash: "".to_string(),
    };
    let a = finalize_event(ev.clone()).unwrap().event_hash;
    let b = finalize_event(ev).unwrap().event_hash;
    assert_eq!(a, b);
}

#[test]
fn full_run_writes_a_verifiable_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit_log.ndjson");
    let store = MemoryRunStore::new();
    let audit = AuditLog::open_or_create(&path).unwrap();
    let mut ctl = WorkflowController::new(CoreConfig::default(), &store, audit).unwrap();

    ctl.submit_note(ClinicalNote::new("Stable angina, started on bisoprolol.", None))
        .unwrap();
    ctl.submit_profile(&ProfileInput {
        age: Some(70),
        language: Some("en".to_string()),
        literacy: Some("basic".to_string()),
        ..ProfileInput::default()
    })
    .unwrap();
    ctl.generate(&TextClient, &CancelFlag::new()).unwrap();
    ctl.approve_all("Dr. Okafor").unwrap();
    ctl.deliver("Dr. Okafor").unwrap();

    let events = read_events(&path).unwrap();
    let head = verify_chain(&events).unwrap();
    assert_eq!(head, ctl.audit().last_hash());

    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types.first(), Some(&"RUN_CREATED"));
    assert_eq!(types.last(), Some(&"DOCUMENT_DELIVERED"));
    for expected in [
        "NOTE_CAPTURED",
        "PROFILE_SET",
        "GENERATION_STARTED",
        "GENERATION_COMPLETED",
        "DOCUMENT_NORMALIZED",
        "SECTION_APPROVED",
    ] {
        assert!(types.contains(&expected), "missing {expected}");
    }
    assert_eq!(types.iter().filter(|t| **t == "SECTION_APPROVED").count(), 7);
    assert!(events.iter().all(|e| e.run_id == ctl.run().run_id()));

    let delivered = events.last().unwrap();
    assert_eq!(
        delivered.details["document_sha256"],
        ctl.run().approved_document().unwrap().digest_sha256()
    );
}

#[test]
fn note_text_is_not_written_to_the_audit_log() {
    let store = MemoryRunStore::new();
    let mut ctl =
        WorkflowController::new(CoreConfig::default(), &store, AuditLog::in_memory()).unwrap();
    ctl.submit_note(ClinicalNote::new("Patient Jane Roe, MRN 445566, NSTEMI.", None))
        .unwrap();
    for e in ctl.audit().events().unwrap() {
        let line = serde_json::to_string(&e).unwrap();
        assert!(!line.contains("445566"), "{}", e.event_type);
    }
}
