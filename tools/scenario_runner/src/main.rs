use cardionote_core::adapters::cancel::CancelFlag;
use cardionote_core::adapters::interface::{GenerationClient, GenerationRequest};
use cardionote_core::audit::log::{verify_chain, AuditLog};
use cardionote_core::document::schema::CANONICAL_ORDER;
use cardionote_core::intake::note::ClinicalNote;
use cardionote_core::intake::profile::ProfileInput;
use cardionote_core::persistence::{FileRunStore, RunStore};
use cardionote_core::validator::violations::ViolationKind;
use cardionote_core::validator::StructuredValidator;
use cardionote_core::{
    CoreConfig, CoreError, CoreResult, Provenance, RawGenerationResult, WorkflowController,
    WorkflowState,
};
use serde_json::{json, Value};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NOTE: &str = "45yo male, NSTEMI, PCI to LAD with DES. EF 50%. \
Start DAPT (aspirin + ticagrelor), high-intensity statin, cardiac rehab referral.";

/// Returns one canned response for every call.
struct ScriptedClient {
    response: String,
}

impl GenerationClient for ScriptedClient {
    fn endpoint(&self) -> &str {
        "http://127.0.0.1:11434"
    }

    fn generate(&self, _req: &GenerationRequest) -> CoreResult<RawGenerationResult> {
        Ok(RawGenerationResult::from_response(&self.response))
    }
}

fn structured_sections(skip: Option<&str>) -> Value {
    let sections: Vec<Value> = CANONICAL_ORDER
        .iter()
        .rev()
        .filter(|t| Some(t.as_str()) != skip)
        .map(|t| {
            json!({
                "type": t.as_str(),
                "title": format!("About {}", t.as_str()),
                "content": format!("Plain-language {} for the patient.", t.as_str()),
            })
        })
        .collect();
    json!({ "sections": sections })
}

fn text_blob() -> String {
    [
        "## Introduction",
        "You had a heart attack called an NSTEMI.",
        "## What this means",
        "One artery was narrowed and has been opened with a stent.",
        "## Your treatment",
        "Take aspirin and ticagrelor every day.",
        "## Summary",
        "Your heart is healing.",
    ]
    .join("\n")
}

fn controller_at_generate<'a>(
    store: &'a FileRunStore,
    audit_path: &Path,
) -> CoreResult<WorkflowController<&'a FileRunStore>> {
    let audit = AuditLog::open_or_create(audit_path)?;
    let mut ctl = WorkflowController::new(CoreConfig::default(), store, audit)?;
    ctl.submit_note(ClinicalNote::new(NOTE, None))?;
    ctl.submit_profile(&ProfileInput {
        age: Some(45),
        language: Some("en".to_string()),
        literacy: Some("standard".to_string()),
        ..ProfileInput::default()
    })?;
    Ok(ctl)
}

fn check(cond: bool, what: &str) -> Result<(), String> {
    if cond {
        Ok(())
    } else {
        Err(what.to_string())
    }
}

fn scenario_a(store: &FileRunStore, audit_path: &Path) -> Result<(), String> {
    let mut ctl = controller_at_generate(store, audit_path).map_err(|e| e.to_string())?;
    let client = ScriptedClient {
        response: structured_sections(None).to_string(),
    };
    let doc = ctl
        .generate(&client, &CancelFlag::new())
        .map_err(|e| e.to_string())?;
    check(doc.provenance == Provenance::Structured, "provenance structured")?;
    let order: Vec<_> = doc.sections.iter().map(|s| s.section_type).collect();
    check(order == CANONICAL_ORDER, "canonical order")?;
    check(ctl.state() == WorkflowState::Approve, "state approve")?;
    let stored = store
        .load(ctl.run().run_id())
        .map_err(|e| e.to_string())?
        .ok_or("run not persisted")?;
    check(stored.state == WorkflowState::Approve, "stored state approve")
}

fn scenario_b(store: &FileRunStore, audit_path: &Path) -> Result<(), String> {
    let mut ctl = controller_at_generate(store, audit_path).map_err(|e| e.to_string())?;
    let client = ScriptedClient { response: text_blob() };
    let doc = ctl
        .generate(&client, &CancelFlag::new())
        .map_err(|e| e.to_string())?;
    check(doc.provenance == Provenance::Fallback, "provenance fallback")?;
    check(doc.sections.len() == CANONICAL_ORDER.len(), "seven sections")?;
    check(!doc.missing_types.is_empty(), "placeholders recorded")
}

fn scenario_c(store: &FileRunStore, audit_path: &Path) -> Result<(), String> {
    let payload = structured_sections(Some("risks"));
    let raw = RawGenerationResult::Structured(payload.clone());
    let violations = match StructuredValidator::default().validate(&raw) {
        Ok(_) => return Err("validator accepted a document without risks".to_string()),
        Err(v) => v,
    };
    check(
        violations.contains(ViolationKind::MISSING_TYPE, "risks"),
        "missing risks violation",
    )?;

    let mut ctl = controller_at_generate(store, audit_path).map_err(|e| e.to_string())?;
    let client = ScriptedClient {
        response: payload.to_string(),
    };
    let doc = ctl
        .generate(&client, &CancelFlag::new())
        .map_err(|e| e.to_string())?;
    check(doc.provenance == Provenance::Fallback, "provenance fallback")?;
    check(doc.sections.len() == CANONICAL_ORDER.len(), "seven sections")?;
    let treatment = doc
        .sections
        .iter()
        .find(|s| s.section_type.as_str() == "treatment")
        .ok_or("no treatment section")?;
    check(
        treatment.content.contains("Plain-language treatment"),
        "structured content carried into fallback",
    )
}

fn scenario_d(store: &FileRunStore, audit_path: &Path) -> Result<(), String> {
    let mut ctl = controller_at_generate(store, audit_path).map_err(|e| e.to_string())?;
    let client = ScriptedClient {
        response: structured_sections(None).to_string(),
    };
    ctl.generate(&client, &CancelFlag::new())
        .map_err(|e| e.to_string())?;
    for t in CANONICAL_ORDER.iter().take(6) {
        ctl.approve_section(*t, "Dr. Rivera")
            .map_err(|e| e.to_string())?;
    }
    let before = ctl.run().clone();
    match ctl.deliver("Dr. Rivera") {
        Err(CoreError::ApprovalIncomplete { pending }) => {
            check(pending.len() == 1, "one pending section")?
        }
        Err(e) => return Err(format!("unexpected error: {}", e)),
        Ok(_) => return Err("partial approval was delivered".to_string()),
    }
    check(ctl.state() == WorkflowState::Approve, "state approve")?;
    check(*ctl.run() == before, "run data unchanged")
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardionote=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let tmp = match tempfile::tempdir() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("cannot create temp dir: {}", e);
            std::process::exit(2);
        }
    };
    let store = match FileRunStore::open(tmp.path().join("store")) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot open run store: {}", e);
            std::process::exit(2);
        }
    };
    let audit_path = std::env::var("CARDIONOTE_AUDIT_LOG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| tmp.path().join("audit_log.ndjson"));

    let scenarios: [(&str, fn(&FileRunStore, &Path) -> Result<(), String>); 4] = [
        ("A_STRUCTURED_RESPONSE", scenario_a),
        ("B_TEXT_RESPONSE", scenario_b),
        ("C_MISSING_RISKS", scenario_c),
        ("D_PARTIAL_APPROVAL", scenario_d),
    ];

    let mut any_fail = false;
    for (id, run) in scenarios {
        match run(&store, &audit_path) {
            Ok(()) => println!("SCENARIO {} PASS", id),
            Err(why) => {
                any_fail = true;
                println!("SCENARIO {} FAIL {}", id, why);
            }
        }
    }

    let chain = AuditLog::open_or_create(&audit_path)
        .and_then(|log| log.events())
        .and_then(|events| verify_chain(&events).map(|head| (events.len(), head)));
    match chain {
        Ok((count, head)) => println!("AUDIT_CHAIN PASS events={} head={}", count, head),
        Err(e) => {
            any_fail = true;
            println!("AUDIT_CHAIN FAIL {}", e);
        }
    }

    if any_fail {
        std::process::exit(1);
    }
}
