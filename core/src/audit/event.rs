use crate::determinism::json_canonical;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    Clinician,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub ts_utc: String, // RFC3339 UTC string
    pub event_type: String,
    pub run_id: String,
    pub actor: Actor,
    pub details: serde_json::Value,
    pub prev_event_hash: String, // hex 64
    pub event_hash: String,      // hex 64
}

pub const ZERO_HASH_64: &str = "0000000000000000000000000000000000000000000000000000000000000000";

impl AuditEvent {
    /// Unchained event; the log fills in both hashes on append.
    pub fn new(
        event_type: &str,
        run_id: &str,
        actor: Actor,
        details: serde_json::Value,
    ) -> Self {
        Self {
            ts_utc: crate::determinism::run_id::now_rfc3339_utc(),
            event_type: event_type.to_string(),
            run_id: run_id.to_string(),
            actor,
            details,
            prev_event_hash: String::new(),
            event_hash: String::new(),
        }
    }
}

// event_hash = SHA-256 over the canonical bytes of the full envelope, with
// event_hash itself set to ZERO_HASH_64 while hashing.
pub fn compute_event_hash(event: &AuditEvent) -> CoreResult<String> {
    let mut e = event.clone();
    e.event_hash = ZERO_HASH_64.to_string();
    json_canonical::canonical_sha256_hex(&e)
}

pub fn finalize_event(mut event: AuditEvent) -> CoreResult<AuditEvent> {
    if !is_hex64(&event.prev_event_hash) {
        return Err(CoreError::InvalidInput(
            "prev_event_hash must be 64 hex chars".to_string(),
        ));
    }
    validate_event_taxonomy(&event)?;
    event.event_hash = compute_event_hash(&event)?;
    Ok(event)
}

pub(crate) fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

const ALLOWED_EVENT_TYPES: &[&str] = &[
    "RUN_CREATED",
    "RUN_STATE_CHANGED",
    "RUN_RESTARTED",
    "RUN_RESUMED",
    "NEW_ROUND_STARTED",
    "NOTE_CAPTURED",
    "PROFILE_SET",
    "INPUT_REJECTED",
    "GENERATION_STARTED",
    "GENERATION_COMPLETED",
    "GENERATION_FAILED",
    "GENERATION_CANCELLED",
    "DOCUMENT_NORMALIZED",
    "SECTION_EDITED",
    "SECTION_REVERTED",
    "SECTION_APPROVED",
    "SECTION_APPROVAL_REVOKED",
    "DELIVERY_BLOCKED",
    "DOCUMENT_DELIVERED",
];

fn validate_event_taxonomy(event: &AuditEvent) -> CoreResult<()> {
    if !ALLOWED_EVENT_TYPES.contains(&event.event_type.as_str()) {
        return Err(CoreError::InvalidInput(format!(
            "unknown event_type {}",
            event.event_type
        )));
    }
    for k in required_detail_keys(&event.event_type) {
        if event.details.get(k).is_none() {
            return Err(CoreError::InvalidInput(format!(
                "event {} missing details.{}",
                event.event_type, k
            )));
        }
    }
    Ok(())
}

fn required_detail_keys(event_type: &str) -> &'static [&'static str] {
    match event_type {
        "RUN_CREATED" => &["state", "min_note_chars", "allow_remote_generation"],
        "RUN_STATE_CHANGED" => &["from_state", "to_state", "action"],
        "RUN_RESTARTED" => &["from_state"],
        "RUN_RESUMED" => &["state", "snapshot_version"],
        "NEW_ROUND_STARTED" => &["previous_run_id"],
        "NOTE_CAPTURED" => &["note_sha256", "note_chars", "has_extracted_text"],
        "PROFILE_SET" => &["age_band", "language", "literacy", "comorbidity_count"],
        "INPUT_REJECTED" => &["state", "message"],
        "GENERATION_STARTED" => &["call_id", "endpoint", "request_sha256", "timeout_ms"],
        "GENERATION_COMPLETED" => &["call_id", "response_shape", "duration_ms"],
        "GENERATION_FAILED" => &["call_id", "error_category", "retryable"],
        "GENERATION_CANCELLED" => &["call_id"],
        "DOCUMENT_NORMALIZED" => &["provenance", "missing_types"],
        "SECTION_EDITED" => &["section_type", "content_sha256", "approval_revoked"],
        "SECTION_REVERTED" => &["section_type", "approval_revoked"],
        "SECTION_APPROVED" => &["section_type", "clinician"],
        "SECTION_APPROVAL_REVOKED" => &["section_type", "clinician"],
        "DELIVERY_BLOCKED" => &["pending_sections"],
        "DOCUMENT_DELIVERED" => &["clinician", "document_sha256", "provenance"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_event_types_are_rejected() {
        let mut e = AuditEvent::new("EXPORT_COMPLETED", "wr_x", Actor::System, json!({}));
        e.prev_event_hash = ZERO_HASH_64.to_string();
        assert!(finalize_event(e).is_err());
    }

    #[test]
    fn missing_detail_keys_are_rejected() {
        let mut e = AuditEvent::new(
            "SECTION_APPROVED",
            "wr_x",
            Actor::Clinician,
            json!({"section_type": "risks"}),
        );
        e.prev_event_hash = ZERO_HASH_64.to_string();
        let err = finalize_event(e).unwrap_err();
        assert!(err.to_string().contains("details.clinician"));
    }

    #[test]
    fn hash_covers_details() {
        let mut e = AuditEvent::new(
            "DELIVERY_BLOCKED",
            "wr_x",
            Actor::Clinician,
            json!({"pending_sections": ["risks"]}),
        );
        e.prev_event_hash = ZERO_HASH_64.to_string();
        let a = finalize_event(e.clone()).unwrap();
        e.details = json!({"pending_sections": ["summary"]});
        let b = finalize_event(e).unwrap();
        assert!(is_hex64(&a.event_hash));
        assert_ne!(a.event_hash, b.event_hash);
    }
}
