use super::approval::{ApprovedDocument, DraftDocument};
use super::run::WorkflowRun;
use super::state::{WorkflowAction, WorkflowState};
use crate::adapters::cancel::CancelFlag;
use crate::adapters::interface::{
    enforce_generation_endpoint, into_generation_failure, GenerationClient, GenerationRequest,
};
use crate::audit::event::{Actor, AuditEvent};
use crate::audit::log::AuditLog;
use crate::config::CoreConfig;
use crate::determinism::json_canonical::canonical_sha256_hex;
use crate::determinism::run_id::{call_id_ulid, now_rfc3339_utc, sha256_hex};
use crate::document::model::NormalizedDocument;
use crate::document::normalizer::DocumentNormalizer;
use crate::document::schema::{SectionType, CANONICAL_ORDER};
use crate::error::{CoreError, CoreResult};
use crate::intake::note::ClinicalNote;
use crate::intake::profile::{PersonalizationProfile, ProfileInput};
use crate::persistence::RunStore;
use serde_json::json;
use std::time::Instant;

/// Drives one run through Intake, Personalize, Generate, Approve and
/// Deliver.
///
/// Every mutation is applied to a copy of the run, saved, and only then
/// committed, so a failed save leaves the run exactly as it was.
pub struct WorkflowController<S: RunStore> {
    run: WorkflowRun,
    store: S,
    audit: AuditLog,
    config: CoreConfig,
}

impl<S: RunStore> WorkflowController<S> {
    pub fn new(config: CoreConfig, store: S, audit: AuditLog) -> CoreResult<Self> {
        config.validate()?;
        let run = WorkflowRun::new();
        store.save(&run.snapshot())?;
        let mut ctl = Self {
            run,
            store,
            audit,
            config,
        };
        ctl.emit_committed(
            "RUN_CREATED",
            Actor::System,
            json!({
                "state": ctl.run.state().as_str(),
                "min_note_chars": ctl.config.min_note_chars,
                "allow_remote_generation": ctl.config.allow_remote_generation,
            }),
        )?;
        tracing::info!(run_id = %ctl.run.run_id(), "workflow run created");
        Ok(ctl)
    }

    /// Reloads a stored run. Unknown ids and inconsistent snapshots are errors.
    pub fn resume(config: CoreConfig, store: S, audit: AuditLog, run_id: &str) -> CoreResult<Self> {
        config.validate()?;
        let snapshot = store
            .load(run_id)?
            .ok_or_else(|| CoreError::InvalidInput(format!("run {} not found", run_id)))?;
        let version = snapshot.snapshot_version;
        let run = WorkflowRun::restore(snapshot)?;
        let mut ctl = Self {
            run,
            store,
            audit,
            config,
        };
        ctl.emit(
            "RUN_RESUMED",
            Actor::System,
            json!({"state": ctl.run.state().as_str(), "snapshot_version": version}),
        )?;
        tracing::info!(run_id = %run_id, state = %ctl.run.state(), "workflow run resumed");
        Ok(ctl)
    }

    pub fn run(&self) -> &WorkflowRun {
        &self.run
    }

    pub fn state(&self) -> WorkflowState {
        self.run.state()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn submit_note(&mut self, note: ClinicalNote) -> CoreResult<()> {
        self.require(WorkflowAction::SubmitNote)?;
        if let Err(e) = note.validate(self.config.min_note_chars) {
            self.reject_input(&e)?;
            return Err(e);
        }
        let text = note.text();
        let details = json!({
            "note_sha256": sha256_hex(text.as_bytes()),
            "note_chars": text.chars().count(),
            "has_extracted_text": note.extracted_text.is_some(),
        });

        let mut next = self.run.clone();
        next.set_note(note);
        self.transition(next, WorkflowAction::SubmitNote, Actor::Clinician)?;
        self.emit_committed("NOTE_CAPTURED", Actor::Clinician, details)
    }

    pub fn submit_profile(&mut self, input: &ProfileInput) -> CoreResult<&PersonalizationProfile> {
        self.require(WorkflowAction::SubmitProfile)?;
        let profile = match PersonalizationProfile::from_input(input) {
            Ok(p) => p,
            Err(e) => {
                self.reject_input(&e)?;
                return Err(e);
            }
        };
        let details = json!({
            "age_band": profile.age_band,
            "language": profile.language.code(),
            "literacy": profile.literacy,
            "comorbidity_count": profile.comorbidities.len(),
        });

        let mut next = self.run.clone();
        next.set_profile(profile);
        self.transition(next, WorkflowAction::SubmitProfile, Actor::Clinician)?;
        self.emit_committed("PROFILE_SET", Actor::Clinician, details)?;
        self.run
            .profile()
            .ok_or_else(|| CoreError::InvalidInput("profile missing after commit".to_string()))
    }

    /// Calls the generation collaborator, normalizes its response and moves
    /// to Approve. On failure or cancellation the run stays in Generate and
    /// can be retried without repeating Intake or Personalize.
    pub fn generate<G: GenerationClient>(
        &mut self,
        client: &G,
        cancel: &CancelFlag,
    ) -> CoreResult<NormalizedDocument> {
        self.require(WorkflowAction::CompleteGeneration)?;
        enforce_generation_endpoint(client.endpoint(), self.config.allow_remote_generation)?;
        let (note, profile) = match (self.run.note(), self.run.profile()) {
            (Some(n), Some(p)) => (n, p),
            _ => {
                return Err(CoreError::InvalidInput(
                    "run in generate is missing note or profile".to_string(),
                ))
            }
        };
        let call_id = call_id_ulid();
        let request = GenerationRequest::new(
            self.run.run_id(),
            &call_id,
            note,
            profile,
            self.config.generation_timeout_ms,
        );
        let language = profile.language;

        let span = tracing::info_span!("generation", run_id = %self.run.run_id(), call_id = %call_id);
        let _guard = span.enter();

        if cancel.is_cancelled() {
            return self.cancelled(&call_id);
        }
        self.emit(
            "GENERATION_STARTED",
            Actor::System,
            json!({
                "call_id": call_id,
                "endpoint": client.endpoint(),
                "request_sha256": canonical_sha256_hex(&request)?,
                "timeout_ms": request.timeout_ms,
            }),
        )?;

        let started = Instant::now();
        let outcome = client.generate(&request);
        let duration_ms = started.elapsed().as_millis() as u64;

        if cancel.is_cancelled() {
            return self.cancelled(&call_id);
        }
        let raw = match outcome.map_err(into_generation_failure) {
            Ok(raw) => raw,
            Err(CoreError::GenerationCancelled) => return self.cancelled(&call_id),
            Err(e) => {
                let (category, retryable) = match &e {
                    CoreError::GenerationFailed {
                        category,
                        retryable,
                        ..
                    } => (category.clone(), *retryable),
                    _ => ("RUNTIME_ERROR".to_string(), true),
                };
                tracing::warn!(error = %e, duration_ms, "generation failed, run stays in generate");
                self.emit(
                    "GENERATION_FAILED",
                    Actor::System,
                    json!({"call_id": call_id, "error_category": category, "retryable": retryable}),
                )?;
                return Err(e);
            }
        };
        self.emit(
            "GENERATION_COMPLETED",
            Actor::System,
            json!({"call_id": call_id, "response_shape": raw.shape(), "duration_ms": duration_ms}),
        )?;

        let normalized = DocumentNormalizer::from_config(&self.config, language).normalize(&raw);
        let missing: Vec<&str> = normalized.missing_types.iter().map(|t| t.as_str()).collect();
        let provenance = normalized.provenance;

        let mut next = self.run.clone();
        next.set_draft(Some(DraftDocument::from_normalized(normalized.clone())));
        self.transition(next, WorkflowAction::CompleteGeneration, Actor::System)?;
        self.emit_committed(
            "DOCUMENT_NORMALIZED",
            Actor::System,
            json!({"provenance": provenance.as_str(), "missing_types": missing}),
        )?;
        tracing::info!(provenance = provenance.as_str(), duration_ms, "document ready for approval");
        Ok(normalized)
    }

    pub fn edit_section(&mut self, section_type: SectionType, text: &str) -> CoreResult<()> {
        self.require(WorkflowAction::EditSection)?;
        let mut next = self.run.clone();
        let revoked = next.draft_mut()?.edit(section_type, text)?;
        self.commit_in_place(next, WorkflowAction::EditSection)?;
        self.emit_committed(
            "SECTION_EDITED",
            Actor::Clinician,
            json!({
                "section_type": section_type.as_str(),
                "content_sha256": sha256_hex(text.as_bytes()),
                "approval_revoked": revoked,
            }),
        )
    }

    /// Drops the clinician's edit, restoring the generated content.
    pub fn revert_section(&mut self, section_type: SectionType) -> CoreResult<()> {
        self.require(WorkflowAction::EditSection)?;
        let mut next = self.run.clone();
        let revoked = next.draft_mut()?.revert(section_type)?;
        self.commit_in_place(next, WorkflowAction::EditSection)?;
        self.emit_committed(
            "SECTION_REVERTED",
            Actor::Clinician,
            json!({"section_type": section_type.as_str(), "approval_revoked": revoked}),
        )
    }

    pub fn approve_section(&mut self, section_type: SectionType, clinician: &str) -> CoreResult<()> {
        self.require(WorkflowAction::ApproveSection)?;
        let clinician = require_clinician(clinician)?;
        let mut next = self.run.clone();
        next.draft_mut()?.approve(section_type)?;
        self.commit_in_place(next, WorkflowAction::ApproveSection)?;
        self.emit_committed(
            "SECTION_APPROVED",
            Actor::Clinician,
            json!({"section_type": section_type.as_str(), "clinician": clinician}),
        )
    }

    pub fn revoke_approval(&mut self, section_type: SectionType, clinician: &str) -> CoreResult<()> {
        self.require(WorkflowAction::ApproveSection)?;
        let clinician = require_clinician(clinician)?;
        let mut next = self.run.clone();
        if !next.draft_mut()?.revoke(section_type)? {
            return Ok(());
        }
        self.commit_in_place(next, WorkflowAction::ApproveSection)?;
        self.emit_committed(
            "SECTION_APPROVAL_REVOKED",
            Actor::Clinician,
            json!({"section_type": section_type.as_str(), "clinician": clinician}),
        )
    }

    pub fn approve_all(&mut self, clinician: &str) -> CoreResult<()> {
        self.require(WorkflowAction::ApproveSection)?;
        let clinician = require_clinician(clinician)?;
        let newly: Vec<SectionType> = self.pending_sections();
        let mut next = self.run.clone();
        next.draft_mut()?.approve_all();
        self.commit_in_place(next, WorkflowAction::ApproveSection)?;
        for t in newly {
            self.emit_committed(
                "SECTION_APPROVED",
                Actor::Clinician,
                json!({"section_type": t.as_str(), "clinician": clinician}),
            )?;
        }
        Ok(())
    }

    /// Unapproved sections in canonical order. Before a draft exists every
    /// section counts as pending.
    pub fn pending_sections(&self) -> Vec<SectionType> {
        match self.run.draft() {
            Some(draft) => draft.pending(),
            None => CANONICAL_ORDER.to_vec(),
        }
    }

    /// The approval gate. Succeeds only in Approve with every section
    /// approved; otherwise the run is left untouched.
    pub fn deliver(&mut self, clinician: &str) -> CoreResult<&ApprovedDocument> {
        self.require(WorkflowAction::ConfirmApproval)?;
        let clinician = require_clinician(clinician)?;
        let pending = self.pending_sections();
        if !pending.is_empty() {
            let names: Vec<&str> = pending.iter().map(|t| t.as_str()).collect();
            tracing::warn!(pending = ?names, "delivery blocked, sections awaiting approval");
            self.emit(
                "DELIVERY_BLOCKED",
                Actor::Clinician,
                json!({"pending_sections": names}),
            )?;
            return Err(CoreError::ApprovalIncomplete { pending });
        }
        let language = self
            .run
            .profile()
            .map(|p| p.language)
            .ok_or_else(|| CoreError::InvalidInput("run has no profile".to_string()))?;
        let draft = self
            .run
            .draft()
            .ok_or_else(|| CoreError::InvalidInput("run has no draft document".to_string()))?;
        let doc = ApprovedDocument::from_draft(draft, language, &clinician, now_rfc3339_utc())?;
        let details = json!({
            "clinician": clinician,
            "document_sha256": doc.digest_sha256(),
            "provenance": doc.provenance().as_str(),
        });

        let mut next = self.run.clone();
        next.set_approved(doc);
        self.transition(next, WorkflowAction::ConfirmApproval, Actor::Clinician)?;
        self.emit_committed("DOCUMENT_DELIVERED", Actor::Clinician, details)?;
        tracing::info!(run_id = %self.run.run_id(), "document delivered");
        self.run
            .approved_document()
            .ok_or_else(|| CoreError::InvalidInput("approved document missing after commit".to_string()))
    }

    /// Approve back to Generate. The current draft and its approvals are discarded.
    pub fn regenerate(&mut self) -> CoreResult<()> {
        self.require(WorkflowAction::Regenerate)?;
        let mut next = self.run.clone();
        next.set_draft(None);
        self.transition(next, WorkflowAction::Regenerate, Actor::Clinician)
    }

    /// Back to Intake from any non-terminal state, dropping all inputs.
    pub fn restart(&mut self) -> CoreResult<()> {
        let from = self.run.state();
        self.require(WorkflowAction::Restart)?;
        let mut next = self.run.clone();
        next.clear_inputs();
        self.transition(next, WorkflowAction::Restart, Actor::Clinician)?;
        self.emit_committed("RUN_RESTARTED", Actor::Clinician, json!({"from_state": from.as_str()}))
    }

    /// Leaves the delivered run untouched and returns a controller for a new
    /// run that reuses its note and profile, starting in Generate.
    pub fn start_new_round(self) -> CoreResult<Self> {
        let run = WorkflowRun::next_round(&self.run)?;
        self.store.save(&run.snapshot())?;
        let previous = self.run.run_id().to_string();
        let mut ctl = Self {
            run,
            store: self.store,
            audit: self.audit,
            config: self.config,
        };
        ctl.emit_committed(
            "NEW_ROUND_STARTED",
            Actor::Clinician,
            json!({"previous_run_id": previous}),
        )?;
        tracing::info!(run_id = %ctl.run.run_id(), previous_run_id = %previous, "new round started");
        Ok(ctl)
    }

    fn require(&self, action: WorkflowAction) -> CoreResult<WorkflowState> {
        super::state::next_state(self.run.state(), action).ok_or(CoreError::IllegalTransition {
            from: self.run.state(),
            action,
        })
    }

    fn transition(&mut self, mut next: WorkflowRun, action: WorkflowAction, actor: Actor) -> CoreResult<()> {
        let from = self.run.state();
        let to = next.apply(action)?;
        self.store.save(&next.snapshot())?;
        self.run = next;
        tracing::debug!(from = %from, to = %to, action = action.as_str(), "state changed");
        self.emit_committed(
            "RUN_STATE_CHANGED",
            actor,
            json!({"from_state": from.as_str(), "to_state": to.as_str(), "action": action.as_str()}),
        )
    }

    fn commit_in_place(&mut self, mut next: WorkflowRun, action: WorkflowAction) -> CoreResult<()> {
        next.apply(action)?;
        self.store.save(&next.snapshot())?;
        self.run = next;
        Ok(())
    }

    fn reject_input(&mut self, err: &CoreError) -> CoreResult<()> {
        tracing::info!(state = %self.run.state(), error = %err, "input rejected");
        self.emit(
            "INPUT_REJECTED",
            Actor::Clinician,
            json!({"state": self.run.state().as_str(), "message": err.to_string()}),
        )
    }

    fn cancelled<T>(&mut self, call_id: &str) -> CoreResult<T> {
        tracing::info!("generation cancelled, run stays in generate");
        self.emit("GENERATION_CANCELLED", Actor::Clinician, json!({"call_id": call_id}))?;
        Err(CoreError::GenerationCancelled)
    }

    /// Audit write for a change that is already saved and applied. A failure
    /// here must not look like the change itself failed.
    fn emit_committed(&mut self, event_type: &str, actor: Actor, details: serde_json::Value) -> CoreResult<()> {
        self.emit(event_type, actor, details).map_err(|e| {
            tracing::error!(event_type, error = %e, "audit write failed after commit");
            CoreError::AuditAfterCommit {
                run_id: self.run.run_id().to_string(),
                state: self.run.state(),
                source: Box::new(e),
            }
        })
    }

    fn emit(&mut self, event_type: &str, actor: Actor, details: serde_json::Value) -> CoreResult<()> {
        self.audit
            .append(AuditEvent::new(event_type, self.run.run_id(), actor, details))?;
        Ok(())
    }
}

fn require_clinician(clinician: &str) -> CoreResult<String> {
    let name = clinician.trim();
    if name.is_empty() {
        return Err(CoreError::ValidationInput(
            "approving clinician must be named".to_string(),
        ));
    }
    Ok(name.to_string())
}
