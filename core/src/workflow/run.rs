use super::approval::{ApprovedDocument, DraftDocument};
use super::state::{next_state, WorkflowAction, WorkflowState};
use crate::determinism::run_id::{is_run_id, now_rfc3339_utc, run_id_ulid};
use crate::document::model::{Provenance, Section};
use crate::error::{CoreError, CoreResult};
use crate::intake::note::ClinicalNote;
use crate::intake::profile::PersonalizationProfile;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of a run, offered to the store at every transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSnapshot {
    pub snapshot_version: u32,
    pub run_id: String,
    pub state: WorkflowState,
    pub round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<ClinicalNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<PersonalizationProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<ApprovedDocument>,
    pub created_at: String,
    pub updated_at: String,
}

/// One end-to-end invocation. Fields are private; every change goes
/// through the controller and the transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    run_id: String,
    state: WorkflowState,
    round: u32,
    previous_run_id: Option<String>,
    note: Option<ClinicalNote>,
    profile: Option<PersonalizationProfile>,
    draft: Option<DraftDocument>,
    approved: Option<ApprovedDocument>,
    created_at: String,
    updated_at: String,
}

impl WorkflowRun {
    pub(crate) fn new() -> Self {
        let now = now_rfc3339_utc();
        Self {
            run_id: run_id_ulid(),
            state: WorkflowState::Intake,
            round: 1,
            previous_run_id: None,
            note: None,
            profile: None,
            draft: None,
            approved: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Fresh run that reuses a delivered run's note and profile and starts
    /// in Generate.
    pub(crate) fn next_round(delivered: &WorkflowRun) -> CoreResult<Self> {
        let state = next_state(delivered.state, WorkflowAction::StartNewRound).ok_or(
            CoreError::IllegalTransition {
                from: delivered.state,
                action: WorkflowAction::StartNewRound,
            },
        )?;
        let mut run = Self::new();
        run.state = state;
        run.round = delivered.round + 1;
        run.previous_run_id = Some(delivered.run_id.clone());
        run.note = delivered.note.clone();
        run.profile = delivered.profile.clone();
        Ok(run)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn previous_run_id(&self) -> Option<&str> {
        self.previous_run_id.as_deref()
    }

    pub fn note(&self) -> Option<&ClinicalNote> {
        self.note.as_ref()
    }

    pub fn profile(&self) -> Option<&PersonalizationProfile> {
        self.profile.as_ref()
    }

    pub fn draft(&self) -> Option<&DraftDocument> {
        self.draft.as_ref()
    }

    pub fn approved_document(&self) -> Option<&ApprovedDocument> {
        self.approved.as_ref()
    }

    pub fn sections(&self) -> &[Section] {
        match (&self.approved, &self.draft) {
            (Some(doc), _) => doc.sections(),
            (None, Some(draft)) => draft.sections(),
            (None, None) => &[],
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.draft.as_ref().map(DraftDocument::provenance)
    }

    /// Moves to the state the table assigns to `action` and returns it.
    pub(crate) fn apply(&mut self, action: WorkflowAction) -> CoreResult<WorkflowState> {
        let next = next_state(self.state, action).ok_or(CoreError::IllegalTransition {
            from: self.state,
            action,
        })?;
        self.state = next;
        self.updated_at = now_rfc3339_utc();
        Ok(next)
    }

    pub(crate) fn set_note(&mut self, note: ClinicalNote) {
        self.note = Some(note);
    }

    pub(crate) fn set_profile(&mut self, profile: PersonalizationProfile) {
        self.profile = Some(profile);
    }

    pub(crate) fn set_draft(&mut self, draft: Option<DraftDocument>) {
        self.draft = draft;
    }

    pub(crate) fn draft_mut(&mut self) -> CoreResult<&mut DraftDocument> {
        let state = self.state;
        self.draft.as_mut().ok_or_else(|| {
            CoreError::InvalidInput(format!("run in {} has no draft document", state))
        })
    }

    pub(crate) fn set_approved(&mut self, doc: ApprovedDocument) {
        self.approved = Some(doc);
    }

    pub(crate) fn clear_inputs(&mut self) {
        self.note = None;
        self.profile = None;
        self.draft = None;
        self.approved = None;
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            snapshot_version: SNAPSHOT_VERSION,
            run_id: self.run_id.clone(),
            state: self.state,
            round: self.round,
            previous_run_id: self.previous_run_id.clone(),
            note: self.note.clone(),
            profile: self.profile.clone(),
            draft: self.draft.clone(),
            approved: self.approved.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }

    /// Rebuilds a run from a stored snapshot, rejecting any snapshot whose
    /// contents do not fit its state. Reached through
    /// `WorkflowController::resume`.
    pub(crate) fn restore(s: RunSnapshot) -> CoreResult<Self> {
        if s.snapshot_version != SNAPSHOT_VERSION {
            return Err(CoreError::InvalidInput(format!(
                "unsupported snapshot_version {}",
                s.snapshot_version
            )));
        }
        if !is_run_id(&s.run_id) {
            return Err(CoreError::InvalidInput(format!("invalid run id '{}'", s.run_id)));
        }

        use WorkflowState as S;
        let has = (
            s.note.is_some(),
            s.profile.is_some(),
            s.draft.is_some(),
            s.approved.is_some(),
        );
        let expected = match s.state {
            S::Intake => (false, false, false, false),
            S::Personalize => (true, false, false, false),
            S::Generate => (true, true, false, false),
            S::Approve => (true, true, true, false),
            S::Deliver => (true, true, true, true),
        };
        if has != expected {
            return Err(CoreError::InvalidInput(format!(
                "snapshot contents do not match state {}",
                s.state
            )));
        }

        if let Some(draft) = &s.draft {
            draft.check_shape()?;
        }
        if let (Some(draft), Some(doc)) = (&s.draft, &s.approved) {
            if !draft.is_fully_approved() || draft.sections() != doc.sections() {
                return Err(CoreError::InvalidInput(
                    "delivered document does not match its approved draft".to_string(),
                ));
            }
        }

        Ok(Self {
            run_id: s.run_id,
            state: s.state,
            round: s.round,
            previous_run_id: s.previous_run_id,
            note: s.note,
            profile: s.profile,
            draft: s.draft,
            approved: s.approved,
            created_at: s.created_at,
            updated_at: s.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_at_intake() {
        let run = WorkflowRun::new();
        assert_eq!(run.state(), WorkflowState::Intake);
        assert!(run.run_id().starts_with("wr_"));
        assert!(run.sections().is_empty());
    }

    #[test]
    fn illegal_action_leaves_state() {
        let mut run = WorkflowRun::new();
        let err = run.apply(WorkflowAction::ConfirmApproval).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IllegalTransition {
                from: WorkflowState::Intake,
                action: WorkflowAction::ConfirmApproval
            }
        ));
        assert_eq!(run.state(), WorkflowState::Intake);
    }

    #[test]
    fn snapshot_restores_to_equal_run() {
        let mut run = WorkflowRun::new();
        run.set_note(ClinicalNote::new("NSTEMI", None));
        run.apply(WorkflowAction::SubmitNote).unwrap();
        let back = WorkflowRun::restore(run.snapshot()).unwrap();
        assert_eq!(back, run);
    }

    #[test]
    fn forged_deliver_snapshot_is_rejected() {
        let mut snap = WorkflowRun::new().snapshot();
        snap.state = WorkflowState::Deliver;
        assert!(WorkflowRun::restore(snap).is_err());
    }

    #[test]
    fn bad_run_id_is_rejected() {
        let mut snap = WorkflowRun::new().snapshot();
        snap.run_id = "../escape".to_string();
        assert!(WorkflowRun::restore(snap).is_err());
    }
}
