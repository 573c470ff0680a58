use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Intake,
    Personalize,
    Generate,
    Approve,
    Deliver,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Intake => "intake",
            WorkflowState::Personalize => "personalize",
            WorkflowState::Generate => "generate",
            WorkflowState::Approve => "approve",
            WorkflowState::Deliver => "deliver",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WorkflowState::Deliver
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External instructions the controller accepts. Section edits and
/// approvals are self-loops on Approve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    SubmitNote,
    SubmitProfile,
    CompleteGeneration,
    EditSection,
    ApproveSection,
    Regenerate,
    ConfirmApproval,
    Restart,
    StartNewRound,
}

impl WorkflowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowAction::SubmitNote => "submit_note",
            WorkflowAction::SubmitProfile => "submit_profile",
            WorkflowAction::CompleteGeneration => "complete_generation",
            WorkflowAction::EditSection => "edit_section",
            WorkflowAction::ApproveSection => "approve_section",
            WorkflowAction::Regenerate => "regenerate",
            WorkflowAction::ConfirmApproval => "confirm_approval",
            WorkflowAction::Restart => "restart",
            WorkflowAction::StartNewRound => "start_new_round",
        }
    }
}

/// The transition table. `None` means the action is rejected in `from`.
///
/// `StartNewRound` names the state the *new* run starts in; the delivered
/// run itself never leaves Deliver.
pub fn next_state(from: WorkflowState, action: WorkflowAction) -> Option<WorkflowState> {
    use WorkflowAction as A;
    use WorkflowState as S;
    match (from, action) {
        (S::Intake, A::SubmitNote) => Some(S::Personalize),
        (S::Personalize, A::SubmitProfile) => Some(S::Generate),
        (S::Generate, A::CompleteGeneration) => Some(S::Approve),
        (S::Approve, A::EditSection) => Some(S::Approve),
        (S::Approve, A::ApproveSection) => Some(S::Approve),
        (S::Approve, A::Regenerate) => Some(S::Generate),
        (S::Approve, A::ConfirmApproval) => Some(S::Deliver),
        (S::Deliver, A::StartNewRound) => Some(S::Generate),
        (s, A::Restart) if !s.is_terminal() => Some(S::Intake),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [WorkflowState; 5] = [
        WorkflowState::Intake,
        WorkflowState::Personalize,
        WorkflowState::Generate,
        WorkflowState::Approve,
        WorkflowState::Deliver,
    ];

    const ACTIONS: [WorkflowAction; 9] = [
        WorkflowAction::SubmitNote,
        WorkflowAction::SubmitProfile,
        WorkflowAction::CompleteGeneration,
        WorkflowAction::EditSection,
        WorkflowAction::ApproveSection,
        WorkflowAction::Regenerate,
        WorkflowAction::ConfirmApproval,
        WorkflowAction::Restart,
        WorkflowAction::StartNewRound,
    ];

    #[test]
    fn forward_path_is_linear() {
        assert_eq!(
            next_state(WorkflowState::Intake, WorkflowAction::SubmitNote),
            Some(WorkflowState::Personalize)
        );
        assert_eq!(
            next_state(WorkflowState::Intake, WorkflowAction::SubmitProfile),
            None
        );
        assert_eq!(
            next_state(WorkflowState::Generate, WorkflowAction::ConfirmApproval),
            None
        );
    }

    #[test]
    fn only_confirm_approval_reaches_deliver() {
        for from in STATES {
            for action in ACTIONS {
                if next_state(from, action) == Some(WorkflowState::Deliver) {
                    assert_eq!((from, action), (WorkflowState::Approve, WorkflowAction::ConfirmApproval));
                }
            }
        }
    }

    #[test]
    fn deliver_is_terminal_for_the_run() {
        for action in ACTIONS {
            let next = next_state(WorkflowState::Deliver, action);
            if action != WorkflowAction::StartNewRound {
                assert_eq!(next, None, "{action:?}");
            }
        }
    }

    #[test]
    fn restart_from_every_open_state() {
        for from in STATES.into_iter().filter(|s| !s.is_terminal()) {
            assert_eq!(next_state(from, WorkflowAction::Restart), Some(WorkflowState::Intake));
        }
    }
}
