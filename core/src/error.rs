use crate::document::schema::SectionType;
use crate::workflow::state::{WorkflowAction, WorkflowState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing or invalid Intake/Personalize input. Correctable in place.
    #[error("validation input error: {0}")]
    ValidationInput(String),

    #[error("illegal transition: {action:?} is not allowed from {from:?}")]
    IllegalTransition {
        from: WorkflowState,
        action: WorkflowAction,
    },

    #[error("generation failed ({category}, retryable={retryable}): {message}")]
    GenerationFailed {
        category: String,
        retryable: bool,
        message: String,
    },

    #[error("generation cancelled; run remains in Generate")]
    GenerationCancelled,

    #[error("approval incomplete: {} section(s) pending", pending.len())]
    ApprovalIncomplete { pending: Vec<SectionType> },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The change was saved and applied; only the audit write after it
    /// failed. Repeating the operation would be an illegal transition.
    #[error("run {run_id} committed in {state} but the audit write failed: {source}")]
    AuditAfterCommit {
        run_id: String,
        state: WorkflowState,
        source: Box<CoreError>,
    },

    #[error("determinism violation: {0}")]
    DeterminismViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether retrying the same operation without changing input may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::GenerationFailed { retryable, .. } => *retryable,
            CoreError::GenerationCancelled => true,
            CoreError::Persistence(_) | CoreError::Io(_) => true,
            _ => false,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
