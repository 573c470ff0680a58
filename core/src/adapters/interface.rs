use crate::adapters::loopback::is_loopback_endpoint;
use crate::document::model::RawGenerationResult;
use crate::error::{CoreError, CoreResult};
use crate::intake::note::ClinicalNote;
use crate::intake::profile::PersonalizationProfile;
use serde::{Deserialize, Serialize};

/// What the generation collaborator receives. Prompt text is the
/// collaborator's concern; the core only hands over the inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub run_id: String,
    pub call_id: String,
    pub note_text: String,
    pub profile: PersonalizationProfile,
    pub timeout_ms: u64,
}

impl GenerationRequest {
    pub fn new(
        run_id: &str,
        call_id: &str,
        note: &ClinicalNote,
        profile: &PersonalizationProfile,
        timeout_ms: u64,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            call_id: call_id.to_string(),
            note_text: note.text(),
            profile: profile.clone(),
            timeout_ms,
        }
    }
}

pub trait GenerationClient {
    fn endpoint(&self) -> &str;
    fn generate(&self, req: &GenerationRequest) -> CoreResult<RawGenerationResult>;
}

impl<T: GenerationClient + ?Sized> GenerationClient for &T {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    fn generate(&self, req: &GenerationRequest) -> CoreResult<RawGenerationResult> {
        (**self).generate(req)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationFailure {
    pub category: String, // TIMEOUT|MODEL_NOT_FOUND|NOT_SUPPORTED|UNAVAILABLE|RUNTIME_ERROR
    /// Always true once surfaced by the controller: the run stays in
    /// Generate and the call can be repeated. `category` says whether the
    /// repeat needs a fix first.
    pub retryable: bool,
    pub message: String,
}

impl From<GenerationFailure> for CoreError {
    fn from(f: GenerationFailure) -> Self {
        CoreError::GenerationFailed {
            category: f.category,
            retryable: f.retryable,
            message: f.message,
        }
    }
}

pub fn enforce_generation_endpoint(endpoint: &str, allow_remote: bool) -> CoreResult<()> {
    if !allow_remote && !is_loopback_endpoint(endpoint)? {
        return Err(CoreError::InvalidInput(format!(
            "generation endpoint rejected: {} is not loopback",
            endpoint
        )));
    }
    Ok(())
}

/// Classify a collaborator error message.
pub fn classify_generation_error(err: &str) -> GenerationFailure {
    let lower = err.to_ascii_lowercase();
    let category = if lower.contains("timeout") || lower.contains("timed out") {
        "TIMEOUT"
    } else if lower.contains("not found") {
        "MODEL_NOT_FOUND"
    } else if lower.contains("unsupported") {
        "NOT_SUPPORTED"
    } else if lower.contains("connection") || lower.contains("unavailable") {
        "UNAVAILABLE"
    } else {
        "RUNTIME_ERROR"
    };
    GenerationFailure {
        category: category.to_string(),
        retryable: true,
        message: err.to_string(),
    }
}

/// Map any error out of a collaborator call into a retryable
/// `GenerationFailed`, keeping a collaborator-supplied category.
pub fn into_generation_failure(err: CoreError) -> CoreError {
    match err {
        CoreError::GenerationFailed {
            category, message, ..
        } => CoreError::GenerationFailed {
            category,
            retryable: true,
            message,
        },
        e @ CoreError::GenerationCancelled => e,
        other => classify_generation_error(&other.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_categories_are_stable() {
        let t = classify_generation_error("request timed out after 120s");
        assert_eq!(t.category, "TIMEOUT");
        assert!(t.retryable);
        let nf = classify_generation_error("model not found");
        assert_eq!(nf.category, "MODEL_NOT_FOUND");
        assert!(nf.retryable);
        assert_eq!(classify_generation_error("unsupported tool").category, "NOT_SUPPORTED");
        assert_eq!(classify_generation_error("boom").category, "RUNTIME_ERROR");
    }

    #[test]
    fn foreign_errors_become_generation_failed() {
        let e = into_generation_failure(CoreError::Persistence("connection reset".to_string()));
        assert!(matches!(
            e,
            CoreError::GenerationFailed { ref category, retryable: true, .. } if category == "UNAVAILABLE"
        ));
    }

    #[test]
    fn collaborator_failures_are_surfaced_as_retryable() {
        let e = into_generation_failure(CoreError::GenerationFailed {
            category: "NOT_SUPPORTED".to_string(),
            retryable: false,
            message: "tool calls unsupported".to_string(),
        });
        assert!(e.is_retryable());
        assert!(matches!(
            e,
            CoreError::GenerationFailed { ref category, .. } if category == "NOT_SUPPORTED"
        ));
    }

    #[test]
    fn endpoint_policy() {
        assert!(enforce_generation_endpoint("http://127.0.0.1:11434", false).is_ok());
        assert!(enforce_generation_endpoint("https://llm.example.org", false).is_err());
        assert!(enforce_generation_endpoint("https://llm.example.org", true).is_ok());
    }
}
