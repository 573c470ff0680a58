use crate::determinism::run_id::now_rfc3339_utc;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Source note for one run. Captured once at Intake and never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClinicalNote {
    pub source_text: String,
    /// Text pulled from an uploaded document by the OCR collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    pub created_at: String, // RFC3339 UTC
}

impl ClinicalNote {
    pub fn new(source_text: impl Into<String>, extracted_text: Option<String>) -> Self {
        Self {
            source_text: source_text.into(),
            extracted_text: extracted_text.filter(|t| !t.trim().is_empty()),
            created_at: now_rfc3339_utc(),
        }
    }

    /// Typed text first, then OCR text, separated by a blank line.
    pub fn text(&self) -> String {
        let typed = self.source_text.trim();
        let extracted = self.extracted_text.as_deref().map(str::trim).unwrap_or("");
        match (typed.is_empty(), extracted.is_empty()) {
            (false, false) => format!("{}\n\n{}", typed, extracted),
            (false, true) => typed.to_string(),
            (true, false) => extracted.to_string(),
            (true, true) => String::new(),
        }
    }

    pub fn validate(&self, min_chars: usize) -> CoreResult<()> {
        let n = self.text().chars().count();
        if n == 0 {
            return Err(CoreError::ValidationInput(
                "clinical note text cannot be empty".to_string(),
            ));
        }
        if n < min_chars {
            return Err(CoreError::ValidationInput(format!(
                "clinical note is too short ({} < {} characters)",
                n, min_chars
            )));
        }
        Ok(())
    }

    /// `{"source_text": "...", "extracted_text": "..."}`; `created_at` is
    /// stamped at parse time when absent.
    pub fn from_json(json_str: &str) -> CoreResult<Self> {
        let raw: serde_json::Value = serde_json::from_str(json_str)
            .map_err(|e| CoreError::InvalidInput(format!("failed to parse note: {}", e)))?;
        let source_text = raw
            .get("source_text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let extracted_text = raw
            .get("extracted_text")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let mut note = Self::new(source_text, extracted_text);
        if let Some(ts) = raw.get("created_at").and_then(|v| v.as_str()) {
            note.created_at = ts.to_string();
        }
        Ok(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_combines_typed_and_extracted() {
        let note = ClinicalNote::new("45yo male, NSTEMI", Some("Cath report: LAD 90%".into()));
        assert_eq!(note.text(), "45yo male, NSTEMI\n\nCath report: LAD 90%");
        let ocr_only = ClinicalNote::new("   ", Some("Echo: EF 45%".into()));
        assert_eq!(ocr_only.text(), "Echo: EF 45%");
    }

    #[test]
    fn blank_note_is_rejected() {
        let note = ClinicalNote::new(" \n\t", Some("  ".into()));
        assert!(note.extracted_text.is_none());
        assert!(matches!(note.validate(1), Err(CoreError::ValidationInput(_))));
    }

    #[test]
    fn min_chars_is_enforced() {
        let note = ClinicalNote::new("NSTEMI", None);
        assert!(note.validate(6).is_ok());
        assert!(note.validate(7).is_err());
    }

    #[test]
    fn parses_json_note() {
        let note = ClinicalNote::from_json(
            r#"{"source_text": "PCI to LAD", "created_at": "2026-02-12T09:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(note.source_text, "PCI to LAD");
        assert_eq!(note.created_at, "2026-02-12T09:00:00Z");
        assert!(ClinicalNote::from_json("{ broken").is_err());
    }
}
