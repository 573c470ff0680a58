use crate::error::{CoreError, CoreResult};
use crate::intake::note::ClinicalNote;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub filename: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

pub trait OcrClient {
    fn extract_text(&self, doc: &UploadedDocument) -> CoreResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OcrStatus {
    NotRequested,
    Extracted,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct NoteCapture {
    pub note: ClinicalNote,
    pub ocr_status: OcrStatus,
}

/// Build the Intake note from typed text plus an optional upload. An OCR
/// failure only costs the extracted text; it becomes an input error only
/// when there is no typed text to fall back on.
pub fn capture_note(
    manual_text: &str,
    upload: Option<&UploadedDocument>,
    ocr: Option<&dyn OcrClient>,
) -> CoreResult<NoteCapture> {
    let (extracted, ocr_status) = match (upload, ocr) {
        (Some(doc), Some(client)) => match client.extract_text(doc) {
            Ok(text) if !text.trim().is_empty() => (Some(text), OcrStatus::Extracted),
            Ok(_) => {
                tracing::warn!(filename = %doc.filename, "OCR returned no text");
                (None, OcrStatus::Failed("no text extracted".to_string()))
            }
            Err(e) => {
                tracing::warn!(filename = %doc.filename, error = %e, "OCR failed, manual entry required");
                (None, OcrStatus::Failed(e.to_string()))
            }
        },
        (Some(doc), None) => {
            tracing::warn!(filename = %doc.filename, "upload supplied without an OCR collaborator");
            (None, OcrStatus::Failed("no OCR collaborator configured".to_string()))
        }
        (None, _) => (None, OcrStatus::NotRequested),
    };

    if manual_text.trim().is_empty() && extracted.is_none() {
        let msg = match &ocr_status {
            OcrStatus::Failed(reason) => format!(
                "text extraction failed ({}); manual text entry required",
                reason
            ),
            _ => "clinical note text cannot be empty".to_string(),
        };
        return Err(CoreError::ValidationInput(msg));
    }

    Ok(NoteCapture {
        note: ClinicalNote::new(manual_text, extracted),
        ocr_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOcr(CoreResult<&'static str>);

    impl OcrClient for FixedOcr {
        fn extract_text(&self, _doc: &UploadedDocument) -> CoreResult<String> {
            match &self.0 {
                Ok(s) => Ok(s.to_string()),
                Err(_) => Err(CoreError::InvalidInput("unreadable scan".to_string())),
            }
        }
    }

    fn upload() -> UploadedDocument {
        UploadedDocument {
            filename: "discharge.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn extracted_text_joins_the_note() {
        let ocr = FixedOcr(Ok("Echo: EF 45%"));
        let cap = capture_note("NSTEMI", Some(&upload()), Some(&ocr)).unwrap();
        assert_eq!(cap.ocr_status, OcrStatus::Extracted);
        assert_eq!(cap.note.text(), "NSTEMI\n\nEcho: EF 45%");
    }

    #[test]
    fn ocr_failure_degrades_to_manual_text() {
        let ocr = FixedOcr(Err(CoreError::InvalidInput(String::new())));
        let cap = capture_note("NSTEMI, PCI to LAD", Some(&upload()), Some(&ocr)).unwrap();
        assert!(matches!(cap.ocr_status, OcrStatus::Failed(_)));
        assert_eq!(cap.note.text(), "NSTEMI, PCI to LAD");
    }

    #[test]
    fn ocr_failure_without_manual_text_asks_for_entry() {
        let ocr = FixedOcr(Err(CoreError::InvalidInput(String::new())));
        let err = capture_note("  ", Some(&upload()), Some(&ocr)).unwrap_err();
        assert!(err.to_string().contains("manual text entry required"));
    }
}
