use crate::determinism::json_canonical::canonical_sha256_hex;
use crate::document::model::{NormalizedDocument, Provenance, Section};
use crate::document::schema::{SectionType, CANONICAL_ORDER};
use crate::error::{CoreError, CoreResult};
use crate::locale::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Normalized sections awaiting clinician review, with per-section approvals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftDocument {
    sections: Vec<Section>,
    provenance: Provenance,
    #[serde(default)]
    missing_types: Vec<SectionType>,
    #[serde(default)]
    approved: BTreeSet<SectionType>,
}

impl DraftDocument {
    pub fn from_normalized(doc: NormalizedDocument) -> Self {
        Self {
            sections: doc.sections,
            provenance: doc.provenance,
            missing_types: doc.missing_types,
            approved: BTreeSet::new(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, section_type: SectionType) -> Option<&Section> {
        self.sections.iter().find(|s| s.section_type == section_type)
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn missing_types(&self) -> &[SectionType] {
        &self.missing_types
    }

    pub fn is_approved(&self, section_type: SectionType) -> bool {
        self.approved.contains(&section_type)
    }

    /// Unapproved section types in canonical order.
    pub fn pending(&self) -> Vec<SectionType> {
        CANONICAL_ORDER
            .into_iter()
            .filter(|t| !self.approved.contains(t))
            .collect()
    }

    pub fn is_fully_approved(&self) -> bool {
        self.pending().is_empty()
    }

    fn section_mut(&mut self, section_type: SectionType) -> CoreResult<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.section_type == section_type)
            .ok_or_else(|| {
                CoreError::InvalidInput(format!("draft has no '{}' section", section_type))
            })
    }

    /// Free-text edits are always accepted. Returns whether an approval
    /// was revoked because the effective content changed.
    pub(crate) fn edit(&mut self, section_type: SectionType, text: &str) -> CoreResult<bool> {
        let section = self.section_mut(section_type)?;
        let changed = section.effective_content() != text;
        section.editable_content = Some(text.to_string());
        Ok(changed && self.approved.remove(&section_type))
    }

    pub(crate) fn revert(&mut self, section_type: SectionType) -> CoreResult<bool> {
        let section = self.section_mut(section_type)?;
        let changed = section.effective_content() != section.content;
        section.editable_content = None;
        Ok(changed && self.approved.remove(&section_type))
    }

    pub(crate) fn approve(&mut self, section_type: SectionType) -> CoreResult<()> {
        self.section_mut(section_type)?;
        self.approved.insert(section_type);
        Ok(())
    }

    pub(crate) fn revoke(&mut self, section_type: SectionType) -> CoreResult<bool> {
        self.section_mut(section_type)?;
        Ok(self.approved.remove(&section_type))
    }

    pub(crate) fn approve_all(&mut self) {
        self.approved = self.sections.iter().map(|s| s.section_type).collect();
    }

    pub(crate) fn check_shape(&self) -> CoreResult<()> {
        check_canonical_sections(&self.sections)
    }
}

fn check_canonical_sections(sections: &[Section]) -> CoreResult<()> {
    let types: Vec<SectionType> = sections.iter().map(|s| s.section_type).collect();
    if types != CANONICAL_ORDER {
        return Err(CoreError::InvalidInput(format!(
            "document must hold the seven sections in canonical order, found {:?}",
            types
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct DigestEntry<'a> {
    #[serde(rename = "type")]
    section_type: SectionType,
    title: &'a str,
    content: &'a str,
}

/// SHA-256 over the canonical JSON of each section's type, title and
/// effective content.
pub fn document_digest(sections: &[Section]) -> CoreResult<String> {
    let entries: Vec<DigestEntry<'_>> = sections
        .iter()
        .map(|s| DigestEntry {
            section_type: s.section_type,
            title: &s.title,
            content: s.effective_content(),
        })
        .collect();
    canonical_sha256_hex(&entries)
}

/// The terminal artifact of a run. Only the workflow can build one, and a
/// deserialized copy is accepted only when its digest still matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "ApprovedDocumentRecord")]
pub struct ApprovedDocument {
    sections: Vec<Section>,
    provenance: Provenance,
    language: Language,
    approved_by: String,
    approved_at: String,
    digest_sha256: String,
}

#[derive(Deserialize)]
struct ApprovedDocumentRecord {
    sections: Vec<Section>,
    provenance: Provenance,
    language: Language,
    approved_by: String,
    approved_at: String,
    digest_sha256: String,
}

impl TryFrom<ApprovedDocumentRecord> for ApprovedDocument {
    type Error = CoreError;

    fn try_from(r: ApprovedDocumentRecord) -> CoreResult<Self> {
        check_canonical_sections(&r.sections)?;
        if r.approved_by.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "approved document has no approving clinician".to_string(),
            ));
        }
        let digest = document_digest(&r.sections)?;
        if digest != r.digest_sha256 {
            return Err(CoreError::InvalidInput(
                "approved document digest does not match its sections".to_string(),
            ));
        }
        Ok(Self {
            sections: r.sections,
            provenance: r.provenance,
            language: r.language,
            approved_by: r.approved_by,
            approved_at: r.approved_at,
            digest_sha256: r.digest_sha256,
        })
    }
}

impl ApprovedDocument {
    pub(crate) fn from_draft(
        draft: &DraftDocument,
        language: Language,
        clinician: &str,
        approved_at: String,
    ) -> CoreResult<Self> {
        let pending = draft.pending();
        if !pending.is_empty() {
            return Err(CoreError::ApprovalIncomplete { pending });
        }
        draft.check_shape()?;
        Ok(Self {
            digest_sha256: document_digest(&draft.sections)?,
            sections: draft.sections.clone(),
            provenance: draft.provenance,
            language,
            approved_by: clinician.to_string(),
            approved_at,
        })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn approved_by(&self) -> &str {
        &self.approved_by
    }

    pub fn approved_at(&self) -> &str {
        &self.approved_at
    }

    pub fn digest_sha256(&self) -> &str {
        &self.digest_sha256
    }

    pub fn render_markdown(&self) -> String {
        crate::render::markdown::render_approved_document(self)
    }
}
