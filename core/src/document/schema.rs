//! The seven-section document contract shared by the structured validator
//! and the fallback text parser.

use crate::locale::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Introduction,
    Explanation,
    Treatment,
    Lifestyle,
    Monitoring,
    Risks,
    Summary,
}

/// Canonical display order. Every validated document follows it exactly.
pub const CANONICAL_ORDER: [SectionType; 7] = [
    SectionType::Introduction,
    SectionType::Explanation,
    SectionType::Treatment,
    SectionType::Lifestyle,
    SectionType::Monitoring,
    SectionType::Risks,
    SectionType::Summary,
];

pub const SECTION_COUNT: usize = CANONICAL_ORDER.len();

impl SectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::Introduction => "introduction",
            SectionType::Explanation => "explanation",
            SectionType::Treatment => "treatment",
            SectionType::Lifestyle => "lifestyle",
            SectionType::Monitoring => "monitoring",
            SectionType::Risks => "risks",
            SectionType::Summary => "summary",
        }
    }

    /// Case-insensitive lookup of a wire type name.
    pub fn parse(name: &str) -> Option<Self> {
        let needle = name.trim().to_ascii_lowercase();
        CANONICAL_ORDER
            .into_iter()
            .find(|t| t.as_str() == needle)
    }

    pub fn canonical_index(self) -> usize {
        CANONICAL_ORDER
            .iter()
            .position(|t| *t == self)
            .unwrap_or(SECTION_COUNT)
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SectionConstraints {
    pub section_type: SectionType,
    pub position: usize,
    pub min_content_chars: usize,
    pub title_required: bool,
    pub unique: bool,
}

/// Constraints for one section type.
pub fn describe(section_type: SectionType) -> SectionConstraints {
    SectionConstraints {
        section_type,
        position: section_type.canonical_index(),
        min_content_chars: 1,
        title_required: true,
        unique: true,
    }
}

/// Title used when a section has to be synthesised (fallback path, mapping
/// payloads without titles).
pub fn default_title(section_type: SectionType, language: Language) -> &'static str {
    use SectionType::*;
    match (language, section_type) {
        (Language::En, Introduction) => "Introduction",
        (Language::En, Explanation) => "What This Means",
        (Language::En, Treatment) => "Your Treatment",
        (Language::En, Lifestyle) => "Lifestyle Changes",
        (Language::En, Monitoring) => "Follow-up and Monitoring",
        (Language::En, Risks) => "Risks and Warning Signs",
        (Language::En, Summary) => "Summary",
        (Language::Es, Introduction) => "Introducción",
        (Language::Es, Explanation) => "Qué significa",
        (Language::Es, Treatment) => "Su tratamiento",
        (Language::Es, Lifestyle) => "Cambios en el estilo de vida",
        (Language::Es, Monitoring) => "Seguimiento y control",
        (Language::Es, Risks) => "Riesgos y señales de alarma",
        (Language::Es, Summary) => "Resumen",
        (Language::Fr, Introduction) => "Introduction",
        (Language::Fr, Explanation) => "Ce que cela signifie",
        (Language::Fr, Treatment) => "Votre traitement",
        (Language::Fr, Lifestyle) => "Changements de mode de vie",
        (Language::Fr, Monitoring) => "Suivi et surveillance",
        (Language::Fr, Risks) => "Risques et signes d'alerte",
        (Language::Fr, Summary) => "Résumé",
    }
}

/// Heading keywords (lowercase) that identify a section in free text.
/// The literal type name always matches as well.
pub fn heading_keywords(section_type: SectionType) -> &'static [&'static str] {
    match section_type {
        SectionType::Introduction => &[
            "introduction",
            "intro",
            "overview",
            "about this document",
            "introducción",
            "introduccion",
            "présentation",
        ],
        SectionType::Explanation => &[
            "explanation",
            "what this means",
            "your condition",
            "diagnosis",
            "what happened",
            "explicación",
            "explicacion",
            "qué significa",
            "que significa",
            "su condición",
            "explication",
            "ce que cela signifie",
            "votre état",
        ],
        SectionType::Treatment => &[
            "treatment",
            "your treatment",
            "medications",
            "procedure",
            "tratamiento",
            "medicamentos",
            "traitement",
            "médicaments",
        ],
        SectionType::Lifestyle => &[
            "lifestyle",
            "lifestyle changes",
            "diet and exercise",
            "daily life",
            "estilo de vida",
            "hábitos",
            "mode de vie",
            "hygiène de vie",
        ],
        SectionType::Monitoring => &[
            "monitoring",
            "follow-up",
            "follow up",
            "next steps",
            "appointments",
            "seguimiento",
            "control",
            "suivi",
            "surveillance",
        ],
        SectionType::Risks => &[
            "risks",
            "risk",
            "warning signs",
            "when to seek help",
            "complications",
            "riesgos",
            "señales de alarma",
            "risques",
            "signes d'alerte",
        ],
        SectionType::Summary => &[
            "summary",
            "key points",
            "in summary",
            "conclusion",
            "resumen",
            "puntos clave",
            "résumé",
            "points clés",
        ],
    }
}
