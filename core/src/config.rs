//! Core configuration, resolved once at startup and passed into the
//! controller. Nothing in the core reads environment variables.

use crate::adapters::loopback::is_loopback_endpoint;
use crate::error::{CoreError, CoreResult};
use crate::locale::Language;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_GENERATION_ENDPOINT: &str = "http://127.0.0.1:11434";
pub const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoreConfig {
    /// Text the fallback parser puts into sections it could not locate.
    pub placeholders: BTreeMap<Language, String>,
    /// Minimum trimmed note length accepted at Intake.
    pub min_note_chars: usize,
    pub generation_endpoint: String,
    /// Clinical notes are PHI; only loopback endpoints unless this is set.
    pub allow_remote_generation: bool,
    /// Advisory timeout handed to the generation collaborator.
    pub generation_timeout_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let placeholders = Language::ALL
            .into_iter()
            .map(|l| (l, default_placeholder(l).to_string()))
            .collect();
        Self {
            placeholders,
            min_note_chars: 1,
            generation_endpoint: DEFAULT_GENERATION_ENDPOINT.to_string(),
            allow_remote_generation: false,
            generation_timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let cfg: CoreConfig = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidInput(format!("invalid config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> CoreResult<()> {
        for (lang, text) in &self.placeholders {
            if text.trim().is_empty() {
                return Err(CoreError::InvalidInput(format!(
                    "placeholder for '{}' cannot be empty",
                    lang
                )));
            }
        }
        if self.min_note_chars == 0 {
            return Err(CoreError::InvalidInput(
                "min_note_chars must be at least 1".to_string(),
            ));
        }
        if self.generation_timeout_ms == 0 {
            return Err(CoreError::InvalidInput(
                "generation_timeout_ms must be positive".to_string(),
            ));
        }
        if !self.allow_remote_generation && !is_loopback_endpoint(&self.generation_endpoint)? {
            return Err(CoreError::InvalidInput(format!(
                "generation endpoint {} is not loopback and remote generation is disabled",
                self.generation_endpoint
            )));
        }
        Ok(())
    }

    pub fn placeholder_for(&self, language: Language) -> String {
        self.placeholders
            .get(&language)
            .cloned()
            .unwrap_or_else(|| default_placeholder(language).to_string())
    }
}

fn default_placeholder(language: Language) -> &'static str {
    match language {
        Language::En => "Not available. Please ask your care team about this topic.",
        Language::Es => "No disponible. Consulte a su equipo médico sobre este tema.",
        Language::Fr => "Non disponible. Veuillez interroger votre équipe soignante à ce sujet.",
    }
}
