use super::schema::SectionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    #[serde(rename = "type")]
    pub section_type: SectionType,
    /// Generated text. Never modified after normalization.
    pub content: String,
    /// Clinician overlay. `None` means unmodified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable_content: Option<String>,
}

impl Section {
    pub fn new(section_type: SectionType, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            section_type,
            content: content.into(),
            editable_content: None,
        }
    }

    /// The text a patient would read: the clinician's edit when present,
    /// otherwise the generated content.
    pub fn effective_content(&self) -> &str {
        self.editable_content.as_deref().unwrap_or(&self.content)
    }

    pub fn is_edited(&self) -> bool {
        self.editable_content.is_some()
    }
}

/// Raw output of the generation collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGenerationResult {
    /// Tool-call style payload already segmented into named parts.
    Structured(serde_json::Value),
    /// A ```json fence embedded in prose. The prose outside the fence is
    /// kept for the fallback path.
    Fenced {
        payload: serde_json::Value,
        prose: String,
    },
    /// Legacy free-text response.
    Text(String),
}

impl RawGenerationResult {
    /// Classify a raw collaborator response. JSON objects and arrays,
    /// optionally wrapped in a ```json fence, are structured; everything
    /// else is text.
    pub fn from_response(response: &str) -> Self {
        if let Some(fence) = find_json_fence(response) {
            if let Some(payload) = parse_container(fence.body) {
                let prose: Vec<&str> = [&response[..fence.start], &response[fence.end..]]
                    .into_iter()
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect();
                if prose.is_empty() {
                    return RawGenerationResult::Structured(payload);
                }
                return RawGenerationResult::Fenced {
                    payload,
                    prose: prose.join("\n\n"),
                };
            }
        }
        match parse_container(response.trim()) {
            Some(payload) => RawGenerationResult::Structured(payload),
            None => RawGenerationResult::Text(response.to_string()),
        }
    }

    /// The JSON payload, for either structured shape.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            RawGenerationResult::Structured(v) => Some(v),
            RawGenerationResult::Fenced { payload, .. } => Some(payload),
            RawGenerationResult::Text(_) => None,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            RawGenerationResult::Structured(_) | RawGenerationResult::Fenced { .. } => "structured",
            RawGenerationResult::Text(_) => "text",
        }
    }
}

struct JsonFence<'a> {
    /// Byte offset of the opening backticks.
    start: usize,
    /// Byte offset just past the closing backticks.
    end: usize,
    body: &'a str,
}

fn find_json_fence(response: &str) -> Option<JsonFence<'_>> {
    let start = response.find("```json")?;
    let body_start = start + "```json".len();
    let len = response[body_start..].find("```")?;
    Some(JsonFence {
        start,
        end: body_start + len + "```".len(),
        body: response[body_start..body_start + len].trim(),
    })
}

fn parse_container(candidate: &str) -> Option<serde_json::Value> {
    if !(candidate.starts_with('{') || candidate.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Structured,
    Fallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Structured => "structured",
            Provenance::Fallback => "fallback",
        }
    }
}

/// Output of the normalizer. `sections` always holds the seven canonical
/// sections in canonical order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub sections: Vec<Section>,
    pub provenance: Provenance,
    /// Types the fallback parser could not locate and filled with a placeholder.
    #[serde(default)]
    pub missing_types: Vec<SectionType>,
}
