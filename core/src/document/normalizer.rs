use super::fallback::FallbackTextParser;
use super::model::{NormalizedDocument, Provenance, RawGenerationResult};
use super::schema::SectionType;
use crate::config::CoreConfig;
use crate::locale::Language;
use crate::validator::StructuredValidator;
use serde_json::Value;

/// Top-level string fields that may hold the whole document as text.
const TEXT_FIELDS: [&str; 4] = ["text", "content", "document", "markdown"];

pub struct DocumentNormalizer {
    validator: StructuredValidator,
    fallback: FallbackTextParser,
}

impl DocumentNormalizer {
    pub fn new(language: Language, placeholder: impl Into<String>) -> Self {
        Self {
            validator: StructuredValidator::new(language),
            fallback: FallbackTextParser::new(language, placeholder),
        }
    }

    pub fn from_config(config: &CoreConfig, language: Language) -> Self {
        Self::new(language, config.placeholder_for(language))
    }

    /// Total: always returns seven canonical sections. Structured-path
    /// violations are logged and dropped.
    pub fn normalize(&self, raw: &RawGenerationResult) -> NormalizedDocument {
        match self.validator.validate(raw) {
            Ok(sections) => {
                tracing::debug!(shape = raw.shape(), "structured response validated");
                NormalizedDocument {
                    sections,
                    provenance: Provenance::Structured,
                    missing_types: Vec::new(),
                }
            }
            Err(violations) => {
                if violations.is_shape_mismatch() {
                    tracing::debug!(shape = raw.shape(), "structured path not applicable, using fallback");
                } else {
                    tracing::warn!(
                        violation_count = violations.len(),
                        violations = %violations,
                        "structured response failed schema validation, using fallback"
                    );
                }
                let text = best_available_text(raw);
                let parsed = self.fallback.parse_detailed(&text);
                NormalizedDocument {
                    sections: parsed.sections,
                    provenance: Provenance::Fallback,
                    missing_types: parsed.missing_types,
                }
            }
        }
    }
}

/// Text representation of a response for the fallback parser. Prose
/// around a fenced payload comes first so none of it is lost.
pub fn best_available_text(raw: &RawGenerationResult) -> String {
    match raw {
        RawGenerationResult::Text(t) => t.clone(),
        RawGenerationResult::Structured(v) => structured_to_text(v).unwrap_or_else(|| v.to_string()),
        RawGenerationResult::Fenced { payload, prose } => match structured_to_text(payload) {
            Some(rendered) => format!("{}\n\n{}", prose, rendered),
            None => prose.clone(),
        },
    }
}

/// `None` when the payload holds nothing the fallback parser can place.
fn structured_to_text(v: &Value) -> Option<String> {
    let text = match v {
        Value::String(s) => s.clone(),
        Value::Array(items) => render_entries(items),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("sections") {
                render_entries(items)
            } else if let Some(s) = TEXT_FIELDS
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str))
            {
                s.to_string()
            } else {
                let inner = match map.get("sections") {
                    Some(Value::Object(inner)) => inner,
                    _ => map,
                };
                // Only section-type keys become headings; anything else
                // ("language", "reading_level") would land inside the
                // previous section.
                inner
                    .iter()
                    .filter(|(key, _)| SectionType::parse(key).is_some())
                    .filter_map(|(key, value)| match value {
                        Value::String(s) => Some(format!("## {}\n{}", key, s)),
                        Value::Object(obj) => Some(entry_block(obj, Some(key))),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
        }
        _ => String::new(),
    };
    (!text.trim().is_empty()).then_some(text)
}

fn render_entries(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(entry_block(obj, None)),
            Value::String(s) => Some(s.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `## heading` + content. The type name is preferred over the title as the
/// heading, since the fallback parser always recognises type names.
fn entry_block(obj: &serde_json::Map<String, Value>, key: Option<&String>) -> String {
    let as_str = |name: &str| obj.get(name).and_then(|v| v.as_str()).unwrap_or("");
    let heading = key
        .map(|k| k.as_str())
        .or_else(|| {
            obj.get("type")
                .and_then(|v| v.as_str())
                .filter(|t| SectionType::parse(t).is_some())
        })
        .unwrap_or_else(|| as_str("title"));
    let content = as_str("content");
    if heading.trim().is_empty() {
        content.to_string()
    } else {
        format!("## {}\n{}", heading, content)
    }
}
