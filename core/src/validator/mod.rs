pub mod violations;

use crate::document::model::{RawGenerationResult, Section};
use crate::document::schema::{default_title, describe, SectionType, CANONICAL_ORDER};
use crate::locale::Language;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use violations::{Violation, ViolationKind, ViolationList};

/// One section-like entry pulled out of a structured payload, before any
/// schema rule has been applied.
#[derive(Debug, Clone)]
struct Candidate {
    type_name: String,
    section_type: Option<SectionType>,
    title: String,
    content: String,
}

pub struct StructuredValidator {
    language: Language,
}

impl Default for StructuredValidator {
    fn default() -> Self {
        Self::new(Language::En)
    }
}

impl StructuredValidator {
    /// `language` only supplies titles for mapping payloads that omit them.
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn validate(&self, raw: &RawGenerationResult) -> Result<Vec<Section>, ViolationList> {
        let payload = match raw.payload() {
            Some(v) => v,
            None => {
                let mut out = ViolationList::default();
                out.push(Violation::new(
                    ViolationKind::SHAPE_MISMATCH,
                    "expected a structured payload, got a text blob",
                ));
                return Err(out);
            }
        };

        let mut violations = ViolationList::default();
        let candidates = self.collect_candidates(payload, &mut violations);
        if violations.is_shape_mismatch() {
            return Err(violations);
        }

        check_type_set(&candidates, &mut violations);
        check_contents(&candidates, &mut violations);
        check_titles(&candidates, &mut violations);
        check_duplicates(&candidates, &mut violations);

        if !violations.is_empty() {
            return Err(violations);
        }

        let mut sections: Vec<Section> = candidates
            .into_iter()
            .filter_map(|c| {
                c.section_type
                    .map(|t| Section::new(t, c.title, c.content))
            })
            .collect();
        sections.sort_by_key(|s| s.section_type.canonical_index());
        Ok(sections)
    }

    fn collect_candidates(&self, payload: &Value, violations: &mut ViolationList) -> Vec<Candidate> {
        match payload {
            Value::Array(items) => collect_list(items, violations),
            Value::Object(map) => match map.get("sections") {
                Some(Value::Array(items)) => collect_list(items, violations),
                Some(Value::Object(inner)) => self.collect_mapping(inner, violations),
                Some(_) => {
                    violations.push(
                        Violation::new(
                            ViolationKind::SHAPE_MISMATCH,
                            "'sections' must be an array or an object",
                        )
                        .on_field("sections"),
                    );
                    Vec::new()
                }
                None if map.keys().any(|k| SectionType::parse(k).is_some()) => {
                    self.collect_mapping(map, violations)
                }
                None => {
                    violations.push(Violation::new(
                        ViolationKind::SHAPE_MISMATCH,
                        "object has neither 'sections' nor section-type keys",
                    ));
                    Vec::new()
                }
            },
            other => {
                violations.push(Violation::new(
                    ViolationKind::SHAPE_MISMATCH,
                    format!("expected an object or array, got {}", json_kind(other)),
                ));
                Vec::new()
            }
        }
    }

    fn collect_mapping(&self, map: &Map<String, Value>, violations: &mut ViolationList) -> Vec<Candidate> {
        let mut out = Vec::new();
        for (key, value) in map {
            let section_type = SectionType::parse(key);
            let fallback_title = section_type
                .map(|t| default_title(t, self.language).to_string())
                .unwrap_or_default();
            match value {
                Value::String(content) => out.push(Candidate {
                    type_name: key.clone(),
                    section_type,
                    title: fallback_title,
                    content: content.clone(),
                }),
                Value::Object(obj) => {
                    let Some(content) = string_field(obj, &["content"], key, violations) else {
                        continue;
                    };
                    let title = match obj.get("title") {
                        None | Some(Value::Null) => fallback_title,
                        Some(_) => match string_field(obj, &["title"], key, violations) {
                            Some(t) => t,
                            None => continue,
                        },
                    };
                    out.push(Candidate {
                        type_name: key.clone(),
                        section_type,
                        title,
                        content,
                    });
                }
                other => violations.push(
                    Violation::new(
                        ViolationKind::MALFORMED_SECTION,
                        format!("section value must be a string or object, got {}", json_kind(other)),
                    )
                    .for_type(key.clone()),
                ),
            }
        }
        out
    }
}

fn collect_list(items: &[Value], violations: &mut ViolationList) -> Vec<Candidate> {
    let mut out = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            violations.push(Violation::new(
                ViolationKind::MALFORMED_SECTION,
                format!("entry {} is {}, expected an object", idx, json_kind(item)),
            ));
            continue;
        };
        let type_name = match obj.get("type").or_else(|| obj.get("section_type")) {
            Some(Value::String(s)) => s.clone(),
            _ => {
                violations.push(
                    Violation::new(
                        ViolationKind::MALFORMED_SECTION,
                        format!("entry {} has no string 'type'", idx),
                    )
                    .on_field("type"),
                );
                continue;
            }
        };
        // Absent title/content fall through to the emptiness rules.
        let title = match obj.get("title") {
            None | Some(Value::Null) => String::new(),
            Some(_) => match string_field(obj, &["title"], &type_name, violations) {
                Some(t) => t,
                None => continue,
            },
        };
        let content = match obj.get("content") {
            None | Some(Value::Null) => String::new(),
            Some(_) => match string_field(obj, &["content"], &type_name, violations) {
                Some(c) => c,
                None => continue,
            },
        };
        out.push(Candidate {
            section_type: SectionType::parse(&type_name),
            type_name,
            title,
            content,
        });
    }
    out
}

fn string_field(
    obj: &Map<String, Value>,
    names: &[&str],
    type_name: &str,
    violations: &mut ViolationList,
) -> Option<String> {
    for name in names {
        match obj.get(*name) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(other) => {
                violations.push(
                    Violation::new(
                        ViolationKind::MALFORMED_SECTION,
                        format!("'{}' must be a string, got {}", name, json_kind(other)),
                    )
                    .for_type(type_name)
                    .on_field(name),
                );
                return None;
            }
            None => {}
        }
    }
    violations.push(
        Violation::new(
            ViolationKind::MALFORMED_SECTION,
            format!("missing field '{}'", names.join("|")),
        )
        .for_type(type_name)
        .on_field(names[0]),
    );
    None
}

// Rule 1: exactly the seven expected types.
fn check_type_set(candidates: &[Candidate], violations: &mut ViolationList) {
    for expected in CANONICAL_ORDER {
        if !candidates.iter().any(|c| c.section_type == Some(expected)) {
            violations.push(
                Violation::new(
                    ViolationKind::MISSING_TYPE,
                    format!("required section '{}' is missing", expected),
                )
                .for_type(expected.as_str()),
            );
        }
    }
    for c in candidates.iter().filter(|c| c.section_type.is_none()) {
        violations.push(
            Violation::new(
                ViolationKind::UNEXPECTED_TYPE,
                format!("'{}' is not a recognised section type", c.type_name),
            )
            .for_type(c.type_name.clone()),
        );
    }
}

// Rule 2: non-empty content after trimming.
fn check_contents(candidates: &[Candidate], violations: &mut ViolationList) {
    for c in candidates {
        let Some(t) = c.section_type else { continue };
        if c.content.trim().chars().count() < describe(t).min_content_chars {
            violations.push(
                Violation::new(ViolationKind::EMPTY_CONTENT, "content is empty")
                    .for_type(t.as_str())
                    .on_field("content"),
            );
        }
    }
}

// Rule 3: non-empty title.
fn check_titles(candidates: &[Candidate], violations: &mut ViolationList) {
    for c in candidates {
        let Some(t) = c.section_type else { continue };
        if describe(t).title_required && c.title.trim().is_empty() {
            violations.push(
                Violation::new(ViolationKind::EMPTY_TITLE, "title is empty")
                    .for_type(t.as_str())
                    .on_field("title"),
            );
        }
    }
}

// Rule 4: no type appears twice.
fn check_duplicates(candidates: &[Candidate], violations: &mut ViolationList) {
    let mut counts: BTreeMap<SectionType, usize> = BTreeMap::new();
    for t in candidates.iter().filter_map(|c| c.section_type) {
        *counts.entry(t).or_insert(0) += 1;
    }
    for (t, n) in counts {
        if n > 1 && describe(t).unique {
            violations.push(
                Violation::new(
                    ViolationKind::DUPLICATE_TYPE,
                    format!("section '{}' appears {} times", t, n),
                )
                .for_type(t.as_str()),
            );
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
