//! Heuristic segmentation of a free-text response into the seven canonical
//! sections. Best effort: the output always has all seven sections, in
//! canonical order, with a placeholder for anything that was not found.

use super::model::Section;
use super::schema::{default_title, heading_keywords, SectionType, CANONICAL_ORDER};
use crate::locale::Language;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s*(.+?)\s*#*$").expect("static regex"));

static BOLD_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\*\*|__)(.+?)(?:\*\*|__)\s*:?\s*(.*)$").expect("static regex")
});

static NUMBERED_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\d{1,2}|[ivx]{1,4})[.)]\s+(.+)$").expect("static regex")
});

/// Longest line (in chars) still considered a heading candidate.
const MAX_HEADING_CHARS: usize = 80;

/// Most words a heading may have before an inline `Heading: text` split.
const MAX_HEADING_WORDS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackParse {
    pub sections: Vec<Section>,
    pub missing_types: Vec<SectionType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Heading {
    section_type: SectionType,
    title: String,
    inline: Option<String>,
    /// Numbered lines double as list items and are kept as text once the
    /// section already has a title.
    numbered: bool,
}

#[derive(Debug, Default)]
struct Bucket {
    title: Option<String>,
    lines: Vec<String>,
}

pub struct FallbackTextParser {
    language: Language,
    placeholder: String,
}

impl FallbackTextParser {
    pub fn new(language: Language, placeholder: impl Into<String>) -> Self {
        Self {
            language,
            placeholder: placeholder.into(),
        }
    }

    pub fn parse(&self, text: &str) -> Vec<Section> {
        self.parse_detailed(text).sections
    }

    pub fn parse_detailed(&self, text: &str) -> FallbackParse {
        let mut buckets: BTreeMap<SectionType, Bucket> = BTreeMap::new();
        let mut preamble: Vec<String> = Vec::new();
        let mut current: Option<SectionType> = None;

        for line in text.lines() {
            if let Some(h) = detect_heading(line) {
                let bucket = buckets.entry(h.section_type).or_default();
                // Once a section has its title, a heading line that differs
                // from it is content.
                let keep_line = bucket
                    .title
                    .as_deref()
                    .map(|existing| h.numbered || !existing.eq_ignore_ascii_case(&h.title));
                match keep_line {
                    None => {
                        bucket.title = Some(h.title);
                        bucket.lines.extend(h.inline);
                    }
                    Some(false) => bucket.lines.extend(h.inline),
                    Some(true) => bucket.lines.push(line.trim().to_string()),
                }
                current = Some(h.section_type);
                continue;
            }
            match current {
                Some(t) => buckets.entry(t).or_default().lines.push(line.to_string()),
                None => preamble.push(line.to_string()),
            }
        }

        let preamble = join_block(&preamble);
        if !preamble.is_empty() {
            let intro = buckets.entry(SectionType::Introduction).or_default();
            intro.lines.insert(0, preamble);
        }

        let mut sections = Vec::with_capacity(CANONICAL_ORDER.len());
        let mut missing_types = Vec::new();
        for t in CANONICAL_ORDER {
            let bucket = buckets.remove(&t).unwrap_or_default();
            let mut content = join_block(&bucket.lines);
            if content.is_empty() {
                content = self.placeholder.clone();
                missing_types.push(t);
            }
            let title = bucket
                .title
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default_title(t, self.language).to_string());
            sections.push(Section::new(t, title, content));
        }

        FallbackParse {
            sections,
            missing_types,
        }
    }
}

fn join_block(lines: &[String]) -> String {
    lines.join("\n").trim().to_string()
}

fn detect_heading(line: &str) -> Option<Heading> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(c) = MARKDOWN_HEADING.captures(trimmed) {
        return marked_heading(&c[1], None, false);
    }
    if let Some(c) = BOLD_HEADING.captures(trimmed) {
        let rest = c[2].trim();
        let inline = (!rest.is_empty()).then(|| rest.to_string());
        return marked_heading(&c[1], inline, false);
    }
    // A numbered line is a heading only when its text is exactly a keyword;
    // "1. Follow-up with Dr. Smith" is a list item.
    if trimmed.chars().count() <= MAX_HEADING_CHARS {
        if let Some(c) = NUMBERED_HEADING.captures(trimmed) {
            if let Some(h) = marked_heading(&c[1], None, true) {
                return Some(Heading { numbered: true, ..h });
            }
        }
    }

    // `Heading: text` or a bare `Heading` line must match a keyword exactly.
    if let Some((head, rest)) = trimmed.split_once(':') {
        if head.split_whitespace().count() <= MAX_HEADING_WORDS {
            if let Some(t) = match_keyword(head, true) {
                let rest = rest.trim();
                return Some(Heading {
                    section_type: t,
                    title: clean_title(head),
                    inline: (!rest.is_empty()).then(|| rest.to_string()),
                    numbered: false,
                });
            }
        }
        return None;
    }
    if trimmed.split_whitespace().count() <= MAX_HEADING_WORDS {
        if let Some(t) = match_keyword(trimmed, true) {
            return Some(Heading {
                section_type: t,
                title: clean_title(trimmed),
                inline: None,
                numbered: false,
            });
        }
    }
    None
}

/// A heading with explicit markup may carry extra words after the keyword
/// ("## Your treatment plan") unless `exact` is set.
fn marked_heading(raw: &str, inline: Option<String>, exact: bool) -> Option<Heading> {
    let (head, colon_rest) = match raw.split_once(':') {
        Some((h, r)) if !r.trim().is_empty() => (h, Some(r.trim().to_string())),
        _ => (raw, None),
    };
    let section_type = match_keyword(head, exact)?;
    Some(Heading {
        section_type,
        title: clean_title(head),
        inline: colon_rest.or(inline),
        numbered: false,
    })
}

fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c == ':' || c == '#')
        .trim()
        .to_string()
}

fn normalize_heading(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Best keyword match for a heading. With `exact`, the whole heading must
/// equal a keyword; otherwise the heading may start with one. The longest
/// matching keyword wins.
fn match_keyword(raw: &str, exact: bool) -> Option<SectionType> {
    let heading = normalize_heading(raw);
    if heading.is_empty() {
        return None;
    }
    let mut best: Option<(usize, SectionType)> = None;
    for t in CANONICAL_ORDER {
        let names = std::iter::once(t.as_str()).chain(heading_keywords(t).iter().copied());
        for kw in names {
            let hit = heading == kw
                || (!exact
                    && heading.starts_with(kw)
                    && heading[kw.len()..].starts_with(|c: char| !c.is_alphanumeric()));
            if hit && best.map_or(true, |(len, _)| kw.len() > len) {
                best = Some((kw.len(), t));
            }
        }
    }
    best.map(|(_, t)| t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> FallbackTextParser {
        FallbackTextParser::new(Language::En, "Not available.")
    }

    #[test]
    fn splits_markdown_headings() {
        let text = "## Introduction\nYou were treated for a heart attack.\n\n\
                    ## What This Means\nAn artery was blocked.\n\
                    ## Your Treatment Plan\nA stent was placed.\n\
                    ## Lifestyle\nWalk daily.\n\
                    ## Follow-up\nCardiology in 6 weeks.\n\
                    ## Warning Signs\nCall 911 for chest pain.\n\
                    ## Summary\nYou are recovering.";
        let out = parser().parse_detailed(text);
        assert!(out.missing_types.is_empty());
        assert_eq!(out.sections.len(), 7);
        assert_eq!(out.sections[2].section_type, SectionType::Treatment);
        assert_eq!(out.sections[2].title, "Your Treatment Plan");
        assert_eq!(out.sections[2].content, "A stent was placed.");
        assert_eq!(out.sections[5].content, "Call 911 for chest pain.");
    }

    #[test]
    fn recognises_bold_numbered_and_inline_headings() {
        let text = "**Introduction**\nHello.\n\
                    2. Explanation\nBlocked artery.\n\
                    Treatment: A stent was placed.\n\
                    **Summary:** You are recovering.";
        let out = parser().parse_detailed(text);
        assert_eq!(out.sections[0].content, "Hello.");
        assert_eq!(out.sections[1].content, "Blocked artery.");
        assert_eq!(out.sections[2].content, "A stent was placed.");
        assert_eq!(out.sections[6].content, "You are recovering.");
        assert_eq!(
            out.missing_types,
            vec![SectionType::Lifestyle, SectionType::Monitoring, SectionType::Risks]
        );
    }

    #[test]
    fn spanish_headings_are_recognised() {
        let text = "# Tratamiento\nSe colocó un stent.\n# Riesgos\nDolor en el pecho.";
        let out = parser().parse_detailed(text);
        assert_eq!(out.sections[2].content, "Se colocó un stent.");
        assert_eq!(out.sections[5].title, "Riesgos");
    }

    #[test]
    fn text_without_headings_becomes_introduction() {
        let out = parser().parse_detailed("You had a heart attack and received a stent.");
        assert_eq!(
            out.sections[0].content,
            "You had a heart attack and received a stent."
        );
        assert_eq!(out.missing_types.len(), 6);
        for s in &out.sections[1..] {
            assert_eq!(s.content, "Not available.");
        }
    }

    #[test]
    fn empty_text_still_yields_seven_placeholders() {
        let sections = parser().parse("");
        assert_eq!(sections.len(), 7);
        for (s, t) in sections.iter().zip(CANONICAL_ORDER) {
            assert_eq!(s.section_type, t);
            assert!(!s.title.is_empty());
            assert!(!s.content.trim().is_empty());
        }
    }

    #[test]
    fn repeated_headings_append() {
        let out = parser().parse_detailed("## Risks\nOne.\n## Summary\nS.\n## Risks\nTwo.");
        assert_eq!(out.sections[5].content, "One.\nTwo.");
    }

    #[test]
    fn sentences_starting_with_keyword_are_not_headings() {
        let out = parser().parse_detailed("## Treatment\nTreatment was successful today.");
        assert_eq!(out.sections[2].content, "Treatment was successful today.");
    }

    #[test]
    fn numbered_list_items_stay_in_their_section() {
        let text = "## Follow-up\nYou have two visits:\n\
                    1. Follow-up with Dr. Smith in 2 weeks\n\
                    2. Echo in 3 months\n\
                    ## Summary\nok";
        let out = parser().parse_detailed(text);
        assert_eq!(
            out.sections[4].content,
            "You have two visits:\n1. Follow-up with Dr. Smith in 2 weeks\n2. Echo in 3 months"
        );
        assert_eq!(out.sections[4].title, "Follow-up");
        assert_eq!(out.sections[6].content, "ok");
    }

    #[test]
    fn numbered_item_starting_with_keyword_does_not_switch_section() {
        let text = "## Treatment\n1. Take aspirin daily.\n2. Risk of bleeding is higher on two blood thinners.\n\
                    3. Keep taking your statin.";
        let out = parser().parse_detailed(text);
        assert_eq!(
            out.sections[2].content,
            "1. Take aspirin daily.\n2. Risk of bleeding is higher on two blood thinners.\n\
             3. Keep taking your statin."
        );
        assert!(out.missing_types.contains(&SectionType::Risks));
    }

    #[test]
    fn numbered_keyword_repeating_a_titled_section_is_kept_as_text() {
        let text = "## Follow-up\nSee your cardiologist.\n1. Follow-up\n2. Echo in 3 months";
        let out = parser().parse_detailed(text);
        assert_eq!(
            out.sections[4].content,
            "See your cardiologist.\n1. Follow-up\n2. Echo in 3 months"
        );
    }
}
