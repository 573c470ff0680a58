use crate::error::{CoreError, CoreResult};
use crate::locale::Language;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    Pediatric,   // < 18
    YoungAdult,  // 18-39
    MiddleAged,  // 40-64
    OlderAdult,  // 65-79
    Elderly,     // 80+
}

impl AgeBand {
    pub fn from_age(years: u32) -> Self {
        match years {
            0..=17 => AgeBand::Pediatric,
            18..=39 => AgeBand::YoungAdult,
            40..=64 => AgeBand::MiddleAged,
            65..=79 => AgeBand::OlderAdult,
            _ => AgeBand::Elderly,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pediatric" => Some(AgeBand::Pediatric),
            "young_adult" => Some(AgeBand::YoungAdult),
            "middle_aged" => Some(AgeBand::MiddleAged),
            "older_adult" => Some(AgeBand::OlderAdult),
            "elderly" => Some(AgeBand::Elderly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LiteracyLevel {
    Basic,
    Standard,
    Advanced,
}

impl LiteracyLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "low" | "simple" => Some(LiteracyLevel::Basic),
            "standard" | "medium" | "average" => Some(LiteracyLevel::Standard),
            "advanced" | "high" => Some(LiteracyLevel::Advanced),
            _ => None,
        }
    }
}

/// Attributes the generation collaborator tailors the document to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonalizationProfile {
    pub age_band: AgeBand,
    pub language: Language,
    pub literacy: LiteracyLevel,
    #[serde(default)]
    pub comorbidities: Vec<String>,
}

/// Unvalidated Personalize form input, as the UI or an API hands it over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileInput {
    pub age: Option<u32>,
    pub age_band: Option<String>,
    pub language: Option<String>,
    pub literacy: Option<String>,
    pub comorbidities: Vec<String>,
}

impl PersonalizationProfile {
    /// Validates every field and reports all problems at once.
    pub fn from_input(input: &ProfileInput) -> CoreResult<Self> {
        let mut problems: Vec<String> = Vec::new();

        let age_band = match (input.age, input.age_band.as_deref()) {
            (Some(age), _) if age > 130 => {
                problems.push(format!("age {} is out of range", age));
                None
            }
            (Some(age), _) => Some(AgeBand::from_age(age)),
            (None, Some(band)) => {
                let parsed = AgeBand::parse(band);
                if parsed.is_none() {
                    problems.push(format!("unknown age band '{}'", band));
                }
                parsed
            }
            (None, None) => {
                problems.push("age or age band is required".to_string());
                None
            }
        };

        let language = match input.language.as_deref().map(str::trim) {
            None | Some("") => {
                problems.push("language is required".to_string());
                None
            }
            Some(code) => match code.parse::<Language>() {
                Ok(l) => Some(l),
                Err(_) => {
                    problems.push(format!(
                        "unsupported language '{}'; supported: en, es, fr",
                        code
                    ));
                    None
                }
            },
        };

        let literacy = match input.literacy.as_deref().map(str::trim) {
            None | Some("") => {
                problems.push("literacy level is required".to_string());
                None
            }
            Some(level) => {
                let parsed = LiteracyLevel::parse(level);
                if parsed.is_none() {
                    problems.push(format!("unknown literacy level '{}'", level));
                }
                parsed
            }
        };

        let comorbidities: Vec<String> = input
            .comorbidities
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        match (age_band, language, literacy) {
            (Some(age_band), Some(language), Some(literacy)) if problems.is_empty() => Ok(Self {
                age_band,
                language,
                literacy,
                comorbidities,
            }),
            _ => Err(CoreError::ValidationInput(problems.join("; "))),
        }
    }

    pub fn from_json(json_str: &str) -> CoreResult<Self> {
        let input: ProfileInput = serde_json::from_str(json_str)
            .map_err(|e| CoreError::InvalidInput(format!("failed to parse profile: {}", e)))?;
        Self::from_input(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(age: Option<u32>, language: Option<&str>, literacy: Option<&str>) -> ProfileInput {
        ProfileInput {
            age,
            age_band: None,
            language: language.map(str::to_string),
            literacy: literacy.map(str::to_string),
            comorbidities: vec![" diabetes ".to_string(), "".to_string()],
        }
    }

    #[test]
    fn complete_input_builds_profile() {
        let p = PersonalizationProfile::from_input(&input(Some(45), Some("en"), Some("standard")))
            .unwrap();
        assert_eq!(p.age_band, AgeBand::MiddleAged);
        assert_eq!(p.language, Language::En);
        assert_eq!(p.literacy, LiteracyLevel::Standard);
        assert_eq!(p.comorbidities, vec!["diabetes".to_string()]);
    }

    #[test]
    fn unsupported_language_is_input_error() {
        let err = PersonalizationProfile::from_input(&input(Some(45), Some("de"), Some("basic")))
            .unwrap_err();
        match err {
            CoreError::ValidationInput(msg) => assert!(msg.contains("unsupported language 'de'")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn all_missing_fields_are_reported() {
        let err = PersonalizationProfile::from_input(&ProfileInput::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("age or age band is required"));
        assert!(msg.contains("language is required"));
        assert!(msg.contains("literacy level is required"));
    }

    #[test]
    fn age_band_can_be_given_directly() {
        let p = PersonalizationProfile::from_json(
            r#"{"age_band": "older-adult", "language": "fr-CA", "literacy": "basic"}"#,
        )
        .unwrap();
        assert_eq!(p.age_band, AgeBand::OlderAdult);
        assert_eq!(p.language, Language::Fr);
    }

    #[test]
    fn age_bands() {
        assert_eq!(AgeBand::from_age(17), AgeBand::Pediatric);
        assert_eq!(AgeBand::from_age(18), AgeBand::YoungAdult);
        assert_eq!(AgeBand::from_age(65), AgeBand::OlderAdult);
        assert_eq!(AgeBand::from_age(92), AgeBand::Elderly);
    }
}
