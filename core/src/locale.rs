use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output languages the generation collaborator can route on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Fr,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Es, Language::Fr];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = CoreError;

    /// Accepts a bare code ("en") or a region-tagged locale ("en-US", "es_MX").
    fn from_str(s: &str) -> CoreResult<Self> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.code() == primary)
            .ok_or_else(|| {
                CoreError::ValidationInput(format!(
                    "unsupported language '{}'; supported: en, es, fr",
                    s.trim()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_and_locales() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert_eq!("ES-mx".parse::<Language>().unwrap(), Language::Es);
        assert_eq!(" fr_CA ".parse::<Language>().unwrap(), Language::Fr);
    }

    #[test]
    fn unsupported_language_is_input_error() {
        let err = "de".parse::<Language>().unwrap_err();
        assert!(matches!(err, CoreError::ValidationInput(_)));
        assert!("".parse::<Language>().is_err());
    }
}
