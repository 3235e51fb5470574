//! Supported languages
//!
//! The UI shows human-readable labels; the TTS model family is keyed by a short
//! language code. The table is fixed at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::CloneError;

/// TTS model language code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LanguageCode {
    En,
    Es,
    Fr,
    Zh,
    Jp,
    Kr,
}

impl LanguageCode {
    /// All language codes
    pub const ALL: [LanguageCode; 6] = [
        LanguageCode::En,
        LanguageCode::Es,
        LanguageCode::Fr,
        LanguageCode::Zh,
        LanguageCode::Jp,
        LanguageCode::Kr,
    ];

    /// Code as understood by the TTS model loader
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::En => "EN",
            LanguageCode::Es => "ES",
            LanguageCode::Fr => "FR",
            LanguageCode::Zh => "ZH",
            LanguageCode::Jp => "JP",
            LanguageCode::Kr => "KR",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageCode {
    type Err = CloneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageCode::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CloneError::UnknownLanguage {
                label: s.to_string(),
            })
    }
}

/// Language selection offered to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "English (American)")]
    EnglishAmerican,
    Spanish,
    French,
    Chinese,
    Japanese,
    Korean,
}

impl Language {
    /// All selectable languages, in display order
    pub const ALL: [Language; 6] = [
        Language::EnglishAmerican,
        Language::Spanish,
        Language::French,
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
    ];

    pub fn all() -> &'static [Language] {
        &Self::ALL
    }

    /// Labels for a selection control
    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(Language::label).collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::EnglishAmerican => "English (American)",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
        }
    }

    pub fn code(&self) -> LanguageCode {
        match self {
            Language::EnglishAmerican => LanguageCode::En,
            Language::Spanish => LanguageCode::Es,
            Language::French => LanguageCode::Fr,
            Language::Chinese => LanguageCode::Zh,
            Language::Japanese => LanguageCode::Jp,
            Language::Korean => LanguageCode::Kr,
        }
    }

    /// Exact label lookup
    pub fn from_label(label: &str) -> Option<Language> {
        Self::ALL.into_iter().find(|lang| lang.label() == label)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolve an optional UI label to a language.
///
/// A missing label selects `default`. An unknown label also selects `default`
/// unless `strict` is set, in which case it is rejected.
pub fn resolve_language(
    label: Option<&str>,
    default: Language,
    strict: bool,
) -> Result<Language, CloneError> {
    match label {
        None => Ok(default),
        Some(label) => match Language::from_label(label) {
            Some(lang) => Ok(lang),
            None if strict => Err(CloneError::UnknownLanguage {
                label: label.to_string(),
            }),
            None => {
                tracing::warn!("Unknown language label '{}', falling back to {}", label, default);
                Ok(default)
            }
        },
    }
}
