//! Generated title candidates.

use serde::{Deserialize, Serialize};

/// How well a title follows Cochrane title conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CochraneCompliance {
    Full,
    #[default]
    Partial,
    None,
}

impl CochraneCompliance {
    /// Lenient parse of the backend tag; unknown tags degrade to `Partial`.
    pub fn parse_lenient(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "full" => CochraneCompliance::Full,
            "none" => CochraneCompliance::None,
            _ => CochraneCompliance::Partial,
        }
    }

    /// Badge text shown next to the candidate.
    pub fn badge(self) -> &'static str {
        match self {
            CochraneCompliance::Full => "Cochrane ✓",
            CochraneCompliance::Partial => "Parcial",
            CochraneCompliance::None => "Básico",
        }
    }
}

/// Language of a title field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }

    /// The other language of the bilingual pair.
    pub fn counterpart(self) -> Self {
        match self {
            Language::En => Language::Es,
            Language::Es => Language::En,
        }
    }
}

/// One bilingual title proposal.
///
/// Created in batch from a generation response, edited in place, and only
/// ever replaced wholesale by regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratedTitleCandidate {
    pub title: String,
    pub spanish_title: String,
    pub justification: String,
    pub compliance: CochraneCompliance,
}

impl GeneratedTitleCandidate {
    pub fn text(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.title,
            Language::Es => &self.spanish_title,
        }
    }

    pub fn set_text(&mut self, lang: Language, text: String) {
        match lang {
            Language::En => self.title = text,
            Language::Es => self.spanish_title = text,
        }
    }
}
