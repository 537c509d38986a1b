//! The aggregate record for one protocol in progress.
//!
//! Every field is independently optional until the step that produces it
//! has run. Empty strings and empty lists mean "not produced yet"; nothing
//! here is required to be consistent with anything else.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::checklist::ChecklistItem;
use super::reference::{Reference, ScreeningStats};
use super::title::GeneratedTitleCandidate;

/// Lower bound of the default search window.
pub const DEFAULT_START_YEAR: i32 = 2019;

/// AI provider the backend should route generation to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    ChatGpt,
    Gemini,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            AiProvider::ChatGpt => "chatgpt",
            AiProvider::Gemini => "gemini",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AiProvider::ChatGpt => "ChatGPT",
            AiProvider::Gemini => "Gemini",
        }
    }
}

/// Population, Intervention, Comparison, Outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pico {
    pub population: String,
    pub intervention: String,
    pub comparison: String,
    pub outcome: String,
}

/// Es/No-Es scope delimitation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeMatrix {
    pub is: Vec<String>,
    pub is_not: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Yes,
    No,
    Partial,
}

/// One row of the unified PICO / scope table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatrixRow {
    pub question: String,
    pub content: String,
    pub presence: Presence,
    pub justification: String,
}

/// Key terms that feed the criteria and search strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolTerms {
    pub technology: Vec<String>,
    pub domain: Vec<String>,
    pub study_type: Vec<String>,
    pub thematic_focus: Vec<String>,
}

impl ProtocolTerms {
    pub fn total(&self) -> usize {
        self.technology.len() + self.domain.len() + self.study_type.len() + self.thematic_focus.len()
    }

    /// Every term in category order.
    pub fn all_terms(&self) -> Vec<String> {
        self.technology
            .iter()
            .chain(&self.domain)
            .chain(&self.study_type)
            .chain(&self.thematic_focus)
            .cloned()
            .collect()
    }
}

/// Inclusion or exclusion criterion keyed by category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Criterion {
    pub category: String,
    pub text: String,
}

impl Criterion {
    pub fn new(category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            text: text.into(),
        }
    }
}

/// A bibliographic database picked for the search plan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectedDatabase {
    pub id: String,
    pub name: String,
    pub has_api: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalRange {
    pub start: i32,
    pub end: i32,
}

impl Default for TemporalRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_YEAR,
            end: Utc::now().year(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    #[default]
    Pending,
    Searching,
    Completed,
    Error,
}

/// Generated query string for one database.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub database_id: String,
    pub database_name: String,
    pub query: String,
    pub base_query: String,
    pub explanation: String,
    pub has_api: bool,
    pub status: QueryStatus,
    pub result_count: Option<u64>,
    pub last_searched: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Ris,
    Bib,
}

/// Metadata of an uploaded export file. Record bodies are not kept here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub filename: String,
    pub format: FileFormat,
    pub record_count: usize,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub database_id: String,
    #[serde(default)]
    pub database_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchPlan {
    pub databases: Vec<SelectedDatabase>,
    pub temporal_range: TemporalRange,
    pub search_queries: Vec<SearchQuery>,
    pub uploaded_files: Vec<UploadedFile>,
}

/// Everything the wizard has collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardData {
    pub project_id: Option<String>,

    // Step 1: proposal
    pub project_name: String,
    pub project_description: String,
    pub research_area: String,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,

    // Step 2: PICO + scope matrix
    pub pico: Pico,
    pub scope_matrix: ScopeMatrix,
    pub matrix_table: Vec<MatrixRow>,

    // Step 3: titles
    pub generated_titles: Vec<GeneratedTitleCandidate>,
    pub selected_title: String,
    pub selected_title_index: Option<usize>,
    pub protocol_justification: String,

    // Step 4: protocol terms
    pub protocol_terms: ProtocolTerms,

    // Step 5: criteria
    pub inclusion_criteria: Vec<Criterion>,
    pub exclusion_criteria: Vec<Criterion>,

    // Step 6: search plan + screening import
    pub search_plan: SearchPlan,
    pub references: Vec<Reference>,
    pub screening_stats: ScreeningStats,

    // Step 7: checklist
    pub prisma_items: Vec<ChecklistItem>,

    pub ai_provider: AiProvider,
    pub last_saved: Option<DateTime<Utc>>,
}

impl WizardData {
    /// The selected candidate, if the selection still points at one.
    pub fn selected_candidate(&self) -> Option<&GeneratedTitleCandidate> {
        self.selected_title_index
            .and_then(|i| self.generated_titles.get(i))
    }

    /// Title to persist: the Spanish rendering of the selected candidate
    /// when available, otherwise the selected title as typed.
    pub fn title_for_persistence(&self) -> &str {
        self.generated_titles
            .iter()
            .find(|t| t.title == self.selected_title && !t.spanish_title.is_empty())
            .map(|t| t.spanish_title.as_str())
            .unwrap_or(&self.selected_title)
    }

    /// Year window, falling back to the search plan defaults.
    pub fn effective_years(&self) -> TemporalRange {
        let fallback = TemporalRange::default();
        TemporalRange {
            start: self.year_start.unwrap_or(fallback.start),
            end: self.year_end.unwrap_or(fallback.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_deserializes_with_defaults() {
        let data: WizardData =
            serde_json::from_str(r#"{"projectName":"IoT","pico":{"population":"farms"}}"#)
                .unwrap();
        assert_eq!(data.project_name, "IoT");
        assert_eq!(data.pico.population, "farms");
        assert!(data.pico.intervention.is_empty());
        assert_eq!(data.search_plan.temporal_range.start, DEFAULT_START_YEAR);
        assert_eq!(data.ai_provider, AiProvider::ChatGpt);
    }

    #[test]
    fn test_title_for_persistence_prefers_spanish() {
        let data = WizardData {
            generated_titles: vec![GeneratedTitleCandidate {
                title: "Edge AI in Agriculture".into(),
                spanish_title: "IA en el borde en agricultura".into(),
                ..Default::default()
            }],
            selected_title: "Edge AI in Agriculture".into(),
            ..Default::default()
        };
        assert_eq!(data.title_for_persistence(), "IA en el borde en agricultura");
    }

    #[test]
    fn test_title_for_persistence_falls_back_to_typed_title() {
        let data = WizardData {
            selected_title: "Custom title".into(),
            ..Default::default()
        };
        assert_eq!(data.title_for_persistence(), "Custom title");
    }
}
