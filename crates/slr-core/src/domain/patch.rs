//! Shallow partial updates of [`WizardData`].
//!
//! A patch sets whole top-level fields; nested records are replaced, never
//! merged. Applying `a` then `b` equals applying `a.merge(b)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checklist::ChecklistItem;
use super::reference::{Reference, ScreeningStats};
use super::step::WizardStep;
use super::title::GeneratedTitleCandidate;
use super::wizard::{
    AiProvider, Criterion, MatrixRow, Pico, ProtocolTerms, ScopeMatrix, SearchPlan, WizardData,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardPatch {
    pub project_id: Option<Option<String>>,
    pub project_name: Option<String>,
    pub project_description: Option<String>,
    pub research_area: Option<String>,
    pub year_start: Option<Option<i32>>,
    pub year_end: Option<Option<i32>>,
    pub pico: Option<Pico>,
    pub scope_matrix: Option<ScopeMatrix>,
    pub matrix_table: Option<Vec<MatrixRow>>,
    pub generated_titles: Option<Vec<GeneratedTitleCandidate>>,
    pub selected_title: Option<String>,
    pub selected_title_index: Option<Option<usize>>,
    pub protocol_justification: Option<String>,
    pub protocol_terms: Option<ProtocolTerms>,
    pub inclusion_criteria: Option<Vec<Criterion>>,
    pub exclusion_criteria: Option<Vec<Criterion>>,
    pub search_plan: Option<SearchPlan>,
    pub references: Option<Vec<Reference>>,
    pub screening_stats: Option<ScreeningStats>,
    pub prisma_items: Option<Vec<ChecklistItem>>,
    pub ai_provider: Option<AiProvider>,
    pub last_saved: Option<Option<DateTime<Utc>>>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn later<T>(earlier: Option<T>, later: Option<T>) -> Option<T> {
    later.or(earlier)
}

impl WizardPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the patch sets no field.
    pub fn is_empty(&self) -> bool {
        *self == WizardPatch::default()
    }

    /// Shallow-merge into `data`; fields left `None` are untouched.
    pub fn apply_to(self, data: &mut WizardData) {
        set(&mut data.project_id, self.project_id);
        set(&mut data.project_name, self.project_name);
        set(&mut data.project_description, self.project_description);
        set(&mut data.research_area, self.research_area);
        set(&mut data.year_start, self.year_start);
        set(&mut data.year_end, self.year_end);
        set(&mut data.pico, self.pico);
        set(&mut data.scope_matrix, self.scope_matrix);
        set(&mut data.matrix_table, self.matrix_table);
        set(&mut data.generated_titles, self.generated_titles);
        set(&mut data.selected_title, self.selected_title);
        set(&mut data.selected_title_index, self.selected_title_index);
        set(&mut data.protocol_justification, self.protocol_justification);
        set(&mut data.protocol_terms, self.protocol_terms);
        set(&mut data.inclusion_criteria, self.inclusion_criteria);
        set(&mut data.exclusion_criteria, self.exclusion_criteria);
        set(&mut data.search_plan, self.search_plan);
        set(&mut data.references, self.references);
        set(&mut data.screening_stats, self.screening_stats);
        set(&mut data.prisma_items, self.prisma_items);
        set(&mut data.ai_provider, self.ai_provider);
        set(&mut data.last_saved, self.last_saved);
    }

    /// Compose two patches; fields set by `other` win.
    pub fn merge(self, other: WizardPatch) -> WizardPatch {
        WizardPatch {
            project_id: later(self.project_id, other.project_id),
            project_name: later(self.project_name, other.project_name),
            project_description: later(self.project_description, other.project_description),
            research_area: later(self.research_area, other.research_area),
            year_start: later(self.year_start, other.year_start),
            year_end: later(self.year_end, other.year_end),
            pico: later(self.pico, other.pico),
            scope_matrix: later(self.scope_matrix, other.scope_matrix),
            matrix_table: later(self.matrix_table, other.matrix_table),
            generated_titles: later(self.generated_titles, other.generated_titles),
            selected_title: later(self.selected_title, other.selected_title),
            selected_title_index: later(self.selected_title_index, other.selected_title_index),
            protocol_justification: later(
                self.protocol_justification,
                other.protocol_justification,
            ),
            protocol_terms: later(self.protocol_terms, other.protocol_terms),
            inclusion_criteria: later(self.inclusion_criteria, other.inclusion_criteria),
            exclusion_criteria: later(self.exclusion_criteria, other.exclusion_criteria),
            search_plan: later(self.search_plan, other.search_plan),
            references: later(self.references, other.references),
            screening_stats: later(self.screening_stats, other.screening_stats),
            prisma_items: later(self.prisma_items, other.prisma_items),
            ai_provider: later(self.ai_provider, other.ai_provider),
            last_saved: later(self.last_saved, other.last_saved),
        }
    }

    /// Reset everything produced by the steps after `step`.
    ///
    /// Going back to the proposal clears PICO, titles, terms, criteria, the
    /// search plan and the checklist; the proposal itself is kept.
    pub fn clear_after(step: WizardStep) -> WizardPatch {
        let mut patch = WizardPatch::default();
        for later_step in WizardStep::ALL.iter().filter(|s| **s > step) {
            match later_step {
                WizardStep::Proposal => {}
                WizardStep::PicoMatrix => {
                    patch.pico = Some(Pico::default());
                    patch.scope_matrix = Some(ScopeMatrix::default());
                    patch.matrix_table = Some(Vec::new());
                }
                WizardStep::Titles => {
                    patch.generated_titles = Some(Vec::new());
                    patch.selected_title = Some(String::new());
                    patch.selected_title_index = Some(None);
                    patch.protocol_justification = Some(String::new());
                }
                WizardStep::ProtocolDefinition => {
                    patch.protocol_terms = Some(ProtocolTerms::default());
                }
                WizardStep::Criteria => {
                    patch.inclusion_criteria = Some(Vec::new());
                    patch.exclusion_criteria = Some(Vec::new());
                }
                WizardStep::SearchPlan => {
                    patch.search_plan = Some(SearchPlan::default());
                    patch.references = Some(Vec::new());
                    patch.screening_stats = Some(ScreeningStats::default());
                }
                WizardStep::PrismaCheck => {
                    patch.prisma_items = Some(Vec::new());
                }
            }
        }
        patch
    }

    // Builder helpers for the common single-field edits.

    pub fn project_name(mut self, value: impl Into<String>) -> Self {
        self.project_name = Some(value.into());
        self
    }

    pub fn project_description(mut self, value: impl Into<String>) -> Self {
        self.project_description = Some(value.into());
        self
    }

    pub fn research_area(mut self, value: impl Into<String>) -> Self {
        self.research_area = Some(value.into());
        self
    }

    pub fn years(mut self, start: Option<i32>, end: Option<i32>) -> Self {
        self.year_start = Some(start);
        self.year_end = Some(end);
        self
    }

    pub fn pico(mut self, value: Pico) -> Self {
        self.pico = Some(value);
        self
    }

    pub fn scope_matrix(mut self, value: ScopeMatrix) -> Self {
        self.scope_matrix = Some(value);
        self
    }

    pub fn protocol_terms(mut self, value: ProtocolTerms) -> Self {
        self.protocol_terms = Some(value);
        self
    }

    pub fn criteria(mut self, inclusion: Vec<Criterion>, exclusion: Vec<Criterion>) -> Self {
        self.inclusion_criteria = Some(inclusion);
        self.exclusion_criteria = Some(exclusion);
        self
    }

    pub fn search_plan(mut self, value: SearchPlan) -> Self {
        self.search_plan = Some(value);
        self
    }

    pub fn ai_provider(mut self, value: AiProvider) -> Self {
        self.ai_provider = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pico(population: &str) -> Pico {
        Pico {
            population: population.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut data = WizardData {
            project_name: "keep".into(),
            ..Default::default()
        };
        WizardPatch::new()
            .project_description("desc")
            .apply_to(&mut data);
        assert_eq!(data.project_name, "keep");
        assert_eq!(data.project_description, "desc");
    }

    #[test]
    fn test_sequential_apply_equals_merged_apply() {
        let a = WizardPatch::new().project_name("one").pico(pico("farms"));
        let b = WizardPatch::new().project_name("two").research_area("Ingeniería");

        let mut sequential = WizardData::default();
        a.clone().apply_to(&mut sequential);
        b.clone().apply_to(&mut sequential);

        let mut merged = WizardData::default();
        a.merge(b).apply_to(&mut merged);

        assert_eq!(sequential, merged);
        assert_eq!(merged.project_name, "two");
        assert_eq!(merged.pico.population, "farms");
    }

    #[test]
    fn test_option_fields_can_be_cleared() {
        let mut data = WizardData {
            year_start: Some(2020),
            ..Default::default()
        };
        WizardPatch::new().years(None, Some(2024)).apply_to(&mut data);
        assert_eq!(data.year_start, None);
        assert_eq!(data.year_end, Some(2024));
    }

    #[test]
    fn test_clear_after_proposal_keeps_proposal() {
        let mut data = WizardData {
            project_name: "IoT".into(),
            pico: pico("farms"),
            selected_title: "T".into(),
            inclusion_criteria: vec![Criterion::new("Idioma", "Inglés")],
            ..Default::default()
        };
        WizardPatch::clear_after(WizardStep::Proposal).apply_to(&mut data);
        assert_eq!(data.project_name, "IoT");
        assert!(data.pico.population.is_empty());
        assert!(data.selected_title.is_empty());
        assert!(data.inclusion_criteria.is_empty());
    }

    #[test]
    fn test_clear_after_last_step_is_empty() {
        assert!(WizardPatch::clear_after(WizardStep::PrismaCheck).is_empty());
    }
}
