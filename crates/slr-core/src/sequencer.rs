//! Step sequencing with declarative presence gates.
//!
//! Each [`WizardStep`] declares the [`RequiredField`]s that must be present
//! in [`WizardData`] before the wizard may advance past it. `next()` checks
//! them and blocks with the complete list of missing fields; `back()` never
//! checks anything.

use serde::{Deserialize, Serialize};

use crate::domain::{NavigationError, ValidationError, WizardData, WizardStep};

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// A presence check over [`WizardData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    ProjectName,
    ProjectDescription,
    ResearchArea,
    PicoPopulation,
    PicoIntervention,
    PicoOutcome,
    /// Both sides of the Es/No-Es matrix, or the unified matrix table.
    ScopeMatrix,
    SelectedTitle,
    /// At least one technology or domain term.
    ProtocolTerms,
    InclusionCriteria,
    ExclusionCriteria,
    SearchDatabases,
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

impl RequiredField {
    pub fn is_present(self, data: &WizardData) -> bool {
        match self {
            RequiredField::ProjectName => filled(&data.project_name),
            RequiredField::ProjectDescription => filled(&data.project_description),
            RequiredField::ResearchArea => filled(&data.research_area),
            RequiredField::PicoPopulation => filled(&data.pico.population),
            RequiredField::PicoIntervention => filled(&data.pico.intervention),
            RequiredField::PicoOutcome => filled(&data.pico.outcome),
            RequiredField::ScopeMatrix => {
                (!data.scope_matrix.is.is_empty() && !data.scope_matrix.is_not.is_empty())
                    || !data.matrix_table.is_empty()
            }
            RequiredField::SelectedTitle => filled(&data.selected_title),
            RequiredField::ProtocolTerms => {
                !data.protocol_terms.technology.is_empty() || !data.protocol_terms.domain.is_empty()
            }
            RequiredField::InclusionCriteria => !data.inclusion_criteria.is_empty(),
            RequiredField::ExclusionCriteria => !data.exclusion_criteria.is_empty(),
            RequiredField::SearchDatabases => !data.search_plan.databases.is_empty(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequiredField::ProjectName => "project_name",
            RequiredField::ProjectDescription => "project_description",
            RequiredField::ResearchArea => "research_area",
            RequiredField::PicoPopulation => "pico_population",
            RequiredField::PicoIntervention => "pico_intervention",
            RequiredField::PicoOutcome => "pico_outcome",
            RequiredField::ScopeMatrix => "scope_matrix",
            RequiredField::SelectedTitle => "selected_title",
            RequiredField::ProtocolTerms => "protocol_terms",
            RequiredField::InclusionCriteria => "inclusion_criteria",
            RequiredField::ExclusionCriteria => "exclusion_criteria",
            RequiredField::SearchDatabases => "search_databases",
        }
    }

    /// Spanish label for inline validation messages.
    pub fn label(self) -> &'static str {
        match self {
            RequiredField::ProjectName => "Nombre del proyecto",
            RequiredField::ProjectDescription => "Descripción del proyecto",
            RequiredField::ResearchArea => "Área de investigación",
            RequiredField::PicoPopulation => "Población (PICO)",
            RequiredField::PicoIntervention => "Intervención (PICO)",
            RequiredField::PicoOutcome => "Resultados (PICO)",
            RequiredField::ScopeMatrix => "Matriz Es/No Es",
            RequiredField::SelectedTitle => "Título seleccionado",
            RequiredField::ProtocolTerms => "Términos del protocolo",
            RequiredField::InclusionCriteria => "Criterios de inclusión",
            RequiredField::ExclusionCriteria => "Criterios de exclusión",
            RequiredField::SearchDatabases => "Bases de datos",
        }
    }
}

/// Fields a step must have produced before the wizard moves past it.
pub fn requirements(step: WizardStep) -> &'static [RequiredField] {
    use RequiredField::*;
    match step {
        WizardStep::Proposal => &[ProjectName, ProjectDescription, ResearchArea],
        WizardStep::PicoMatrix => &[PicoPopulation, PicoIntervention, PicoOutcome, ScopeMatrix],
        WizardStep::Titles => &[SelectedTitle],
        WizardStep::ProtocolDefinition => &[ProtocolTerms],
        WizardStep::Criteria => &[InclusionCriteria, ExclusionCriteria],
        WizardStep::SearchPlan => &[SearchDatabases],
        WizardStep::PrismaCheck => &[],
    }
}

/// Requirements of `step` that `data` does not satisfy, in declaration order.
pub fn missing_fields(step: WizardStep, data: &WizardData) -> Vec<RequiredField> {
    requirements(step)
        .iter()
        .copied()
        .filter(|f| !f.is_present(data))
        .collect()
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Tracks the active step and enforces forward gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSequencer {
    steps: Vec<WizardStep>,
    position: usize,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl StepSequencer {
    /// Sequencer over the full seven-step wizard, starting at the proposal.
    pub fn new() -> Self {
        Self {
            steps: WizardStep::ALL.to_vec(),
            position: 0,
        }
    }

    pub fn current(&self) -> WizardStep {
        self.steps[self.position]
    }

    /// 0-based index into the step list.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn is_first(&self) -> bool {
        self.position == 0
    }

    pub fn is_last(&self) -> bool {
        self.position + 1 == self.steps.len()
    }

    pub fn steps(&self) -> &[WizardStep] {
        &self.steps
    }

    pub fn missing_fields(&self, data: &WizardData) -> Vec<RequiredField> {
        missing_fields(self.current(), data)
    }

    pub fn can_advance(&self, data: &WizardData) -> bool {
        !self.is_last() && self.missing_fields(data).is_empty()
    }

    /// Advance one step if the current step's gate passes.
    pub fn next(&mut self, data: &WizardData) -> Result<WizardStep, NavigationError> {
        if self.is_last() {
            return Err(NavigationError::AtFinalStep);
        }
        let missing = self.missing_fields(data);
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequiredFields {
                step: self.current(),
                missing,
            }
            .into());
        }
        self.position += 1;
        Ok(self.current())
    }

    /// Go back one step. Always succeeds unless already at the first step.
    pub fn back(&mut self) -> Result<WizardStep, NavigationError> {
        if self.is_first() {
            return Err(NavigationError::AtFirstStep);
        }
        self.position -= 1;
        Ok(self.current())
    }

    /// Reset to the first step.
    pub fn restart(&mut self) {
        self.position = 0;
    }
}
