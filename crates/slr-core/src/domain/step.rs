//! Wizard step identifiers.

use serde::{Deserialize, Serialize};

/// One of the ordered wizard steps. Carries no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Proposal,
    PicoMatrix,
    Titles,
    ProtocolDefinition,
    Criteria,
    SearchPlan,
    PrismaCheck,
}

impl WizardStep {
    /// All steps in wizard order.
    pub const ALL: [WizardStep; 7] = [
        WizardStep::Proposal,
        WizardStep::PicoMatrix,
        WizardStep::Titles,
        WizardStep::ProtocolDefinition,
        WizardStep::Criteria,
        WizardStep::SearchPlan,
        WizardStep::PrismaCheck,
    ];

    /// 1-based position shown to users ("Paso 3 de 7").
    pub fn ordinal(self) -> usize {
        WizardStep::ALL
            .iter()
            .position(|s| *s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WizardStep::Proposal => "proposal",
            WizardStep::PicoMatrix => "pico_matrix",
            WizardStep::Titles => "titles",
            WizardStep::ProtocolDefinition => "protocol_definition",
            WizardStep::Criteria => "criteria",
            WizardStep::SearchPlan => "search_plan",
            WizardStep::PrismaCheck => "prisma_check",
        }
    }

    /// Spanish label used in the UI.
    pub fn label(self) -> &'static str {
        match self {
            WizardStep::Proposal => "Propuesta",
            WizardStep::PicoMatrix => "PICO + Matriz Es/No Es",
            WizardStep::Titles => "Títulos",
            WizardStep::ProtocolDefinition => "Términos del Protocolo",
            WizardStep::Criteria => "Criterios I/E",
            WizardStep::SearchPlan => "Plan de Búsqueda",
            WizardStep::PrismaCheck => "PRISMA y Confirmación",
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
