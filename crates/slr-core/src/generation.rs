//! Remote AI generation seam.
//!
//! [`GenerationClient`] is the request/response interface to the backend's
//! generation endpoints. Request and result types here are already
//! validated domain values; decoding the backend's loose JSON happens in
//! `slr-client`.
//!
//! [`RequestTracker`] hands out tickets so that a response arriving after a
//! newer request of the same kind can be recognised and dropped.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AiProvider, Criterion, GeneratedTitleCandidate, Language, MatrixRow, Pico, Presence,
    ProtocolTerms, ScopeMatrix, SearchQuery, SelectedDatabase, WizardData, WizardPatch,
};
use crate::persistence::RemoteResult;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleRequest {
    pub scope_matrix: ScopeMatrix,
    pub pico: Pico,
    pub provider: AiProvider,
}

impl TitleRequest {
    pub fn from_data(data: &WizardData) -> Self {
        Self {
            scope_matrix: data.scope_matrix.clone(),
            pico: data.pico.clone(),
            provider: data.ai_provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub title: String,
    pub description: String,
    pub provider: AiProvider,
    pub research_area: Option<String>,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
}

impl AnalysisRequest {
    pub fn from_data(data: &WizardData) -> Self {
        Self {
            title: data.project_name.clone(),
            description: data.project_description.clone(),
            provider: data.ai_provider,
            research_area: Some(data.research_area.clone()).filter(|a| !a.trim().is_empty()),
            year_start: data.year_start,
            year_end: data.year_end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStrategyRequest {
    pub scope_matrix: ScopeMatrix,
    pub pico: Pico,
    /// Database ids, e.g. `scopus`.
    pub databases: Vec<String>,
    pub key_terms: Vec<String>,
    pub provider: AiProvider,
}

impl SearchStrategyRequest {
    pub fn from_data(data: &WizardData) -> Self {
        Self {
            scope_matrix: data.scope_matrix.clone(),
            pico: data.pico.clone(),
            databases: data
                .search_plan
                .databases
                .iter()
                .map(|d| d.id.clone())
                .collect(),
            key_terms: data.protocol_terms.all_terms(),
            provider: data.ai_provider,
        }
    }
}

/// Which criteria list a regeneration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriteriaKind {
    Inclusion,
    Exclusion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaRequest {
    pub terms: ProtocolTerms,
    pub pico: Pico,
    pub provider: AiProvider,
    /// Regenerate only one list; `None` generates both.
    pub only: Option<CriteriaKind>,
    /// Free-text focus for a regeneration.
    pub focus: Option<String>,
}

impl CriteriaRequest {
    pub fn from_data(data: &WizardData) -> Self {
        Self {
            terms: data.protocol_terms.clone(),
            pico: data.pico.clone(),
            provider: data.ai_provider,
            only: None,
            focus: None,
        }
    }

    pub fn regenerate(mut self, kind: CriteriaKind, focus: Option<String>) -> Self {
        self.only = Some(kind);
        self.focus = focus.filter(|f| !f.trim().is_empty());
        self
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Description and rationale of one PICO component.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PicoComponent {
    pub description: String,
    pub justification: String,
}

/// PICO framework plus scope matrix derived from the proposal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolAnalysis {
    pub population: PicoComponent,
    pub intervention: PicoComponent,
    pub comparison: PicoComponent,
    pub outcome: PicoComponent,
    pub scope: ScopeMatrix,
}

fn justified(component: &PicoComponent, fallback: &str) -> String {
    let reason = if component.justification.trim().is_empty() {
        fallback
    } else {
        component.justification.as_str()
    };
    format!("ES: {reason}")
}

impl ProtocolAnalysis {
    pub fn pico(&self) -> Pico {
        Pico {
            population: self.population.description.clone(),
            intervention: self.intervention.description.clone(),
            comparison: self.comparison.description.clone(),
            outcome: self.outcome.description.clone(),
        }
    }

    /// Unified four-row table of PICO components with their Es/No-Es reading.
    pub fn matrix_table(&self) -> Vec<MatrixRow> {
        let has_comparison = !self.comparison.description.trim().is_empty();
        vec![
            MatrixRow {
                question: "Población / Contexto".into(),
                content: self.population.description.clone(),
                presence: Presence::Yes,
                justification: justified(
                    &self.population,
                    "El tema define claramente el contexto de aplicación",
                ),
            },
            MatrixRow {
                question: "Intervención / Tecnología".into(),
                content: self.intervention.description.clone(),
                presence: Presence::Yes,
                justification: justified(
                    &self.intervention,
                    "La tecnología o fenómeno de interés está especificado",
                ),
            },
            if has_comparison {
                MatrixRow {
                    question: "Comparación".into(),
                    content: self.comparison.description.clone(),
                    presence: Presence::Yes,
                    justification: justified(
                        &self.comparison,
                        "Se definen comparadores explícitos",
                    ),
                }
            } else {
                MatrixRow {
                    question: "Comparación".into(),
                    content: "No especificado".into(),
                    presence: Presence::Partial,
                    justification: "NO ES explícito: el tema no menciona comparadores directos"
                        .into(),
                }
            },
            MatrixRow {
                question: "Outcomes / Resultados".into(),
                content: self.outcome.description.clone(),
                presence: Presence::Yes,
                justification: justified(
                    &self.outcome,
                    "Los resultados esperados están claramente definidos",
                ),
            },
        ]
    }

    /// Patch that merges the analysis into the wizard.
    pub fn to_patch(&self) -> WizardPatch {
        WizardPatch {
            pico: Some(self.pico()),
            scope_matrix: Some(self.scope.clone()),
            matrix_table: Some(self.matrix_table()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CriteriaResult {
    pub inclusion: Vec<Criterion>,
    pub exclusion: Vec<Criterion>,
}

/// Research area classification plus the databases suggested for it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectedArea {
    pub area: String,
    pub databases: Vec<SelectedDatabase>,
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate_titles(
        &self,
        request: &TitleRequest,
    ) -> RemoteResult<Vec<GeneratedTitleCandidate>>;

    async fn generate_protocol_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> RemoteResult<ProtocolAnalysis>;

    async fn generate_search_strategies(
        &self,
        request: &SearchStrategyRequest,
    ) -> RemoteResult<Vec<SearchQuery>>;

    async fn generate_inclusion_exclusion_criteria(
        &self,
        request: &CriteriaRequest,
    ) -> RemoteResult<CriteriaResult>;

    async fn translate_text(&self, text: &str, from: Language, to: Language)
        -> RemoteResult<String>;

    async fn detect_research_area(&self, area: &str, description: &str)
        -> RemoteResult<DetectedArea>;
}

// ---------------------------------------------------------------------------
// Stale-response tracking
// ---------------------------------------------------------------------------

/// Kind of remote request; responses only compete within one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Titles,
    ProtocolAnalysis,
    SearchStrategies,
    Criteria,
    ResearchArea,
    /// Translation into `target` of the candidate at `index`.
    Translation { index: usize, target: Language },
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Titles => "generate_titles",
            RequestKind::ProtocolAnalysis => "protocol_analysis",
            RequestKind::SearchStrategies => "search_strategies",
            RequestKind::Criteria => "criteria",
            RequestKind::ResearchArea => "detect_research_area",
            RequestKind::Translation { .. } => "translate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: RequestKind,
    pub seq: u64,
}

/// Last-request-wins bookkeeping per [`RequestKind`].
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: Mutex<HashMap<RequestKind, u64>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request, superseding earlier ones of the same kind.
    pub fn issue(&self, kind: RequestKind) -> Ticket {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = latest.entry(kind).or_insert(0);
        *seq += 1;
        Ticket { kind, seq: *seq }
    }

    /// Invalidate outstanding requests of `kind` without starting a new one.
    pub fn supersede(&self, kind: RequestKind) {
        self.issue(kind);
    }

    /// Invalidate every outstanding translation, whatever its candidate.
    pub fn supersede_translations(&self) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        for (kind, seq) in latest.iter_mut() {
            if matches!(kind, RequestKind::Translation { .. }) {
                *seq += 1;
            }
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest_seq(ticket.kind) == ticket.seq
    }

    pub fn latest_seq(&self, kind: RequestKind) -> u64 {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.get(&kind).copied().unwrap_or(0)
    }
}
