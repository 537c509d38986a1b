//! Wire formats of the backend API.
//!
//! Every response is wrapped in `{ "success", "message", "data" }`. The
//! payloads inside `data` are loose: keys are partly Spanish, optional
//! almost everywhere, and some fields have more than one name. The types
//! here accept those shapes and convert into the validated domain types.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use slr_core::export;
use slr_core::{
    AiProvider, CochraneCompliance, CriteriaKind, CriteriaResult, Criterion, DetectedArea,
    GeneratedTitleCandidate, Language, Pico, PicoComponent, ProtocolAnalysis, ProtocolTerms,
    RemoteCallError, RemoteResult, ScopeMatrix, SearchQuery, SelectedDatabase,
};

fn invalid(endpoint: &str, reason: impl Into<String>) -> RemoteCallError {
    RemoteCallError::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    success: Option<bool>,
    message: Option<String>,
    data: Option<Value>,
}

/// Classify a raw HTTP response and return its `data` payload.
pub fn decode_envelope(endpoint: &str, status: u16, body: &str) -> RemoteResult<Value> {
    let parsed: Option<Envelope> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let message = parsed
            .and_then(|e| e.message)
            .unwrap_or_else(|| "Error en la petición".to_string());
        return Err(RemoteCallError::Status {
            endpoint: endpoint.to_string(),
            status,
            message,
        });
    }

    let envelope = parsed.ok_or_else(|| invalid(endpoint, "body is not a JSON envelope"))?;
    if envelope.success == Some(false) {
        return Err(invalid(
            endpoint,
            envelope
                .message
                .unwrap_or_else(|| "request reported failure".to_string()),
        ));
    }
    match envelope.data {
        Some(Value::Null) | None => Err(invalid(endpoint, "missing `data`")),
        Some(data) => Ok(data),
    }
}

/// Deserialize a `data` payload into `T`.
pub fn parse_data<T: DeserializeOwned>(endpoint: &str, data: Value) -> RemoteResult<T> {
    serde_json::from_value(data).map_err(|e| invalid(endpoint, e.to_string()))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitlesBody<'a> {
    pub matrix_data: &'a ScopeMatrix,
    pub pico_data: &'a Pico,
    pub ai_provider: AiProvider,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBody<'a> {
    pub title: &'a str,
    pub description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_start: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_end: Option<i32>,
    pub ai_provider: AiProvider,
}

/// Protocol terms as the backend names them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTerms<'a> {
    pub tecnologia: &'a [String],
    pub dominio: &'a [String],
    pub tipo_estudio: &'a [String],
    pub focos_tematicos: &'a [String],
}

impl<'a> From<&'a ProtocolTerms> for WireTerms<'a> {
    fn from(terms: &'a ProtocolTerms) -> Self {
        Self {
            tecnologia: &terms.technology,
            dominio: &terms.domain,
            tipo_estudio: &terms.study_type,
            focos_tematicos: &terms.thematic_focus,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategiesBody<'a> {
    pub matrix_data: &'a ScopeMatrix,
    pub pico_data: &'a Pico,
    pub databases: &'a [String],
    pub key_terms: &'a [String],
    pub ai_provider: AiProvider,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaBody<'a> {
    pub protocol_terms: WireTerms<'a>,
    pub pico_data: &'a Pico,
    pub ai_provider: AiProvider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_type: Option<CriteriaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_focus: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct TranslateBody<'a> {
    pub text: &'a str,
    pub from: Language,
    pub to: Language,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectAreaBody<'a> {
    pub research_area: &'a str,
    pub description: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireTitle {
    title: String,
    #[serde(alias = "titleEs", alias = "tituloEspanol")]
    spanish_title: String,
    reasoning: Option<String>,
    justification: Option<String>,
    cochrane_compliance: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TitlesData {
    titles: Vec<WireTitle>,
}

impl TitlesData {
    /// Candidates with a non-empty English title, in response order.
    pub fn into_candidates(self) -> Vec<GeneratedTitleCandidate> {
        self.titles
            .into_iter()
            .filter(|t| !t.title.trim().is_empty())
            .map(|t| GeneratedTitleCandidate {
                title: t.title.trim().to_string(),
                spanish_title: t.spanish_title.trim().to_string(),
                justification: t.reasoning.or(t.justification).unwrap_or_default(),
                compliance: t
                    .cochrane_compliance
                    .as_deref()
                    .map(CochraneCompliance::parse_lenient)
                    .unwrap_or_default(),
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireComponent {
    descripcion: String,
    justificacion: String,
}

fn pico_component(component: Option<WireComponent>) -> PicoComponent {
    let component = component.unwrap_or_default();
    PicoComponent {
        description: component.descripcion,
        justification: component.justificacion,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarcoPico {
    population: Option<WireComponent>,
    intervention: Option<WireComponent>,
    comparison: Option<WireComponent>,
    #[serde(alias = "outcome")]
    outcomes: Option<WireComponent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhaseOne {
    marco_pico: MarcoPico,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhaseTwo {
    es: Vec<String>,
    no_es: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisData {
    fase1_marco_pico: PhaseOne,
    fase2_matriz_es_no_es: PhaseTwo,
}

impl From<AnalysisData> for ProtocolAnalysis {
    fn from(data: AnalysisData) -> Self {
        let pico = data.fase1_marco_pico.marco_pico;
        ProtocolAnalysis {
            population: pico_component(pico.population),
            intervention: pico_component(pico.intervention),
            comparison: pico_component(pico.comparison),
            outcome: pico_component(pico.outcomes),
            scope: ScopeMatrix {
                is: data.fase2_matriz_es_no_es.es,
                is_not: data.fase2_matriz_es_no_es.no_es,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WireQuery {
    database: String,
    database_id: Option<String>,
    query: String,
    explanation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StrategiesData {
    queries: Option<Vec<WireQuery>>,
}

/// `"IEEE Xplore"` -> `"ieeexplore"`; ids that are already normalized pass through.
fn normalize_database_id(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

impl StrategiesData {
    pub fn into_queries(self, endpoint: &str) -> RemoteResult<Vec<SearchQuery>> {
        let queries = self
            .queries
            .ok_or_else(|| invalid(endpoint, "missing `queries`"))?;
        Ok(queries
            .into_iter()
            .map(|q| {
                let id = q
                    .database_id
                    .unwrap_or_else(|| normalize_database_id(&q.database));
                let name = match export::database_name(&id) {
                    known if known != id => known.to_string(),
                    _ => q.database.clone(),
                };
                SearchQuery {
                    has_api: export::has_api(&id),
                    database_id: id,
                    database_name: name,
                    base_query: q.query.clone(),
                    query: q.query,
                    explanation: q.explanation,
                    ..Default::default()
                }
            })
            .collect())
    }
}

/// Criteria arrive either as `{ "criterio", "categoria" }` or as plain strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireCriterion {
    Structured {
        criterio: String,
        #[serde(default)]
        categoria: String,
    },
    Plain(String),
}

impl From<WireCriterion> for Criterion {
    fn from(c: WireCriterion) -> Self {
        match c {
            WireCriterion::Structured {
                criterio,
                categoria,
            } => Criterion::new(categoria, criterio),
            WireCriterion::Plain(text) => Criterion::new(String::new(), text),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CriteriaData {
    inclusion_criteria: Vec<WireCriterion>,
    exclusion_criteria: Vec<WireCriterion>,
}

impl From<CriteriaData> for CriteriaResult {
    fn from(data: CriteriaData) -> Self {
        CriteriaResult {
            inclusion: data.inclusion_criteria.into_iter().map(Into::into).collect(),
            exclusion: data.exclusion_criteria.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranslateData {
    pub translated_text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDatabase {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectAreaData {
    detected_area: String,
    databases: Vec<WireDatabase>,
}

impl From<DetectAreaData> for DetectedArea {
    fn from(data: DetectAreaData) -> Self {
        DetectedArea {
            area: data.detected_area,
            databases: data
                .databases
                .into_iter()
                .filter(|db| !db.id.is_empty())
                .map(|db| SelectedDatabase {
                    has_api: export::has_api(&db.id),
                    name: if db.name.is_empty() {
                        export::database_name(&db.id).to_string()
                    } else {
                        db.name
                    },
                    id: db.id,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProjectData {
    pub project: WireProject,
}

#[derive(Debug, Deserialize)]
pub struct WireProject {
    pub id: Value,
}

impl ProjectData {
    /// Project id as a string; numeric ids are rendered in decimal.
    pub fn id(&self, endpoint: &str) -> RemoteResult<String> {
        match &self.project.id {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(invalid(endpoint, format!("unusable project id: {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProtocolData {
    #[serde(default)]
    pub protocol: Value,
}
