//! In-memory fakes for the remote seams (testing only)
//!
//! Provides `MemoryProjectStore`, `MemorySectionSink` and
//! `FakeGenerationClient`, which satisfy the trait contracts without a
//! backend. Each can be switched into a failing mode and records what it
//! was asked to do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::autosave::SectionKey;
use crate::domain::{
    CochraneCompliance, Criterion, GeneratedTitleCandidate, Language, RemoteCallError, ScopeMatrix,
    SearchQuery, SelectedDatabase,
};
use crate::generation::{
    AnalysisRequest, CriteriaKind, CriteriaRequest, CriteriaResult, DetectedArea,
    GenerationClient, PicoComponent, ProtocolAnalysis, SearchStrategyRequest, TitleRequest,
};
use crate::persistence::{ProjectDraft, ProjectStore, ProjectUpdate, RemoteResult, SectionSink};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(endpoint: &str) -> RemoteCallError {
    RemoteCallError::Status {
        endpoint: endpoint.to_string(),
        status: 503,
        message: "Servicio no disponible".to_string(),
    }
}

/// Shallow-merge the keys of `patch` into `target`, like the backend's PUT.
fn merge_object(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

// ---------------------------------------------------------------------------
// MemoryProjectStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StoredProject {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: crate::persistence::ProjectStatus,
    pub protocol: Value,
}

/// In-memory project store keyed by a sequential id.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: Mutex<HashMap<String, StoredProject>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    protocol_updates: AtomicUsize,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with HTTP 503.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn project(&self, id: &str) -> Option<StoredProject> {
        locked(&self.projects).get(id).cloned()
    }

    pub fn project_count(&self) -> usize {
        locked(&self.projects).len()
    }

    pub fn protocol_updates(&self) -> usize {
        self.protocol_updates.load(Ordering::SeqCst)
    }

    fn check(&self, endpoint: &str) -> RemoteResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable(endpoint));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn create_project(&self, draft: &ProjectDraft) -> RemoteResult<String> {
        self.check("/api/projects")?;
        let id = format!("project-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let project = StoredProject {
            id: id.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: draft.status,
            protocol: draft
                .protocol
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new())),
        };
        locked(&self.projects).insert(id.clone(), project);
        Ok(id)
    }

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> RemoteResult<()> {
        let endpoint = format!("/api/projects/{id}");
        self.check(&endpoint)?;
        let mut projects = locked(&self.projects);
        let project = projects.get_mut(id).ok_or_else(|| RemoteCallError::Status {
            endpoint,
            status: 404,
            message: "Proyecto no encontrado".into(),
        })?;
        project.title = update.title.clone();
        project.description = update.description.clone();
        project.status = update.status;
        Ok(())
    }

    async fn get_protocol(&self, id: &str) -> RemoteResult<Value> {
        let endpoint = format!("/api/projects/{id}/protocol");
        self.check(&endpoint)?;
        locked(&self.projects)
            .get(id)
            .map(|p| p.protocol.clone())
            .ok_or(RemoteCallError::Status {
                endpoint,
                status: 404,
                message: "Proyecto no encontrado".into(),
            })
    }

    async fn update_protocol(&self, id: &str, protocol: &Value) -> RemoteResult<()> {
        let endpoint = format!("/api/projects/{id}/protocol");
        self.check(&endpoint)?;
        let mut projects = locked(&self.projects);
        let project = projects.get_mut(id).ok_or_else(|| RemoteCallError::Status {
            endpoint,
            status: 404,
            message: "Proyecto no encontrado".into(),
        })?;
        merge_object(&mut project.protocol, protocol);
        self.protocol_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySectionSink
// ---------------------------------------------------------------------------

/// Records every successful section save in order.
#[derive(Debug, Default)]
pub struct MemorySectionSink {
    calls: Mutex<Vec<(SectionKey, Value)>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl MemorySectionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Simulated round-trip time of each save.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Successful saves, oldest first.
    pub fn calls(&self) -> Vec<(SectionKey, Value)> {
        locked(&self.calls).clone()
    }

    /// Every save attempt, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SectionSink for MemorySectionSink {
    async fn persist(&self, section: SectionKey, payload: &Value) -> RemoteResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteCallError::Transport {
                endpoint: format!("section:{section}"),
                message: "connection reset".into(),
            });
        }
        locked(&self.calls).push((section, payload.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeGenerationClient
// ---------------------------------------------------------------------------

/// Deterministic generation backend.
///
/// Titles, criteria and queries are derived from the request so tests can
/// assert on them. Translations are `"[<to>] <text>"` and can be delayed per
/// source text to provoke out-of-order responses; area detection can be
/// delayed per research area the same way.
#[derive(Debug, Default)]
pub struct FakeGenerationClient {
    failing: AtomicBool,
    calls: AtomicUsize,
    translation_delays: Mutex<HashMap<String, Duration>>,
    area_delays: Mutex<HashMap<String, Duration>>,
}

impl FakeGenerationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay the translation of `text` by `delay`.
    pub fn delay_translation(&self, text: &str, delay: Duration) {
        locked(&self.translation_delays).insert(text.to_string(), delay);
    }

    /// Delay the detection of `area` by `delay`.
    pub fn delay_detection(&self, area: &str, delay: Duration) {
        locked(&self.area_delays).insert(area.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, endpoint: &str) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable(endpoint));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationClient for FakeGenerationClient {
    async fn generate_titles(
        &self,
        request: &TitleRequest,
    ) -> RemoteResult<Vec<GeneratedTitleCandidate>> {
        self.enter("/api/ai/generate-titles")?;
        let topic = if request.pico.intervention.is_empty() {
            "Technology"
        } else {
            request.pico.intervention.as_str()
        };
        Ok((1..=5)
            .map(|n| GeneratedTitleCandidate {
                title: format!("{topic}: Systematic Review {n}"),
                spanish_title: format!("{topic}: Revisión Sistemática {n}"),
                justification: format!("Candidato {n}"),
                compliance: if n == 1 {
                    CochraneCompliance::Full
                } else {
                    CochraneCompliance::Partial
                },
            })
            .collect())
    }

    async fn generate_protocol_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> RemoteResult<ProtocolAnalysis> {
        self.enter("/api/ai/protocol-analysis")?;
        let component = |description: String| PicoComponent {
            description,
            justification: String::new(),
        };
        Ok(ProtocolAnalysis {
            population: component(format!("Población de {}", request.title)),
            intervention: component(request.title.clone()),
            comparison: component(String::new()),
            outcome: component("Efectividad reportada".into()),
            scope: ScopeMatrix {
                is: vec![request.title.clone()],
                is_not: vec!["Estudios no empíricos".into()],
            },
        })
    }

    async fn generate_search_strategies(
        &self,
        request: &SearchStrategyRequest,
    ) -> RemoteResult<Vec<SearchQuery>> {
        self.enter("/api/ai/generate-search-strategies")?;
        let base = request
            .key_terms
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" AND ");
        Ok(request
            .databases
            .iter()
            .map(|id| SearchQuery {
                database_id: id.clone(),
                database_name: crate::export::database_name(id).to_string(),
                query: format!("TITLE-ABS-KEY({base})"),
                base_query: base.clone(),
                ..Default::default()
            })
            .collect())
    }

    async fn generate_inclusion_exclusion_criteria(
        &self,
        request: &CriteriaRequest,
    ) -> RemoteResult<CriteriaResult> {
        self.enter("/api/ai/generate-inclusion-exclusion-criteria")?;
        let focus = request.focus.clone().unwrap_or_default();
        let inclusion = vec![
            Criterion::new("Cobertura temática", format!("Estudios sobre {focus}").trim_end().to_string()),
            Criterion::new("Idioma", "Inglés o español"),
        ];
        let exclusion = vec![Criterion::new("Tipo de publicación", "Literatura gris")];
        Ok(match request.only {
            None => CriteriaResult {
                inclusion,
                exclusion,
            },
            Some(CriteriaKind::Inclusion) => CriteriaResult {
                inclusion,
                exclusion: Vec::new(),
            },
            Some(CriteriaKind::Exclusion) => CriteriaResult {
                inclusion: Vec::new(),
                exclusion,
            },
        })
    }

    async fn translate_text(
        &self,
        text: &str,
        _from: Language,
        to: Language,
    ) -> RemoteResult<String> {
        self.enter("/api/ai/translate")?;
        let delay = locked(&self.translation_delays).get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("[{}] {text}", to.code()))
    }

    async fn detect_research_area(
        &self,
        area: &str,
        _description: &str,
    ) -> RemoteResult<DetectedArea> {
        self.enter("/api/ai/detect-research-area")?;
        let delay = locked(&self.area_delays).get(area).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(DetectedArea {
            area: area.to_string(),
            databases: ["scopus", "ieee"]
                .into_iter()
                .map(|id| SelectedDatabase {
                    id: id.to_string(),
                    name: crate::export::database_name(id).to_string(),
                    has_api: true,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_protocol_merges_keys() {
        let store = MemoryProjectStore::new();
        let id = store
            .create_project(&ProjectDraft {
                title: "T".into(),
                description: String::new(),
                status: Default::default(),
                research_area: None,
                protocol: Some(json!({"population": "a", "intervention": "b"})),
            })
            .await
            .unwrap();
        store
            .update_protocol(&id, &json!({"population": "c"}))
            .await
            .unwrap();
        let protocol = store.get_protocol(&id).await.unwrap();
        assert_eq!(protocol, json!({"population": "c", "intervention": "b"}));
        assert_eq!(store.protocol_updates(), 1);
    }

    #[tokio::test]
    async fn test_unknown_project_is_404() {
        let store = MemoryProjectStore::new();
        let err = store.get_protocol("missing").await.unwrap_err();
        assert!(matches!(err, RemoteCallError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_failing_generation_counts_calls() {
        let client = FakeGenerationClient::new();
        client.set_failing(true);
        assert!(client
            .translate_text("hola", Language::Es, Language::En)
            .await
            .is_err());
        assert_eq!(client.calls(), 1);
    }
}
