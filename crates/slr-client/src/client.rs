//! Backend API client
//!
//! One `reqwest::Client` per [`ApiClient`], a bearer token when configured,
//! and the `{ success, message, data }` envelope decoded for every call.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use slr_core::{
    AnalysisRequest, ApiConfig, CriteriaRequest, CriteriaResult, DetectedArea, GenerationClient,
    GeneratedTitleCandidate, Language, ProjectDraft, ProjectStore, ProjectUpdate,
    ProtocolAnalysis, RemoteCallError, RemoteResult, SearchQuery, SearchStrategyRequest,
    TitleRequest, WizardConfig,
};

use crate::wire::{
    self, AnalysisBody, AnalysisData, CriteriaBody, CriteriaData, DetectAreaBody, DetectAreaData,
    ProjectData, ProtocolData, StrategiesBody, StrategiesData, TitlesBody, TitlesData,
    TranslateBody, TranslateData,
};

pub const GENERATE_TITLES: &str = "/api/ai/generate-titles";
pub const PROTOCOL_ANALYSIS: &str = "/api/ai/protocol-analysis";
pub const SEARCH_STRATEGIES: &str = "/api/ai/generate-search-strategies";
pub const CRITERIA: &str = "/api/ai/generate-inclusion-exclusion-criteria";
pub const DETECT_AREA: &str = "/api/ai/detect-research-area";
pub const TRANSLATE: &str = "/api/ai/translate";
pub const PROJECTS: &str = "/api/projects";

/// Path of one project.
pub fn project_path(id: &str) -> String {
    format!("{PROJECTS}/{id}")
}

/// Path of one project's protocol document.
pub fn protocol_path(id: &str) -> String {
    format!("{PROJECTS}/{id}/protocol")
}

/// HTTP client for the wizard backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("slr-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| RemoteCallError::Config(e.to_string()))?;
        Ok(ApiClient { config, http })
    }

    /// Client for the API section of a loaded [`WizardConfig`].
    pub fn from_config(config: &WizardConfig) -> RemoteResult<Self> {
        Self::new(config.api.clone())
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> RemoteResult<Value> {
        let url = self.url(path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, "calling backend");
        let transport = |e: reqwest::Error| RemoteCallError::Transport {
            endpoint: path.to_string(),
            message: e.to_string(),
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport)?;
        debug!(url = %url, status = status, bytes = text.len(), "backend responded");

        wire::decode_envelope(path, status, &text)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> RemoteResult<T> {
        let data = self.send(Method::POST, path, Some(body)).await?;
        wire::parse_data(path, data)
    }

    async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RemoteResult<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        let data = self.send::<Value>(Method::GET, path, None).await?;
        wire::parse_data(path, data)
    }
}

#[async_trait]
impl GenerationClient for ApiClient {
    async fn generate_titles(
        &self,
        request: &TitleRequest,
    ) -> RemoteResult<Vec<GeneratedTitleCandidate>> {
        let body = TitlesBody {
            matrix_data: &request.scope_matrix,
            pico_data: &request.pico,
            ai_provider: request.provider,
        };
        let data: TitlesData = self.post(GENERATE_TITLES, &body).await?;
        Ok(data.into_candidates())
    }

    async fn generate_protocol_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> RemoteResult<ProtocolAnalysis> {
        let body = AnalysisBody {
            title: &request.title,
            description: &request.description,
            area: request.research_area.as_deref(),
            year_start: request.year_start,
            year_end: request.year_end,
            ai_provider: request.provider,
        };
        let data: AnalysisData = self.post(PROTOCOL_ANALYSIS, &body).await?;
        Ok(data.into())
    }

    async fn generate_search_strategies(
        &self,
        request: &SearchStrategyRequest,
    ) -> RemoteResult<Vec<SearchQuery>> {
        let body = StrategiesBody {
            matrix_data: &request.scope_matrix,
            pico_data: &request.pico,
            databases: &request.databases,
            key_terms: &request.key_terms,
            ai_provider: request.provider,
        };
        let data: StrategiesData = self.post(SEARCH_STRATEGIES, &body).await?;
        data.into_queries(SEARCH_STRATEGIES)
    }

    async fn generate_inclusion_exclusion_criteria(
        &self,
        request: &CriteriaRequest,
    ) -> RemoteResult<CriteriaResult> {
        let body = CriteriaBody {
            protocol_terms: (&request.terms).into(),
            pico_data: &request.pico,
            ai_provider: request.provider,
            specific_type: request.only,
            custom_focus: request.focus.as_deref(),
        };
        let data: CriteriaData = self.post(CRITERIA, &body).await?;
        Ok(data.into())
    }

    async fn translate_text(
        &self,
        text: &str,
        from: Language,
        to: Language,
    ) -> RemoteResult<String> {
        let data: TranslateData = self
            .post(TRANSLATE, &TranslateBody { text, from, to })
            .await?;
        if data.translated_text.trim().is_empty() {
            return Err(RemoteCallError::InvalidResponse {
                endpoint: TRANSLATE.to_string(),
                reason: "empty translation".to_string(),
            });
        }
        Ok(data.translated_text)
    }

    async fn detect_research_area(
        &self,
        area: &str,
        description: &str,
    ) -> RemoteResult<DetectedArea> {
        let body = DetectAreaBody {
            research_area: area,
            description,
        };
        let data: DetectAreaData = self.post(DETECT_AREA, &body).await?;
        Ok(data.into())
    }
}

#[async_trait]
impl ProjectStore for ApiClient {
    async fn create_project(&self, draft: &ProjectDraft) -> RemoteResult<String> {
        let data: ProjectData = self.post(PROJECTS, draft).await?;
        let id = data.id(PROJECTS)?;
        info!(project_id = %id, "project created");
        Ok(id)
    }

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> RemoteResult<()> {
        self.put(&project_path(id), update).await?;
        Ok(())
    }

    async fn get_protocol(&self, id: &str) -> RemoteResult<Value> {
        let data: ProtocolData = self.get(&protocol_path(id)).await?;
        Ok(data.protocol)
    }

    async fn update_protocol(&self, id: &str, protocol: &Value) -> RemoteResult<()> {
        self.put(&protocol_path(id), protocol).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new(ApiConfig::new("http://localhost:3001/")).unwrap();
        assert_eq!(
            client.url(&protocol_path("p-1")),
            "http://localhost:3001/api/projects/p-1/protocol"
        );
    }

    #[test]
    fn test_from_config_keeps_token() {
        let mut config = WizardConfig::default();
        config.api = ApiConfig::new("https://slr.example.org").with_token("secret");
        let client = ApiClient::from_config(&config).unwrap();
        assert_eq!(client.config().token.as_deref(), Some("secret"));
    }
}
