//! Persistence seams for projects and protocol sections.
//!
//! - `ProjectStore`: project and protocol CRUD against the backend
//! - `SectionSink`: the target the auto-save coordinator flushes into
//! - `save_protocol`: the create-or-update of a complete protocol
//!
//! Both traits are async and backend-agnostic. `slr-client` provides the
//! HTTP implementation; [`crate::fakes`] provides in-memory ones.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::autosave::SectionKey;
use crate::domain::{RemoteCallError, WizardData};
use crate::export;

/// Result type for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteCallError>;

/// Lifecycle status of a project on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
}

/// Payload for `POST /api/projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_area: Option<String>,
    /// Full protocol document, sent inline when the project is created at finish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Value>,
}

/// Payload for `PUT /api/projects/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Create a project and return its id.
    async fn create_project(&self, draft: &ProjectDraft) -> RemoteResult<String>;

    async fn update_project(&self, id: &str, update: &ProjectUpdate) -> RemoteResult<()>;

    /// Current protocol document of a project.
    async fn get_protocol(&self, id: &str) -> RemoteResult<Value>;

    /// Merge `protocol` (possibly a partial document) into the stored protocol.
    async fn update_protocol(&self, id: &str, protocol: &Value) -> RemoteResult<()>;
}

/// Where [`save_protocol`] left the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedProject {
    pub project_id: String,
    /// True when the project did not exist before the save.
    pub created: bool,
}

/// Persist the complete protocol of `data`.
///
/// With a `project_id` the project metadata and then its protocol are
/// updated; otherwise the project is created with the protocol inline.
/// The project is marked in progress either way.
pub async fn save_protocol(
    store: &dyn ProjectStore,
    data: &WizardData,
) -> RemoteResult<SavedProject> {
    let document = export::protocol_document(data);
    let title = data.title_for_persistence().to_string();
    match &data.project_id {
        Some(id) => {
            let update = ProjectUpdate {
                title,
                description: data.project_description.clone(),
                status: ProjectStatus::InProgress,
            };
            store.update_project(id, &update).await?;
            store.update_protocol(id, &document).await?;
            Ok(SavedProject {
                project_id: id.clone(),
                created: false,
            })
        }
        None => {
            let draft = ProjectDraft {
                title,
                description: data.project_description.clone(),
                status: ProjectStatus::InProgress,
                research_area: Some(data.research_area.clone()).filter(|a| !a.is_empty()),
                protocol: Some(document),
            };
            let project_id = store.create_project(&draft).await?;
            Ok(SavedProject {
                project_id,
                created: true,
            })
        }
    }
}

/// Destination of debounced section saves.
#[async_trait]
pub trait SectionSink: Send + Sync {
    async fn persist(&self, section: SectionKey, payload: &Value) -> RemoteResult<()>;
}

/// Saves each section as a partial protocol update of one project.
pub struct ProtocolSectionSink {
    store: Arc<dyn ProjectStore>,
    project_id: String,
}

impl ProtocolSectionSink {
    pub fn new(store: Arc<dyn ProjectStore>, project_id: impl Into<String>) -> Self {
        Self {
            store,
            project_id: project_id.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

#[async_trait]
impl SectionSink for ProtocolSectionSink {
    async fn persist(&self, section: SectionKey, payload: &Value) -> RemoteResult<()> {
        tracing::debug!(section = %section, project_id = %self.project_id, "persisting section");
        self.store.update_protocol(&self.project_id, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryProjectStore;
    use serde_json::json;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ProjectStatus::InProgress).unwrap(),
            json!("in-progress")
        );
    }

    #[test]
    fn test_draft_omits_empty_protocol() {
        let draft = ProjectDraft {
            title: "T".into(),
            description: "D".into(),
            status: ProjectStatus::Draft,
            research_area: None,
            protocol: None,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert!(value.get("protocol").is_none());
        assert_eq!(value["status"], "draft");
    }

    fn titled(title: &str) -> WizardData {
        WizardData {
            selected_title: title.into(),
            project_description: "Sensores".into(),
            research_area: "Ingeniería".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_protocol_creates_unattached_project() {
        let store = MemoryProjectStore::new();
        let saved = save_protocol(&store, &titled("IoT")).await.unwrap();
        assert!(saved.created);

        let project = store.project(&saved.project_id).unwrap();
        assert_eq!(project.title, "IoT");
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert!(project.protocol.is_object());
        assert_eq!(store.protocol_updates(), 0);
    }

    #[tokio::test]
    async fn test_save_protocol_updates_attached_project() {
        let store = MemoryProjectStore::new();
        let first = save_protocol(&store, &titled("IoT")).await.unwrap();

        let mut data = titled("IoT en agricultura");
        data.project_id = Some(first.project_id.clone());
        let second = save_protocol(&store, &data).await.unwrap();

        assert_eq!(second.project_id, first.project_id);
        assert!(!second.created);
        assert_eq!(store.project_count(), 1);
        assert_eq!(store.protocol_updates(), 1);
        let project = store.project(&first.project_id).unwrap();
        assert_eq!(project.title, "IoT en agricultura");
    }

    #[tokio::test]
    async fn test_save_protocol_stops_at_first_failure() {
        let store = MemoryProjectStore::new();
        let saved = save_protocol(&store, &titled("IoT")).await.unwrap();
        store.set_failing(true);

        let mut data = titled("Otro");
        data.project_id = Some(saved.project_id.clone());
        assert!(save_protocol(&store, &data).await.is_err());
        assert_eq!(store.project(&saved.project_id).unwrap().title, "IoT");
    }

    #[tokio::test]
    async fn test_protocol_sink_updates_attached_project() {
        let store = Arc::new(MemoryProjectStore::new());
        let id = store
            .create_project(&ProjectDraft {
                title: "T".into(),
                description: String::new(),
                status: ProjectStatus::Draft,
                research_area: None,
                protocol: None,
            })
            .await
            .unwrap();
        let sink = ProtocolSectionSink::new(store.clone(), id.clone());
        sink.persist(SectionKey::Pico, &json!({"population": "farms"}))
            .await
            .unwrap();
        let protocol = store.get_protocol(&id).await.unwrap();
        assert_eq!(protocol["population"], "farms");
    }
}
