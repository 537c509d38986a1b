//! One wizard session: state, navigation and remote collaborators.
//!
//! `WizardSession` is the handle the UI drives. It owns the
//! [`WizardStateStore`] and the [`StepSequencer`], routes section edits
//! through the [`AutoSaveCoordinator`] once a project exists, and catches
//! every remote failure: the failure becomes a [`Notice`], the store keeps
//! its last good state, and the error is returned to the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use crate::autosave::{AutoSaveCoordinator, SectionKey};
use crate::compliance::{self, EvaluationSummary};
use crate::config::AutoSaveConfig;
use crate::domain::{
    ChecklistItem, GeneratedTitleCandidate, Language, NavigationError, RemoteCallError, Result,
    ScreeningStats, ScreeningStatus, SelectedDatabase, ValidationError, WizardData, WizardError,
    WizardPatch, WizardStep,
};
use crate::export;
use crate::generation::{
    AnalysisRequest, CriteriaKind, CriteriaRequest, DetectedArea, GenerationClient, RequestKind,
    RequestTracker, SearchStrategyRequest, Ticket, TitleRequest,
};
use crate::metrics::METRICS;
use crate::notify::{Notice, Notifier};
use crate::obs;
use crate::obs::SessionSpan;
use crate::persistence::{
    self, ProjectDraft, ProjectStatus, ProjectStore, ProtocolSectionSink, SavedProject,
};
use crate::references;
use crate::sequencer::StepSequencer;
use crate::store::WizardStateStore;
use crate::titles;

/// What happened to a remote response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The response was merged into the wizard.
    Applied,
    /// The call failed or returned nothing; local templates were used.
    Fallback,
    /// A newer request of the same kind was issued meanwhile.
    Discarded,
}

/// Result of [`WizardSession::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishOutcome {
    pub project_id: String,
    /// True when the project did not exist before finishing.
    pub created: bool,
    /// Route of the project page to navigate to.
    pub redirect: String,
}

/// Databases suggested when area detection is unavailable.
const FALLBACK_DATABASES: [&str; 6] = ["scopus", "ieee", "acm", "springer", "sciencedirect", "webofscience"];

pub struct WizardSession {
    id: String,
    span: SessionSpan,
    store: WizardStateStore,
    sequencer: Mutex<StepSequencer>,
    generator: Arc<dyn GenerationClient>,
    projects: Arc<dyn ProjectStore>,
    notifier: Notifier,
    autosave_config: AutoSaveConfig,
    autosave: Mutex<Option<AutoSaveCoordinator>>,
    tracker: RequestTracker,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WizardSession {
    pub fn new(
        generator: Arc<dyn GenerationClient>,
        projects: Arc<dyn ProjectStore>,
        notifier: Notifier,
        autosave_config: AutoSaveConfig,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let span = SessionSpan::new(&id);
        Self {
            id,
            span,
            store: WizardStateStore::default(),
            sequencer: Mutex::new(StepSequencer::new()),
            generator,
            projects,
            notifier,
            autosave_config,
            autosave: Mutex::new(None),
            tracker: RequestTracker::new(),
        }
    }

    /// Resume from existing data. A known project id enables auto-save.
    pub fn with_data(mut self, data: WizardData) -> Self {
        let project_id = data.project_id.clone();
        self.store = WizardStateStore::new(data);
        if let Some(id) = project_id {
            self.install_autosave(&id);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &WizardStateStore {
        &self.store
    }

    pub fn data(&self) -> WizardData {
        self.store.data()
    }

    pub fn current_step(&self) -> WizardStep {
        locked(&self.sequencer).current()
    }

    pub fn sequencer(&self) -> StepSequencer {
        locked(&self.sequencer).clone()
    }

    pub fn autosave(&self) -> Option<AutoSaveCoordinator> {
        locked(&self.autosave).clone()
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Advance if the current step's requirements are met.
    ///
    /// Entering the final step with an empty checklist runs the evaluator.
    pub fn next(&self) -> std::result::Result<WizardStep, NavigationError> {
        let _span = self.span.enter();
        let data = self.store.data();
        let (from, result) = {
            let mut sequencer = locked(&self.sequencer);
            let from = sequencer.current();
            (from, sequencer.next(&data))
        };
        match result {
            Ok(to) => {
                obs::emit_step_advanced(from, to);
                if to == WizardStep::PrismaCheck && data.prisma_items.is_empty() {
                    self.evaluate_compliance();
                }
                Ok(to)
            }
            Err(NavigationError::Validation(ValidationError::MissingRequiredFields {
                step,
                missing,
            })) => {
                obs::emit_step_blocked(step, &missing);
                Err(ValidationError::MissingRequiredFields { step, missing }.into())
            }
            Err(other) => Err(other),
        }
    }

    pub fn back(&self) -> std::result::Result<WizardStep, NavigationError> {
        let _span = self.span.enter();
        let mut sequencer = locked(&self.sequencer);
        let from = sequencer.current();
        let to = sequencer.back()?;
        obs::emit_step_back(from, to, false);
        Ok(to)
    }

    /// Go back and clear everything produced by later steps.
    pub fn back_discarding(&self) -> std::result::Result<WizardStep, NavigationError> {
        let _span = self.span.enter();
        let (from, to) = {
            let mut sequencer = locked(&self.sequencer);
            let from = sequencer.current();
            (from, sequencer.back()?)
        };
        self.store.update(WizardPatch::clear_after(to));
        obs::emit_step_back(from, to, true);
        Ok(to)
    }

    // -----------------------------------------------------------------------
    // Editing and persistence
    // -----------------------------------------------------------------------

    /// Apply an edit of `section` and schedule its auto-save.
    pub fn edit(&self, section: SectionKey, patch: WizardPatch) {
        self.store.update(patch);
        self.schedule(section);
    }

    fn schedule(&self, section: SectionKey) {
        if let Some(autosave) = self.autosave() {
            let payload = self.store.read(|data| export::section_payload(data, section));
            autosave.schedule_save(section, payload);
        }
    }

    fn install_autosave(&self, project_id: &str) {
        let sink = Arc::new(ProtocolSectionSink::new(
            Arc::clone(&self.projects),
            project_id,
        ));
        let coordinator =
            AutoSaveCoordinator::new(sink, self.notifier.clone(), self.autosave_config.clone());
        if let Some(previous) = locked(&self.autosave).replace(coordinator) {
            previous.cancel_all();
        }
    }

    /// Bind the session to an existing backend project and enable auto-save.
    pub fn attach_project(&self, project_id: impl Into<String>) {
        let project_id = project_id.into();
        self.store.update(WizardPatch {
            project_id: Some(Some(project_id.clone())),
            ..Default::default()
        });
        self.install_autosave(&project_id);
    }

    /// Create the backend project as a draft unless one is attached already.
    pub async fn create_project(&self) -> Result<String> {
        if let Some(id) = self.store.read(|d| d.project_id.clone()) {
            return Ok(id);
        }
        let data = self.store.data();
        let draft = ProjectDraft {
            title: data.project_name.clone(),
            description: data.project_description.clone(),
            status: ProjectStatus::Draft,
            research_area: Some(data.research_area.clone()).filter(|a| !a.is_empty()),
            protocol: None,
        };
        let id = self
            .projects
            .create_project(&draft)
            .instrument(self.span.handle())
            .await
            .map_err(|e| self.fail("create_project", "Error al crear el proyecto", e))?;
        self.attach_project(id.clone());
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Remote generation
    // -----------------------------------------------------------------------

    fn fail(&self, operation: &str, title: &str, err: RemoteCallError) -> WizardError {
        obs::emit_remote_call_failed(operation, &err);
        self.notifier
            .notify(Notice::error(title, err.user_message()));
        WizardError::Remote(err)
    }

    fn issue(&self, kind: RequestKind) -> Ticket {
        METRICS.inc_generation_calls();
        self.tracker.issue(kind)
    }

    /// True when `ticket` was superseded; the response must be dropped.
    fn is_stale(&self, ticket: &Ticket) -> bool {
        if self.tracker.is_current(ticket) {
            return false;
        }
        METRICS.inc_stale_responses();
        obs::emit_stale_response_discarded(
            ticket.kind.as_str(),
            ticket.seq,
            self.tracker.latest_seq(ticket.kind),
        );
        true
    }

    /// Generate title candidates, falling back to templates on failure.
    pub async fn generate_titles(&self) -> Result<ResponseOutcome> {
        let ticket = self.issue(RequestKind::Titles);
        let data = self.store.data();
        let request = TitleRequest::from_data(&data);
        self.notifier.notify(Notice::info(
            "Generando títulos...",
            format!(
                "Usando {} para crear 5 opciones...",
                request.provider.display_name()
            ),
        ));

        let response = self
            .generator
            .generate_titles(&request)
            .instrument(self.span.handle())
            .await;
        if self.is_stale(&ticket) {
            return Ok(ResponseOutcome::Discarded);
        }

        let (titles, outcome) = match response {
            Ok(titles) if !titles.is_empty() => (titles, ResponseOutcome::Applied),
            Ok(_) => (titles::fallback_titles(&data), ResponseOutcome::Fallback),
            Err(err) => {
                obs::emit_remote_call_failed(ticket.kind.as_str(), &err);
                (titles::fallback_titles(&data), ResponseOutcome::Fallback)
            }
        };
        let count = titles.len();
        // Translations of the replaced candidates must not land on the new ones.
        self.tracker.supersede_translations();
        self.edit(SectionKey::Titles, titles::replace_candidates(titles));
        self.notifier.notify(match outcome {
            ResponseOutcome::Applied => Notice::success(
                "Títulos generados",
                format!("{count} opciones creadas. Selecciona la que más te guste o edítala."),
            ),
            _ => Notice::info(
                "Títulos sugeridos",
                "Se generaron títulos de ejemplo a partir del marco PICO",
            ),
        });
        Ok(outcome)
    }

    /// Derive PICO, scope matrix and the unified table from the proposal.
    pub async fn generate_protocol_analysis(&self) -> Result<ResponseOutcome> {
        let ticket = self.issue(RequestKind::ProtocolAnalysis);
        let request = self.store.read(AnalysisRequest::from_data);
        let response = self
            .generator
            .generate_protocol_analysis(&request)
            .instrument(self.span.handle())
            .await;
        if self.is_stale(&ticket) {
            return Ok(ResponseOutcome::Discarded);
        }
        let analysis = response.map_err(|e| {
            self.fail(ticket.kind.as_str(), "Error al generar el análisis", e)
        })?;

        self.store.update(analysis.to_patch());
        self.schedule(SectionKey::Pico);
        self.schedule(SectionKey::ScopeMatrix);
        self.notifier.notify(Notice::success(
            "Análisis generado",
            "Marco PICO y matriz Es/No Es completados",
        ));
        Ok(ResponseOutcome::Applied)
    }

    pub async fn generate_search_strategies(&self) -> Result<ResponseOutcome> {
        let ticket = self.issue(RequestKind::SearchStrategies);
        let request = self.store.read(SearchStrategyRequest::from_data);
        let response = self
            .generator
            .generate_search_strategies(&request)
            .instrument(self.span.handle())
            .await;
        if self.is_stale(&ticket) {
            return Ok(ResponseOutcome::Discarded);
        }
        let queries = response.map_err(|e| {
            self.fail(ticket.kind.as_str(), "Error al generar las cadenas de búsqueda", e)
        })?;

        let count = queries.len();
        let mut plan = self.store.read(|d| d.search_plan.clone());
        plan.search_queries = queries;
        self.edit(SectionKey::SearchPlan, WizardPatch::new().search_plan(plan));
        self.notifier.notify(Notice::success(
            "Cadenas generadas",
            format!("{count} cadenas de búsqueda creadas"),
        ));
        Ok(ResponseOutcome::Applied)
    }

    /// Generate both criteria lists, or regenerate one of them with a focus.
    pub async fn generate_criteria(
        &self,
        only: Option<CriteriaKind>,
        focus: Option<String>,
    ) -> Result<ResponseOutcome> {
        let ticket = self.issue(RequestKind::Criteria);
        let mut request = self.store.read(CriteriaRequest::from_data);
        if let Some(kind) = only {
            request = request.regenerate(kind, focus);
        }
        let response = self
            .generator
            .generate_inclusion_exclusion_criteria(&request)
            .instrument(self.span.handle())
            .await;
        if self.is_stale(&ticket) {
            return Ok(ResponseOutcome::Discarded);
        }
        let result = response.map_err(|e| {
            self.fail(ticket.kind.as_str(), "Error al generar los criterios", e)
        })?;

        let mut patch = WizardPatch::default();
        if only != Some(CriteriaKind::Exclusion) {
            patch.inclusion_criteria = Some(result.inclusion);
        }
        if only != Some(CriteriaKind::Inclusion) {
            patch.exclusion_criteria = Some(result.exclusion);
        }
        self.edit(SectionKey::Criteria, patch);
        self.notifier.notify(Notice::success(
            "Criterios generados",
            "Criterios de inclusión y exclusión creados basándose en tu proyecto",
        ));
        Ok(ResponseOutcome::Applied)
    }

    /// Classify the research area and suggest databases.
    ///
    /// Falls back to a general catalog selection when the backend fails.
    /// The wizard data is not modified: the result is a suggestion list.
    /// `None` means a newer detection was started while this one ran.
    pub async fn detect_research_area(&self) -> Result<Option<DetectedArea>> {
        let ticket = self.issue(RequestKind::ResearchArea);
        let (area, description) = self
            .store
            .read(|d| (d.research_area.clone(), d.project_description.clone()));
        let response = self
            .generator
            .detect_research_area(&area, &description)
            .instrument(self.span.handle())
            .await;
        if self.is_stale(&ticket) {
            return Ok(None);
        }
        match response {
            Ok(detected) => Ok(Some(detected)),
            Err(err) => {
                obs::emit_remote_call_failed(ticket.kind.as_str(), &err);
                let databases: Vec<SelectedDatabase> = FALLBACK_DATABASES
                    .iter()
                    .map(|id| SelectedDatabase {
                        id: id.to_string(),
                        name: export::database_name(id).to_string(),
                        has_api: export::has_api(id),
                    })
                    .collect();
                self.notifier.notify(Notice::info(
                    "Bases de datos cargadas",
                    format!("Se cargaron {} bases de datos generales", databases.len()),
                ));
                Ok(Some(DetectedArea { area, databases }))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Titles
    // -----------------------------------------------------------------------

    pub fn select_title(&self, index: usize) -> Result<()> {
        let patch = self.store.read(|d| titles::select_title(d, index))?;
        self.edit(SectionKey::Titles, patch);
        Ok(())
    }

    /// Edit one language of a candidate, then translate it into the other.
    ///
    /// The local edit is applied immediately. A translation that arrives
    /// after a newer edit of the same candidate and language is dropped, and
    /// so is one arriving after a manual edit of its target language.
    pub async fn edit_title(
        &self,
        index: usize,
        lang: Language,
        text: impl Into<String>,
    ) -> Result<ResponseOutcome> {
        let text = text.into();
        let patch = self
            .store
            .read(|d| titles::edit_title(d, index, lang, text.clone()))?;
        self.tracker
            .supersede(RequestKind::Translation { index, target: lang });
        self.edit(SectionKey::Titles, patch);
        if text.trim().is_empty() {
            return Ok(ResponseOutcome::Applied);
        }

        let target = lang.counterpart();
        let ticket = self.issue(RequestKind::Translation { index, target });
        let response = self
            .generator
            .translate_text(&text, lang, target)
            .instrument(self.span.handle())
            .await;
        if self.is_stale(&ticket) {
            return Ok(ResponseOutcome::Discarded);
        }
        let translated =
            response.map_err(|e| self.fail("translate", "Error al traducir", e))?;

        let patch = self
            .store
            .read(|d| titles::edit_title(d, index, target, translated))?;
        self.edit(SectionKey::Titles, patch);
        Ok(ResponseOutcome::Applied)
    }

    pub fn titles(&self) -> Vec<GeneratedTitleCandidate> {
        self.store.read(|d| d.generated_titles.clone())
    }

    // -----------------------------------------------------------------------
    // References
    // -----------------------------------------------------------------------

    /// Replace the screening references with the contents of an uploaded file.
    pub fn import_references(&self, text: &str) -> Result<usize> {
        let refs = match references::parse_reference_file(text) {
            Ok(refs) => refs,
            Err(err) => {
                tracing::warn!(event = "references.import_failed", error = %err);
                self.notifier.notify(Notice::error(
                    "Error al importar",
                    "El archivo debe ser un arreglo JSON de referencias",
                ));
                return Err(err.into());
            }
        };
        let count = refs.len();
        let stats = ScreeningStats::from_references(&refs);
        self.store.update(WizardPatch {
            references: Some(refs),
            screening_stats: Some(stats),
            ..Default::default()
        });
        tracing::info!(event = "references.imported", count = count);
        self.notifier.notify(Notice::success(
            "Referencias importadas",
            format!("{count} referencias listas para cribado"),
        ));
        Ok(count)
    }

    pub fn set_reference_status(&self, id: &str, status: ScreeningStatus) -> Result<()> {
        let mut refs = self.store.read(|d| d.references.clone());
        references::set_status(&mut refs, id, status)?;
        let stats = ScreeningStats::from_references(&refs);
        self.store.update(WizardPatch {
            references: Some(refs),
            screening_stats: Some(stats),
            ..Default::default()
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Checklist
    // -----------------------------------------------------------------------

    /// Re-run the evaluator and replace the checklist.
    pub fn evaluate_compliance(&self) -> EvaluationSummary {
        let items = self.store.read(compliance::evaluate);
        let summary = EvaluationSummary::from_items(&items);
        obs::emit_compliance_evaluated(summary.passed, summary.total, summary.percentage);
        self.edit(
            SectionKey::PrismaChecklist,
            WizardPatch {
                prisma_items: Some(items),
                ..Default::default()
            },
        );
        summary
    }

    pub fn compliance_percentage(&self) -> u8 {
        self.store
            .read(|d| compliance::compliance_percentage(&d.prisma_items))
    }

    pub fn set_item_compliance(&self, number: u8, complies: bool) -> Result<()> {
        self.update_item(number, |item| item.complies = complies)
    }

    pub fn set_item_evidence(&self, number: u8, evidence: impl Into<String>) -> Result<()> {
        let evidence = evidence.into();
        self.update_item(number, move |item| item.evidence = evidence)
    }

    fn update_item(
        &self,
        number: u8,
        change: impl FnOnce(&mut ChecklistItem),
    ) -> Result<()> {
        let mut items = self.store.read(|d| d.prisma_items.clone());
        let item = items
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or(WizardError::ChecklistItemNotFound(number))?;
        change(item);
        self.edit(
            SectionKey::PrismaChecklist,
            WizardPatch {
                prisma_items: Some(items),
                ..Default::default()
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Finish
    // -----------------------------------------------------------------------

    /// Flush pending saves and persist the complete protocol.
    pub async fn finish(&self) -> Result<FinishOutcome> {
        let step = self.current_step();
        if step != WizardStep::PrismaCheck {
            return Err(NavigationError::NotAtFinalStep(step).into());
        }

        if let Some(autosave) = self.autosave() {
            for (section, err) in autosave.flush_all().instrument(self.span.handle()).await {
                tracing::warn!(section = %section, error = %err, "section flush failed before finish");
            }
        }

        let data = self.store.data();
        let SavedProject {
            project_id,
            created,
        } = persistence::save_protocol(self.projects.as_ref(), &data)
            .instrument(self.span.handle())
            .await
            .map_err(|e| self.fail("save_protocol", "Error al guardar proyecto", e))?;

        self.store.update(WizardPatch {
            project_id: Some(Some(project_id.clone())),
            last_saved: Some(Some(Utc::now())),
            ..Default::default()
        });
        self.notifier.notify(Notice::success(
            if created {
                "Proyecto creado exitosamente"
            } else {
                "Proyecto completado"
            },
            "Redirigiendo a tu proyecto...",
        ));
        {
            let _span = self.span.enter();
            obs::emit_wizard_finished(&project_id, created);
        }
        METRICS.flush();

        Ok(FinishOutcome {
            redirect: format!("/projects/{project_id}"),
            project_id,
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeGenerationClient, MemoryProjectStore};
    use crate::notify::NoticeLevel;

    fn session() -> (
        WizardSession,
        Arc<FakeGenerationClient>,
        Arc<MemoryProjectStore>,
        tokio::sync::mpsc::UnboundedReceiver<Notice>,
    ) {
        let generator = Arc::new(FakeGenerationClient::new());
        let projects = Arc::new(MemoryProjectStore::new());
        let (notifier, rx) = Notifier::channel();
        let session = WizardSession::new(
            generator.clone(),
            projects.clone(),
            notifier,
            AutoSaveConfig::default(),
        );
        (session, generator, projects, rx)
    }

    #[test]
    fn test_with_data_resumes_state() {
        let (session, _, _, _) = session();
        let session = session.with_data(WizardData {
            project_name: "IoT".into(),
            ..Default::default()
        });
        assert_eq!(session.data().project_name, "IoT");
        assert!(session.autosave().is_none());
    }

    #[test]
    fn test_blocked_next_keeps_step() {
        let (session, _, _, _) = session();
        assert!(session.next().is_err());
        assert_eq!(session.current_step(), WizardStep::Proposal);
    }

    #[tokio::test]
    async fn test_title_generation_failure_uses_templates_without_error() {
        let (session, generator, _, mut rx) = session();
        generator.set_failing(true);
        let outcome = session.generate_titles().await.unwrap();
        assert_eq!(outcome, ResponseOutcome::Fallback);
        assert_eq!(session.titles().len(), 5);
        while let Ok(notice) = rx.try_recv() {
            assert_ne!(notice.level, NoticeLevel::Error);
        }
    }

    #[tokio::test]
    async fn test_analysis_failure_leaves_store_untouched() {
        let (session, generator, _, mut rx) = session();
        session
            .store()
            .update(WizardPatch::new().project_name("IoT"));
        let before = session.data();
        generator.set_failing(true);
        assert!(matches!(
            session.generate_protocol_analysis().await,
            Err(WizardError::Remote(_))
        ));
        assert_eq!(session.data(), before);
        assert_eq!(rx.try_recv().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_finish_requires_final_step() {
        let (session, _, _, _) = session();
        assert!(matches!(
            session.finish().await,
            Err(WizardError::Navigation(NavigationError::NotAtFinalStep(
                WizardStep::Proposal
            )))
        ));
    }

    #[test]
    fn test_unknown_checklist_item() {
        let (session, _, _, _) = session();
        session.evaluate_compliance();
        assert!(session.set_item_compliance(4, true).is_ok());
        assert!(matches!(
            session.set_item_evidence(99, "x"),
            Err(WizardError::ChecklistItemNotFound(99))
        ));
    }
}
