//! End-to-end wizard sessions against the in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use slr_core::fakes::{FakeGenerationClient, MemoryProjectStore};
use slr_core::{
    AutoSaveConfig, Language, NavigationError, Notice, NoticeLevel, Notifier, ProjectStatus,
    ProtocolTerms, RequiredField, ResponseOutcome, SectionKey, ValidationError, WizardError,
    WizardPatch, WizardSession, WizardStep,
};
use tokio::sync::mpsc::UnboundedReceiver;

struct Harness {
    session: WizardSession,
    generator: Arc<FakeGenerationClient>,
    projects: Arc<MemoryProjectStore>,
    notices: UnboundedReceiver<Notice>,
}

fn harness() -> Harness {
    let generator = Arc::new(FakeGenerationClient::new());
    let projects = Arc::new(MemoryProjectStore::new());
    let (notifier, notices) = Notifier::channel();
    let session = WizardSession::new(
        generator.clone(),
        projects.clone(),
        notifier,
        AutoSaveConfig::default(),
    );
    Harness {
        session,
        generator,
        projects,
        notices,
    }
}

fn drain(rx: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

fn fill_proposal(session: &WizardSession) {
    session.edit(
        SectionKey::Proposal,
        WizardPatch::new()
            .project_name("IoT en agricultura")
            .project_description("Uso de sensores IoT para mejorar el rendimiento de cultivos")
            .research_area("Ingeniería")
            .years(Some(2019), Some(2024)),
    );
}

/// Drive a fresh session through every step up to the checklist.
async fn walk_to_checklist(session: &WizardSession) {
    fill_proposal(session);
    assert_eq!(session.next().unwrap(), WizardStep::PicoMatrix);

    session.generate_protocol_analysis().await.unwrap();
    assert_eq!(session.next().unwrap(), WizardStep::Titles);

    session.generate_titles().await.unwrap();
    session.select_title(0).unwrap();
    assert_eq!(session.next().unwrap(), WizardStep::ProtocolDefinition);

    session.edit(
        SectionKey::ProtocolTerms,
        WizardPatch::new().protocol_terms(ProtocolTerms {
            technology: vec!["IoT".into()],
            domain: vec!["agricultura".into()],
            ..Default::default()
        }),
    );
    assert_eq!(session.next().unwrap(), WizardStep::Criteria);

    session.generate_criteria(None, None).await.unwrap();
    assert_eq!(session.next().unwrap(), WizardStep::SearchPlan);

    let detected = session
        .detect_research_area()
        .await
        .unwrap()
        .expect("only detection in flight");
    let mut plan = session.data().search_plan;
    plan.databases = detected.databases;
    session.edit(SectionKey::SearchPlan, WizardPatch::new().search_plan(plan));
    session.generate_search_strategies().await.unwrap();
    assert_eq!(session.next().unwrap(), WizardStep::PrismaCheck);
}

#[tokio::test]
async fn test_full_session_creates_project_at_finish() {
    let mut h = harness();
    walk_to_checklist(&h.session).await;

    let data = h.session.data();
    assert_eq!(data.prisma_items.len(), 13, "checklist evaluated on entry");
    assert_eq!(data.search_plan.search_queries.len(), 2);
    assert!(matches!(
        h.session.next(),
        Err(NavigationError::AtFinalStep)
    ));

    let outcome = h.session.finish().await.unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.project_id, "project-1");
    assert_eq!(outcome.redirect, "/projects/project-1");

    let stored = h.projects.project("project-1").unwrap();
    assert_eq!(stored.status, ProjectStatus::InProgress);
    assert_eq!(stored.title, "IoT en agricultura: Revisión Sistemática 1");
    assert_eq!(stored.protocol["prismaCompliance"].as_array().unwrap().len(), 13);
    assert_eq!(stored.protocol["population"], "Población de IoT en agricultura");

    let data = h.session.data();
    assert_eq!(data.project_id.as_deref(), Some("project-1"));
    assert!(data.last_saved.is_some());

    let notices = drain(&mut h.notices);
    let last = notices.last().unwrap();
    assert_eq!(last.level, NoticeLevel::Success);
    assert_eq!(last.title, "Proyecto creado exitosamente");
}

#[tokio::test]
async fn test_finish_updates_attached_project() {
    let h = harness();
    fill_proposal(&h.session);
    let id = h.session.create_project().await.unwrap();
    assert_eq!(
        h.projects.project(&id).unwrap().status,
        ProjectStatus::Draft
    );
    assert!(h.session.autosave().is_some());

    walk_to_checklist(&h.session).await;
    let outcome = h.session.finish().await.unwrap();

    assert!(!outcome.created);
    assert_eq!(outcome.project_id, id);
    assert_eq!(h.projects.project_count(), 1);
    let stored = h.projects.project(&id).unwrap();
    assert_eq!(stored.status, ProjectStatus::InProgress);
    assert!(stored.protocol.get("inclusionCriteria").is_some());
    assert!(h.session.autosave().unwrap().pending_sections().is_empty());
}

#[test]
fn test_blocked_next_reports_every_missing_field() {
    let h = harness();
    h.session
        .store()
        .update(WizardPatch::new().project_name("Solo nombre"));

    let err = h.session.next().unwrap_err();
    assert_eq!(
        err,
        NavigationError::Validation(ValidationError::MissingRequiredFields {
            step: WizardStep::Proposal,
            missing: vec![RequiredField::ProjectDescription, RequiredField::ResearchArea],
        })
    );
    assert_eq!(h.session.current_step(), WizardStep::Proposal);
}

#[tokio::test]
async fn test_back_discarding_clears_later_steps_only() {
    let h = harness();
    fill_proposal(&h.session);
    h.session.next().unwrap();
    h.session.generate_protocol_analysis().await.unwrap();
    h.session.next().unwrap();
    h.session.generate_titles().await.unwrap();
    h.session.select_title(1).unwrap();

    assert_eq!(h.session.back_discarding().unwrap(), WizardStep::PicoMatrix);
    let data = h.session.data();
    assert!(data.generated_titles.is_empty());
    assert!(data.selected_title.is_empty());
    assert!(!data.pico.population.is_empty(), "PICO belongs to the kept step");
    assert_eq!(data.project_name, "IoT en agricultura");
}

#[tokio::test]
async fn test_plain_back_keeps_everything() {
    let h = harness();
    fill_proposal(&h.session);
    h.session.next().unwrap();
    h.session.generate_protocol_analysis().await.unwrap();
    let before = h.session.data();

    assert_eq!(h.session.back().unwrap(), WizardStep::Proposal);
    assert_eq!(h.session.data(), before);
    assert!(matches!(h.session.back(), Err(NavigationError::AtFirstStep)));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_translation_is_discarded() {
    let h = harness();
    h.session.generate_titles().await.unwrap();
    h.generator
        .delay_translation("first edit", Duration::from_millis(500));

    let (first, second) = tokio::join!(
        h.session.edit_title(0, Language::En, "first edit"),
        h.session.edit_title(0, Language::En, "second edit"),
    );

    assert_eq!(first.unwrap(), ResponseOutcome::Discarded);
    assert_eq!(second.unwrap(), ResponseOutcome::Applied);
    let titles = h.session.titles();
    assert_eq!(titles[0].title, "second edit");
    assert_eq!(titles[0].spanish_title, "[es] second edit");
}

#[tokio::test(start_paused = true)]
async fn test_manual_edit_supersedes_translation_into_same_language() {
    let h = harness();
    h.session.generate_titles().await.unwrap();
    h.generator.delay_translation("hola", Duration::from_millis(500));

    let (spanish, english) = tokio::join!(
        h.session.edit_title(0, Language::Es, "hola"),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.session.edit_title(0, Language::En, "Manual English").await
        },
    );

    assert_eq!(spanish.unwrap(), ResponseOutcome::Discarded);
    assert_eq!(english.unwrap(), ResponseOutcome::Applied);
    let titles = h.session.titles();
    assert_eq!(titles[0].title, "Manual English");
    assert_eq!(titles[0].spanish_title, "[es] Manual English");
}

#[tokio::test(start_paused = true)]
async fn test_regenerated_titles_drop_pending_translations() {
    let h = harness();
    h.session.generate_titles().await.unwrap();
    h.generator.delay_translation("edited", Duration::from_millis(500));

    let (edit, regenerated) = tokio::join!(
        h.session.edit_title(0, Language::En, "edited"),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.session.generate_titles().await
        },
    );

    assert_eq!(edit.unwrap(), ResponseOutcome::Discarded);
    assert_eq!(regenerated.unwrap(), ResponseOutcome::Applied);
    let titles = h.session.titles();
    assert_eq!(titles[0].title, "Technology: Systematic Review 1");
    assert_eq!(titles[0].spanish_title, "Technology: Revisión Sistemática 1");
}

#[tokio::test(start_paused = true)]
async fn test_superseded_area_detection_returns_none() {
    let h = harness();
    h.session
        .store()
        .update(WizardPatch::new().research_area("Medicina"));
    h.generator
        .delay_detection("Medicina", Duration::from_millis(500));

    let (first, second) = tokio::join!(h.session.detect_research_area(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.session
            .store()
            .update(WizardPatch::new().research_area("Ingeniería"));
        h.session.detect_research_area().await
    });

    assert!(first.unwrap().is_none());
    let detected = second.unwrap().expect("latest detection");
    assert_eq!(detected.area, "Ingeniería");
}

#[tokio::test]
async fn test_translation_failure_keeps_local_edit() {
    let mut h = harness();
    h.session.generate_titles().await.unwrap();
    h.session.select_title(2).unwrap();
    drain(&mut h.notices);

    h.generator.set_failing(true);
    let result = h.session.edit_title(2, Language::En, "Hand written").await;
    assert!(matches!(result, Err(WizardError::Remote(_))));

    let data = h.session.data();
    assert_eq!(data.generated_titles[2].title, "Hand written");
    assert_eq!(data.selected_title, "Hand written");
    let notices = drain(&mut h.notices);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Error al traducir");
}

#[tokio::test]
async fn test_regenerating_exclusion_keeps_inclusion() {
    let h = harness();
    h.session.generate_criteria(None, None).await.unwrap();
    let inclusion = h.session.data().inclusion_criteria;

    h.session
        .generate_criteria(
            Some(slr_core::CriteriaKind::Exclusion),
            Some("estudios de caso".into()),
        )
        .await
        .unwrap();
    let data = h.session.data();
    assert_eq!(data.inclusion_criteria, inclusion);
    assert_eq!(data.exclusion_criteria.len(), 1);
}

#[tokio::test]
async fn test_finish_failure_keeps_session_retryable() {
    let mut h = harness();
    walk_to_checklist(&h.session).await;
    drain(&mut h.notices);

    h.projects.set_failing(true);
    assert!(matches!(
        h.session.finish().await,
        Err(WizardError::Remote(_))
    ));
    assert!(h.session.data().project_id.is_none());
    let notices = drain(&mut h.notices);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].title, "Error al guardar proyecto");

    h.projects.set_failing(false);
    let outcome = h.session.finish().await.unwrap();
    assert!(outcome.created);
}
