//! Observability tests for wizard lifecycle tracing.
//!
//! These verify that structured events are emitted for navigation,
//! auto-save, compliance evaluation and remote failures.

use std::sync::Arc;

use slr_core::fakes::{FakeGenerationClient, MemoryProjectStore};
use slr_core::{
    emit_compliance_evaluated, emit_remote_call_failed, emit_save_failed, emit_save_flushed,
    emit_stale_response_discarded, emit_step_advanced, emit_step_blocked, emit_wizard_finished,
    AutoSaveConfig, Notifier, RequiredField, SectionKey, SessionSpan, WizardPatch, WizardSession,
    WizardStep,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_step_advanced_logs_both_steps() {
    emit_step_advanced(WizardStep::Proposal, WizardStep::PicoMatrix);
    assert!(logs_contain("step.advanced"));
    assert!(logs_contain("pico_matrix"));
}

#[traced_test]
#[test]
fn test_emit_step_blocked_lists_missing_fields() {
    emit_step_blocked(
        WizardStep::Proposal,
        &[RequiredField::ProjectName, RequiredField::ResearchArea],
    );
    assert!(logs_contain("project_name,research_area"));
}

#[traced_test]
#[test]
fn test_emit_save_events() {
    emit_save_flushed(SectionKey::Pico, 3, 12);
    emit_save_failed(SectionKey::Criteria, 1, &"HTTP 503");
    assert!(logs_contain("autosave.flushed"));
    assert!(logs_contain("autosave.failed"));
    assert!(logs_contain("HTTP 503"));
}

#[traced_test]
#[test]
fn test_emit_compliance_and_remote_events() {
    emit_compliance_evaluated(9, 13, 69);
    emit_remote_call_failed("generate_titles", &"connection refused");
    emit_stale_response_discarded("translate", 1, 2);
    emit_wizard_finished("project-1", true);
    assert!(logs_contain("compliance.evaluated"));
    assert!(logs_contain("connection refused"));
    assert!(logs_contain("remote.stale_discarded"));
    assert!(logs_contain("project-1"));
}

#[traced_test]
#[test]
fn test_session_span_enter_creates_span() {
    let span = SessionSpan::new("session-abc");
    {
        let _entered = span.enter();
        emit_step_advanced(WizardStep::Titles, WizardStep::ProtocolDefinition);
    }
    assert!(logs_contain("session-abc"));
}

#[traced_test]
#[test]
fn test_session_navigation_emits_within_session_span() {
    let session = WizardSession::new(
        Arc::new(FakeGenerationClient::new()),
        Arc::new(MemoryProjectStore::new()),
        Notifier::disabled(),
        AutoSaveConfig::default(),
    );
    assert!(session.next().is_err());
    session.store().update(
        WizardPatch::new()
            .project_name("IoT")
            .project_description("Sensores")
            .research_area("Ingeniería"),
    );
    session.next().unwrap();

    assert!(logs_contain("step.blocked"));
    assert!(logs_contain("step.advanced"));
    assert!(logs_contain(session.id()));
}
