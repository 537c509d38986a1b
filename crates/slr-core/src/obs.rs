//! Structured observability hooks for wizard lifecycle events.
//!
//! This module provides:
//! - The session-scoped tracing span, `SessionSpan`
//! - Emission functions for navigation, auto-save, compliance and remote calls
//!
//! Events are emitted at `info!` level, failures at `warn!`. Filtering and
//! JSON output are configured by [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

use crate::autosave::SectionKey;
use crate::domain::WizardStep;
use crate::sequencer::RequiredField;

/// Session-scoped tracing span.
///
/// ```ignore
/// let span = SessionSpan::new("3f6c...");
/// let _entered = span.enter();
/// // events emitted here carry session_id = "3f6c..."
/// ```
#[derive(Debug, Clone)]
pub struct SessionSpan {
    span: tracing::Span,
}

impl SessionSpan {
    pub fn new(session_id: &str) -> Self {
        Self {
            span: tracing::info_span!("slr.session", session_id = %session_id),
        }
    }

    /// Enter the span until the guard is dropped. Not for use across `.await`.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// Span handle for `Instrument::instrument` on async work.
    pub fn handle(&self) -> tracing::Span {
        self.span.clone()
    }
}

pub fn emit_step_advanced(from: WizardStep, to: WizardStep) {
    info!(event = "step.advanced", from = %from, to = %to);
}

/// Emit event: navigation back, with whether later data was discarded.
pub fn emit_step_back(from: WizardStep, to: WizardStep, discarded: bool) {
    info!(event = "step.back", from = %from, to = %to, discarded = discarded);
}

/// Emit event: forward navigation blocked by missing fields.
pub fn emit_step_blocked(step: WizardStep, missing: &[RequiredField]) {
    let fields = missing
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(",");
    info!(
        event = "step.blocked",
        step = %step,
        missing = %fields,
        missing_count = missing.len(),
    );
}

pub fn emit_save_scheduled(section: SectionKey, generation: u64, delay_ms: u64) {
    tracing::debug!(
        event = "autosave.scheduled",
        section = %section,
        generation = generation,
        delay_ms = delay_ms,
    );
}

pub fn emit_save_flushed(section: SectionKey, generation: u64, duration_ms: u64) {
    info!(
        event = "autosave.flushed",
        section = %section,
        generation = generation,
        duration_ms = duration_ms,
    );
}

/// Emit event: a section save failed (warning level). The section stays dirty.
pub fn emit_save_failed(section: SectionKey, generation: u64, error: &dyn std::fmt::Display) {
    warn!(
        event = "autosave.failed",
        section = %section,
        generation = generation,
        error = %error,
    );
}

pub fn emit_compliance_evaluated(passed: usize, total: usize, percentage: u8) {
    info!(
        event = "compliance.evaluated",
        passed = passed,
        total = total,
        percentage = percentage,
    );
}

pub fn emit_remote_call_failed(operation: &str, error: &dyn std::fmt::Display) {
    warn!(event = "remote.failed", operation = %operation, error = %error);
}

/// Emit event: a response arrived after a newer request of the same kind.
pub fn emit_stale_response_discarded(operation: &str, ticket: u64, latest: u64) {
    info!(
        event = "remote.stale_discarded",
        operation = %operation,
        ticket = ticket,
        latest = latest,
    );
}

pub fn emit_wizard_finished(project_id: &str, created: bool) {
    info!(event = "wizard.finished", project_id = %project_id, created = created);
}
