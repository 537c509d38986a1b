//! Debounced, per-section auto-save.
//!
//! Each [`SectionKey`] owns an independent cancel-and-reschedule timer.
//! Scheduling bumps the section generation and stores the payload; when the
//! timer fires it only flushes if its generation is still the latest, so a
//! burst of edits produces one flush carrying the last payload.
//!
//! Flushes of one section are serialised by a per-section async lock, and a
//! flush takes the pending payload only once it holds that lock.
//! Sections never wait on each other and failures are not retried: the
//! section simply stays dirty until the next edit or [`AutoSaveCoordinator::flush_now`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::AutoSaveConfig;
use crate::domain::{RemoteCallError, WizardStep};
use crate::metrics::METRICS;
use crate::notify::{Notice, Notifier};
use crate::obs;
use crate::persistence::{RemoteResult, SectionSink};

/// Independently persisted part of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Proposal,
    Pico,
    ScopeMatrix,
    Titles,
    ProtocolTerms,
    Criteria,
    SearchPlan,
    PrismaChecklist,
}

impl SectionKey {
    pub const ALL: [SectionKey; 8] = [
        SectionKey::Proposal,
        SectionKey::Pico,
        SectionKey::ScopeMatrix,
        SectionKey::Titles,
        SectionKey::ProtocolTerms,
        SectionKey::Criteria,
        SectionKey::SearchPlan,
        SectionKey::PrismaChecklist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKey::Proposal => "proposal",
            SectionKey::Pico => "pico",
            SectionKey::ScopeMatrix => "scope_matrix",
            SectionKey::Titles => "titles",
            SectionKey::ProtocolTerms => "protocol_terms",
            SectionKey::Criteria => "criteria",
            SectionKey::SearchPlan => "search_plan",
            SectionKey::PrismaChecklist => "prisma_checklist",
        }
    }

    /// Sections typed as prose get the longer debounce window.
    pub fn is_free_text(self) -> bool {
        matches!(
            self,
            SectionKey::Proposal | SectionKey::Pico | SectionKey::Titles
        )
    }

    /// Step whose screen edits this section.
    pub fn step(self) -> WizardStep {
        match self {
            SectionKey::Proposal => WizardStep::Proposal,
            SectionKey::Pico | SectionKey::ScopeMatrix => WizardStep::PicoMatrix,
            SectionKey::Titles => WizardStep::Titles,
            SectionKey::ProtocolTerms => WizardStep::ProtocolDefinition,
            SectionKey::Criteria => WizardStep::Criteria,
            SectionKey::SearchPlan => WizardStep::SearchPlan,
            SectionKey::PrismaChecklist => WizardStep::PrismaCheck,
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Save indicator shown next to a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
}

#[derive(Debug, Default)]
struct SectionState {
    generation: u64,
    /// Unsaved payload and the generation that produced it.
    latest: Option<(u64, Value)>,
    dirty: bool,
    status: SaveStatus,
    /// Bumped on every status change so stale `Saved -> Idle` resets are ignored.
    status_epoch: u64,
    pending: Option<JoinHandle<()>>,
    flush_lock: Arc<tokio::sync::Mutex<()>>,
}

impl SectionState {
    fn set_status(&mut self, status: SaveStatus) -> u64 {
        self.status = status;
        self.status_epoch += 1;
        self.status_epoch
    }
}

struct Inner {
    sink: Arc<dyn SectionSink>,
    notifier: Notifier,
    config: AutoSaveConfig,
    sections: Mutex<HashMap<SectionKey, SectionState>>,
}

impl Inner {
    fn sections(&self) -> MutexGuard<'_, HashMap<SectionKey, SectionState>> {
        self.sections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coordinates debounced saves for every section of one project.
///
/// Must be used from within a tokio runtime: scheduling spawns timer tasks.
#[derive(Clone)]
pub struct AutoSaveCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for AutoSaveCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoSaveCoordinator")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl AutoSaveCoordinator {
    pub fn new(sink: Arc<dyn SectionSink>, notifier: Notifier, config: AutoSaveConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                notifier,
                config,
                sections: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &AutoSaveConfig {
        &self.inner.config
    }

    /// Schedule a save with the section's configured debounce.
    pub fn schedule_save(&self, section: SectionKey, payload: Value) {
        let delay = self.inner.config.debounce_for(section);
        self.schedule_save_after(section, payload, delay);
    }

    /// Replace the pending payload of `section` and restart its timer.
    pub fn schedule_save_after(&self, section: SectionKey, payload: Value, delay: Duration) {
        let mut sections = self.inner.sections();
        let state = sections.entry(section).or_default();
        state.generation += 1;
        state.latest = Some((state.generation, payload));
        state.dirty = true;
        if let Some(timer) = state.pending.take() {
            timer.abort();
        }

        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Failures are already reported through notices and logs.
            let _ = fire(inner, section, generation).await;
        }));
        obs::emit_save_scheduled(section, generation, delay.as_millis() as u64);
    }

    /// Flush `section` immediately, cancelling its timer.
    ///
    /// Waits for a flush of the same section that is already in flight.
    /// Returns `Ok(())` when there is nothing left to save.
    pub async fn flush_now(&self, section: SectionKey) -> RemoteResult<()> {
        let lock = {
            let mut sections = self.inner.sections();
            let Some(state) = sections.get_mut(&section) else {
                return Ok(());
            };
            if let Some(timer) = state.pending.take() {
                timer.abort();
            }
            Arc::clone(&state.flush_lock)
        };
        let _flushing = lock.lock().await;
        flush_locked(&self.inner, section).await
    }

    /// Flush every section holding an unsaved payload.
    ///
    /// Sections are flushed independently; the failures are returned.
    pub async fn flush_all(&self) -> Vec<(SectionKey, RemoteCallError)> {
        let mut failures = Vec::new();
        for section in self.pending_sections() {
            if let Err(err) = self.flush_now(section).await {
                failures.push((section, err));
            }
        }
        failures
    }

    pub fn status(&self, section: SectionKey) -> SaveStatus {
        self.inner
            .sections()
            .get(&section)
            .map(|s| s.status)
            .unwrap_or_default()
    }

    /// True while the last edit of `section` has not been persisted.
    pub fn is_dirty(&self, section: SectionKey) -> bool {
        self.inner
            .sections()
            .get(&section)
            .is_some_and(|s| s.dirty)
    }

    /// Dirty sections, in section order.
    pub fn pending_sections(&self) -> Vec<SectionKey> {
        let sections = self.inner.sections();
        SectionKey::ALL
            .into_iter()
            .filter(|key| sections.get(key).is_some_and(|s| s.dirty))
            .collect()
    }

    /// Abort every pending timer without saving.
    pub fn cancel_all(&self) {
        let mut sections = self.inner.sections();
        for state in sections.values_mut() {
            if let Some(timer) = state.pending.take() {
                timer.abort();
            }
        }
    }
}

/// Timer callback: flush if `generation` is still the latest for `section`.
async fn fire(inner: Arc<Inner>, section: SectionKey, generation: u64) -> RemoteResult<()> {
    let lock = {
        let mut sections = inner.sections();
        let Some(state) = sections.get_mut(&section) else {
            return Ok(());
        };
        if state.generation != generation {
            return Ok(());
        }
        // From here on this task is a flush, not a cancellable timer.
        state.pending = None;
        Arc::clone(&state.flush_lock)
    };
    let _flushing = lock.lock().await;
    flush_locked(&inner, section).await
}

/// Persist the pending payload of `section`. The caller holds its flush lock.
async fn flush_locked(inner: &Arc<Inner>, section: SectionKey) -> RemoteResult<()> {
    let (generation, payload) = {
        let mut sections = inner.sections();
        let state = sections.entry(section).or_default();
        let Some(pending) = state.latest.take() else {
            return Ok(());
        };
        state.set_status(SaveStatus::Saving);
        pending
    };

    let started = Instant::now();
    let result = inner.sink.persist(section, &payload).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let mut sections = inner.sections();
    let state = sections.entry(section).or_default();
    match &result {
        Ok(()) => {
            if state.generation == generation {
                state.dirty = false;
            }
            let epoch = state.set_status(SaveStatus::Saved);
            drop(sections);

            METRICS.inc_saves_flushed();
            obs::emit_save_flushed(section, generation, duration_ms);
            schedule_idle_reset(Arc::clone(inner), section, epoch);
        }
        Err(err) => {
            state.set_status(SaveStatus::Idle);
            // Keep the newest unsaved payload for an explicit retrigger.
            if state.latest.as_ref().map_or(true, |(newer, _)| *newer < generation) {
                state.latest = Some((generation, payload));
            }
            drop(sections);

            METRICS.inc_saves_failed();
            obs::emit_save_failed(section, generation, err);
            inner.notifier.notify(Notice::error(
                "Error al guardar",
                format!(
                    "No se pudieron guardar los cambios de {}: {}",
                    section_label(section),
                    err.user_message()
                ),
            ));
        }
    }
    result
}

fn schedule_idle_reset(inner: Arc<Inner>, section: SectionKey, epoch: u64) {
    let display = inner.config.saved_display();
    tokio::spawn(async move {
        tokio::time::sleep(display).await;
        let mut sections = inner.sections();
        if let Some(state) = sections.get_mut(&section) {
            if state.status_epoch == epoch && state.status == SaveStatus::Saved {
                state.set_status(SaveStatus::Idle);
            }
        }
    });
}

fn section_label(section: SectionKey) -> &'static str {
    match section {
        SectionKey::Proposal => "la propuesta",
        SectionKey::Pico => "el marco PICO",
        SectionKey::ScopeMatrix => "la matriz Es/No Es",
        SectionKey::Titles => "los títulos",
        SectionKey::ProtocolTerms => "los términos del protocolo",
        SectionKey::Criteria => "los criterios",
        SectionKey::SearchPlan => "el plan de búsqueda",
        SectionKey::PrismaChecklist => "la lista PRISMA",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemorySectionSink;
    use crate::notify::NoticeLevel;
    use serde_json::json;

    fn coordinator(
        sink: Arc<MemorySectionSink>,
    ) -> (
        AutoSaveCoordinator,
        tokio::sync::mpsc::UnboundedReceiver<Notice>,
    ) {
        let (notifier, rx) = Notifier::channel();
        (
            AutoSaveCoordinator::new(sink, notifier, AutoSaveConfig::default()),
            rx,
        )
    }

    #[test]
    fn test_free_text_sections() {
        assert!(SectionKey::Proposal.is_free_text());
        assert!(SectionKey::Titles.is_free_text());
        assert!(!SectionKey::Criteria.is_free_text());
        assert_eq!(SectionKey::ScopeMatrix.step(), WizardStep::PicoMatrix);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_flush_with_last_payload() {
        let sink = Arc::new(MemorySectionSink::new());
        let (autosave, _rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Proposal, json!({"title": "a"}));
        tokio::time::sleep(Duration::from_millis(500)).await;
        autosave.schedule_save(SectionKey::Proposal, json!({"title": "ab"}));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(sink.calls().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let calls = sink.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (SectionKey::Proposal, json!({"title": "ab"})));
        assert!(!autosave.is_dirty(SectionKey::Proposal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_returns_to_idle_after_display_window() {
        let sink = Arc::new(MemorySectionSink::new());
        let (autosave, _rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Criteria, json!({"inclusionCriteria": []}));
        assert_eq!(autosave.status(SectionKey::Criteria), SaveStatus::Idle);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(autosave.status(SectionKey::Criteria), SaveStatus::Saved);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(autosave.status(SectionKey::Criteria), SaveStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_section_dirty_and_notifies() {
        let sink = Arc::new(MemorySectionSink::new());
        sink.set_failing(true);
        let (autosave, mut rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Pico, json!({"population": "farms"}));
        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(autosave.status(SectionKey::Pico), SaveStatus::Idle);
        assert!(autosave.is_dirty(SectionKey::Pico));
        assert_eq!(autosave.pending_sections(), vec![SectionKey::Pico]);
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);

        // No automatic retry.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sink.attempts(), 1);

        // An explicit retrigger sends the preserved payload.
        sink.set_failing(false);
        autosave.flush_now(SectionKey::Pico).await.unwrap();
        assert_eq!(sink.calls(), vec![(SectionKey::Pico, json!({"population": "farms"}))]);
        assert!(!autosave.is_dirty(SectionKey::Pico));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sections_flush_independently() {
        let sink = Arc::new(MemorySectionSink::new());
        let (autosave, _rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Proposal, json!({"p": 1}));
        autosave.schedule_save(SectionKey::Criteria, json!({"c": 1}));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(sink.calls(), vec![(SectionKey::Criteria, json!({"c": 1}))]);
        assert!(autosave.is_dirty(SectionKey::Proposal));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(sink.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_inflight_flush_is_saved_next_cycle() {
        let sink = Arc::new(MemorySectionSink::new());
        sink.set_delay(Duration::from_millis(500));
        let (autosave, _rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Criteria, json!({"v": 1}));
        // Timer fires at 1000ms; the flush is in flight until 1500ms.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(autosave.status(SectionKey::Criteria), SaveStatus::Saving);
        autosave.schedule_save(SectionKey::Criteria, json!({"v": 2}));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(sink.calls(), vec![(SectionKey::Criteria, json!({"v": 1}))]);
        assert!(autosave.is_dirty(SectionKey::Criteria));

        // Second timer fires at 2200ms and its flush completes at 2700ms.
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(sink.calls().len(), 2);
        assert_eq!(sink.calls()[1].1, json!({"v": 2}));
        assert!(!autosave.is_dirty(SectionKey::Criteria));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_sends_pending_without_waiting() {
        let sink = Arc::new(MemorySectionSink::new());
        let (autosave, _rx) = coordinator(sink.clone());
        autosave.schedule_save(SectionKey::Titles, json!({"t": 1}));
        autosave.schedule_save(SectionKey::SearchPlan, json!({"s": 1}));

        let failures = autosave.flush_all().await;
        assert!(failures.is_empty());
        assert_eq!(sink.calls().len(), 2);
        assert!(autosave.pending_sections().is_empty());

        // Aborted timers never flush again.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_older_flush_never_replaces_newer_payload() {
        let sink = Arc::new(MemorySectionSink::new());
        sink.set_delay(Duration::from_millis(1500));
        sink.set_failing(true);
        let (autosave, _rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Criteria, json!({"v": 1}));
        // v1 is in flight from 1000ms to 2500ms.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        autosave.schedule_save(SectionKey::Criteria, json!({"v": 2}));
        // v2 fires at 2100ms, flushes after v1 fails and fails at 4000ms.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(sink.attempts(), 2);
        assert!(autosave.is_dirty(SectionKey::Criteria));

        sink.set_failing(false);
        autosave.flush_now(SectionKey::Criteria).await.unwrap();
        assert_eq!(sink.calls(), vec![(SectionKey::Criteria, json!({"v": 2}))]);
        assert!(!autosave.is_dirty(SectionKey::Criteria));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_waits_for_inflight_flush() {
        let sink = Arc::new(MemorySectionSink::new());
        sink.set_delay(Duration::from_millis(500));
        let (autosave, _rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Criteria, json!({"v": 1}));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(autosave.status(SectionKey::Criteria), SaveStatus::Saving);

        assert!(autosave.flush_all().await.is_empty());
        assert_eq!(sink.calls(), vec![(SectionKey::Criteria, json!({"v": 1}))]);
        assert!(!autosave.is_dirty(SectionKey::Criteria));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_all_reports_failure_of_inflight_flush() {
        let sink = Arc::new(MemorySectionSink::new());
        sink.set_delay(Duration::from_millis(500));
        sink.set_failing(true);
        let (autosave, _rx) = coordinator(sink.clone());

        autosave.schedule_save(SectionKey::Pico, json!({"population": "farms"}));
        // Pico debounces for 2000ms; its flush is in flight until 2500ms.
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let failures = autosave.flush_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, SectionKey::Pico);
        assert!(autosave.is_dirty(SectionKey::Pico));
    }

    #[tokio::test]
    async fn test_flush_now_without_payload_is_noop() {
        let sink = Arc::new(MemorySectionSink::new());
        let (autosave, _rx) = coordinator(sink.clone());
        autosave.flush_now(SectionKey::Proposal).await.unwrap();
        assert!(sink.calls().is_empty());
    }
}
