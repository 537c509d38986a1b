//! SLR Wizard Core Library
//!
//! State, step gating, debounced auto-save and PRISMA/WPOM self-evaluation
//! for building a systematic literature review protocol step by step.
//!
//! The HTTP backend lives in `slr-client`; everything here talks to it
//! through the [`GenerationClient`] and [`ProjectStore`] traits.

pub mod autosave;
pub mod compliance;
pub mod config;
pub mod domain;
pub mod export;
pub mod fakes;
pub mod generation;
pub mod metrics;
pub mod notify;
pub mod obs;
pub mod persistence;
pub mod references;
pub mod sequencer;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod titles;

pub use autosave::{AutoSaveCoordinator, SaveStatus, SectionKey};
pub use compliance::{compliance_percentage, evaluate, EvaluationSummary, CHECKLIST};
pub use config::{ApiConfig, AutoSaveConfig, WizardConfig};
pub use domain::{
    AiProvider, ChecklistItem, ChecklistKey, CochraneCompliance, Criterion,
    GeneratedTitleCandidate, ImportFormatError, Language, MatrixRow, NavigationError, Pico,
    Presence, ProtocolTerms, Reference, RemoteCallError, Result, ScopeMatrix, ScreeningStats,
    ScreeningStatus, SearchPlan, SearchQuery, SelectedDatabase, ValidationError, WizardData,
    WizardError, WizardPatch, WizardStep,
};
pub use export::{export_snapshot, parse_snapshot, protocol_document, section_payload};
pub use generation::{
    AnalysisRequest, CriteriaKind, CriteriaRequest, CriteriaResult, DetectedArea,
    GenerationClient, PicoComponent, ProtocolAnalysis, RequestKind, RequestTracker,
    SearchStrategyRequest, Ticket, TitleRequest,
};
pub use metrics::METRICS;
pub use notify::{Notice, NoticeLevel, Notifier};
pub use obs::{
    emit_compliance_evaluated, emit_remote_call_failed, emit_save_failed, emit_save_flushed,
    emit_save_scheduled, emit_stale_response_discarded, emit_step_advanced, emit_step_back,
    emit_step_blocked, emit_wizard_finished, SessionSpan,
};
pub use persistence::{
    save_protocol, ProjectDraft, ProjectStatus, ProjectStore, ProjectUpdate, ProtocolSectionSink,
    RemoteResult, SavedProject, SectionSink,
};
pub use references::parse_reference_file;
pub use sequencer::{RequiredField, StepSequencer};
pub use session::{FinishOutcome, ResponseOutcome, WizardSession};
pub use store::WizardStateStore;
pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
