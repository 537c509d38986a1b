//! Domain model for the SLR protocol wizard.

pub mod checklist;
pub mod error;
pub mod patch;
pub mod reference;
pub mod step;
pub mod title;
pub mod wizard;

pub use checklist::{ChecklistItem, ChecklistKey};
pub use error::{
    ImportFormatError, NavigationError, RemoteCallError, Result, ValidationError, WizardError,
};
pub use patch::WizardPatch;
pub use reference::{Reference, ScreeningStats, ScreeningStatus};
pub use step::WizardStep;
pub use title::{CochraneCompliance, GeneratedTitleCandidate, Language};
pub use wizard::{
    AiProvider, Criterion, FileFormat, MatrixRow, Pico, Presence, ProtocolTerms, QueryStatus,
    ScopeMatrix, SearchPlan, SearchQuery, SelectedDatabase, TemporalRange, UploadedFile,
    WizardData, DEFAULT_START_YEAR,
};
