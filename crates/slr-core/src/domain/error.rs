//! Error taxonomy for the wizard core.
//!
//! Nothing here is fatal: every variant leaves the wizard in its last good
//! in-memory state and the triggering action can be retried.

use crate::domain::step::WizardStep;
use crate::sequencer::RequiredField;

/// A step gate rejected navigation because required data is absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("step {step} is missing required fields: {}", join_fields(missing))]
    MissingRequiredFields {
        step: WizardStep,
        missing: Vec<RequiredField>,
    },
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors produced by the step sequencer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("already at the first step")]
    AtFirstStep,

    #[error("already at the final step; finish the wizard instead")]
    AtFinalStep,

    #[error("finish is only available on the final step (current: {0})")]
    NotAtFinalStep(WizardStep),
}

/// A call to the backend (generation or persistence) failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteCallError {
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("no project is attached to this wizard session")]
    MissingProject,

    #[error("client configuration error: {0}")]
    Config(String),
}

impl RemoteCallError {
    /// Short description for end users (Spanish, like the rest of the UI).
    pub fn user_message(&self) -> String {
        match self {
            RemoteCallError::Transport { .. } => {
                "No se pudo conectar con el servidor. Intenta nuevamente.".to_string()
            }
            RemoteCallError::Status { message, .. } if !message.is_empty() => message.clone(),
            RemoteCallError::Status { status, .. } => {
                format!("El servidor respondió con un error ({status})")
            }
            RemoteCallError::InvalidResponse { .. } => {
                "El servidor devolvió una respuesta inesperada".to_string()
            }
            RemoteCallError::MissingProject => {
                "El proyecto aún no ha sido creado en el servidor".to_string()
            }
            RemoteCallError::Config(_) => "Configuración del cliente inválida".to_string(),
        }
    }
}

/// The uploaded reference file does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportFormatError {
    #[error("file is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON array of references, found {found}")]
    NotAnArray { found: &'static str },

    #[error("reference #{index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// Umbrella error for wizard operations.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteCallError),

    #[error("import failed: {0}")]
    Import(#[from] ImportFormatError),

    #[error("title index {index} out of range ({len} candidates)")]
    TitleIndexOutOfRange { index: usize, len: usize },

    #[error("reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("checklist item not found: {0}")]
    ChecklistItemNotFound(u8),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationError> for WizardError {
    fn from(err: ValidationError) -> Self {
        WizardError::Navigation(NavigationError::Validation(err))
    }
}

/// Result type for wizard operations.
pub type Result<T> = std::result::Result<T, WizardError>;
