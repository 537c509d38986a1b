//! Runtime configuration: backend endpoint and auto-save timings.
//!
//! Values come from a TOML file, from `SLR_*` environment variables, or from
//! the defaults below. Durations are stored in milliseconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::autosave::SectionKey;
use crate::domain::{Result, WizardError};

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer token; public deployments may leave it unset.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Debounce windows for the auto-save coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Sections edited as free text: proposal, PICO, titles.
    pub text_debounce_ms: u64,
    /// Sections edited as lists: matrix, terms, criteria, search plan, checklist.
    pub list_debounce_ms: u64,
    /// How long `Saved` is shown before falling back to `Idle`.
    pub saved_display_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            text_debounce_ms: 2000,
            list_debounce_ms: 1000,
            saved_display_ms: 2000,
        }
    }
}

impl AutoSaveConfig {
    pub fn debounce_for(&self, section: SectionKey) -> Duration {
        let ms = if section.is_free_text() {
            self.text_debounce_ms
        } else {
            self.list_debounce_ms
        };
        Duration::from_millis(ms)
    }

    pub fn saved_display(&self) -> Duration {
        Duration::from_millis(self.saved_display_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub api: ApiConfig,
    pub autosave: AutoSaveConfig,
}

impl WizardConfig {
    /// Defaults overridden by `SLR_API_URL`, `SLR_API_TOKEN` and
    /// `SLR_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("SLR_API_URL") {
            self.api.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(token) = lookup("SLR_API_TOKEN").filter(|t| !t.is_empty()) {
            self.api.token = Some(token);
        }
        if let Some(raw) = lookup("SLR_API_TIMEOUT_SECS") {
            self.api.timeout_secs = raw.trim().parse().map_err(|_| {
                WizardError::Config(format!("SLR_API_TIMEOUT_SECS is not a number: {raw}"))
            })?;
        }
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| WizardError::Config(e.to_string()))
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}
