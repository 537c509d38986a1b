//! Screening references and their counters.

use serde::{Deserialize, Serialize};

/// Screening decision for a single reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningStatus {
    #[default]
    Pending,
    Included,
    Excluded,
    Doubt,
}

/// A candidate study imported for screening.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reference {
    pub id: String,
    pub title: String,
    pub authors: String,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub status: ScreeningStatus,
}

/// Per-status reference counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningStats {
    pub total: usize,
    pub pending: usize,
    pub included: usize,
    pub excluded: usize,
    pub doubt: usize,
}

impl ScreeningStats {
    /// Recount from scratch; the counters are never patched incrementally.
    pub fn from_references(references: &[Reference]) -> Self {
        let mut stats = ScreeningStats {
            total: references.len(),
            ..Default::default()
        };
        for reference in references {
            match reference.status {
                ScreeningStatus::Pending => stats.pending += 1,
                ScreeningStatus::Included => stats.included += 1,
                ScreeningStatus::Excluded => stats.excluded += 1,
                ScreeningStatus::Doubt => stats.doubt += 1,
            }
        }
        stats
    }
}
