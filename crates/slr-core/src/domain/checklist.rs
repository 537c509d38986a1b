//! PRISMA/WPOM checklist items.

use serde::{Deserialize, Serialize};

/// Which protocol aspect a checklist item inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChecklistKey {
    Clarity,
    Variables,
    Rationale,
    Pico,
    Need,
    SearchStrategy,
    Criteria,
    Sources,
    SearchString,
    ManualSearch,
    TemporalRange,
    Auxiliary,
    Validation,
}

/// One evaluated checklist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub number: u8,
    pub key: ChecklistKey,
    pub item: String,
    pub complies: bool,
    pub evidence: String,
}
