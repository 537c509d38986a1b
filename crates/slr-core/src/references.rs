//! Reference file import and screening decisions.
//!
//! The import format is a JSON array of objects with `title`, `authors`,
//! `year` and `abstract`. Parsing is all-or-nothing: any malformed record
//! rejects the whole file so that no partial import reaches the wizard.

use serde_json::{Map, Value};

use crate::domain::{ImportFormatError, Reference, ScreeningStats, ScreeningStatus, WizardError};

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

type Record = Map<String, Value>;

fn text_field(record: &Record, key: &str, index: usize) -> Result<String, ImportFormatError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(ImportFormatError::InvalidRecord {
            index,
            reason: format!("`{key}` must be a string, found {}", json_kind(other)),
        }),
    }
}

/// Authors may come as one string or as a list of names.
fn authors_field(record: &Record, index: usize) -> Result<String, ImportFormatError> {
    match record.get("authors") {
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| match n {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(ImportFormatError::InvalidRecord {
                    index,
                    reason: format!("author names must be strings, found {}", json_kind(other)),
                }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|names| names.join(", ")),
        _ => text_field(record, "authors", index),
    }
}

fn year_field(record: &Record, index: usize) -> Result<Option<i32>, ImportFormatError> {
    let invalid = |reason: String| ImportFormatError::InvalidRecord { index, reason };
    match record.get("year") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .map(Some)
            .ok_or_else(|| invalid(format!("`year` is not a whole year: {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|_| invalid(format!("`year` is not numeric: {s}"))),
        Some(other) => Err(invalid(format!(
            "`year` must be a number, found {}",
            json_kind(other)
        ))),
    }
}

/// Parse an uploaded reference file.
///
/// Ids are assigned as `ref-{index}` and every reference starts pending.
pub fn parse_reference_file(text: &str) -> Result<Vec<Reference>, ImportFormatError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ImportFormatError::InvalidJson(e.to_string()))?;
    let found = json_kind(&value);
    let Value::Array(records) = value else {
        return Err(ImportFormatError::NotAnArray { found });
    };

    records
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let Value::Object(record) = raw else {
                return Err(ImportFormatError::InvalidRecord {
                    index,
                    reason: format!("expected an object, found {}", json_kind(raw)),
                });
            };
            Ok(Reference {
                id: format!("ref-{index}"),
                title: text_field(record, "title", index)?,
                authors: authors_field(record, index)?,
                year: year_field(record, index)?,
                abstract_text: text_field(record, "abstract", index)?,
                status: ScreeningStatus::Pending,
            })
        })
        .collect()
}

pub fn screening_stats(references: &[Reference]) -> ScreeningStats {
    ScreeningStats::from_references(references)
}

/// Set the screening decision of reference `id`.
pub fn set_status(
    references: &mut [Reference],
    id: &str,
    status: ScreeningStatus,
) -> Result<(), WizardError> {
    let reference = references
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| WizardError::ReferenceNotFound(id.to_string()))?;
    reference.status = status;
    Ok(())
}
