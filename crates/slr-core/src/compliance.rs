//! PRISMA/WPOM self-evaluation of a protocol in progress.
//!
//! [`evaluate`] is a pure function of [`WizardData`]: each of the 13
//! checklist items is a presence rule over specific fields, and its evidence
//! text interpolates those field values. Absent data yields a failing item
//! whose evidence is a pending marker.

use serde::{Deserialize, Serialize};

use crate::domain::{ChecklistItem, ChecklistKey, WizardData};

/// Number, key and question of every checklist item, in order.
pub const CHECKLIST: [(u8, ChecklistKey, &str); 13] = [
    (1, ChecklistKey::Clarity, "¿Es entendible por alguien que no es experto?"),
    (2, ChecklistKey::Variables, "¿Se definen claramente las \"variables\"?"),
    (
        3,
        ChecklistKey::Rationale,
        "¿Se describe la justificación de la revisión en relación con lo que se conoce?",
    ),
    (
        4,
        ChecklistKey::Pico,
        "¿Se proporciona una declaración explícita de las preguntas usando PICOS?",
    ),
    (
        5,
        ChecklistKey::Need,
        "Si extiende investigaciones previas, ¿explica por qué se necesita este estudio?",
    ),
    (
        6,
        ChecklistKey::SearchStrategy,
        "¿Se especifica y justifica la estrategia de búsqueda (manual, automatizada o mixta)?",
    ),
    (
        7,
        ChecklistKey::Criteria,
        "¿Se identifican los criterios de inclusión y exclusión de estudios primarios?",
    ),
    (
        8,
        ChecklistKey::Sources,
        "¿Se describen todas las fuentes de información utilizadas y fechas de cobertura?",
    ),
    (
        9,
        ChecklistKey::SearchString,
        "¿Se presenta la estrategia electrónica de búsqueda completa para al menos una base de datos?",
    ),
    (
        10,
        ChecklistKey::ManualSearch,
        "¿Se identifican las revistas y conferencias para búsquedas manuales?",
    ),
    (
        11,
        ChecklistKey::TemporalRange,
        "¿Se especifica el período temporal de cobertura y su justificación?",
    ),
    (
        12,
        ChecklistKey::Auxiliary,
        "¿Se indican procedimientos auxiliares (e.g., consultas a expertos, revisión de bibliografía secundaria)?",
    ),
    (
        13,
        ChecklistKey::Validation,
        "¿Se describe cómo se evaluará el proceso de búsqueda (comparación con revisión previa, etc.)?",
    ),
];

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

fn database_names(data: &WizardData) -> String {
    data.search_plan
        .databases
        .iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sentence justifying the year window, as stored in the protocol.
pub fn temporal_justification(data: &WizardData) -> String {
    let area = if filled(&data.research_area) {
        data.research_area.as_str()
    } else {
        "el área de estudio"
    };
    format!("Rango temporal definido para cubrir investigaciones recientes en {area}")
}

/// Presence rule and evidence for one item.
fn check(key: ChecklistKey, data: &WizardData) -> (bool, String) {
    let pico = &data.pico;
    let plan = &data.search_plan;
    match key {
        ChecklistKey::Clarity => {
            if filled(&data.selected_title) && filled(&data.project_description) {
                (true, format!("Título definido: {}", data.selected_title))
            } else {
                (false, "Pendiente: falta título o descripción del proyecto".into())
            }
        }
        ChecklistKey::Variables => {
            let terms = &data.protocol_terms;
            if !terms.technology.is_empty() {
                let mut vars = terms.technology.clone();
                vars.extend(terms.domain.iter().cloned());
                (true, format!("Variables definidas: {}", vars.join(", ")))
            } else if filled(&pico.population) {
                (true, format!("Población definida: {}", pico.population))
            } else {
                (false, "Pendiente: definir términos o población".into())
            }
        }
        ChecklistKey::Rationale => {
            if filled(&data.protocol_justification) {
                (true, data.protocol_justification.clone())
            } else if filled(&data.project_description) {
                (true, format!("Justificación: {}", data.project_description))
            } else {
                (false, "Pendiente: describir la justificación".into())
            }
        }
        ChecklistKey::Pico => {
            if filled(&pico.population) && filled(&pico.intervention) {
                let mut parts = vec![
                    format!("P: {}", pico.population),
                    format!("I: {}", pico.intervention),
                ];
                if filled(&pico.comparison) {
                    parts.push(format!("C: {}", pico.comparison));
                }
                if filled(&pico.outcome) {
                    parts.push(format!("O: {}", pico.outcome));
                }
                (true, parts.join("; "))
            } else {
                (false, "PICO incompleto".into())
            }
        }
        ChecklistKey::Need => {
            if filled(&data.project_description) {
                let area = if filled(&data.research_area) {
                    data.research_area.as_str()
                } else {
                    "el área"
                };
                (true, format!("Necesidad descrita en la propuesta para {area}"))
            } else {
                (false, "Pendiente: explicar la necesidad del estudio".into())
            }
        }
        ChecklistKey::SearchStrategy => {
            if plan.databases.is_empty() {
                (false, "Falta estrategia".into())
            } else {
                (
                    true,
                    format!(
                        "Búsqueda automatizada en {} bases de datos definidas",
                        plan.databases.len()
                    ),
                )
            }
        }
        ChecklistKey::Criteria => {
            if !data.inclusion_criteria.is_empty() && !data.exclusion_criteria.is_empty() {
                (
                    true,
                    format!(
                        "{} criterios de inclusión, {} criterios de exclusión",
                        data.inclusion_criteria.len(),
                        data.exclusion_criteria.len()
                    ),
                )
            } else {
                (false, "Criterios incompletos".into())
            }
        }
        ChecklistKey::Sources => {
            if plan.databases.is_empty() {
                (false, "Pendiente: seleccionar fuentes de información".into())
            } else {
                let years = data.effective_years();
                (
                    true,
                    format!(
                        "Fuentes: {} ({}-{})",
                        database_names(data),
                        years.start,
                        years.end
                    ),
                )
            }
        }
        ChecklistKey::SearchString => {
            match plan.search_queries.iter().find(|q| filled(&q.query)) {
                Some(q) => {
                    let db = if filled(&q.database_name) {
                        q.database_name.as_str()
                    } else {
                        q.database_id.as_str()
                    };
                    (true, format!("Cadena para {db}: {}", q.query))
                }
                None => (false, "Pendiente: generar cadenas de búsqueda".into()),
            }
        }
        ChecklistKey::ManualSearch => {
            if plan.databases.is_empty() {
                (false, "Pendiente: identificar revistas y conferencias".into())
            } else {
                (
                    true,
                    format!("Revistas y conferencias indexadas en {}", database_names(data)),
                )
            }
        }
        ChecklistKey::TemporalRange => match (data.year_start, data.year_end) {
            (Some(start), Some(end)) => (
                true,
                format!("Período {start}-{end}. {}", temporal_justification(data)),
            ),
            _ => (false, "Pendiente: definir período temporal".into()),
        },
        ChecklistKey::Auxiliary => {
            let files = plan.uploaded_files.len();
            let refs = data.references.len();
            if files > 0 || refs > 0 {
                (
                    true,
                    format!("{files} archivos importados, {refs} referencias para cribado"),
                )
            } else {
                (false, "Pendiente: indicar procedimientos auxiliares".into())
            }
        }
        ChecklistKey::Validation => {
            let counted: Vec<String> = plan
                .search_queries
                .iter()
                .filter_map(|q| {
                    q.result_count
                        .map(|n| format!("{}: {n}", q.database_name))
                })
                .collect();
            if counted.is_empty() {
                (false, "Pendiente: describir la validación de la búsqueda".into())
            } else {
                (true, format!("Resultados registrados: {}", counted.join(", ")))
            }
        }
    }
}

/// Evaluate all 13 items against `data`.
pub fn evaluate(data: &WizardData) -> Vec<ChecklistItem> {
    CHECKLIST
        .iter()
        .map(|&(number, key, question)| {
            let (complies, evidence) = check(key, data);
            ChecklistItem {
                number,
                key,
                item: question.to_string(),
                complies,
                evidence,
            }
        })
        .collect()
}

/// Rounded share of complying items, 0 for an empty list.
pub fn compliance_percentage(items: &[ChecklistItem]) -> u8 {
    if items.is_empty() {
        return 0;
    }
    let passed = items.iter().filter(|i| i.complies).count();
    ((passed * 200 + items.len()) / (items.len() * 2)) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub passed: usize,
    pub total: usize,
    pub percentage: u8,
}

impl EvaluationSummary {
    pub fn from_items(items: &[ChecklistItem]) -> Self {
        Self {
            passed: items.iter().filter(|i| i.complies).count(),
            total: items.len(),
            percentage: compliance_percentage(items),
        }
    }
}
