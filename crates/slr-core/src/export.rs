//! Snapshot export and protocol documents.
//!
//! - `export_snapshot` / `parse_snapshot`: the downloadable JSON image of the
//!   whole [`WizardData`]
//! - `section_payload`: the partial protocol document auto-saved per section
//! - `protocol_document`: every section merged, as sent at finish

use serde_json::{json, Map, Value};

use crate::autosave::SectionKey;
use crate::compliance;
use crate::domain::{Result, WizardData};

/// Known bibliographic databases: id and display name.
pub const DATABASE_CATALOG: [(&str, &str); 20] = [
    ("scopus", "Scopus"),
    ("ieee", "IEEE Xplore"),
    ("acm", "ACM Digital Library"),
    ("springer", "Springer Link"),
    ("sciencedirect", "ScienceDirect"),
    ("webofscience", "Web of Science"),
    ("pubmed", "PubMed"),
    ("embase", "Embase"),
    ("cochrane", "Cochrane Library"),
    ("cinahl", "CINAHL"),
    ("eric", "ERIC"),
    ("psycinfo", "PsycINFO"),
    ("jstor", "JSTOR"),
    ("sage", "SAGE Journals"),
    ("avery", "Avery Index"),
    ("taylor", "Taylor & Francis"),
    ("econlit", "EconLit"),
    ("wiley", "Wiley Online Library"),
    ("arxiv", "arXiv"),
    ("google_scholar", "Google Scholar"),
];

/// Display name for a database id; unknown ids are returned unchanged.
pub fn database_name(id: &str) -> &str {
    DATABASE_CATALOG
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
        .unwrap_or(id)
}

/// Databases whose search API the backend can query directly.
pub const API_DATABASES: [&str; 4] = ["scopus", "ieee", "pubmed", "springer"];

pub fn has_api(id: &str) -> bool {
    API_DATABASES.contains(&id)
}

/// Pretty-printed JSON of the full wizard state.
pub fn export_snapshot(data: &WizardData) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Inverse of [`export_snapshot`]; missing fields take their defaults.
pub fn parse_snapshot(text: &str) -> Result<WizardData> {
    Ok(serde_json::from_str(text)?)
}

fn temporal_range(data: &WizardData) -> Value {
    let years = data.effective_years();
    json!({
        "start": years.start,
        "end": years.end,
        "justification": compliance::temporal_justification(data),
    })
}

/// Partial protocol document carrying only the fields of `section`.
pub fn section_payload(data: &WizardData, section: SectionKey) -> Value {
    match section {
        SectionKey::Proposal => json!({
            "refinedQuestion": data.project_description,
            "temporalRange": temporal_range(data),
        }),
        SectionKey::Pico => json!({
            "population": data.pico.population,
            "intervention": data.pico.intervention,
            "comparison": data.pico.comparison,
            "outcomes": data.pico.outcome,
        }),
        SectionKey::ScopeMatrix => json!({
            "isMatrix": data.scope_matrix.is,
            "isNotMatrix": data.scope_matrix.is_not,
            "matrixTable": data.matrix_table,
        }),
        SectionKey::Titles => json!({
            "proposedTitle": data.title_for_persistence(),
            "titleJustification": data.protocol_justification,
        }),
        SectionKey::ProtocolTerms => json!({
            "keyTerms": {
                "technology": data.protocol_terms.technology,
                "domain": data.protocol_terms.domain,
                "studyType": data.protocol_terms.study_type,
                "themes": data.protocol_terms.thematic_focus,
            }
        }),
        SectionKey::Criteria => json!({
            "inclusionCriteria": data.inclusion_criteria,
            "exclusionCriteria": data.exclusion_criteria,
        }),
        SectionKey::SearchPlan => {
            let queries: Vec<Value> = data
                .search_plan
                .search_queries
                .iter()
                .map(|q| {
                    let database = if q.database_name.is_empty() {
                        database_name(&q.database_id)
                    } else {
                        q.database_name.as_str()
                    };
                    json!({
                        "database": database,
                        "databaseId": q.database_id,
                        "query": q.query,
                        "baseQuery": q.base_query,
                        "hasAPI": q.has_api,
                        "status": q.status,
                        "resultsCount": q.result_count.unwrap_or(0),
                    })
                })
                .collect();
            let databases: Vec<&str> = data
                .search_plan
                .databases
                .iter()
                .map(|d| {
                    if d.name.is_empty() {
                        database_name(&d.id)
                    } else {
                        d.name.as_str()
                    }
                })
                .collect();
            let search_string = data
                .search_plan
                .search_queries
                .first()
                .map(|q| q.query.as_str())
                .unwrap_or_default();
            json!({
                "databases": databases,
                "searchString": search_string,
                "searchQueries": queries,
                "temporalRange": temporal_range(data),
            })
        }
        SectionKey::PrismaChecklist => {
            let items = if data.prisma_items.is_empty() {
                compliance::evaluate(data)
            } else {
                data.prisma_items.clone()
            };
            let entries: Vec<Value> = items
                .iter()
                .map(|i| {
                    json!({
                        "number": i.number,
                        "item": i.item,
                        "complies": if i.complies { "yes" } else { "no" },
                        "evidence": i.evidence,
                    })
                })
                .collect();
            json!({ "prismaCompliance": entries })
        }
    }
}

/// Every section merged into one protocol document.
pub fn protocol_document(data: &WizardData) -> Value {
    let mut document = Map::new();
    for section in SectionKey::ALL {
        if let Value::Object(fields) = section_payload(data, section) {
            document.extend(fields);
        }
    }
    Value::Object(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeneratedTitleCandidate, SearchQuery, SelectedDatabase};

    #[test]
    fn test_database_name_lookup() {
        assert_eq!(database_name("ieee"), "IEEE Xplore");
        assert_eq!(database_name("local-repo"), "local-repo");
        assert!(has_api("pubmed"));
        assert!(!has_api("acm"));
    }

    #[test]
    fn test_snapshot_round_trip_preserves_data() {
        let data = WizardData {
            project_name: "IoT".into(),
            year_start: Some(2020),
            ..Default::default()
        };
        let text = export_snapshot(&data).unwrap();
        assert_eq!(parse_snapshot(&text).unwrap(), data);
    }

    #[test]
    fn test_parse_snapshot_rejects_garbage() {
        assert!(parse_snapshot("not json").is_err());
    }

    #[test]
    fn test_protocol_document_uses_spanish_title_and_names() {
        let mut data = WizardData {
            generated_titles: vec![GeneratedTitleCandidate {
                title: "IoT in Agriculture".into(),
                spanish_title: "IoT en la agricultura".into(),
                ..Default::default()
            }],
            selected_title: "IoT in Agriculture".into(),
            year_start: Some(2019),
            year_end: Some(2024),
            ..Default::default()
        };
        data.search_plan.databases.push(SelectedDatabase {
            id: "acm".into(),
            name: String::new(),
            has_api: false,
        });
        data.search_plan.search_queries.push(SearchQuery {
            database_id: "acm".into(),
            query: "\"IoT\" AND \"agriculture\"".into(),
            ..Default::default()
        });

        let doc = protocol_document(&data);
        assert_eq!(doc["proposedTitle"], "IoT en la agricultura");
        assert_eq!(doc["databases"], json!(["ACM Digital Library"]));
        assert_eq!(doc["searchString"], "\"IoT\" AND \"agriculture\"");
        assert_eq!(doc["searchQueries"][0]["database"], "ACM Digital Library");
        assert_eq!(doc["temporalRange"]["start"], 2019);
        assert_eq!(doc["prismaCompliance"].as_array().unwrap().len(), 13);
    }

    #[test]
    fn test_section_payload_only_carries_its_fields() {
        let payload = section_payload(&WizardData::default(), SectionKey::Criteria);
        let keys: Vec<&String> = payload.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(payload.get("inclusionCriteria").is_some());
    }
}
