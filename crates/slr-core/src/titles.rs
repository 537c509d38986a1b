//! Title selection, in-place editing and template fallbacks.
//!
//! The selected title is kept in sync with its candidate: while index `i` is
//! selected, editing the English text of candidate `i` also rewrites
//! `selected_title`.

use crate::domain::{
    CochraneCompliance, GeneratedTitleCandidate, Language, Result, WizardData, WizardError,
    WizardPatch,
};

fn candidate(data: &WizardData, index: usize) -> Result<&GeneratedTitleCandidate> {
    data.generated_titles
        .get(index)
        .ok_or(WizardError::TitleIndexOutOfRange {
            index,
            len: data.generated_titles.len(),
        })
}

/// Patch selecting candidate `index`.
pub fn select_title(data: &WizardData, index: usize) -> Result<WizardPatch> {
    let chosen = candidate(data, index)?;
    Ok(WizardPatch {
        selected_title: Some(chosen.title.clone()),
        selected_title_index: Some(Some(index)),
        protocol_justification: Some(chosen.justification.clone()),
        ..Default::default()
    })
}

/// Patch replacing the `lang` text of candidate `index`.
pub fn edit_title(
    data: &WizardData,
    index: usize,
    lang: Language,
    text: impl Into<String>,
) -> Result<WizardPatch> {
    candidate(data, index)?;
    let text = text.into();
    let mut titles = data.generated_titles.clone();
    titles[index].set_text(lang, text.clone());

    let mut patch = WizardPatch {
        generated_titles: Some(titles),
        ..Default::default()
    };
    if lang == Language::En && data.selected_title_index == Some(index) {
        patch.selected_title = Some(text);
    }
    Ok(patch)
}

/// Template titles used when generation is unavailable.
pub fn fallback_titles(data: &WizardData) -> Vec<GeneratedTitleCandidate> {
    let pick = |value: &str, placeholder: &str| {
        if value.trim().is_empty() {
            placeholder.to_string()
        } else {
            value.trim().to_string()
        }
    };
    let i = pick(&data.pico.intervention, "the intervention");
    let p = pick(&data.pico.population, "the target population");
    let o = pick(&data.pico.outcome, "reported outcomes");

    let templates = [
        (
            format!("{i} in {p}: A Systematic Review on {o}"),
            format!("{i} en {p}: una revisión sistemática sobre {o}"),
            CochraneCompliance::Full,
            "Incluye intervención, población y resultados claramente definidos",
        ),
        (
            format!("Exploring {i} for {o} in {p}: A Literature Review"),
            format!("Explorando {i} para {o} en {p}: una revisión de la literatura"),
            CochraneCompliance::Full,
            "Formato claro con verbo exploratorio y alcance definido",
        ),
        (
            format!("{i} and Its Impact on {o}: Systematic Review"),
            format!("{i} y su impacto en {o}: revisión sistemática"),
            CochraneCompliance::Partial,
            "Falta especificar la población explícitamente",
        ),
        (
            format!("Development Practices and {o} Using {i}: A Scoping Review"),
            format!("Prácticas de desarrollo y {o} usando {i}: una revisión de alcance"),
            CochraneCompliance::Full,
            "Incluye práctica, resultado y herramienta. Tipo de revisión claro",
        ),
        (
            format!("Evaluating {i} Strategies in {p}: A Technical Review"),
            format!("Evaluando estrategias de {i} en {p}: una revisión técnica"),
            CochraneCompliance::Full,
            "Verbo activo, estrategias claras y contexto definido",
        ),
    ];

    templates
        .into_iter()
        .map(|(title, spanish_title, compliance, justification)| GeneratedTitleCandidate {
            title,
            spanish_title,
            justification: justification.to_string(),
            compliance,
        })
        .collect()
}

/// Patch installing a fresh batch of candidates and clearing the selection.
pub fn replace_candidates(titles: Vec<GeneratedTitleCandidate>) -> WizardPatch {
    WizardPatch {
        generated_titles: Some(titles),
        selected_title: Some(String::new()),
        selected_title_index: Some(None),
        ..Default::default()
    }
}
