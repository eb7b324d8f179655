//! UI Builder module for formatting scan results and building keyboards

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import the scan data model
use crate::scan_model::ScanSnapshot;

/// Widest ingredient name that still fits a button label
const MAX_BUTTON_NAME_CHARS: usize = 20;

/// Progress message for a transient scan status
pub fn progress_message(status: &str, language_code: Option<&str>) -> String {
    match status {
        "pending" => t_lang("progress-pending", language_code),
        "processing" => t_lang("progress-processing", language_code),
        other => t_args_lang("progress-unknown", &[("status", other)], language_code),
    }
}

/// Caption for the hazard gauge photo: product name, hazard index and the
/// allergen list
pub fn result_caption(snapshot: &ScanSnapshot, language_code: Option<&str>) -> String {
    let name = snapshot
        .display_name()
        .map(str::to_string)
        .unwrap_or_else(|| t_lang("result-name-placeholder", language_code));

    let index = snapshot.additives_danger_index().to_string();
    let hazard = t_args_lang("result-hazard-index", &[("index", index.as_str())], language_code);

    let allergens = if snapshot.allergens().is_empty() {
        t_lang("result-allergens-none", language_code)
    } else {
        snapshot
            .allergens()
            .iter()
            .map(|allergen| format!("- {}", capitalize(allergen)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut caption = format!(
        "*{name}*\n{hazard}\n\n*{}*\n{allergens}",
        t_lang("result-allergens-title", language_code)
    );
    if !snapshot.linked_ingredients().is_empty() {
        caption.push_str(&format!(
            "\n\n*{}* ⬇️",
            t_lang("result-additives-title", language_code)
        ));
    }
    caption
}

/// Follow-up message with the AI analysis, the recognized composition and
/// the disclaimer
pub fn result_details(snapshot: &ScanSnapshot, language_code: Option<&str>) -> String {
    let mut sections = Vec::new();

    if let Some(analysis) = snapshot.ai_analysis_text() {
        sections.push(format!(
            "*{}*\n{analysis}",
            t_lang("result-ai-title", language_code)
        ));
    }
    if let Some(composition) = snapshot.composition.as_deref() {
        sections.push(format!(
            "*{}:*\n{composition}",
            t_lang("result-composition-title", language_code)
        ));
    }
    sections.push(format!("_{}_", t_lang("result-disclaimer", language_code)));

    sections.join("\n\n")
}

/// Keyboard with one reference-link button per ingredient that carries a URL
///
/// Returns `None` when no ingredient links exist, so callers can skip the
/// keyboard entirely.
pub fn ingredient_links_keyboard(
    snapshot: &ScanSnapshot,
    language_code: Option<&str>,
) -> Option<InlineKeyboardMarkup> {
    let mut rows = Vec::new();

    for ingredient in snapshot.linked_ingredients() {
        let link = ingredient.reference_url.as_deref().unwrap_or_default();
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(_) => continue,
        };

        let name = ingredient
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .map(|name| truncate_name(name, MAX_BUTTON_NAME_CHARS))
            .unwrap_or_else(|| t_lang("result-name-placeholder", language_code));

        let label = match ingredient.danger {
            Some(danger) => t_args_lang(
                "ingredient-danger-scale",
                &[
                    ("marker", ingredient.danger_marker()),
                    ("name", name.as_str()),
                    ("danger", danger.to_string().as_str()),
                ],
                language_code,
            ),
            None => t_args_lang(
                "ingredient-danger-unknown",
                &[
                    ("marker", ingredient.danger_marker()),
                    ("name", name.as_str()),
                ],
                language_code,
            ),
        };

        rows.push(vec![InlineKeyboardButton::url(label, url)]);
    }

    if rows.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(rows))
    }
}

/// Truncate an ingredient name to a bounded display width, char-aware so
/// non-ASCII names never split mid-character
pub fn truncate_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let truncated: String = name.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Uppercase the first letter, keeping the rest untouched
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
