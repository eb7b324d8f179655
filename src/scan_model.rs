//! # Scan Data Model
//!
//! This module defines the typed view of a scan job as returned by the Pomelo
//! API, together with the status classification used by the tracker.
//!
//! ## Core Concepts
//!
//! - **ScanSnapshot**: a point-in-time read of a scan's fields. A snapshot is
//!   *fully completed* only when its status is `"completed"` AND the AI
//!   enrichment payload is present — a `"completed"` status alone is not
//!   proof of completion.
//! - **Status classes**: the service emits an open-ended set of status
//!   strings. The tracker only distinguishes terminal failures, completion
//!   candidates, and "anything else = transient".
//!
//! ## Usage
//!
//! ```rust
//! use pomelo_bot::scan_model::{is_completion_candidate, ScanSnapshot};
//!
//! let snapshot: ScanSnapshot = serde_json::from_str(
//!     r#"{"id": "j1", "status": "completed", "aiAnalysis": "Looks fine."}"#,
//! ).unwrap();
//!
//! assert!(is_completion_candidate(snapshot.status()));
//! assert!(snapshot.is_fully_completed());
//! ```

use serde::Deserialize;

/// Response envelope for scan creation and scan fetch endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanEnvelope {
    /// The scan payload; tolerated as missing so a malformed response
    /// surfaces as a validation error instead of a decode panic
    #[serde(default)]
    pub scan: ScanSnapshot,
}

/// Immutable-per-fetch view of a scan job's state
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    /// Opaque job identifier assigned by the service at creation
    #[serde(default)]
    pub id: String,

    /// Display name of the scanned product
    #[serde(default)]
    pub name: Option<String>,

    /// Raw status string as last reported by the service
    #[serde(default)]
    pub status: Option<String>,

    /// AI enrichment payload; `null` counts as absent
    #[serde(default)]
    pub ai_analysis: Option<serde_json::Value>,

    /// Ingredient analysis, present once recognition has run
    #[serde(default)]
    pub analysis: Option<ScanAnalysis>,

    /// Recognized composition text
    #[serde(default)]
    pub composition: Option<String>,
}

/// Ingredient analysis attached to a scan
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanAnalysis {
    /// Ordered ingredient records
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,

    /// Detected allergens
    #[serde(default)]
    pub allergens: Vec<String>,

    /// Hazard summary, 0-100
    #[serde(default)]
    pub additives_danger_index: i64,
}

/// A single analyzed ingredient
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    /// Ingredient name as recognized by the service
    #[serde(default)]
    pub name: Option<String>,

    /// Danger level 0-5; absent when the service could not rate it
    #[serde(default)]
    pub danger: Option<i8>,

    /// Reference article about the ingredient, when one exists
    #[serde(default)]
    pub reference_url: Option<String>,
}

impl ScanSnapshot {
    /// Raw status string, empty when the service sent none
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }

    /// Whether the scan is truly finished: status `"completed"` AND the AI
    /// enrichment attached. `"ai_analysis_completed"` events only signal that
    /// this predicate should be re-checked against a fresh snapshot.
    pub fn is_fully_completed(&self) -> bool {
        self.status() == "completed"
            && matches!(&self.ai_analysis, Some(value) if !value.is_null())
    }

    /// Product name, `None` when absent or blank
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// AI enrichment rendered as display text
    pub fn ai_analysis_text(&self) -> Option<String> {
        match &self.ai_analysis {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(value) if !value.is_null() => Some(value.to_string()),
            _ => None,
        }
    }

    /// Analyzed ingredients, empty before recognition finishes
    pub fn ingredients(&self) -> &[Ingredient] {
        self.analysis
            .as_ref()
            .map(|analysis| analysis.ingredients.as_slice())
            .unwrap_or(&[])
    }

    /// Ingredients that carry a reference URL, in analysis order
    pub fn linked_ingredients(&self) -> Vec<&Ingredient> {
        self.ingredients()
            .iter()
            .filter(|ingredient| {
                ingredient
                    .reference_url
                    .as_deref()
                    .is_some_and(|url| !url.is_empty())
            })
            .collect()
    }

    /// Detected allergens, empty before recognition finishes
    pub fn allergens(&self) -> &[String] {
        self.analysis
            .as_ref()
            .map(|analysis| analysis.allergens.as_slice())
            .unwrap_or(&[])
    }

    /// Additives danger index clamped to the displayable 0-100 range
    pub fn additives_danger_index(&self) -> u8 {
        self.analysis
            .as_ref()
            .map(|analysis| analysis.additives_danger_index.clamp(0, 100) as u8)
            .unwrap_or(0)
    }
}

impl Ingredient {
    /// Qualitative marker for the danger level
    pub fn danger_marker(&self) -> &'static str {
        match self.danger {
            None | Some(0) => "⚪",
            Some(1) => "🟢",
            Some(2) | Some(3) => "🟡",
            Some(4) => "🟠",
            Some(5) => "🔴",
            Some(_) => "⚪",
        }
    }
}

/// Whether a status reports the job itself failed. Terminal: the session
/// ends without a refetch.
pub fn is_terminal_failure(status: &str) -> bool {
    matches!(status, "failed" | "analysis_failed" | "recognition_failed")
}

/// Whether a status may indicate true completion. The authoritative check is
/// always re-derived from a freshly fetched snapshot, never from the event.
pub fn is_completion_candidate(status: &str) -> bool {
    matches!(status, "completed" | "ai_analysis_completed")
}
