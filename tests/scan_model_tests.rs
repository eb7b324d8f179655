//! Tests for the scan data model: wire deserialization, the completion
//! predicate and status classification

use pomelo_bot::scan_model::{
    is_completion_candidate, is_terminal_failure, Ingredient, ScanEnvelope, ScanSnapshot,
};

/// A realistic response body from the scan endpoints
const COMPLETED_SCAN_JSON: &str = r#"{
    "scan": {
        "id": "scan-42",
        "name": "Лимонад",
        "status": "completed",
        "aiAnalysis": "Mostly sugar. Drink in moderation.",
        "composition": "water, sugar, E211",
        "analysis": {
            "ingredients": [
                {"name": "water", "danger": 0, "referenceUrl": null},
                {"name": "sugar", "danger": 2, "referenceUrl": "https://example.com/sugar"},
                {"name": "sodium benzoate", "danger": 5, "referenceUrl": "https://example.com/e211"}
            ],
            "allergens": ["milk"],
            "additivesDangerIndex": 63
        }
    }
}"#;

/// Deserializing a full response keeps every field the presenters need
#[test]
fn deserializes_completed_scan_envelope() {
    let envelope: ScanEnvelope = serde_json::from_str(COMPLETED_SCAN_JSON).unwrap();
    let snapshot = envelope.scan;

    assert_eq!(snapshot.id, "scan-42");
    assert_eq!(snapshot.display_name(), Some("Лимонад"));
    assert_eq!(snapshot.status(), "completed");
    assert_eq!(snapshot.ingredients().len(), 3);
    assert_eq!(snapshot.allergens(), ["milk".to_string()]);
    assert_eq!(snapshot.additives_danger_index(), 63);
    assert_eq!(snapshot.composition.as_deref(), Some("water, sugar, E211"));
    assert_eq!(
        snapshot.ai_analysis_text().as_deref(),
        Some("Mostly sugar. Drink in moderation.")
    );
}

/// A response without a scan object decodes to the empty snapshot instead
/// of failing, so the client can reject it with a validation error
#[test]
fn missing_scan_object_yields_empty_snapshot() {
    let envelope: ScanEnvelope = serde_json::from_str("{}").unwrap();
    assert!(envelope.scan.id.is_empty());
    assert!(!envelope.scan.is_fully_completed());
}

/// Fully completed requires BOTH the completed status and the enrichment
#[test]
fn full_completion_needs_status_and_enrichment() {
    let complete: ScanSnapshot = serde_json::from_str(
        r#"{"id": "s", "status": "completed", "aiAnalysis": "fine"}"#,
    )
    .unwrap();
    assert!(complete.is_fully_completed());

    // Status alone is not proof of completion
    let no_enrichment: ScanSnapshot =
        serde_json::from_str(r#"{"id": "s", "status": "completed"}"#).unwrap();
    assert!(!no_enrichment.is_fully_completed());

    // An explicit null counts as absent
    let null_enrichment: ScanSnapshot =
        serde_json::from_str(r#"{"id": "s", "status": "completed", "aiAnalysis": null}"#).unwrap();
    assert!(!null_enrichment.is_fully_completed());

    // The enrichment signal status is not itself completion
    let signal_only: ScanSnapshot = serde_json::from_str(
        r#"{"id": "s", "status": "ai_analysis_completed", "aiAnalysis": "fine"}"#,
    )
    .unwrap();
    assert!(!signal_only.is_fully_completed());
}

/// Structured enrichment payloads still render as text
#[test]
fn object_enrichment_renders_as_text() {
    let snapshot: ScanSnapshot = serde_json::from_str(
        r#"{"id": "s", "status": "completed", "aiAnalysis": {"verdict": "ok"}}"#,
    )
    .unwrap();
    assert!(snapshot.is_fully_completed());
    assert_eq!(
        snapshot.ai_analysis_text().as_deref(),
        Some(r#"{"verdict":"ok"}"#)
    );
}

/// Blank and missing names both fall back to the placeholder path
#[test]
fn blank_names_count_as_absent() {
    let blank: ScanSnapshot =
        serde_json::from_str(r#"{"id": "s", "name": "   "}"#).unwrap();
    assert_eq!(blank.display_name(), None);

    let missing: ScanSnapshot = serde_json::from_str(r#"{"id": "s"}"#).unwrap();
    assert_eq!(missing.display_name(), None);
}

/// Only ingredients with a non-empty reference URL become links
#[test]
fn linked_ingredients_require_a_reference_url() {
    let envelope: ScanEnvelope = serde_json::from_str(COMPLETED_SCAN_JSON).unwrap();
    let linked = envelope.scan.linked_ingredients();

    assert_eq!(linked.len(), 2);
    assert_eq!(linked[0].name.as_deref(), Some("sugar"));
    assert_eq!(linked[1].name.as_deref(), Some("sodium benzoate"));
}

/// The hazard index is clamped into the displayable range
#[test]
fn danger_index_is_clamped() {
    let too_high: ScanSnapshot = serde_json::from_str(
        r#"{"id": "s", "analysis": {"additivesDangerIndex": 250}}"#,
    )
    .unwrap();
    assert_eq!(too_high.additives_danger_index(), 100);

    let negative: ScanSnapshot = serde_json::from_str(
        r#"{"id": "s", "analysis": {"additivesDangerIndex": -5}}"#,
    )
    .unwrap();
    assert_eq!(negative.additives_danger_index(), 0);

    let absent: ScanSnapshot = serde_json::from_str(r#"{"id": "s"}"#).unwrap();
    assert_eq!(absent.additives_danger_index(), 0);
}

/// Danger levels map onto the qualitative markers of the source data
#[test]
fn danger_markers_follow_the_scale() {
    let marker = |danger: Option<i8>| Ingredient {
        danger,
        ..Default::default()
    }
    .danger_marker()
    .to_string();

    assert_eq!(marker(None), "⚪");
    assert_eq!(marker(Some(0)), "⚪");
    assert_eq!(marker(Some(1)), "🟢");
    assert_eq!(marker(Some(2)), "🟡");
    assert_eq!(marker(Some(3)), "🟡");
    assert_eq!(marker(Some(4)), "🟠");
    assert_eq!(marker(Some(5)), "🔴");
}

/// Status classification: failures and completion candidates are closed
/// sets, everything else is transient
#[test]
fn status_classification_covers_the_known_sets() {
    for status in ["failed", "analysis_failed", "recognition_failed"] {
        assert!(is_terminal_failure(status), "{status} should be terminal");
        assert!(!is_completion_candidate(status));
    }
    for status in ["completed", "ai_analysis_completed"] {
        assert!(is_completion_candidate(status), "{status} should be a candidate");
        assert!(!is_terminal_failure(status));
    }
    for status in ["pending", "processing", "queued", ""] {
        assert!(!is_terminal_failure(status));
        assert!(!is_completion_candidate(status));
    }
}
