//! Integration tests for core snapshot and alert types.

use chrono::{TimeZone, Utc};
use tallybar_core::{AlertKind, AlertState, CredentialsDocument, UsageSnapshot, UsageWindow};

#[test]
fn test_alert_state_tracks_snapshots_across_windows() {
    let first_reset = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
    let second_reset = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap();

    let mut state = AlertState::default();
    let mut snapshot = UsageSnapshot::new();
    snapshot.five_hour = Some(UsageWindow::new(95.0).resetting_at(first_reset));

    let fired: Vec<_> = (0..3)
        .filter_map(|_| state.evaluate(&snapshot).alert)
        .collect();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, AlertKind::Session);

    snapshot.five_hour = Some(UsageWindow::new(12.0).resetting_at(second_reset));
    assert!(state.evaluate(&snapshot).alert.is_none());
    assert!(!state.alert_shown_for_current_window);
}

#[test]
fn test_credentials_document_without_oauth_object() {
    let doc = CredentialsDocument::parse("{}").unwrap();
    assert!(doc.credential().unwrap().is_none());
}

#[test]
fn test_malformed_oauth_object_is_an_error() {
    let doc = CredentialsDocument::parse(r#"{"claudeAiOauth": {"expiresAt": "soon"}}"#).unwrap();
    assert!(doc.credential().is_err());
}
