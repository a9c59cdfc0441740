//! Tests for utility functions

use quota_dispatch::util::{now_ms, CredentialId, RunId};

#[test]
fn test_run_ids_are_unique() {
    let a = RunId::new();
    let b = RunId::new();
    assert_ne!(a, b);
    assert!(!a.is_nil());
    assert!(RunId::default().is_nil());
}

#[test]
fn test_run_id_serializes_as_string() {
    let id = RunId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
}

#[test]
fn test_credential_id_ordering() {
    let mut ids = vec![CredentialId::from("b.json"), CredentialId::from("a.json")];
    ids.sort();
    assert_eq!(ids[0].as_str(), "a.json");
    assert_eq!(ids[1].to_string(), "b.json");
}

#[test]
fn test_now_ms_is_positive() {
    assert!(now_ms() > 0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    quota_dispatch::util::init_tracing();
    quota_dispatch::util::init_tracing();
    tracing::info!("tracing initialized");
}
