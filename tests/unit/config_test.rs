//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use quota_dispatch::config::{BatchShaping, DispatchConfig, ExhaustionPolicy};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_defaults_are_valid() {
    let cfg = DispatchConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.daily_limit, 2000);
    assert_eq!(cfg.max_retries, 5);
    assert_eq!(cfg.exhaustion, ExhaustionPolicy::Skip);
    assert!(cfg.batch.is_none());
}

#[test]
fn test_zero_limit_is_invalid() {
    let cfg = DispatchConfig {
        daily_limit: 0,
        ..DispatchConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_batch_is_invalid() {
    let cfg = DispatchConfig {
        batch: Some(BatchShaping {
            size: 0,
            pause_ms: 10,
        }),
        ..DispatchConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_json_str_fills_defaults() {
    let cfg = DispatchConfig::from_json_str(
        r#"{"daily_limit": 50, "exhaustion": "reassign", "batch": {"size": 10, "pause_ms": 500}}"#,
    )
    .unwrap();
    assert_eq!(cfg.daily_limit, 50);
    assert_eq!(cfg.exhaustion, ExhaustionPolicy::Reassign);
    assert_eq!(cfg.batch.unwrap().size, 10);
    assert_eq!(cfg.max_retries, 5);
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(DispatchConfig::from_json_str(r#"{"daily_limit": 0}"#).is_err());
    assert!(DispatchConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_lookup_reads_dispatch_vars() {
    let cfg = DispatchConfig::from_lookup(lookup(&[
        ("DISPATCH_DAILY_LIMIT", "300"),
        ("DISPATCH_MAX_RETRIES", " 2 "),
        ("DISPATCH_MAX_CONCURRENCY", "4"),
        ("DISPATCH_EXHAUSTION", "reassign"),
        ("DISPATCH_SUCCESS_LOG", "/tmp/ok.txt"),
    ]))
    .unwrap();
    assert_eq!(cfg.daily_limit, 300);
    assert_eq!(cfg.max_retries, 2);
    assert_eq!(cfg.concurrency_for(10), 4);
    assert_eq!(cfg.exhaustion, ExhaustionPolicy::Reassign);
    assert_eq!(cfg.success_log.to_str(), Some("/tmp/ok.txt"));
}

#[test]
fn test_from_lookup_rejects_bad_values() {
    let err = DispatchConfig::from_lookup(lookup(&[("DISPATCH_DAILY_LIMIT", "lots")])).unwrap_err();
    assert!(err.starts_with("DISPATCH_DAILY_LIMIT"));
    assert!(DispatchConfig::from_lookup(lookup(&[("DISPATCH_EXHAUSTION", "drop")])).is_err());
}

#[test]
fn test_from_lookup_reads_delivery_and_batch_vars() {
    let cfg = DispatchConfig::from_lookup(lookup(&[
        ("DISPATCH_RATE_LIMIT_JITTER", "false"),
        ("DISPATCH_BROADCAST_CAPACITY", "8"),
        ("DISPATCH_FALLBACK_TEXT", "See the HTML part."),
        ("DISPATCH_CREDENTIAL_EXTENSION", ".cred"),
        ("DISPATCH_BATCH_SIZE", "10"),
    ]))
    .unwrap();

    assert!(!cfg.rate_limit_jitter);
    assert_eq!(cfg.broadcast_capacity, 8);
    assert_eq!(cfg.fallback_text, "See the HTML part.");
    assert_eq!(cfg.credential_extension, "cred");
    assert_eq!(
        cfg.batch,
        Some(BatchShaping {
            size: 10,
            pause_ms: 1000
        })
    );

    let paused_only =
        DispatchConfig::from_lookup(lookup(&[("DISPATCH_BATCH_PAUSE_MS", "250")])).unwrap();
    assert_eq!(
        paused_only.batch,
        Some(BatchShaping {
            size: 50,
            pause_ms: 250
        })
    );
    assert!(DispatchConfig::from_lookup(lookup(&[])).unwrap().batch.is_none());
}

#[test]
fn test_from_lookup_validates_delivery_vars() {
    let err = DispatchConfig::from_lookup(lookup(&[("DISPATCH_BROADCAST_CAPACITY", "0")]))
        .unwrap_err();
    assert!(err.contains("broadcast_capacity"));
    assert!(DispatchConfig::from_lookup(lookup(&[("DISPATCH_RATE_LIMIT_JITTER", "maybe")])).is_err());
    assert!(DispatchConfig::from_lookup(lookup(&[("DISPATCH_CREDENTIAL_EXTENSION", ".")])).is_err());
    assert!(DispatchConfig::from_lookup(lookup(&[("DISPATCH_BATCH_SIZE", "0")])).is_err());
}

#[test]
fn test_retry_policy_mirrors_config() {
    let cfg = DispatchConfig {
        base_delay_ms: 250,
        max_delay_secs: 10,
        ..DispatchConfig::default()
    };
    let policy = cfg.retry_policy();
    assert_eq!(policy.base_delay, Duration::from_millis(250));
    assert_eq!(policy.max_delay, Duration::from_secs(10));
    assert_eq!(policy.max_retries, 5);
}

#[test]
fn test_concurrency_defaults_to_pool_size() {
    let cfg = DispatchConfig::default();
    assert_eq!(cfg.concurrency_for(3), 3);
    assert_eq!(cfg.concurrency_for(0), 1);
}
