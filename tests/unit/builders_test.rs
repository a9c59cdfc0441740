//! Tests for builder modules

use std::fs;

use async_trait::async_trait;
use quota_dispatch::builders::{build_dispatcher, DispatcherBuilder};
use quota_dispatch::config::DispatchConfig;
use quota_dispatch::core::{
    ComposedMessage, DispatchError, InMemoryDeliveryLog, Job, MailTransport, SendError,
};
use quota_dispatch::runtime::TokioSpawner;
use quota_dispatch::util::CredentialId;

struct AcceptAll;

#[async_trait]
impl MailTransport for AcceptAll {
    async fn send(&self, _: &CredentialId, _: &ComposedMessage) -> Result<(), SendError> {
        Ok(())
    }
}

fn config_in(dir: &std::path::Path) -> DispatchConfig {
    DispatchConfig {
        credentials_dir: dir.join("credentials"),
        success_log: dir.join("success.txt"),
        error_log: dir.join("error.txt"),
        ..DispatchConfig::default()
    }
}

#[tokio::test]
async fn test_build_dispatcher_wires_credentials_and_file_logs() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("credentials")).unwrap();
    fs::write(dir.path().join("credentials/sender.json"), "{}").unwrap();
    let cfg = config_in(dir.path());

    let dispatcher = build_dispatcher(cfg, AcceptAll, TokioSpawner::current().unwrap()).unwrap();
    assert_eq!(dispatcher.sources(), &[CredentialId::from("sender.json")]);

    let job = Job::new("ann@example.com", "Hi", "<p>hi</p>").unwrap();
    let report = dispatcher.run(vec![job]).await.unwrap();
    assert_eq!(report.snapshot.sent_count, 1);

    let success = fs::read_to_string(dir.path().join("success.txt")).unwrap();
    assert_eq!(
        success.trim_end(),
        "Email sent to ann@example.com successfully using sender.json."
    );
}

#[tokio::test]
async fn test_builder_with_explicit_sources() {
    let dir = tempfile::tempdir().unwrap();
    let dispatcher = DispatcherBuilder::new(config_in(dir.path()))
        .sources(vec![CredentialId::from("a"), CredentialId::from("b")])
        .delivery_log(Box::new(InMemoryDeliveryLog::new(16)))
        .seed(3)
        .build(AcceptAll, TokioSpawner::current().unwrap())
        .unwrap();
    assert_eq!(dispatcher.sources().len(), 2);
    assert!(!dir.path().join("success.txt").exists());
}

#[tokio::test]
async fn test_builder_rejects_missing_credentials() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("credentials")).unwrap();
    let result = DispatcherBuilder::new(config_in(dir.path()))
        .build(AcceptAll, TokioSpawner::current().unwrap());
    assert!(matches!(result, Err(DispatchError::NoCredentials)));

    let result = DispatcherBuilder::new(config_in(dir.path()))
        .sources(Vec::new())
        .build(AcceptAll, TokioSpawner::current().unwrap());
    assert!(matches!(result, Err(DispatchError::NoCredentials)));
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let cfg = DispatchConfig {
        max_concurrency: Some(0),
        ..DispatchConfig::default()
    };
    let result = DispatcherBuilder::new(cfg)
        .sources(vec![CredentialId::from("a")])
        .build(AcceptAll, TokioSpawner::current().unwrap());
    assert!(matches!(result, Err(DispatchError::InvalidConfig(_))));
}
