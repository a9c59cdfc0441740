//! Tests for file-backed delivery logs

use std::fs;

use async_trait::async_trait;
use quota_dispatch::config::DispatchConfig;
use quota_dispatch::core::{
    ComposedMessage, DeliveryLog, DeliveryRecord, Dispatcher, Job, MailTransport, SendError,
};
use quota_dispatch::infra::FileDeliveryLog;
use quota_dispatch::runtime::TokioSpawner;
use quota_dispatch::util::{CredentialId, RunId};

#[test]
fn test_records_route_to_their_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut log =
        FileDeliveryLog::open(dir.path().join("success.txt"), dir.path().join("error.txt")).unwrap();
    let run = RunId::new();
    let cred = CredentialId::from("c1.json");

    log.record(DeliveryRecord::sent(run, "a@example.com", cred.clone()));
    log.record(DeliveryRecord::failed(run, "b@example.com", cred.clone(), "boom"));
    log.record(DeliveryRecord::skipped(run, "c@example.com", cred, "quota exhausted"));
    log.flush();

    let success = fs::read_to_string(log.success_path()).unwrap();
    let error = fs::read_to_string(log.error_path()).unwrap();
    assert_eq!(success, "Email sent to a@example.com successfully using c1.json.\n");
    assert_eq!(error.lines().count(), 2);
    assert!(error.starts_with("Failed to send email to b@example.com using c1.json. Error: boom"));
}

#[test]
fn test_reopening_appends() {
    let dir = tempfile::tempdir().unwrap();
    let ok = dir.path().join("success.txt");
    let err = dir.path().join("error.txt");
    for recipient in ["a@example.com", "b@example.com"] {
        let mut log = FileDeliveryLog::open(&ok, &err).unwrap();
        log.record(DeliveryRecord::sent(RunId::new(), recipient, CredentialId::from("x")));
    }
    assert_eq!(fs::read_to_string(&ok).unwrap().lines().count(), 2);
}

#[test]
fn test_lines_are_buffered_until_flush() {
    let dir = tempfile::tempdir().unwrap();
    let mut log =
        FileDeliveryLog::open(dir.path().join("success.txt"), dir.path().join("error.txt")).unwrap();

    log.record(DeliveryRecord::sent(RunId::new(), "a@example.com", CredentialId::from("x")));
    assert!(fs::read_to_string(log.success_path()).unwrap().is_empty());

    log.flush();
    assert_eq!(fs::read_to_string(log.success_path()).unwrap().lines().count(), 1);
}

struct RejectOdd;

#[async_trait]
impl MailTransport for RejectOdd {
    async fn send(&self, _: &CredentialId, message: &ComposedMessage) -> Result<(), SendError> {
        if message.to.starts_with("odd") {
            return Err(SendError::Permanent {
                reason: "mailbox unavailable".into(),
            });
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_run_leaves_logs_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let success = dir.path().join("success.txt");
    let error = dir.path().join("error.txt");
    let log = FileDeliveryLog::open(&success, &error).unwrap();
    let dispatcher = Dispatcher::new(
        DispatchConfig::default(),
        vec![CredentialId::from("c1.json")],
        RejectOdd,
        TokioSpawner::current().unwrap(),
    )
    .unwrap()
    .with_delivery_log(Box::new(log));
    let jobs = ["even0@example.com", "odd1@example.com", "even2@example.com"]
        .into_iter()
        .map(|to| Job::new(to, "Hi", "<p>hi</p>").unwrap())
        .collect();

    let report = dispatcher.run(jobs).await.unwrap();

    assert_eq!(report.snapshot.sent_count, 2);
    assert_eq!(fs::read_to_string(&success).unwrap().lines().count(), 2);
    let errors = fs::read_to_string(&error).unwrap();
    assert_eq!(errors.lines().count(), 1);
    assert!(errors.contains("odd1@example.com"));
}
