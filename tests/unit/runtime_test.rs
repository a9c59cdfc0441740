//! Tests for tokio spawner utilities and API models

use std::fs;

use async_trait::async_trait;
use quota_dispatch::config::DispatchConfig;
use quota_dispatch::core::{
    ComposedMessage, Dispatcher, Job, MailTransport, ProgressSnapshot, SendError, Spawn,
};
use quota_dispatch::runtime::api::{PROGRESS_EVENT, RUN_STARTED_MESSAGE};
use quota_dispatch::runtime::tokio_spawner::TokioSpawner;
use quota_dispatch::runtime::{health, start_run, ProgressEvent, StartRunRequest};
use quota_dispatch::util::{CredentialId, RunId};

struct AcceptAll;

#[async_trait]
impl MailTransport for AcceptAll {
    async fn send(&self, _: &CredentialId, _: &ComposedMessage) -> Result<(), SendError> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let receivers: Vec<_> = (0..4)
        .map(|i| {
            let (tx, rx) = tokio::sync::oneshot::channel();
            spawner.spawn(async move {
                tx.send(i * 10).unwrap();
            });
            rx
        })
        .collect();

    let results: Vec<i32> = futures::future::join_all(receivers)
        .await
        .into_iter()
        .map(|r| r.expect("oneshot result"))
        .collect();
    assert_eq!(results, vec![0, 10, 20, 30]);
}

#[test]
fn test_owned_runtime_spawner() {
    let (_runtime, spawner) = TokioSpawner::with_worker_threads(1).unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    spawner.spawn(async move {
        tx.send(7).unwrap();
    });
    assert_eq!(rx.recv().unwrap(), 7);
}

struct SlowAccept;

#[async_trait]
impl MailTransport for SlowAccept {
    async fn send(&self, _: &CredentialId, _: &ComposedMessage) -> Result<(), SendError> {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(())
    }
}

#[test]
fn test_dispatcher_dropped_mid_run_on_owned_runtime() {
    let (runtime, spawner) = TokioSpawner::with_worker_threads(1).unwrap();
    let dispatcher = Dispatcher::new(
        DispatchConfig::default(),
        vec![CredentialId::from("a.json"), CredentialId::from("b.json")],
        SlowAccept,
        spawner,
    )
    .unwrap();
    let jobs = (0..4)
        .map(|i| Job::new(format!("user{i}@example.com"), "Hi", "<p>hi</p>").unwrap())
        .collect();

    let handle = dispatcher.start_run(jobs).unwrap();
    drop(dispatcher);

    let report = runtime.block_on(handle.wait()).unwrap();
    assert_eq!(report.snapshot.sent_count, 4);
    assert!(report.snapshot.finished);
    drop(runtime);
}

#[test]
fn test_current_outside_runtime_fails() {
    assert!(TokioSpawner::current().is_err());
}

#[test]
fn test_progress_event_shape() {
    let event = ProgressEvent::from(ProgressSnapshot::new(RunId::new(), 4));
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], PROGRESS_EVENT);
    assert_eq!(json["total_count"], 4);
    assert_eq!(json["sent_count"], 0);
    assert_eq!(json["percent_complete"], 0.0);
    assert!(json["statuses"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_run_from_uploaded_list() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = DispatchConfig {
        job_list_dir: dir.path().join("upload_email"),
        content_dir: dir.path().join("upload_content"),
        ..DispatchConfig::default()
    };
    fs::create_dir(&cfg.job_list_dir).unwrap();
    fs::create_dir(&cfg.content_dir).unwrap();
    fs::write(cfg.content_dir.join("hi.html"), "<p>hi</p>").unwrap();
    fs::write(
        cfg.job_list_dir.join("emails.txt"),
        "ann@example.com,Hi,hi.html\nbob@example.com,Hi,hi.html\nnot-an-email,Hi,hi.html\n",
    )
    .unwrap();

    let dispatcher = Dispatcher::new(
        cfg,
        vec![CredentialId::from("a.json")],
        AcceptAll,
        TokioSpawner::current().unwrap(),
    )
    .unwrap();
    assert!(!health(&dispatcher).running);

    let req = StartRunRequest {
        email_list_filename: "emails.txt".into(),
    };
    let (resp, handle) = start_run(&dispatcher, &req).unwrap();
    assert_eq!(resp.message, RUN_STARTED_MESSAGE);
    assert_eq!(resp.accepted, 2);
    assert_eq!(resp.rejected.len(), 1);
    assert_eq!(resp.run_id, handle.run_id());

    let report = handle.wait().await.unwrap();
    assert_eq!(report.snapshot.sent_count, 2);
    assert!(health(&dispatcher).ok);
}

#[tokio::test]
async fn test_start_run_requires_filename() {
    let dispatcher = Dispatcher::new(
        DispatchConfig::default(),
        vec![CredentialId::from("a.json")],
        AcceptAll,
        TokioSpawner::current().unwrap(),
    )
    .unwrap();
    let req = StartRunRequest {
        email_list_filename: "  ".into(),
    };
    assert_eq!(
        start_run(&dispatcher, &req).unwrap_err(),
        "No email list filename provided"
    );
}
