//! Tests for recipient list loading

use std::fs;

use quota_dispatch::core::{DispatchError, ValidationError};
use quota_dispatch::infra::{load_job_list, DirContentResolver};

#[test]
fn test_load_from_upload_directories() {
    let emails = tempfile::tempdir().unwrap();
    let content = tempfile::tempdir().unwrap();
    fs::write(content.path().join("welcome.html"), "<h1>Welcome</h1>").unwrap();
    fs::write(
        emails.path().join("emails.txt"),
        "ann@example.com,Welcome,welcome.html\nbroken,Welcome,welcome.html\n",
    )
    .unwrap();

    let resolver = DirContentResolver::new(content.path());
    let list = load_job_list(emails.path(), "emails.txt", &resolver).unwrap();

    assert_eq!(list.jobs.len(), 1);
    assert_eq!(list.jobs[0].body(), "<h1>Welcome</h1>");
    assert_eq!(
        list.rejected,
        vec![ValidationError::InvalidRecipient("broken".into())]
    );
}

#[test]
fn test_missing_content_file_rejects_list() {
    let emails = tempfile::tempdir().unwrap();
    let content = tempfile::tempdir().unwrap();
    fs::write(emails.path().join("emails.txt"), "ann@example.com,Hi,absent.html\n").unwrap();

    let resolver = DirContentResolver::new(content.path());
    let err = load_job_list(emails.path(), "emails.txt", &resolver).unwrap_err();
    assert_eq!(err.to_string(), "content file absent.html not found");
}

#[test]
fn test_missing_list_is_io_error() {
    let emails = tempfile::tempdir().unwrap();
    let resolver = DirContentResolver::new(emails.path());
    assert!(matches!(
        load_job_list(emails.path(), "nope.txt", &resolver),
        Err(DispatchError::Io(_))
    ));
}

#[test]
fn test_content_reference_cannot_escape_directory() {
    let root = tempfile::tempdir().unwrap();
    let content = root.path().join("content");
    fs::create_dir(&content).unwrap();
    fs::write(root.path().join("secret.html"), "secret").unwrap();
    fs::write(root.path().join("emails.txt"), "ann@example.com,Hi,../secret.html\n").unwrap();

    let resolver = DirContentResolver::new(&content);
    let err = load_job_list(root.path(), "emails.txt", &resolver).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Validation(ValidationError::MissingContent(_))
    ));
}
