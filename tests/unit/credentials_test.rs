//! Tests for credential directory loading

use std::fs;

use quota_dispatch::core::DispatchError;
use quota_dispatch::infra::load_credential_sources;
use quota_dispatch::util::CredentialId;

#[test]
fn test_lists_matching_files_sorted() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.json", "a.json", "notes.txt"] {
        fs::write(dir.path().join(name), "{}").unwrap();
    }
    fs::create_dir(dir.path().join("nested.json")).unwrap();

    let ids = load_credential_sources(dir.path(), "json").unwrap();
    assert_eq!(ids, vec![CredentialId::from("a.json"), CredentialId::from("b.json")]);
}

#[test]
fn test_empty_directory_has_no_credentials() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("readme.md"), "").unwrap();
    assert!(matches!(
        load_credential_sources(dir.path(), "json"),
        Err(DispatchError::NoCredentials)
    ));
}

#[test]
fn test_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_credential_sources(dir.path().join("absent"), "json"),
        Err(DispatchError::Io(_))
    ));
}
