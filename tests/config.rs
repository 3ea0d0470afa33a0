use pr_activity_report::model::{Error, IdentityKind, Repository, Roster, User};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn repositories_load_in_file_order() {
    let file = config_file(r#"{ "web": { "owner": "acme" }, "api": { "owner": "acme" } }"#);
    let repos = Repository::from_config(file.path().to_str().unwrap()).unwrap();
    assert_eq!(
        repos.iter().map(Repository::full_name).collect::<Vec<_>>(),
        vec!["acme/web", "acme/api"]
    );
}

#[test]
fn missing_owner_is_a_config_error() {
    let file = config_file(r#"{ "web": {} }"#);
    let err = Repository::from_config(file.path().to_str().unwrap()).unwrap_err();
    assert!(matches!(err, Error::Config(message) if message.contains("owner")));
}

#[test]
fn users_build_a_roster() {
    let file = config_file(
        r#"{
            "alice": { "type": "user", "teams": ["core"] },
            "deploy-helper": { "type": "bot" },
            "robot": { "type": "user" }
        }"#,
    );
    let users = User::from_config(file.path().to_str().unwrap()).unwrap();
    assert_eq!(users[1].kind, IdentityKind::Bot);

    let roster = Roster::new(&users);
    assert!(roster.is_team("core"));
    assert!(roster.is_bot("deploy-helper"));
    assert!(!roster.is_bot("robot"));
    assert!(roster.is_bot("renovate[bot]"));
}

#[test]
fn unreadable_config_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.json");
    let err = User::from_config(missing.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
