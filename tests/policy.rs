mod common;

use common::{Workspace, patch};
use privacy_guard::{Error, PolicyStore, SetPolicyRequest};
use serde_json::json;

#[test]
fn missing_file_yields_defaults_without_writing() {
    let ws = Workspace::new();
    let store = PolicyStore::load(ws.policy_path()).expect("load");
    let policy = store.get();

    assert_eq!(policy.max_bytes, 2_000_000);
    assert!(policy.redact_on_read);
    assert_eq!(policy.redaction_token, "█");
    assert_eq!(policy.root_dir, ws.root().canonicalize().expect("canonicalize"));
    assert!(!ws.policy_path().exists());
}

#[test]
fn persisted_fields_overlay_defaults_and_unknown_fields_survive() {
    let ws = Workspace::with_policy(
        r#"{"max_bytes": 4096, "owner": {"team": "intake"}, "use_presidio": true}"#,
    );
    let guardian = ws.guardian();
    let policy = guardian.get_policy().expect("get_policy");
    assert_eq!(policy.max_bytes, 4096);
    assert!(policy.use_entity_engine);
    assert_eq!(policy.allow_extensions, vec![".txt", ".md", ".json"]);

    guardian
        .set_policy(SetPolicyRequest {
            patch: patch(json!({"redact_on_read": false})),
        })
        .expect("set_policy");
    let raw = std::fs::read_to_string(ws.policy_path()).expect("read");
    let persisted: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(persisted["owner"], json!({"team": "intake"}));
    assert_eq!(persisted["redact_on_read"], false);
    assert_eq!(persisted["max_bytes"], 4096);
}

#[test]
fn malformed_policy_is_a_load_error() {
    for raw in ["{not json", "[]", r#"{"max_bytes": "big"}"#, r#"{"max_bytes": 0}"#] {
        let ws = Workspace::with_policy(raw);
        match PolicyStore::load(ws.policy_path()).expect_err("malformed") {
            Error::PolicyLoad(_) => {}
            other => panic!("unexpected error for {raw}: {other:?}"),
        }
    }
}

#[test]
fn patch_replaces_whole_fields_and_persists() {
    let ws = Workspace::new();
    let store = PolicyStore::load(ws.policy_path()).expect("load");
    let updated = store
        .patch(patch(json!({"deny_globs": ["private/**"], "redaction_token": "*"})))
        .expect("patch");
    assert_eq!(updated.deny_globs, vec!["private/**"]);
    assert_eq!(updated.redaction_token, "*");

    let reloaded = PolicyStore::load(ws.policy_path()).expect("reload").get();
    assert_eq!(reloaded, updated);
}

#[test]
fn invalid_patch_changes_nothing() {
    let ws = Workspace::new();
    let store = PolicyStore::load(ws.policy_path()).expect("load");
    for bad in [
        json!({"redaction_token": "##"}),
        json!({"max_bytes": -1}),
        json!({"deny_globs": ["[unclosed"]}),
    ] {
        match store.patch(patch(bad.clone())).expect_err("invalid") {
            Error::InvalidPolicy(_) => {}
            other => panic!("unexpected error for {bad}: {other:?}"),
        }
    }
    assert_eq!(store.get().redaction_token, "█");
    assert!(!ws.policy_path().exists());
}

#[test]
fn relative_root_resolves_against_policy_directory() {
    let ws = Workspace::with_policy(r#"{"root_dir": "./sandbox"}"#);
    let policy = PolicyStore::load(ws.policy_path()).expect("load").get();
    assert!(policy.root_dir.is_absolute());
    assert_eq!(policy.root_dir, ws.root().canonicalize().expect("canonicalize"));
}

#[test]
fn toml_policy_round_trips_as_toml() {
    let ws = Workspace::new();
    let path = ws.dir.path().join("policy.toml");
    std::fs::write(&path, "max_bytes = 64\nallow_extensions = [\".txt\"]\n").expect("write");

    let store = PolicyStore::load(&path).expect("load");
    assert_eq!(store.get().max_bytes, 64);
    assert_eq!(store.get().allow_extensions, vec![".txt"]);

    store
        .patch(patch(json!({"redact_on_read": false})))
        .expect("patch");
    let raw = std::fs::read_to_string(&path).expect("read");
    assert!(raw.contains("redact_on_read = false"), "toml: {raw}");
    assert!(!PolicyStore::load(&path).expect("reload").get().redact_on_read);
}

#[cfg(unix)]
#[test]
fn symlinked_policy_file_is_rejected() {
    let ws = Workspace::new();
    let real = ws.dir.path().join("real.json");
    std::fs::write(&real, "{}").expect("write");
    std::os::unix::fs::symlink(&real, ws.policy_path()).expect("symlink");

    match PolicyStore::load(ws.policy_path()).expect_err("symlink") {
        Error::PolicyLoad(message) => assert!(message.contains("symlink")),
        other => panic!("unexpected error: {other:?}"),
    }
}
