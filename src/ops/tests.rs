use std::path::Path;

use serde_json::{Value, json};

use crate::audit::{AuditLog, verify_chain};
use crate::error::Error;
use crate::policy::Policy;
use crate::policy_io::PolicyStore;

use super::*;

struct Fixture {
    _dir: tempfile::TempDir,
    guardian: Guardian,
    root: std::path::PathBuf,
    audit_path: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("sandbox");
    std::fs::create_dir(&root).expect("mkdir");
    let audit_path = dir.path().join("logs/requests.jsonl");
    let store = PolicyStore::with_policy(dir.path().join("policy.json"), Policy::rooted_at(&root))
        .expect("store");
    let guardian = Guardian::from_parts(store, AuditLog::new(&audit_path), dir.path().join("out"))
        .expect("guardian");
    Fixture {
        root: root.canonicalize().expect("canonicalize"),
        _dir: dir,
        guardian,
        audit_path,
    }
}

fn audit_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .expect("read audit")
        .lines()
        .map(|line| serde_json::from_str(line).expect("audit json"))
        .collect()
}

#[test]
fn every_action_appends_one_record() {
    let fx = fixture();
    std::fs::write(fx.root.join("a.txt"), "hello").expect("write");

    fx.guardian.get_policy().expect("get_policy");
    fx.guardian
        .list_dir(ListDirRequest::default())
        .expect("list_dir");
    fx.guardian
        .scan_text(ScanTextRequest {
            text: "no pii here".to_string(),
        })
        .expect("scan_text");
    fx.guardian
        .safe_read_file(SafeReadRequest::new("a.txt"))
        .expect("safe_read_file");
    let _ = fx.guardian.safe_read_file(SafeReadRequest::new("missing.txt"));

    let lines = audit_lines(&fx.audit_path);
    let operations = lines
        .iter()
        .map(|line| line["operation"].as_str().expect("operation").to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        operations,
        vec![
            "get_policy",
            "list_dir",
            "scan_text",
            "safe_read_file",
            "safe_read_file"
        ]
    );
    assert_eq!(lines[4]["outcome"], "error");
    assert_eq!(lines[4]["error"], "not_found");
    assert!(verify_chain(&fx.audit_path).expect("verify").is_intact());
}

#[test]
fn scan_text_audits_counts_not_content() {
    let fx = fixture();
    let response = fx
        .guardian
        .scan_text(ScanTextRequest {
            text: "reach me at bob@example.org".to_string(),
        })
        .expect("scan_text");
    assert_eq!(response.findings.len(), 1);

    let raw = std::fs::read_to_string(&fx.audit_path).expect("read audit");
    assert!(!raw.contains("bob@example.org"), "audit leaked PII: {raw}");
    assert_eq!(audit_lines(&fx.audit_path)[0]["findings"], 1);
}

#[test]
fn set_policy_audits_key_names_only() {
    let fx = fixture();
    let patch = json!({"redaction_token": "#", "max_bytes": 64});
    let Value::Object(patch) = patch else {
        panic!("object");
    };
    let updated = fx
        .guardian
        .set_policy(SetPolicyRequest { patch })
        .expect("set_policy");
    assert_eq!(updated.redaction_token, "#");
    assert_eq!(updated.max_bytes, 64);

    let line = &audit_lines(&fx.audit_path)[0];
    assert_eq!(line["keys"], json!(["max_bytes", "redaction_token"]));
    assert!(line.get("max_bytes").is_none());
}

#[test]
fn rejected_patch_is_audited_and_keeps_policy() {
    let fx = fixture();
    let Value::Object(patch) = json!({"max_bytes": 0}) else {
        panic!("object");
    };
    match fx
        .guardian
        .set_policy(SetPolicyRequest { patch })
        .expect_err("invalid")
    {
        Error::InvalidPolicy(_) => {}
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fx.guardian.policy_store().get().max_bytes, 2_000_000);
    assert_eq!(audit_lines(&fx.audit_path)[0]["error"], "invalid_policy");
}

#[test]
fn engine_selection_is_per_call() {
    use std::sync::Arc;

    use crate::detect::{EntityRecognizer, RecognizedSpan};

    struct Names;
    impl EntityRecognizer for Names {
        fn analyze(
            &self,
            text: &str,
            _entities: &[String],
            language: &str,
        ) -> crate::Result<Vec<RecognizedSpan>> {
            assert_eq!(language, "fr");
            Ok(text
                .find("Alice")
                .map(|start| RecognizedSpan {
                    entity_kind: "PERSON".to_string(),
                    start,
                    end: start + 5,
                })
                .into_iter()
                .collect())
        }
    }

    let fx = fixture();
    let guardian = fx.guardian.with_recognizer(Arc::new(Names));
    let text = "Alice: alice@example.com";

    let regex = guardian
        .scan_text(ScanTextRequest {
            text: text.to_string(),
        })
        .expect("scan");
    assert_eq!(regex.findings[0].entity_kind, "EMAIL");

    let Value::Object(patch) = json!({"use_entity_engine": true, "engine_language": "fr"}) else {
        panic!("object");
    };
    guardian
        .set_policy(SetPolicyRequest { patch })
        .expect("set_policy");
    let engine = guardian
        .scan_text(ScanTextRequest {
            text: text.to_string(),
        })
        .expect("scan");
    assert_eq!(engine.findings.len(), 1);
    assert_eq!(engine.findings[0].entity_kind, "PERSON");
    assert_eq!(engine.findings[0].matched_text, "Alice");
}

#[test]
fn missing_engine_degrades_to_no_findings() {
    let fx = fixture();
    let Value::Object(patch) = json!({"use_presidio": true}) else {
        panic!("object");
    };
    fx.guardian
        .set_policy(SetPolicyRequest { patch })
        .expect("set_policy");
    let response = fx
        .guardian
        .scan_text(ScanTextRequest {
            text: "alice@example.com".to_string(),
        })
        .expect("scan");
    assert!(response.findings.is_empty());
}

#[test]
fn dispatch_routes_actions_and_rejects_unknown_ones() {
    let fx = fixture();
    std::fs::write(fx.root.join("note.txt"), "id 123-456-789").expect("write");

    let read = dispatch::invoke(
        &fx.guardian,
        "safe_read_file",
        json!({"relpath": "note.txt"}),
    )
    .expect("invoke");
    assert_eq!(read["redactions"], 1);
    assert_eq!(read["snipped"], false);

    let resource = dispatch::invoke(
        &fx.guardian,
        "read_resource",
        json!({"uri": "privacy://note.txt"}),
    )
    .expect("invoke");
    assert_eq!(resource, Value::String(format!("id {}", "█".repeat(11))));

    let listing = dispatch::invoke(&fx.guardian, "list_dir", Value::Null).expect("invoke");
    assert_eq!(listing["items"][0]["uri"], "privacy://note.txt");

    match dispatch::invoke(&fx.guardian, "delete_everything", Value::Null).expect_err("unknown") {
        Error::InvalidRequest(msg) => assert!(msg.contains("get_policy")),
        other => panic!("unexpected error: {other:?}"),
    }
    match dispatch::invoke(&fx.guardian, "scan_text", json!({"txt": 1})).expect_err("bad params") {
        Error::InvalidRequest(msg) => assert!(msg.contains("scan_text")),
        other => panic!("unexpected error: {other:?}"),
    }
}
