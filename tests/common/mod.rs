#![allow(dead_code)]

use std::path::{Path, PathBuf};

use privacy_guard::{Guardian, GuardianConfig};

/// A scratch workspace: `policy.json`, `sandbox/`, `logs/requests.jsonl`, `redacted/`.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("sandbox")).expect("mkdir sandbox");
        Self { dir }
    }

    /// Same as [`Workspace::new`] with a policy file holding `policy_json`.
    pub fn with_policy(policy_json: &str) -> Self {
        let ws = Self::new();
        std::fs::write(ws.policy_path(), policy_json).expect("write policy");
        ws
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("sandbox")
    }

    pub fn policy_path(&self) -> PathBuf {
        self.dir.path().join("policy.json")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.dir.path().join("logs/requests.jsonl")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("redacted")
    }

    pub fn write(&self, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir parent");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    pub fn guardian(&self) -> Guardian {
        Guardian::new(GuardianConfig {
            policy_path: self.policy_path(),
            audit_path: self.audit_path(),
            output_dir: self.output_dir(),
        })
        .expect("guardian")
    }

    pub fn audit_records(&self) -> Vec<serde_json::Value> {
        read_jsonl(&self.audit_path())
    }
}

pub fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .expect("read jsonl")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect()
}

pub fn patch(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("patch must be an object, got {other}"),
    }
}
