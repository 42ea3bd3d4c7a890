//! Policy Store: persisted policy file, in-memory snapshot, and patch-then-persist updates.
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::policy::Policy;
use crate::sandbox::{PathRules, SandboxPath};

const DEFAULT_MAX_POLICY_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Toml,
    Json,
}

impl PolicyFormat {
    /// `.toml` => TOML, anything else => JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// A validated policy together with its compiled path rules.
#[derive(Debug)]
pub struct PolicySnapshot {
    policy: Policy,
    rules: PathRules,
}

impl PolicySnapshot {
    pub fn new(policy: Policy) -> Result<Self> {
        policy.validate()?;
        let rules = PathRules::compile(&policy)?;
        Ok(Self { policy, rules })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn rules(&self) -> &PathRules {
        &self.rules
    }

    /// Policy decision for a path already resolved against the canonical root.
    pub fn is_allowed(&self, path: &SandboxPath) -> bool {
        self.rules.is_allowed_relative(path.relative())
    }
}

/// Parses raw policy text into the generic JSON tree both formats share.
pub fn parse_policy_value(raw: &str, format: PolicyFormat) -> Result<Map<String, Value>> {
    let value: Value = match format {
        PolicyFormat::Json => serde_json::from_str(raw)
            .map_err(|err| Error::PolicyLoad(format!("invalid json policy: {err}")))?,
        PolicyFormat::Toml => toml::from_str(raw)
            .map_err(|err| Error::PolicyLoad(format!("invalid toml policy: {err}")))?,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::PolicyLoad(format!(
            "policy must be an object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads the policy file if it exists.
///
/// Returns `Ok(None)` when the file is absent. Symlinks, non-regular files, oversized files,
/// and malformed content are `PolicyLoad` errors rather than a silent fallback to defaults.
pub fn read_policy_file(path: &Path, max_bytes: u64) -> Result<Option<Map<String, Value>>> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::io_path("metadata", path, err)),
    };
    if meta.file_type().is_symlink() {
        return Err(Error::PolicyLoad(format!(
            "path {} is a symlink; refusing to load policy from symlink paths",
            path.display()
        )));
    }
    if !meta.is_file() {
        return Err(Error::PolicyLoad(format!(
            "path {} is not a regular file",
            path.display()
        )));
    }

    let limit = max_bytes.saturating_add(1);
    let mut bytes = Vec::<u8>::new();
    std::fs::File::open(path)
        .map_err(|err| Error::io_path("open", path, err))?
        .take(limit)
        .read_to_end(&mut bytes)
        .map_err(|err| Error::io_path("read", path, err))?;
    if bytes.len() as u64 > max_bytes {
        return Err(Error::PolicyLoad(format!(
            "policy file is too large (max {max_bytes} bytes)"
        )));
    }

    let raw = std::str::from_utf8(&bytes)
        .map_err(|_| Error::PolicyLoad(format!("invalid utf-8 in {}", path.display())))?;
    parse_policy_value(raw, PolicyFormat::from_path(path)).map(Some)
}

const LEGACY_KEYS: [(&str, &str); 2] = [
    ("use_presidio", "use_entity_engine"),
    ("presidio_entities", "engine_entities"),
];

/// Shallow top-level merge; legacy key names replace their current counterparts.
fn merge_top_level(base: &mut Map<String, Value>, overrides: Map<String, Value>) {
    for (key, value) in overrides {
        let key = LEGACY_KEYS
            .iter()
            .find(|(legacy, _)| *legacy == key)
            .map_or(key, |(_, current)| (*current).to_string());
        base.insert(key, value);
    }
}

/// Overlays `overrides` onto the built-in defaults, field by field.
fn merge_over_defaults(overrides: Map<String, Value>) -> Result<Policy> {
    let mut merged = match serde_json::to_value(Policy::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    merge_top_level(&mut merged, overrides);
    serde_json::from_value(Value::Object(merged))
        .map_err(|err| Error::PolicyLoad(format!("invalid policy field: {err}")))
}

fn render_policy(policy: &Policy, format: PolicyFormat) -> Result<String> {
    let mut out = match format {
        PolicyFormat::Json => serde_json::to_string_pretty(policy)?,
        PolicyFormat::Toml => toml::to_string_pretty(policy).map_err(|err| {
            Error::InvalidPolicy(format!("policy is not representable as toml: {err}"))
        })?,
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Owns the active policy and its backing file.
///
/// Reads are lock-free clones of an `Arc` snapshot; patches are serialized so the
/// merge-validate-persist-swap sequence cannot interleave.
#[derive(Debug)]
pub struct PolicyStore {
    path: PathBuf,
    current: RwLock<Arc<PolicySnapshot>>,
    write_lock: Mutex<()>,
}

impl PolicyStore {
    /// Loads `path` merged over the defaults. A missing file yields the defaults (not written).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        Self::load_limited(path, DEFAULT_MAX_POLICY_BYTES)
    }

    pub fn load_limited(path: impl Into<PathBuf>, max_bytes: u64) -> Result<Self> {
        let path = path.into();
        let overrides = read_policy_file(&path, max_bytes)?.unwrap_or_default();
        let mut policy = merge_over_defaults(overrides)?;
        policy.resolve_root(&base_dir(&path));
        let snapshot = PolicySnapshot::new(policy)
            .map_err(|err| Error::PolicyLoad(format!("{}: {err}", path.display())))?;
        tracing::debug!(
            path = %path.display(),
            root = %snapshot.policy().root_dir.display(),
            "policy loaded"
        );
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
        })
    }

    /// Builds a store from an in-memory policy; the first patch creates the file at `path`.
    pub fn with_policy(path: impl Into<PathBuf>, mut policy: Policy) -> Result<Self> {
        let path = path.into();
        policy.resolve_root(&base_dir(&path));
        let snapshot = PolicySnapshot::new(policy)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot; stays valid even if a patch lands afterwards.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self) -> Policy {
        self.snapshot().policy().clone()
    }

    /// Shallow top-level merge of `patch`, validated, persisted, then made current.
    ///
    /// Nothing changes (in memory or on disk) if the merged policy is invalid.
    pub fn patch(&self, patch: Map<String, Value>) -> Result<Policy> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();

        let mut merged = match serde_json::to_value(current.policy())? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merge_top_level(&mut merged, patch);
        let mut policy: Policy = serde_json::from_value(Value::Object(merged))
            .map_err(|err| Error::InvalidPolicy(format!("invalid policy patch: {err}")))?;
        policy.resolve_root(&base_dir(&self.path));
        let snapshot = PolicySnapshot::new(policy)?;

        self.persist(snapshot.policy())?;
        let updated = snapshot.policy().clone();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        Ok(updated)
    }

    fn persist(&self, policy: &Policy) -> Result<()> {
        let rendered = render_policy(policy, PolicyFormat::from_path(&self.path))?;
        crate::sandbox::write_bytes_atomic(&self.path, &self.path, rendered.as_bytes())?;
        tracing::debug!(path = %self.path.display(), "policy persisted");
        Ok(())
    }
}

fn base_dir(policy_path: &Path) -> PathBuf {
    let parent = match policy_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::path::absolute(&parent).unwrap_or(parent)
}
