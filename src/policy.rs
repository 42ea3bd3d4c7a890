use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Enforcement policy for the sandbox, the detector, and the redactor.
///
/// Every field has a built-in default so a persisted file only needs the fields it overrides.
/// Fields this crate does not know about are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Sandbox boundary. Always absolute once a [`crate::policy_io::PolicyStore`] has loaded it.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    #[serde(default = "default_allow_globs")]
    pub allow_globs: Vec<String>,
    #[serde(default = "default_deny_globs")]
    pub deny_globs: Vec<String>,
    #[serde(default = "default_allow_extensions")]
    pub allow_extensions: Vec<String>,
    #[serde(default = "default_deny_extensions")]
    pub deny_extensions: Vec<String>,
    /// Read cap in bytes; longer files are truncated, not rejected.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_redact_on_read")]
    pub redact_on_read: bool,
    /// Selects the external entity-recognition engine instead of the regex battery.
    #[serde(default, alias = "use_presidio")]
    pub use_entity_engine: bool,
    /// Entity kinds requested from the external engine. Ignored by the regex battery.
    #[serde(default = "default_engine_entities", alias = "presidio_entities")]
    pub engine_entities: Vec<String>,
    #[serde(default = "default_engine_language")]
    pub engine_language: String,
    /// Single character repeated over each redacted span.
    #[serde(default = "default_redaction_token")]
    pub redaction_token: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("sandbox")
}

fn default_allow_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.json".to_string(),
    ]
}

fn default_deny_globs() -> Vec<String> {
    vec![
        "**/.env".to_string(),
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}

fn default_allow_extensions() -> Vec<String> {
    vec![".txt".to_string(), ".md".to_string(), ".json".to_string()]
}

fn default_deny_extensions() -> Vec<String> {
    vec![
        ".pem".to_string(),
        ".key".to_string(),
        ".pfx".to_string(),
        ".crt".to_string(),
    ]
}

const fn default_max_bytes() -> u64 {
    2_000_000
}

const fn default_redact_on_read() -> bool {
    true
}

fn default_engine_entities() -> Vec<String> {
    [
        "PERSON",
        "EMAIL_ADDRESS",
        "PHONE_NUMBER",
        "CREDIT_CARD",
        "LOCATION",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_engine_language() -> String {
    "en".to_string()
}

fn default_redaction_token() -> String {
    "█".to_string()
}

// Hard caps are policy-level guardrails against misconfiguration.
const MAX_BYTES_HARD_CAP: u64 = 256 * 1024 * 1024;
const MAX_GLOBS: usize = 512;
const MAX_GLOB_PATTERN_BYTES: usize = 4 * 1024;

impl Default for Policy {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            allow_globs: default_allow_globs(),
            deny_globs: default_deny_globs(),
            allow_extensions: default_allow_extensions(),
            deny_extensions: default_deny_extensions(),
            max_bytes: default_max_bytes(),
            redact_on_read: default_redact_on_read(),
            use_entity_engine: false,
            engine_entities: default_engine_entities(),
            engine_language: default_engine_language(),
            redaction_token: default_redaction_token(),
            extra: BTreeMap::new(),
        }
    }
}

fn validate_globs(field: &str, patterns: &[String]) -> Result<()> {
    if patterns.len() > MAX_GLOBS {
        return Err(Error::InvalidPolicy(format!(
            "{field}: too many patterns ({} > {MAX_GLOBS})",
            patterns.len()
        )));
    }
    for (idx, pattern) in patterns.iter().enumerate() {
        if pattern.trim().is_empty() {
            return Err(Error::InvalidPolicy(format!(
                "{field}[{idx}]: glob pattern must not be empty"
            )));
        }
        if pattern.len() > MAX_GLOB_PATTERN_BYTES {
            return Err(Error::InvalidPolicy(format!(
                "{field}[{idx}]: glob pattern too long ({} bytes > {MAX_GLOB_PATTERN_BYTES} bytes)",
                pattern.len()
            )));
        }
    }
    Ok(())
}

impl Policy {
    /// A default policy rooted at `root_dir`.
    pub fn rooted_at(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Structural validation only; glob syntax is checked when the rules are compiled.
    pub fn validate(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::InvalidPolicy("root_dir is empty".to_string()));
        }
        if self.max_bytes == 0 {
            return Err(Error::InvalidPolicy("max_bytes must be > 0".to_string()));
        }
        if self.max_bytes > MAX_BYTES_HARD_CAP {
            return Err(Error::InvalidPolicy(format!(
                "max_bytes must be <= {MAX_BYTES_HARD_CAP}"
            )));
        }
        if self.redaction_token.chars().count() != 1 {
            return Err(Error::InvalidPolicy(format!(
                "redaction_token must be exactly one character, got {:?}",
                self.redaction_token
            )));
        }
        validate_globs("allow_globs", &self.allow_globs)?;
        validate_globs("deny_globs", &self.deny_globs)?;
        if self.use_entity_engine && self.engine_language.trim().is_empty() {
            return Err(Error::InvalidPolicy(
                "engine_language must not be empty when use_entity_engine is set".to_string(),
            ));
        }
        Ok(())
    }

    /// The masking character. Falls back to `█` if the policy was built without validation.
    pub fn token_char(&self) -> char {
        self.redaction_token.chars().next().unwrap_or('█')
    }

    /// Resolves `root_dir` to an absolute path, relative entries anchored at `base`.
    ///
    /// The deepest existing ancestor is canonicalized and any missing tail appended, so a policy
    /// loads before its sandbox is created and still names the root the way the filesystem does.
    pub fn resolve_root(&mut self, base: &Path) {
        let joined = if self.root_dir.is_absolute() {
            self.root_dir.clone()
        } else {
            base.join(&self.root_dir)
        };
        self.root_dir = crate::sandbox::canonicalize_lenient(&joined)
            .unwrap_or_else(|_| crate::path_utils::normalize_path_lexical(&joined));
    }
}
