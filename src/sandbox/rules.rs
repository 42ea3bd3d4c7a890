use std::path::Path;

use globset::{GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};
use crate::policy::Policy;

/// Compiled allow/deny rules of a [`Policy`].
///
/// Deny rules always win: an extension or glob listed on both sides is denied.
#[derive(Debug, Clone)]
pub struct PathRules {
    allow: Option<GlobSet>,
    deny: GlobSet,
    allow_extensions: Vec<String>,
    deny_extensions: Vec<String>,
}

fn compile_globs(field: &str, patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = crate::path_utils::build_glob(pattern).map_err(|err| {
            Error::InvalidPolicy(format!("invalid {field} glob {pattern:?}: {err}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| Error::InvalidPolicy(format!("invalid {field}: {err}")))
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

/// The `.ext` suffix of the final component (`.env` and `Makefile` have none).
fn suffix(path: &Path) -> Option<String> {
    path.extension().map(|ext| format!(".{}", ext.to_string_lossy()))
}

impl PathRules {
    pub fn compile(policy: &Policy) -> Result<Self> {
        let allow = if policy.allow_globs.is_empty() {
            None
        } else {
            Some(compile_globs("allow_globs", &policy.allow_globs)?)
        };
        let deny = compile_globs("deny_globs", &policy.deny_globs)?;
        Ok(Self {
            allow,
            deny,
            allow_extensions: policy
                .allow_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            deny_extensions: policy
                .deny_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
        })
    }

    /// Decides whether `path` (absolute, already resolved inside `root_dir`) may be read.
    ///
    /// Paths that cannot be expressed relative to `root_dir` are denied.
    pub fn is_allowed(&self, path: &Path, root_dir: &Path) -> bool {
        match crate::path_utils::relative_to(path, root_dir) {
            Some(relative) => self.is_allowed_relative(&relative),
            None => false,
        }
    }

    /// Same decision for a path already expressed relative to the sandbox root.
    pub fn is_allowed_relative(&self, relative: &Path) -> bool {
        let ext = suffix(relative);
        if let Some(ext) = &ext
            && self.deny_extensions.contains(ext)
        {
            return false;
        }
        if !self.allow_extensions.is_empty() {
            match &ext {
                Some(ext) if self.allow_extensions.contains(ext) => {}
                _ => return false,
            }
        }

        let Some(relative) = crate::path_utils::to_posix(relative) else {
            return false;
        };
        if self.deny.is_match(relative.as_str()) {
            return false;
        }
        match &self.allow {
            Some(allow) => allow.is_match(relative.as_str()),
            None => true,
        }
    }
}

/// One-shot form of [`PathRules::is_allowed`] for callers holding only a policy.
///
/// Both `path` and the root are compared in canonical form when they exist on disk.
pub fn is_allowed(path: &Path, policy: &Policy) -> Result<bool> {
    let rules = PathRules::compile(policy)?;
    let root = policy
        .root_dir
        .canonicalize()
        .unwrap_or_else(|_| policy.root_dir.clone());
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Ok(rules.is_allowed(&path, &root))
}
