use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::detect::Finding;
use crate::error::{Error, Result};
use crate::policy_io::PolicySnapshot;
use crate::redaction::redact;
use crate::sandbox::{self, SandboxPath, URI_SCHEME};

use super::Guardian;
use super::context::record;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeReadRequest {
    pub relpath: String,
    /// Read cap; `None` or `0` means the policy's `max_bytes`, larger values are clamped to it.
    #[serde(default)]
    pub max_bytes: Option<u64>,
    /// Overrides the policy's `redact_on_read`.
    #[serde(default)]
    pub redact: Option<bool>,
}

impl SafeReadRequest {
    pub fn new(relpath: impl Into<String>) -> Self {
        Self {
            relpath: relpath.into(),
            max_bytes: None,
            redact: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeReadResponse {
    pub relpath: String,
    pub content: String,
    /// `true` when the file was longer than the effective cap.
    pub snipped: bool,
    pub findings: Vec<Finding>,
    pub redactions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceRequest {
    /// `privacy://<relpath>` or a bare relpath.
    pub uri: String,
}

pub fn safe_read_file(ctx: &Guardian, request: SafeReadRequest) -> Result<SafeReadResponse> {
    let mut fields = Map::new();
    record(&mut fields, "relpath", request.relpath.clone());
    let result = read_guarded(ctx, &request, &mut fields);
    ctx.finish("safe_read_file", fields, result)
}

/// Read-only resource view: `safe_read_file` with default parameters, content only.
pub fn read_resource(ctx: &Guardian, request: ReadResourceRequest) -> Result<String> {
    let relpath = request
        .uri
        .strip_prefix(URI_SCHEME)
        .unwrap_or(&request.uri)
        .to_string();
    let mut fields = Map::new();
    record(&mut fields, "relpath", relpath.clone());
    let result = read_guarded(ctx, &SafeReadRequest::new(relpath), &mut fields)
        .map(|response| response.content);
    ctx.finish("read_resource", fields, result)
}

/// Resolves `relpath` to an existing, policy-allowed regular file.
///
/// Escapes are reported before existence, and existence before policy.
pub(super) fn resolve_readable(snapshot: &PolicySnapshot, relpath: &str) -> Result<SandboxPath> {
    let path = sandbox::resolve(Path::new(relpath), &snapshot.policy().root_dir)?;
    if !path.is_file() {
        return Err(Error::NotFound {
            path: path.relative().to_path_buf(),
        });
    }
    if !snapshot.is_allowed(&path) {
        return Err(Error::PermissionDenied {
            path: path.relative().to_path_buf(),
        });
    }
    Ok(path)
}

fn read_guarded(
    ctx: &Guardian,
    request: &SafeReadRequest,
    fields: &mut Map<String, Value>,
) -> Result<SafeReadResponse> {
    let snapshot = ctx.policy.snapshot();
    let policy = snapshot.policy();
    let path = resolve_readable(&snapshot, &request.relpath)?;

    let cap = match request.max_bytes {
        None | Some(0) => policy.max_bytes,
        Some(requested) => requested.min(policy.max_bytes),
    };
    let bounded = sandbox::read_bounded(path.absolute(), path.relative(), cap)?;
    let findings = ctx.detect(&bounded.text, policy);

    let mut content = bounded.text;
    let mut redactions = 0;
    if request.redact.unwrap_or(policy.redact_on_read) && !findings.is_empty() {
        (content, redactions) = redact(&content, &findings, policy.token_char());
    }

    record(fields, "relpath", path.relpath());
    record(fields, "snipped", bounded.truncated);
    record(fields, "bytes_read", bounded.bytes_read);
    record(fields, "findings", findings.len());
    record(fields, "redactions", redactions);

    Ok(SafeReadResponse {
        relpath: path.relpath(),
        content,
        snipped: bounded.truncated,
        findings,
        redactions,
    })
}
