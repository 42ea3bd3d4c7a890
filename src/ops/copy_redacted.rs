use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::detect::Finding;
use crate::error::{Error, Result};
use crate::redaction::redact;
use crate::sandbox;

use super::Guardian;
use super::context::record;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRedactedRequest {
    pub relpath: String,
    /// Destination inside the output directory; defaults to `<source name>.redacted.txt`.
    #[serde(default)]
    pub out_relpath: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRedactedResponse {
    /// Destination as the output directory was configured plus the relative name.
    pub dest: PathBuf,
    pub redactions: usize,
    pub findings: Vec<Finding>,
    pub snipped: bool,
}

/// Writes a redacted copy of a sandbox file into the fixed output directory.
///
/// Redaction is unconditional here; `redact_on_read` only governs `safe_read_file`.
pub fn copy_redacted_file(
    ctx: &Guardian,
    request: CopyRedactedRequest,
) -> Result<CopyRedactedResponse> {
    let mut fields = Map::new();
    record(&mut fields, "src", request.relpath.clone());
    if let Some(out) = &request.out_relpath {
        record(&mut fields, "dest", out.clone());
    }
    let result = copy_inner(ctx, &request, &mut fields);
    ctx.finish("copy_redacted_file", fields, result)
}

fn copy_inner(
    ctx: &Guardian,
    request: &CopyRedactedRequest,
    fields: &mut Map<String, Value>,
) -> Result<CopyRedactedResponse> {
    let snapshot = ctx.policy.snapshot();
    let policy = snapshot.policy();
    let source = super::read::resolve_readable(&snapshot, &request.relpath)?;

    let out_name = match &request.out_relpath {
        Some(out) if !out.trim().is_empty() => PathBuf::from(out),
        _ => {
            let name = source.file_name().ok_or_else(|| {
                Error::InvalidPath(format!("{} has no file name", source.relpath()))
            })?;
            let mut name = name.to_os_string();
            name.push(".redacted.txt");
            PathBuf::from(name)
        }
    };

    fs::create_dir_all(&ctx.output_dir)
        .map_err(|err| Error::io_path("create_dir", &ctx.output_dir, err))?;
    let dest = sandbox::resolve(&out_name, &ctx.output_dir)?;
    if dest.is_dir() || dest.relpath() == "." {
        return Err(Error::InvalidPath(format!(
            "destination {} is a directory",
            dest.relpath()
        )));
    }

    let bounded = sandbox::read_bounded(source.absolute(), source.relative(), policy.max_bytes)?;
    let findings = ctx.detect(&bounded.text, policy);
    let (redacted, redactions) = redact(&bounded.text, &findings, policy.token_char());
    sandbox::write_bytes_atomic(dest.absolute(), dest.relative(), redacted.as_bytes())?;

    let dest_display = ctx.output_dir.join(dest.relative());
    tracing::debug!(
        src = %source.relpath(),
        dest = %dest.relpath(),
        redactions,
        "redacted copy written"
    );

    record(fields, "src", source.relpath());
    record(fields, "dest", path_string(&dest_display));
    record(fields, "snipped", bounded.truncated);
    record(fields, "findings", findings.len());
    record(fields, "redactions", redactions);

    Ok(CopyRedactedResponse {
        dest: dest_display,
        redactions,
        findings,
        snipped: bounded.truncated,
    })
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
