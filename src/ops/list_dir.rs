use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::{Error, Result};
use crate::sandbox;

use super::Guardian;
use super::context::record;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDirRequest {
    /// Directory relative to the sandbox root; empty means the root.
    #[serde(default)]
    pub relpath: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDirEntry {
    /// File name; directories carry a trailing `/`.
    pub name: String,
    pub relpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub dir: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDirResponse {
    /// The listed directory, relative to the sandbox root.
    pub relpath: String,
    pub items: Vec<ListDirEntry>,
}

/// Lists the immediate children of a sandbox directory.
///
/// Directories are always listed. Files appear only when the policy allows them. Children whose
/// resolution leaves the root (symlinks pointing outside) are omitted.
pub fn list_dir(ctx: &Guardian, request: ListDirRequest) -> Result<ListDirResponse> {
    let mut fields = Map::new();
    record(&mut fields, "relpath", request.relpath.clone());
    let result = list_dir_inner(ctx, &request);
    if let Ok(response) = &result {
        record(&mut fields, "relpath", response.relpath.clone());
        record(&mut fields, "returned", response.items.len());
    }
    ctx.finish("list_dir", fields, result)
}

fn list_dir_inner(ctx: &Guardian, request: &ListDirRequest) -> Result<ListDirResponse> {
    let snapshot = ctx.policy.snapshot();
    let root = snapshot.policy().root_dir.as_path();

    let dir = sandbox::resolve(Path::new(&request.relpath), root)?;
    if !dir.exists() {
        return Err(Error::NotFound {
            path: dir.relative().to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(Error::NotADirectory {
            path: dir.relative().to_path_buf(),
        });
    }

    let mut rows = fs::read_dir(dir.absolute())
        .map_err(|err| Error::io_path("read_dir", dir.relative(), err))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|err| Error::io_path("read_dir", dir.relative(), err))?;
    rows.sort_by_key(|entry| entry.file_name());

    let mut items = Vec::<ListDirEntry>::new();
    for entry in rows {
        let name = entry.file_name().to_string_lossy().into_owned();
        let child = match sandbox::resolve(&dir.relative().join(entry.file_name()), root) {
            Ok(child) => child,
            Err(err) => {
                tracing::debug!(name = %name, code = err.code(), "skipping unresolvable entry");
                continue;
            }
        };

        if child.is_dir() {
            items.push(ListDirEntry {
                name: format!("{name}/"),
                relpath: child.relpath(),
                uri: None,
                dir: true,
            });
        } else if child.is_file() && snapshot.is_allowed(&child) {
            items.push(ListDirEntry {
                name,
                relpath: child.relpath(),
                uri: Some(child.uri()),
                dir: false,
            });
        }
    }

    Ok(ListDirResponse {
        relpath: dir.relpath(),
        items,
    })
}
