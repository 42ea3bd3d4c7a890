//! Append-only, hash-chained audit log.
//!
//! One JSON object per line. Every record carries `prev_hash` (the previous record's `hash`,
//! `null` for the first) and its own `hash`:
//!
//! `hash = hex(sha256(prev_hash_or_empty || canonical_json(record without "hash")))`
//!
//! where canonical JSON has recursively sorted keys and no insignificant whitespace.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// How an audited operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Denied,
    Error,
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: String,
    pub operation: String,
    pub outcome: Outcome,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub prev_hash: Option<String>,
    pub hash: String,
}

/// Result of [`verify_chain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// Complete lines examined.
    pub records: usize,
    /// 1-based line numbers whose link or hash does not verify, or that do not parse.
    pub broken: Vec<usize>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.broken.is_empty()
    }
}

/// Serializes `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort_unstable();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Hash of a record body (everything except `hash`) chained onto `prev_hash`.
fn chain_hash(prev_hash: Option<&str>, body: &Value) -> String {
    let mut input = prev_hash.unwrap_or_default().to_string();
    input.push_str(&canonical_json(body));
    sha256_hex(input.as_bytes())
}

/// Writer for one audit log file.
///
/// Appends are serialized by an internal mutex; the last hash is read from disk once and then
/// tracked in memory. A single process is assumed to own the file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    // `None` until the tail of the file has been read.
    last_hash: Mutex<Option<Option<String>>>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_hash: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record for `operation` and returns it as written.
    ///
    /// `fields` must not contain raw file content or matched PII; reserved keys (`ts`,
    /// `operation`, `outcome`, `prev_hash`, `hash`) are overwritten.
    pub fn append(
        &self,
        operation: &str,
        outcome: Outcome,
        fields: Map<String, Value>,
    ) -> Result<AuditRecord> {
        let mut last_hash = self.last_hash.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io_path("create_dir", &self.path, err))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| Error::io_path("open", &self.path, err))?;

        let needs_newline = ends_without_newline(&mut file)
            .map_err(|err| Error::io_path("read", &self.path, err))?;
        let prev_hash = match last_hash.as_ref() {
            Some(cached) => cached.clone(),
            None => read_last_hash(&self.path)?,
        };

        let mut body = fields;
        for reserved in ["ts", "operation", "outcome", "prev_hash", "hash"] {
            body.remove(reserved);
        }
        let mut record = AuditRecord {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            operation: operation.to_string(),
            outcome,
            fields: body,
            prev_hash,
            hash: String::new(),
        };
        let mut value = serde_json::to_value(&record)?;
        if let Value::Object(map) = &mut value {
            map.remove("hash");
        }
        record.hash = chain_hash(record.prev_hash.as_deref(), &value);

        let mut line = String::new();
        if needs_newline {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(&record)?);
        line.push('\n');
        file.write_all(line.as_bytes())
            .map_err(|err| Error::io_path("write", &self.path, err))?;
        file.flush()
            .map_err(|err| Error::io_path("flush", &self.path, err))?;

        *last_hash = Some(Some(record.hash.clone()));
        tracing::debug!(operation, outcome = ?outcome, "audit record appended");
        Ok(record)
    }
}

fn ends_without_newline(file: &mut fs::File) -> std::io::Result<bool> {
    let len = file.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// `hash` of the final complete record, or `None` if the log is empty or its tail is unreadable.
fn read_last_hash(path: &Path) -> Result<Option<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::io_path("read", path, err)),
    };
    let text = String::from_utf8_lossy(&bytes);
    let Some(last) = text.lines().rev().find(|line| !line.trim().is_empty()) else {
        return Ok(None);
    };
    let hash = serde_json::from_str::<Value>(last)
        .ok()
        .and_then(|value| value.get("hash").and_then(Value::as_str).map(str::to_string));
    if hash.is_none() {
        tracing::warn!(
            path = %path.display(),
            "last audit line is unreadable; starting a new chain segment"
        );
    }
    Ok(hash)
}

/// Recomputes every hash and link in the log at `path`.
///
/// A missing file is an empty, intact chain. A final line without a trailing newline is a torn
/// write and is ignored; any other unparsable line is reported as broken.
pub fn verify_chain(path: &Path) -> Result<ChainReport> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ChainReport::default());
        }
        Err(err) => return Err(Error::io_path("read", path, err)),
    };
    let text = String::from_utf8_lossy(&bytes);
    let terminated = text.ends_with('\n');
    let lines = text.split('\n').collect::<Vec<_>>();
    let complete = if terminated {
        lines.len() - 1
    } else {
        lines.len().saturating_sub(1)
    };

    let mut report = ChainReport::default();
    // `None` once a corrupt line makes the expected link unknown.
    let mut expected_prev: Option<Option<String>> = Some(None);
    for (idx, line) in lines.iter().take(complete).enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        report.records += 1;

        let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(line) else {
            report.broken.push(line_no);
            expected_prev = None;
            continue;
        };
        let stored_hash = map
            .remove("hash")
            .and_then(|value| value.as_str().map(str::to_string));
        let prev_hash = match map.get("prev_hash") {
            Some(Value::String(prev)) => Some(prev.clone()),
            _ => None,
        };

        let recomputed = chain_hash(prev_hash.as_deref(), &Value::Object(map));
        let hash_ok = stored_hash.as_deref() == Some(recomputed.as_str());
        let link_ok = expected_prev
            .as_ref()
            .is_none_or(|expected| *expected == prev_hash);
        if !hash_ok || !link_ok {
            report.broken.push(line_no);
        }
        expected_prev = Some(stored_hash);
    }
    Ok(report)
}
