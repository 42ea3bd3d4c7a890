use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::audit::{AuditLog, Outcome};
use crate::detect::{EngineDetector, EntityRecognizer, Finding, PiiDetector, RegexDetector};
use crate::error::Result;
use crate::policy::Policy;
use crate::policy_io::PolicyStore;

use super::{
    CopyRedactedRequest, CopyRedactedResponse, Guardian, ListDirRequest, ListDirResponse,
    ReadResourceRequest, SafeReadRequest, SafeReadResponse, ScanTextRequest, ScanTextResponse,
    SetPolicyRequest,
};

/// Where a [`Guardian`] keeps its state on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardianConfig {
    pub policy_path: PathBuf,
    pub audit_path: PathBuf,
    /// Fixed destination directory for `copy_redacted_file`.
    pub output_dir: PathBuf,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from("policy.json"),
            audit_path: PathBuf::from("logs/requests.jsonl"),
            output_dir: PathBuf::from("redacted"),
        }
    }
}

impl Guardian {
    pub fn new(config: GuardianConfig) -> Result<Self> {
        let policy = PolicyStore::load(&config.policy_path)?;
        Self::from_parts(policy, AuditLog::new(config.audit_path), config.output_dir)
    }

    pub fn from_parts(
        policy: PolicyStore,
        audit: AuditLog,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            policy,
            audit,
            regex: RegexDetector::new()?,
            engine: EngineDetector::unavailable(),
            output_dir: output_dir.into(),
        })
    }

    /// Registers the external engine used when the policy sets `use_entity_engine`.
    ///
    /// The language is taken from the policy on every call.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        self.engine = EngineDetector::new(recognizer, "");
        self
    }

    pub fn policy_store(&self) -> &PolicyStore {
        &self.policy
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn get_policy(&self) -> Result<Policy> {
        super::get_policy(self)
    }

    pub fn set_policy(&self, request: SetPolicyRequest) -> Result<Policy> {
        super::set_policy(self, request)
    }

    pub fn list_dir(&self, request: ListDirRequest) -> Result<ListDirResponse> {
        super::list_dir(self, request)
    }

    pub fn scan_text(&self, request: ScanTextRequest) -> Result<ScanTextResponse> {
        super::scan_text(self, request)
    }

    pub fn safe_read_file(&self, request: SafeReadRequest) -> Result<SafeReadResponse> {
        super::safe_read_file(self, request)
    }

    pub fn copy_redacted_file(&self, request: CopyRedactedRequest) -> Result<CopyRedactedResponse> {
        super::copy_redacted_file(self, request)
    }

    pub fn read_resource(&self, request: ReadResourceRequest) -> Result<String> {
        super::read_resource(self, request)
    }

    /// Runs the detector the policy selects; the choice is made per call.
    pub(super) fn detect(&self, text: &str, policy: &Policy) -> Vec<Finding> {
        if policy.use_entity_engine {
            self.engine
                .with_language(&policy.engine_language)
                .detect(text, &policy.engine_entities)
        } else {
            self.regex.detect(text, &policy.engine_entities)
        }
    }

    /// Writes the audit record for `operation` and passes `result` through.
    ///
    /// A failed audit write fails a successful operation. On the failure path it is logged and
    /// the original error is returned.
    pub(super) fn finish<T>(
        &self,
        operation: &'static str,
        mut fields: Map<String, Value>,
        result: Result<T>,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                self.audit.append(operation, Outcome::Ok, fields)?;
                tracing::debug!(operation, "request completed");
                Ok(value)
            }
            Err(err) => {
                let outcome = if err.is_denial() {
                    tracing::warn!(operation, code = err.code(), "request denied");
                    Outcome::Denied
                } else {
                    tracing::debug!(operation, code = err.code(), "request failed");
                    Outcome::Error
                };
                fields.insert("error".to_string(), Value::from(err.code()));
                if let Err(audit_err) = self.audit.append(operation, outcome, fields) {
                    tracing::error!(
                        operation,
                        error = %audit_err,
                        "failed to audit failed request"
                    );
                }
                Err(err)
            }
        }
    }
}

pub(super) fn record(fields: &mut Map<String, Value>, key: &str, value: impl Into<Value>) {
    fields.insert(key.to_string(), value.into());
}
