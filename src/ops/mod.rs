use std::path::PathBuf;

use crate::audit::AuditLog;
use crate::detect::{EngineDetector, RegexDetector};
use crate::policy_io::PolicyStore;

mod context;
mod copy_redacted;
pub mod dispatch;
mod list_dir;
mod policy;
mod read;
mod scan;

pub use context::GuardianConfig;
pub use copy_redacted::{CopyRedactedRequest, CopyRedactedResponse, copy_redacted_file};
pub use list_dir::{ListDirEntry, ListDirRequest, ListDirResponse, list_dir};
pub use policy::{SetPolicyRequest, get_policy, set_policy};
pub use read::{
    ReadResourceRequest, SafeReadRequest, SafeReadResponse, read_resource, safe_read_file,
};
pub use scan::{ScanTextRequest, ScanTextResponse, scan_text};

#[cfg(test)]
mod tests;

/// Operation façade: owns the policy store, the audit log, and both detectors.
///
/// Every action ends with exactly one audit record, whether it succeeds, is denied, or fails.
pub struct Guardian {
    policy: PolicyStore,
    audit: AuditLog,
    regex: RegexDetector,
    engine: EngineDetector,
    output_dir: PathBuf,
}

impl std::fmt::Debug for Guardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guardian")
            .field("policy_path", &self.policy.path())
            .field("audit_path", &self.audit.path())
            .field("engine", &self.engine)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}
