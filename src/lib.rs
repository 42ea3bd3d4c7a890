//! `privacy-guard` lets an external agent browse and read files inside one sandbox directory.
//!
//! Paths are confined to the policy root, files are filtered by allow/deny rules, PII in file
//! content is detected and optionally masked before it leaves the process, and every action is
//! recorded in a hash-chained audit log.

pub mod audit;
pub mod detect;
mod error;
pub mod ops;
pub mod path_utils;
pub mod policy;
pub mod policy_io;
pub mod redaction;
pub mod sandbox;

pub use error::{Error, Result};

pub use audit::{AuditLog, AuditRecord, ChainReport, Outcome, verify_chain};
pub use detect::{
    EngineDetector, EntityRecognizer, Finding, PiiDetector, RecognizedSpan, RegexDetector,
};
pub use ops::{
    CopyRedactedRequest, CopyRedactedResponse, Guardian, GuardianConfig, ListDirEntry,
    ListDirRequest, ListDirResponse, ReadResourceRequest, SafeReadRequest, SafeReadResponse,
    ScanTextRequest, ScanTextResponse, SetPolicyRequest,
};
pub use policy::Policy;
pub use policy_io::{PolicyFormat, PolicySnapshot, PolicyStore};
pub use redaction::redact;
pub use sandbox::{SandboxPath, is_allowed, resolve};
