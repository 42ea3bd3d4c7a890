use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("io error during {op} ({path}): {source}")]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("path escapes sandbox root: {path}")]
    PathEscape { path: PathBuf },

    #[error("access denied by policy: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("failed to load policy: {0}")]
    PolicyLoad(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid detection pattern: {0}")]
    InvalidPattern(String),

    #[error("entity recognition engine unavailable: {0}")]
    DetectorUnavailable(String),
}

impl Error {
    pub(crate) fn io_path(
        op: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::IoPath {
            op,
            path: path.into(),
            source,
        }
    }

    /// Stable discriminator for callers that render errors as structured data.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::IoPath { .. } => "io_path",
            Error::Json(_) => "json",
            Error::PathEscape { .. } => "path_escape",
            Error::PermissionDenied { .. } => "permission_denied",
            Error::NotFound { .. } => "not_found",
            Error::NotADirectory { .. } => "not_a_directory",
            Error::PolicyLoad(_) => "policy_load",
            Error::InvalidPolicy(_) => "invalid_policy",
            Error::InvalidPath(_) => "invalid_path",
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidPattern(_) => "invalid_pattern",
            Error::DetectorUnavailable(_) => "detector_unavailable",
        }
    }

    /// Whether the failure is an access-control decision rather than an operational error.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Error::PathEscape { .. } | Error::PermissionDenied { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
