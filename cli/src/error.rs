const CLI_ERROR_CODE_JSON: &str = "json";
const CLI_ERROR_CODE_INPUT: &str = "input";

#[derive(Debug)]
pub(crate) enum CliError {
    Guard(privacy_guard::Error),
    Json(serde_json::Error),
    Input(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Guard(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "json error: {err}"),
            CliError::Input(message) => write!(f, "invalid input: {message}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Guard(err) => Some(err),
            CliError::Json(err) => Some(err),
            CliError::Input(_) => None,
        }
    }
}

impl From<privacy_guard::Error> for CliError {
    fn from(err: privacy_guard::Error) -> Self {
        Self::Guard(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl CliError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            CliError::Guard(err) => err.code(),
            CliError::Json(_) => CLI_ERROR_CODE_JSON,
            CliError::Input(_) => CLI_ERROR_CODE_INPUT,
        }
    }
}

/// Structured details for the JSON error format. Paths are already root-relative.
pub(crate) fn guard_error_details(err: &privacy_guard::Error) -> Option<serde_json::Value> {
    use privacy_guard::Error;

    match err {
        Error::PathEscape { path }
        | Error::PermissionDenied { path }
        | Error::NotFound { path }
        | Error::NotADirectory { path } => Some(serde_json::json!({
            "kind": err.code(),
            "path": path.display().to_string(),
        })),
        Error::IoPath { op, path, .. } => Some(serde_json::json!({
            "kind": "io_path",
            "op": op,
            "path": path.display().to_string(),
        })),
        Error::PolicyLoad(message)
        | Error::InvalidPolicy(message)
        | Error::InvalidPath(message)
        | Error::InvalidRequest(message)
        | Error::InvalidPattern(message)
        | Error::DetectorUnavailable(message) => Some(serde_json::json!({
            "kind": err.code(),
            "message": message,
        })),
        _ => None,
    }
}

/// `{"error": {"code", "message", "details"?}}`.
pub(crate) fn render_json_error(err: &CliError) -> serde_json::Value {
    let mut error = serde_json::Map::new();
    error.insert(
        "code".to_string(),
        serde_json::Value::String(err.code().to_string()),
    );
    error.insert(
        "message".to_string(),
        serde_json::Value::String(err.to_string()),
    );
    if let CliError::Guard(guard) = err
        && let Some(details) = guard_error_details(guard)
    {
        error.insert("details".to_string(), details);
    }
    serde_json::json!({ "error": error })
}
