//! Action-name router used by transports.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

use super::Guardian;

/// Every action name [`invoke`] accepts.
pub const ACTIONS: [&str; 7] = [
    "get_policy",
    "set_policy",
    "list_dir",
    "scan_text",
    "safe_read_file",
    "copy_redacted_file",
    "read_resource",
];

fn params<T: DeserializeOwned>(action: &str, params: Value) -> Result<T> {
    let params = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(params)
        .map_err(|err| Error::InvalidRequest(format!("invalid params for {action}: {err}")))
}

fn respond<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Runs `action` with JSON `params` (`null` is treated as `{}`) and returns the JSON result.
///
/// Unknown actions and malformed params are `InvalidRequest` and are not audited, since no
/// operation ran.
pub fn invoke(guardian: &Guardian, action: &str, params_value: Value) -> Result<Value> {
    match action {
        "get_policy" => respond(guardian.get_policy()?),
        "set_policy" => respond(guardian.set_policy(params(action, params_value)?)?),
        "list_dir" => respond(guardian.list_dir(params(action, params_value)?)?),
        "scan_text" => respond(guardian.scan_text(params(action, params_value)?)?),
        "safe_read_file" => respond(guardian.safe_read_file(params(action, params_value)?)?),
        "copy_redacted_file" => {
            respond(guardian.copy_redacted_file(params(action, params_value)?)?)
        }
        "read_resource" => respond(guardian.read_resource(params(action, params_value)?)?),
        other => Err(Error::InvalidRequest(format!(
            "unknown action {other:?}; expected one of {}",
            ACTIONS.join(", ")
        ))),
    }
}
