use std::io::{BufRead, Write};

use privacy_guard::Guardian;
use privacy_guard::ops::dispatch;
use serde_json::{Map, Value, json};

use crate::error::CliError;

/// Handles one request line: `{"id", "action", "params"}`.
///
/// Always produces a response object; malformed requests get an `invalid_request` error.
pub(crate) fn handle_line(guardian: &Guardian, line: &str) -> Value {
    let request = match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return error_response(Value::Null, "invalid_request", "request must be an object"),
        Err(err) => return error_response(Value::Null, "invalid_request", &err.to_string()),
    };
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let Some(action) = request.get("action").and_then(Value::as_str) else {
        return error_response(id, "invalid_request", "missing string field \"action\"");
    };
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    match dispatch::invoke(guardian, action, params) {
        Ok(result) => json!({ "id": id, "result": result }),
        Err(err) => error_response(id, err.code(), &err.to_string()),
    }
}

fn error_response(id: Value, code: &str, message: &str) -> Value {
    let mut error = Map::new();
    error.insert("code".to_string(), Value::String(code.to_string()));
    error.insert("message".to_string(), Value::String(message.to_string()));
    json!({ "id": id, "error": error })
}

/// Newline-delimited JSON over any reader/writer pair; returns the number of requests served.
pub(crate) fn serve<R: BufRead, W: Write>(
    guardian: &Guardian,
    input: R,
    mut output: W,
) -> Result<u64, CliError> {
    let mut served = 0u64;
    for line in input.lines() {
        let line = line.map_err(privacy_guard::Error::from)?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(guardian, &line);
        serde_json::to_writer(&mut output, &response)?;
        output
            .write_all(b"\n")
            .and_then(|()| output.flush())
            .map_err(privacy_guard::Error::from)?;
        served += 1;
    }
    tracing::info!(served, "input closed; stopping");
    Ok(served)
}
