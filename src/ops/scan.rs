use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::detect::Finding;
use crate::error::Result;

use super::Guardian;
use super::context::record;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTextResponse {
    pub findings: Vec<Finding>,
}

/// Runs the configured detector on caller-supplied text. Only the finding count is audited.
pub fn scan_text(ctx: &Guardian, request: ScanTextRequest) -> Result<ScanTextResponse> {
    let snapshot = ctx.policy.snapshot();
    let findings = ctx.detect(&request.text, snapshot.policy());

    let mut fields = Map::new();
    record(&mut fields, "findings", findings.len());
    ctx.finish("scan_text", fields, Ok(ScanTextResponse { findings }))
}
