use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::policy::Policy;

use super::Guardian;
use super::context::record;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetPolicyRequest {
    /// Top-level fields to replace; nested values are replaced whole.
    #[serde(default)]
    pub patch: Map<String, Value>,
}

pub fn get_policy(ctx: &Guardian) -> Result<Policy> {
    let policy = ctx.policy.get();
    ctx.finish("get_policy", Map::new(), Ok(policy))
}

/// Applies a shallow patch. Only the patched key names are audited, never their values.
pub fn set_policy(ctx: &Guardian, request: SetPolicyRequest) -> Result<Policy> {
    let mut keys = request.patch.keys().cloned().collect::<Vec<_>>();
    keys.sort_unstable();

    let mut fields = Map::new();
    record(&mut fields, "keys", keys);
    let result = ctx.policy.patch(request.patch);
    ctx.finish("set_policy", fields, result)
}
