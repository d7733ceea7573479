// SPDX-License-Identifier: Apache-2.0

//! RPC entry points into the command processor.
//!
//! `arm.command` translates a JSON argument object into the KV wire format
//! (arrays become CSV, booleans become `1`/`0`) and reuses the same router
//! the bus pipeline dispatches through, so both entry points behave
//! identically. The raw response KV map is returned in `result.kv`.

use crate::router::CommandRouter;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use wxz_arm_sdk::ArmClient;
use wxz_rpc::{Reply, RpcServiceBuilder};

fn json_to_scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_owned(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn json_to_csv(arr: &[Value]) -> String {
    arr.iter()
        .map(json_to_scalar)
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds a raw KV command string from a JSON argument object. Requires a
/// string `op`; every other member becomes a KV pair.
#[must_use]
pub fn build_raw_kv_from_params(params: &Value) -> Option<String> {
    let obj = params.as_object()?;
    let op = obj.get("op")?.as_str()?;

    let mut raw = String::with_capacity(256);
    raw.push_str("op=");
    raw.push_str(op);
    for (k, v) in obj {
        if k == "op" {
            continue;
        }
        raw.push(';');
        raw.push_str(k);
        raw.push('=');
        match v {
            Value::Array(items) => raw.push_str(&json_to_csv(items)),
            other => raw.push_str(&json_to_scalar(other)),
        }
    }
    Some(raw)
}

/// Registers the arm service's RPC handlers: `arm.ping` and `arm.command`.
pub fn install_arm_rpc_handlers(
    builder: &mut RpcServiceBuilder,
    router: Arc<CommandRouter>,
    arm: Arc<dyn ArmClient>,
) {
    builder.add_ping_handler("arm.ping");

    builder.add_handler("arm.command", move |args| {
        let Some(raw) = build_raw_kv_from_params(args) else {
            return Reply::error(1, "missing_or_invalid_params.op");
        };

        let resp = router.dispatch_raw(&raw, arm.as_ref());
        let mut kv_json = Map::new();
        for (k, v) in &resp {
            let _ = kv_json.insert(k.clone(), Value::String(v.clone()));
        }
        // Transport/handler success is ok=true; business failures live in
        // the returned kv fields.
        Reply::ok(json!({ "kv": Value::Object(kv_json) }))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_raw_kv_scalars_and_arrays() {
        let raw = build_raw_kv_from_params(&json!({
            "op": "moveJoint",
            "jointpos": [0, 0.5, 1, -0.5, 0, 0.25],
            "speed": 1.5,
            "unit_override": true,
        }))
        .expect("raw");
        assert!(raw.starts_with("op=moveJoint;"));
        assert!(raw.contains("jointpos=0,0.5,1,-0.5,0,0.25"));
        assert!(raw.contains("speed=1.5"));
        assert!(raw.contains("unit_override=1"));
    }

    #[test]
    fn test_build_raw_kv_requires_string_op() {
        assert!(build_raw_kv_from_params(&json!({"speed": 1})).is_none());
        assert!(build_raw_kv_from_params(&json!({"op": 5})).is_none());
        assert!(build_raw_kv_from_params(&json!("not an object")).is_none());
    }
}
