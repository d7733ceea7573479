// SPDX-License-Identifier: Apache-2.0

//! Parsed command model.

use wxz_kv::KvMap;

/// One inbound command, alive from ingress until its response is published.
#[derive(Debug, Clone, Default)]
pub struct ArmCommand {
    /// Operation name; empty when the payload lacked `op`.
    pub op: String,
    /// Correlation id; empty when absent (allowed but discouraged).
    pub id: String,
    /// Full decoded payload.
    pub kv: KvMap,
    /// Raw payload as received, for logs.
    pub raw: String,
}

/// Decodes a raw KV payload into a command. Total: malformed payloads yield
/// a command with an empty `op`, which the router rejects downstream.
#[must_use]
pub fn parse_arm_command(raw: &str) -> ArmCommand {
    let kv = wxz_kv::decode(raw);
    ArmCommand {
        op: wxz_kv::get_or(&kv, "op", "").to_owned(),
        id: wxz_kv::get_or(&kv, "id", "").to_owned(),
        kv,
        raw: raw.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_op_and_id() {
        let cmd = parse_arm_command("op=moveL;id=3;pose=1,2,3,4,5,6");
        assert_eq!(cmd.op, "moveL");
        assert_eq!(cmd.id, "3");
        assert_eq!(cmd.kv.len(), 3);
        assert_eq!(cmd.raw, "op=moveL;id=3;pose=1,2,3,4,5,6");
    }

    #[test]
    fn test_parse_tolerates_missing_op() {
        let cmd = parse_arm_command("id=1");
        assert!(cmd.op.is_empty());
        assert_eq!(cmd.id, "1");
    }
}
