// SPDX-License-Identifier: Apache-2.0

//! Behavior-tree service configuration.

use crate::env::{env_bool, env_int, env_size, env_str, env_u64};
use crate::shared::{FaultRecoveryConfig, RpcConfig};

/// Live tree-visualization observer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeObserverConfig {
    /// Whether the observer is attached after a successful tree load.
    pub enable: bool,
    /// First port to try.
    pub port: i32,
    /// How many successive ports to try when construction fails.
    pub retry: i32,
    /// Upper bound on state messages per second.
    pub max_msg_per_sec: i32,
}

/// Full configuration of the behavior-tree service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtServiceConfig {
    /// Bus domain id.
    pub domain: i32,
    /// Arm command topic and schema (outbound).
    pub arm_cmd_dto_topic: String,
    /// Schema id stamped on outbound commands.
    pub arm_cmd_dto_schema: String,
    /// Arm status topic and schema (inbound).
    pub arm_status_dto_topic: String,
    /// Schema id expected on inbound status.
    pub arm_status_dto_schema: String,
    /// Default deadline for arm commands, milliseconds.
    pub arm_timeout_ms: u64,
    /// Source name stamped on outbound envelopes.
    pub dto_source: String,
    /// Payload size cap in bytes.
    pub dto_max_payload: usize,
    /// Capability announcement topic.
    pub capability_topic: String,
    /// Fault event topic.
    pub fault_status_topic: String,
    /// Heartbeat topic.
    pub heartbeat_topic: String,
    /// Time-sync topic.
    pub timesync_topic: String,
    /// System alert topic and schema.
    pub system_alert_topic: String,
    /// Schema id stamped on alert envelopes.
    pub system_alert_dto_schema: String,
    /// Behavior tree XML path.
    pub xml_path: String,
    /// Tick period, milliseconds.
    pub tick_ms: u64,
    /// Hot-reload throttle, milliseconds.
    pub reload_ms: u64,
    /// Tree observer settings.
    pub observer: TreeObserverConfig,
    /// Optional health file touched on tick; empty disables.
    pub health_file: String,
    /// Reported software version.
    pub sw_version: String,
    /// Heartbeat/capability period in milliseconds.
    pub heartbeat_period_ms: u64,
    /// RPC control-plane settings.
    pub rpc: RpcConfig,
    /// Fault-recovery settings.
    pub fault_recovery: FaultRecoveryConfig,
}

impl BtServiceConfig {
    /// Loads the configuration from the environment.
    #[must_use]
    pub fn load() -> Self {
        BtServiceConfig {
            domain: env_int("WXZ_DOMAIN_ID", 0),
            arm_cmd_dto_topic: env_str("WXZ_P1_ARM_COMMAND_TOPIC", "/arm/command"),
            arm_cmd_dto_schema: env_str("WXZ_ARM_CMD_DTO_SCHEMA", "ws.arm_command.v1"),
            arm_status_dto_topic: env_str("WXZ_P1_ARM_STATUS_TOPIC", "/arm/status"),
            arm_status_dto_schema: env_str("WXZ_ARM_STATUS_DTO_SCHEMA", "ws.arm_status.v1"),
            arm_timeout_ms: env_u64("WXZ_ARM_CMD_TIMEOUT_MS", 30_000),
            dto_source: env_str("WXZ_DTO_SOURCE", "workstation_bt_service"),
            dto_max_payload: env_size("WXZ_DTO_MAX_PAYLOAD", 8192),
            capability_topic: env_str("WXZ_CAPABILITY_STATUS_TOPIC", "capability/status"),
            fault_status_topic: env_str("WXZ_FAULT_STATUS_TOPIC", "fault/status"),
            heartbeat_topic: env_str("WXZ_HEARTBEAT_STATUS_TOPIC", "heartbeat/status"),
            timesync_topic: env_str("WXZ_TIMESYNC_STATUS_TOPIC", "timesync/status"),
            system_alert_topic: env_str("WXZ_SYSTEM_ALERT_TOPIC", "/system/alert"),
            system_alert_dto_schema: env_str("WXZ_SYSTEM_ALERT_DTO_SCHEMA", "ws.system_alert.v1"),
            xml_path: env_str("WXZ_BT_XML", "bt.xml"),
            tick_ms: env_u64("WXZ_BT_TICK_MS", 20),
            reload_ms: env_u64("WXZ_BT_RELOAD_MS", 500),
            observer: TreeObserverConfig {
                enable: env_bool("WXZ_BT_GROOT", true),
                port: env_int("WXZ_BT_GROOT_PORT", 1666),
                retry: env_int("WXZ_BT_GROOT_RETRY", 5),
                max_msg_per_sec: env_int("WXZ_BT_GROOT_MAX_MSG_PER_SEC", 25),
            },
            health_file: env_str("WXZ_HEALTH_FILE", ""),
            sw_version: env_str("WXZ_SW_VERSION", "dev"),
            heartbeat_period_ms: env_u64("WXZ_HEARTBEAT_PERIOD_MS", 1000),
            rpc: RpcConfig::load("bt_service", "WXZ_BT_RPC_ENABLE"),
            fault_recovery: FaultRecoveryConfig::load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let cfg = BtServiceConfig::load();
        assert_eq!(cfg.arm_cmd_dto_topic, "/arm/command");
        assert_eq!(cfg.arm_timeout_ms, 30_000);
        assert_eq!(cfg.tick_ms, 20);
        assert_eq!(cfg.reload_ms, 500);
        assert_eq!(cfg.system_alert_topic, "/system/alert");
        assert_eq!(cfg.observer.port, 1666);
        assert_eq!(cfg.rpc.reply_topic, "/svc/bt_service/rpc/reply");
    }
}
