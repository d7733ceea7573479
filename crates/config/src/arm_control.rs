// SPDX-License-Identifier: Apache-2.0

//! Arm-control service configuration.

use crate::env::{env_int, env_size, env_str, env_u64};
use crate::shared::{FaultRecoveryConfig, RpcConfig};

/// Robot controller connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmConn {
    /// Controller IP.
    pub ip: String,
    /// Controller port.
    pub port: i32,
    /// Controller password.
    pub passwd: String,
}

/// Full configuration of the arm-control service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmControlConfig {
    /// SDK connection parameters.
    pub conn: ArmConn,
    /// Bus domain id.
    pub domain: i32,
    /// Command topic and payload schema.
    pub cmd_dto_topic: String,
    /// Schema id expected on inbound commands.
    pub cmd_dto_schema: String,
    /// Status topic and payload schema.
    pub status_dto_topic: String,
    /// Schema id stamped on outbound status.
    pub status_dto_schema: String,
    /// Source name stamped on outbound envelopes.
    pub dto_source: String,
    /// Payload size cap in bytes.
    pub dto_max_payload: usize,
    /// Capability announcement topic.
    pub capability_topic: String,
    /// Fault event topic.
    pub fault_status_topic: String,
    /// Fault action (reset request) topic.
    pub fault_action_topic: String,
    /// Heartbeat topic.
    pub heartbeat_topic: String,
    /// Time-sync topic.
    pub timesync_topic: String,
    /// Command queue capacity.
    pub queue_max: usize,
    /// Ingress listener buffer count.
    pub ingress_pool_buffers: usize,
    /// Optional health file touched on tick; empty disables.
    pub health_file: String,
    /// Reported software version.
    pub sw_version: String,
    /// Heartbeat/capability period in milliseconds.
    pub heartbeat_period_ms: u64,
    /// Metrics snapshot logging period in milliseconds; 0 disables.
    pub metrics_log_ms: u64,
    /// Start-signal digital input index.
    pub start_di_index: i32,
    /// Stop-signal digital input index.
    pub stop_di_index: i32,
    /// Path index used by trajectory execution.
    pub path_index: i32,
    /// RPC control-plane settings.
    pub rpc: RpcConfig,
    /// Fault-recovery settings.
    pub fault_recovery: FaultRecoveryConfig,
}

impl ArmControlConfig {
    /// Loads the configuration from the environment.
    #[must_use]
    pub fn load() -> Self {
        let queue_max = env_size("WXZ_ARM_QUEUE_MAX", 64);
        ArmControlConfig {
            conn: ArmConn {
                ip: env_str("WXZ_ARM_IP", "192.168.100.88"),
                port: env_int("WXZ_ARM_PORT", 2323),
                passwd: env_str("WXZ_ARM_PASS", "123"),
            },
            domain: env_int("WXZ_DOMAIN_ID", 0),
            cmd_dto_topic: env_str("WXZ_P1_ARM_COMMAND_TOPIC", "/arm/command"),
            cmd_dto_schema: env_str("WXZ_ARM_CMD_DTO_SCHEMA", "ws.arm_command.v1"),
            status_dto_topic: env_str("WXZ_P1_ARM_STATUS_TOPIC", "/arm/status"),
            status_dto_schema: env_str("WXZ_ARM_STATUS_DTO_SCHEMA", "ws.arm_status.v1"),
            dto_source: env_str("WXZ_DTO_SOURCE", "workstation_arm_control_service"),
            dto_max_payload: env_size("WXZ_DTO_MAX_PAYLOAD", 8192),
            capability_topic: env_str("WXZ_CAPABILITY_STATUS_TOPIC", "capability/status"),
            fault_status_topic: env_str("WXZ_FAULT_STATUS_TOPIC", "fault/status"),
            fault_action_topic: env_str("WXZ_FAULT_ACTION_TOPIC", "fault/action"),
            heartbeat_topic: env_str("WXZ_HEARTBEAT_STATUS_TOPIC", "heartbeat/status"),
            timesync_topic: env_str("WXZ_TIMESYNC_STATUS_TOPIC", "timesync/status"),
            queue_max,
            ingress_pool_buffers: env_size(
                "WXZ_CMD_INGRESS_POOL_BUFFERS",
                usize::max(64, queue_max * 2),
            ),
            health_file: env_str("WXZ_HEALTH_FILE", ""),
            sw_version: env_str("WXZ_SW_VERSION", "dev"),
            heartbeat_period_ms: env_u64("WXZ_HEARTBEAT_PERIOD_MS", 1000),
            metrics_log_ms: env_u64("WXZ_METRICS_LOG_MS", 0),
            start_di_index: env_int("WXZ_ARM_START_DI_INDEX", 0),
            stop_di_index: env_int("WXZ_ARM_STOP_DI_INDEX", 1),
            path_index: env_int("WXZ_ARM_PATH_INDEX", 0),
            rpc: RpcConfig::load("arm_control", "WXZ_ARM_RPC_ENABLE"),
            fault_recovery: FaultRecoveryConfig::load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_complete() {
        let cfg = ArmControlConfig::load();
        assert_eq!(cfg.cmd_dto_topic, "/arm/command");
        assert_eq!(cfg.cmd_dto_schema, "ws.arm_command.v1");
        assert_eq!(cfg.status_dto_topic, "/arm/status");
        assert_eq!(cfg.dto_max_payload, 8192);
        assert_eq!(cfg.queue_max, 64);
        assert_eq!(cfg.ingress_pool_buffers, 128);
        assert_eq!(cfg.conn.port, 2323);
        assert_eq!(cfg.rpc.request_topic, "/svc/arm_control/rpc/request");
        assert!(!cfg.rpc.enable);
        assert_eq!(cfg.fault_recovery.exit_code, 77);
    }
}
