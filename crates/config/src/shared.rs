// SPDX-License-Identifier: Apache-2.0

//! Configuration blocks shared by both services.

use crate::env::{env_bool, env_int, env_str};

/// RPC control-plane settings for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// Whether the RPC plane is started at all.
    pub enable: bool,
    /// Service name used in topic defaults and ping replies.
    pub service_name: String,
    /// Request topic, default `/svc/<service>/rpc/request`.
    pub request_topic: String,
    /// Reply topic, default `/svc/<service>/rpc/reply`.
    pub reply_topic: String,
}

impl RpcConfig {
    /// Loads RPC settings for `service_name`, honoring the given enable
    /// variable and the shared topic overrides.
    #[must_use]
    pub fn load(service_name: &str, enable_key: &str) -> Self {
        RpcConfig {
            enable: env_bool(enable_key, false),
            service_name: service_name.to_owned(),
            request_topic: env_str(
                "WXZ_RPC_REQUEST_TOPIC",
                &format!("/svc/{service_name}/rpc/request"),
            ),
            reply_topic: env_str(
                "WXZ_RPC_REPLY_TOPIC",
                &format!("/svc/{service_name}/rpc/reply"),
            ),
        }
    }
}

/// Fault-recovery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRecoveryConfig {
    /// Whether the recovery executor is started.
    pub enable: bool,
    /// Rule list, `fault|service|severities|action` entries separated by
    /// whitespace.
    pub rules: String,
    /// Marker file written before a recovery restart.
    pub marker_file: String,
    /// Exit code reported on a recovery restart.
    pub exit_code: i32,
}

impl FaultRecoveryConfig {
    /// Loads the fault-recovery block.
    #[must_use]
    pub fn load() -> Self {
        FaultRecoveryConfig {
            enable: env_bool("WXZ_FAULT_RECOVERY_ENABLE", false),
            rules: env_str("WXZ_FAULT_RECOVERY_RULES", ""),
            marker_file: env_str(
                "WXZ_FAULT_RECOVERY_MARKER_FILE",
                "/tmp/wxz_fault_restart.marker",
            ),
            exit_code: env_int("WXZ_FAULT_RECOVERY_EXIT_CODE", 77),
        }
    }
}
