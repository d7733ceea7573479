// SPDX-License-Identifier: Apache-2.0

//! Environment-driven configuration for both workstation services.
//!
//! Configuration is read once at startup from `WXZ_*` variables; every value
//! has a default, so a bare environment yields a runnable config. Parsing is
//! forgiving: malformed values fall back to their defaults rather than
//! failing startup.

mod arm_control;
mod bt_service;
mod env;
mod shared;

pub use arm_control::{ArmConn, ArmControlConfig};
pub use bt_service::{BtServiceConfig, TreeObserverConfig};
pub use env::{env_bool, env_int, env_size, env_str, env_u64};
pub use shared::{FaultRecoveryConfig, RpcConfig};
