// SPDX-License-Identifier: Apache-2.0

//! Structured fault events and the restart-recovery executor.
//!
//! Every command failure in the system surfaces as a [`FaultStatus`] on the
//! fault topic. The recovery executor subscribes there, matches events
//! against configured rules, and on a restart rule writes a marker file and
//! asks the process to exit with a configured non-zero code so the
//! orchestrator restarts the service.

mod event;
mod recovery;

pub use event::{FaultStatus, Severity};
pub use recovery::{FaultRecovery, RecoveryAction, RecoveryRule, install_fault_recovery};
