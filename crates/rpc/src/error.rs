// SPDX-License-Identifier: Apache-2.0

//! Errors for the RPC plane.

/// Errors that can occur on the RPC plane.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The underlying bus refused the subscription.
    #[error(transparent)]
    Bus(#[from] wxz_bus::Error),

    /// The strand refused the handler invocation (executor stopped).
    #[error("RPC handler for `{op}` could not be scheduled")]
    Rejected {
        /// Operation that could not be scheduled.
        op: String,
    },

    /// No reply arrived within the deadline.
    #[error("RPC call `{op}` timed out after {timeout_ms} ms")]
    Timeout {
        /// Operation that timed out.
        op: String,
        /// Deadline that elapsed.
        timeout_ms: u64,
    },
}
