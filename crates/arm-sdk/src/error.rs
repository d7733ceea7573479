// SPDX-License-Identifier: Apache-2.0

//! Errors for SDK session calls.

use crate::modes::SdkCode;

/// Outcome of a session call that did not succeed.
///
/// Validation failures are raised before the SDK is touched and carry the
/// offending field; SDK failures carry the raw vendor code so responses can
/// propagate it verbatim.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmCallError {
    /// A safety gate rejected the request before the SDK call.
    #[error("invalid {field}")]
    InvalidArgs {
        /// Field that failed validation.
        field: &'static str,
    },

    /// The SDK ran the call and returned a non-zero code.
    #[error("sdk call failed with code {code}")]
    Sdk {
        /// Raw vendor result code.
        code: SdkCode,
    },

    /// No SDK is bound (startup should have failed, or the binding is gone).
    #[error("sdk unavailable")]
    Unavailable,
}

/// Result alias for session calls.
pub type ArmResult<T = ()> = Result<T, ArmCallError>;
