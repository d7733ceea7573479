// SPDX-License-Identifier: Apache-2.0

//! JSON envelopes on the RPC topic pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport/handler outcome of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// True when the handler ran and produced a result.
    pub ok: bool,
    /// Non-zero when `ok` is false.
    pub code: i32,
    /// Human-readable diagnostics for failures.
    pub message: String,
}

impl Status {
    /// Successful status.
    #[must_use]
    pub fn ok_status() -> Self {
        Status {
            ok: true,
            code: 0,
            message: String::new(),
        }
    }

    /// Failed status with diagnostics.
    #[must_use]
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Status {
            ok: false,
            code,
            message: message.into(),
        }
    }
}

/// Handler return value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    /// Transport/handler outcome.
    pub status: Status,
    /// Operation result; business failures are conveyed inside this value.
    pub result: Value,
}

impl Reply {
    /// Successful reply wrapping `result`.
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Reply {
            status: Status::ok_status(),
            result,
        }
    }

    /// Failed reply with diagnostics.
    #[must_use]
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Reply {
            status: Status::error(code, message),
            result: Value::Null,
        }
    }
}

/// Envelope published on the request topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Operation name, e.g. `arm.ping`.
    pub op: String,
    /// Operation arguments.
    #[serde(default)]
    pub args: Value,
    /// Correlation id echoed on the reply.
    pub request_id: String,
    /// Caller identity, for logs.
    #[serde(default)]
    pub client_id: String,
}

/// Envelope published on the reply topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    /// Correlation id from the request.
    pub request_id: String,
    /// Transport/handler outcome.
    pub status: Status,
    /// Operation result.
    pub result: Value,
}
