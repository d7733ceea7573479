// SPDX-License-Identifier: Apache-2.0

//! Error code conventions on the `/arm/status` topic.
//!
//! Every response carries either `ok=1` with `err_code=0`, or `ok=0` with a
//! non-zero `err_code` and a short snake_case `err` token. Responses that
//! reached the SDK also carry `sdk_code` with the raw vendor code, mirrored
//! into the legacy `code` field. When `ok` and `err_code` disagree,
//! consumers trust `err_code`.

use wxz_arm_sdk::{ArmCallError, ArmResult};
use wxz_kv::KvMap;

/// Stable error codes carried in `err_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ArmErrc {
    /// Success.
    Ok = 0,

    /// Malformed request at the envelope level.
    BadRequest = 1001,
    /// A required key is absent (`err=missing_<key>`).
    MissingField = 1002,
    /// A present key failed to parse (`err=bad_<key>`).
    ParseError = 1003,
    /// A parsed value failed validation (`err=invalid_<field>`).
    InvalidArgs = 1004,
    /// The ingress queue was full; the command was dropped.
    QueueFull = 1101,
    /// No handler is registered for the op.
    UnknownOp = 1102,

    /// The SDK ran the call and failed; see `sdk_code`.
    SdkCallFailed = 2001,
    /// No SDK is bound.
    SdkUnavailable = 2002,

    /// Anything that should not happen.
    InternalError = 9000,
}

impl ArmErrc {
    /// Integer value on the wire.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Marks a response successful and normalizes the error fields.
pub fn arm_set_ok(resp: &mut KvMap) {
    let _ = resp.insert("ok".into(), "1".into());
    let _ = resp.insert("err_code".into(), ArmErrc::Ok.code().to_string());
    let _ = resp.shift_remove("err");
}

/// Marks a response failed with a stable code and token.
pub fn arm_set_error(resp: &mut KvMap, code: ArmErrc, err: impl Into<String>) {
    let _ = resp.insert("ok".into(), "0".into());
    let _ = resp.insert("err_code".into(), code.code().to_string());
    let _ = resp.insert("err".into(), err.into());
}

/// Records a raw SDK result: sets `sdk_code` (and the legacy `code` mirror)
/// and normalizes `ok`/`err_code` from it.
pub fn arm_set_sdk_result(resp: &mut KvMap, sdk_code: i32) {
    let _ = resp.insert("code".into(), sdk_code.to_string());
    let _ = resp.insert("sdk_code".into(), sdk_code.to_string());
    if sdk_code == 0 {
        arm_set_ok(resp);
    } else {
        arm_set_error(resp, ArmErrc::SdkCallFailed, "sdk_call_failed");
    }
}

/// Folds a session call outcome into a response.
pub fn arm_apply_result(resp: &mut KvMap, result: &ArmResult) {
    match result {
        Ok(()) => arm_set_sdk_result(resp, 0),
        Err(ArmCallError::Sdk { code }) => arm_set_sdk_result(resp, *code),
        Err(ArmCallError::InvalidArgs { field }) => {
            arm_set_error(resp, ArmErrc::InvalidArgs, format!("invalid_{field}"));
        }
        Err(ArmCallError::Unavailable) => {
            arm_set_error(resp, ArmErrc::SdkUnavailable, "sdk_unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_clears_previous_error() {
        let mut resp = KvMap::new();
        arm_set_error(&mut resp, ArmErrc::ParseError, "bad_speed");
        arm_set_ok(&mut resp);
        assert_eq!(resp.get("ok").map(String::as_str), Some("1"));
        assert_eq!(resp.get("err_code").map(String::as_str), Some("0"));
        assert!(resp.get("err").is_none());
    }

    #[test]
    fn test_sdk_result_mirrors_legacy_code_field() {
        let mut resp = KvMap::new();
        arm_set_sdk_result(&mut resp, 7);
        assert_eq!(resp.get("code").map(String::as_str), Some("7"));
        assert_eq!(resp.get("sdk_code").map(String::as_str), Some("7"));
        assert_eq!(resp.get("ok").map(String::as_str), Some("0"));
        assert_eq!(resp.get("err_code").map(String::as_str), Some("2001"));
        assert_eq!(resp.get("err").map(String::as_str), Some("sdk_call_failed"));

        arm_set_sdk_result(&mut resp, 0);
        assert_eq!(resp.get("ok").map(String::as_str), Some("1"));
        assert_eq!(resp.get("err_code").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_apply_result_invalid_args() {
        let mut resp = KvMap::new();
        arm_apply_result(&mut resp, &Err(ArmCallError::InvalidArgs { field: "speed" }));
        assert_eq!(resp.get("err_code").map(String::as_str), Some("1004"));
        assert_eq!(resp.get("err").map(String::as_str), Some("invalid_speed"));
    }
}
