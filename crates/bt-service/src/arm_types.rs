// SPDX-License-Identifier: Apache-2.0

//! Shared types of the behavior-tree service: request ids, trace context,
//! and the normalized arm response.

use parking_lot::Mutex;
use wxz_dto::time::now_monotonic_ms;
use wxz_kv::KvMap;

/// Generates a request/transaction id: monotonic milliseconds plus a random
/// suffix, short enough for logs, unique enough for correlation.
#[must_use]
pub fn make_id() -> String {
    let ms = now_monotonic_ms();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{ms:x}-{}", &suffix[..8])
}

/// Reads a text file into a string. `None` on any I/O failure.
#[must_use]
pub fn load_text_file(path: &str) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Run-time trace context: the active trace id propagated across requests.
#[derive(Default)]
pub struct TraceContext {
    active_trace_id: Mutex<String>,
}

impl TraceContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        TraceContext::default()
    }

    /// Updates the active trace id when the inbound one is non-empty.
    pub fn set_if_nonempty(&self, trace_id: &str) {
        if !trace_id.is_empty() {
            *self.active_trace_id.lock() = trace_id.to_owned();
        }
    }

    /// Copy of the active trace id (possibly empty).
    #[must_use]
    pub fn get(&self) -> String {
        self.active_trace_id.lock().clone()
    }
}

/// Writes trace/request correlation fields into an outbound KV payload.
pub fn fill_trace_fields(kv: &mut KvMap, ctx: Option<&TraceContext>, request_id: &str) {
    if let Some(ctx) = ctx {
        let trace_id = ctx.get();
        if !trace_id.is_empty() {
            let _ = kv.insert("trace_id".into(), trace_id);
        }
    }
    if !request_id.is_empty() {
        let _ = kv.insert("request_id".into(), request_id.to_owned());
    }
}

/// Normalized arm response extracted from a status payload, original KV
/// retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmResp {
    /// `ok` field as received.
    pub ok: String,
    /// Legacy `code` field.
    pub code: String,
    /// Stable `err_code` field.
    pub err_code: String,
    /// Short error token.
    pub err: String,
    /// Raw SDK code, when the call reached the SDK.
    pub sdk_code: String,
    /// Monotonic arrival time, for retention.
    pub ts_ms: u64,
    /// Full payload for field access by nodes.
    pub kv: KvMap,
}

/// Success decision when `ok` and `err_code` may disagree: a present
/// `err_code` wins either way; only an absent one falls back to `ok`.
#[must_use]
pub fn prefer_err_code_success(ok: &str, err_code: &str) -> bool {
    if !err_code.is_empty() {
        return err_code == "0";
    }
    wxz_kv::is_truthy(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id_is_unique_enough() {
        let a = make_id();
        let b = make_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn test_prefer_err_code_success_conflicts() {
        // err_code wins in both conflict directions.
        assert!(prefer_err_code_success("0", "0"));
        assert!(!prefer_err_code_success("1", "2001"));
        // No err_code: fall back to ok.
        assert!(prefer_err_code_success("1", ""));
        assert!(!prefer_err_code_success("0", ""));
        assert!(!prefer_err_code_success("", ""));
    }

    #[test]
    fn test_trace_context_ignores_empty_updates() {
        let ctx = TraceContext::new();
        ctx.set_if_nonempty("");
        assert_eq!(ctx.get(), "");
        ctx.set_if_nonempty("t-1");
        ctx.set_if_nonempty("");
        assert_eq!(ctx.get(), "t-1");
    }

    #[test]
    fn test_fill_trace_fields() {
        let ctx = TraceContext::new();
        ctx.set_if_nonempty("t-9");
        let mut kv = KvMap::new();
        fill_trace_fields(&mut kv, Some(&ctx), "req-1");
        assert_eq!(kv.get("trace_id").map(String::as_str), Some("t-9"));
        assert_eq!(kv.get("request_id").map(String::as_str), Some("req-1"));
    }
}
