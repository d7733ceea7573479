// SPDX-License-Identifier: Apache-2.0

//! Fault event model and its KV rendering.

use wxz_kv::KvMap;

/// Severity carried on fault events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    /// Informational; also used for recovery acknowledgements.
    Info,
    /// Degraded but operating (e.g. shed load).
    Warn,
    /// A command or subsystem failed.
    #[default]
    Error,
    /// The service cannot continue.
    Fatal,
}

impl Severity {
    /// Wire token for the severity.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    /// Parses a wire token; unknown tokens yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warn" => Some(Severity::Warn),
            "error" => Some(Severity::Error),
            "fatal" => Some(Severity::Fatal),
            _ => None,
        }
    }
}

/// A structured fault event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultStatus {
    /// Dotted fault name, e.g. `arm.command` or `arm.queue_full`.
    pub fault: String,
    /// Service that raised the event.
    pub service: String,
    /// Event severity.
    pub severity: Severity,
    /// True while the fault condition holds; false when it clears.
    pub active: bool,
    /// Stable error code from the originating response, 0 when clearing.
    pub err_code: i32,
    /// Short error token, empty when clearing.
    pub err: String,
}

impl FaultStatus {
    /// Renders the event as a KV payload.
    #[must_use]
    pub fn to_kv(&self) -> KvMap {
        let mut kv = KvMap::new();
        let _ = kv.insert("fault".into(), self.fault.clone());
        let _ = kv.insert("service".into(), self.service.clone());
        let _ = kv.insert("severity".into(), self.severity.as_str().into());
        let active = if self.active { "1" } else { "0" };
        let _ = kv.insert("active".into(), active.into());
        let _ = kv.insert("err_code".into(), self.err_code.to_string());
        let _ = kv.insert("err".into(), self.err.clone());
        kv
    }

    /// Reconstructs an event from a KV payload, defaulting missing fields.
    #[must_use]
    pub fn from_kv(kv: &KvMap) -> Self {
        FaultStatus {
            fault: wxz_kv::get_or(kv, "fault", "").to_owned(),
            service: wxz_kv::get_or(kv, "service", "").to_owned(),
            severity: Severity::parse(wxz_kv::get_or(kv, "severity", "error"))
                .unwrap_or_default(),
            active: wxz_kv::is_truthy(wxz_kv::get_or(kv, "active", "0")),
            err_code: wxz_kv::parse_int(wxz_kv::get_or(kv, "err_code", "0")).unwrap_or(0),
            err: wxz_kv::get_or(kv, "err", "").to_owned(),
        }
    }
}
