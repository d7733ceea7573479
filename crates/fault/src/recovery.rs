// SPDX-License-Identifier: Apache-2.0

//! Rule-driven fault recovery.

use crate::event::{FaultStatus, Severity};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use wxz_bus::{Bus, QosProfile, Subscription};
use wxz_dto::EventDto;

/// Action taken when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Log the match and do nothing else.
    Log,
    /// Write the marker file and request a restart exit.
    Restart,
}

/// A single recovery rule. Empty `fault`/`service` and `None` severity are
/// wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRule {
    /// Fault name to match, empty for any.
    pub fault: String,
    /// Service name to match, empty for any.
    pub service: String,
    /// Severity to match, `None` for any.
    pub severity: Option<Severity>,
    /// Action on match.
    pub action: RecoveryAction,
}

impl RecoveryRule {
    fn matches(&self, event: &FaultStatus) -> bool {
        (self.fault.is_empty() || self.fault == event.fault)
            && (self.service.is_empty() || self.service == event.service)
            && self.severity.is_none_or(|s| s == event.severity)
    }

    /// Parses a rule list: rules separated by whitespace, fields by `|` as
    /// `fault|service|severities|action`, where `severities` is a CSV that
    /// expands into one rule per severity. Malformed entries are skipped
    /// with a warning.
    #[must_use]
    pub fn parse_list(rule_list: &str) -> Vec<RecoveryRule> {
        let mut rules = Vec::new();
        for entry in rule_list.split_whitespace() {
            let fields: Vec<&str> = entry.split('|').collect();
            if fields.len() != 4 {
                warn!(entry, "fault recovery rule skipped: want fault|service|severities|action");
                continue;
            }
            let action = match fields[3] {
                "restart" => RecoveryAction::Restart,
                "log" => RecoveryAction::Log,
                other => {
                    warn!(entry, action = other, "fault recovery rule skipped: unknown action");
                    continue;
                }
            };
            let severities: Vec<Option<Severity>> = if fields[2].is_empty() {
                vec![None]
            } else {
                let parsed: Vec<Option<Severity>> = fields[2]
                    .split(',')
                    .map(|s| Severity::parse(s.trim()))
                    .collect();
                if parsed.contains(&None) {
                    warn!(entry, "fault recovery rule skipped: bad severity");
                    continue;
                }
                parsed
            };
            for severity in severities {
                rules.push(RecoveryRule {
                    fault: fields[0].to_owned(),
                    service: fields[1].to_owned(),
                    severity,
                    action,
                });
            }
        }
        rules
    }
}

/// Evaluates fault events against rules and requests restarts.
///
/// The restart callback is expected to store the exit code and flip the
/// node's running flag; the actual process exit happens in the composition
/// root once the main loop unwinds.
pub struct FaultRecovery {
    rules: Vec<RecoveryRule>,
    marker_file: PathBuf,
    exit_code: i32,
    request_restart: Box<dyn Fn(i32) + Send + Sync>,
    triggered: AtomicBool,
}

impl FaultRecovery {
    /// Creates an executor over `rules`.
    #[must_use]
    pub fn new(
        rules: Vec<RecoveryRule>,
        marker_file: PathBuf,
        exit_code: i32,
        request_restart: impl Fn(i32) + Send + Sync + 'static,
    ) -> Self {
        FaultRecovery {
            rules,
            marker_file,
            exit_code,
            request_restart: Box::new(request_restart),
            triggered: AtomicBool::new(false),
        }
    }

    /// Evaluates one event against the rules, first match wins.
    pub fn handle_event(&self, event: &FaultStatus) {
        let Some(rule) = self.rules.iter().find(|r| r.matches(event)) else {
            return;
        };
        match rule.action {
            RecoveryAction::Log => {
                info!(
                    fault = %event.fault,
                    service = %event.service,
                    severity = event.severity.as_str(),
                    "fault recovery rule matched (log only)"
                );
            }
            RecoveryAction::Restart => {
                if self.triggered.swap(true, Ordering::SeqCst) {
                    return;
                }
                info!(
                    fault = %event.fault,
                    service = %event.service,
                    exit_code = self.exit_code,
                    "fault recovery rule matched, requesting restart"
                );
                self.write_marker(event);
                (self.request_restart)(self.exit_code);
            }
        }
    }

    // Best effort: a missing marker must not prevent the restart.
    fn write_marker(&self, event: &FaultStatus) {
        let body = format!(
            "fault={}\nservice={}\nseverity={}\nerr_code={}\nts_ms={}\n",
            event.fault,
            event.service,
            event.severity.as_str(),
            event.err_code,
            wxz_dto::time::now_epoch_ms()
        );
        if let Err(e) = std::fs::write(&self.marker_file, body) {
            warn!(
                marker = %self.marker_file.display(),
                error = %e,
                "failed to write restart marker"
            );
        }
    }
}

/// Subscribes `recovery` to the fault topic. The returned subscription must
/// be held for the lifetime of the interest.
pub fn install_fault_recovery(
    bus: &Bus,
    fault_topic: &str,
    recovery: Arc<FaultRecovery>,
) -> Result<Subscription, wxz_bus::Error> {
    bus.subscribe(fault_topic, QosProfile::reliable(), move |bytes| {
        let Ok(dto) = EventDto::decode(&bytes) else {
            warn!("fault event decode failed, message dropped");
            return;
        };
        let event = FaultStatus::from_kv(&wxz_kv::decode(&dto.payload));
        recovery.handle_event(&event);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn event(fault: &str, service: &str, severity: Severity) -> FaultStatus {
        FaultStatus {
            fault: fault.into(),
            service: service.into(),
            severity,
            active: true,
            err_code: 2001,
            err: "sdk_call_failed".into(),
        }
    }

    #[test]
    fn test_parse_list_expands_severity_csv() {
        let rules = RecoveryRule::parse_list("arm.command|svc|error,fatal|restart x|y|z|restart ||warn|log");
        // The middle entry has a bad severity token and is skipped.
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].severity, Some(Severity::Error));
        assert_eq!(rules[1].severity, Some(Severity::Fatal));
        assert_eq!(rules[2].action, RecoveryAction::Log);
        assert!(rules[2].fault.is_empty());
    }

    #[test]
    fn test_restart_rule_writes_marker_and_requests_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("restart.marker");
        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        let recovery = FaultRecovery::new(
            RecoveryRule::parse_list("arm.command||error|restart"),
            marker.clone(),
            77,
            move |code| *sink.lock() = Some(code),
        );

        // Non-matching severity does nothing.
        recovery.handle_event(&event("arm.command", "svc", Severity::Warn));
        assert_eq!(*captured.lock(), None);

        recovery.handle_event(&event("arm.command", "svc", Severity::Error));
        assert_eq!(*captured.lock(), Some(77));
        let body = std::fs::read_to_string(&marker).expect("marker");
        assert!(body.contains("fault=arm.command"));

        // A second match does not fire twice.
        *captured.lock() = None;
        recovery.handle_event(&event("arm.command", "svc", Severity::Error));
        assert_eq!(*captured.lock(), None);
    }

    #[test]
    fn test_unwritable_marker_does_not_block_restart() {
        let captured = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&captured);
        let recovery = FaultRecovery::new(
            RecoveryRule::parse_list("|||restart"),
            PathBuf::from("/nonexistent-dir/marker"),
            9,
            move |code| *sink.lock() = Some(code),
        );
        recovery.handle_event(&event("anything", "svc", Severity::Fatal));
        assert_eq!(*captured.lock(), Some(9));
    }

    #[test]
    fn test_first_match_wins() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let recovery = FaultRecovery::new(
            RecoveryRule::parse_list("a.b|||log a.b|||restart"),
            PathBuf::from("/tmp/unused.marker"),
            77,
            move |code| sink.lock().push(code),
        );
        recovery.handle_event(&event("a.b", "svc", Severity::Error));
        // The log rule shadows the restart rule.
        assert!(captured.lock().is_empty());
    }
}
