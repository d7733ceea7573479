// SPDX-License-Identifier: Apache-2.0

//! Quality-of-service profile attached to subscriptions.

/// Per-subscription QoS. Mirrors the subset of the deployment transport's
/// QoS the services rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosProfile {
    /// Reliable subscriptions never drop; best-effort ones shed load.
    pub reliable: bool,
    /// Buffer cap for best-effort subscriptions; ignored for reliable ones.
    pub depth: usize,
    /// Transport priority hint; carried through for parity with the
    /// deployment transport, unused by the in-process implementation.
    pub transport_priority: i32,
}

impl QosProfile {
    /// Reliable profile used by default on every control-plane topic.
    #[must_use]
    pub fn reliable() -> Self {
        QosProfile {
            reliable: true,
            depth: 0,
            transport_priority: 0,
        }
    }

    /// Best-effort profile with the given buffer depth.
    #[must_use]
    pub fn best_effort(depth: usize) -> Self {
        QosProfile {
            reliable: false,
            depth: depth.max(1),
            transport_priority: 0,
        }
    }

    /// Returns the profile with a transport priority hint applied.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.transport_priority = priority;
        self
    }
}

impl Default for QosProfile {
    fn default() -> Self {
        QosProfile::reliable()
    }
}
