// SPDX-License-Identifier: Apache-2.0

//! Clock helpers shared by both services.
//!
//! Deadlines and retention windows use the monotonic clock so they survive
//! wall-clock jumps; envelope timestamps use the wall clock so they are
//! meaningful across hosts.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

/// Milliseconds since an arbitrary process-local anchor. Monotonic.
#[must_use]
pub fn now_monotonic_ms() -> u64 {
    anchor().elapsed().as_millis() as u64
}

/// Milliseconds since the Unix epoch. Wall clock.
#[must_use]
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_never_goes_backwards() {
        let a = now_monotonic_ms();
        let b = now_monotonic_ms();
        assert!(b >= a);
    }

    #[test]
    fn test_epoch_is_plausible() {
        // Anything after 2020-01-01 keeps this from regressing to zero.
        assert!(now_epoch_ms() > 1_577_836_800_000);
    }
}
