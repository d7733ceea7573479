// SPDX-License-Identifier: Apache-2.0

//! In-process topic bus.
//!
//! This is the process-local implementation of the transport contract the
//! services are written against: named topics, opaque byte messages, and
//! subscriber callbacks invoked on transport-owned threads. The deployment
//! transport (DDS) satisfies the same contract; everything above this crate
//! is transport-agnostic.
//!
//! Delivery rules:
//! - Reliable subscriptions buffer without bound; a slow consumer delays
//!   only itself.
//! - Best-effort subscriptions carry a buffer cap and drop the newest
//!   message when the consumer falls behind.
//! - Callbacks run on a dedicated listener thread per subscription, never on
//!   the publisher's thread. Listener callbacks must stay light and hand
//!   real work to a queue or strand.

mod error;
mod qos;
mod topic_bus;

pub use error::Error;
pub use qos::QosProfile;
pub use topic_bus::{Bus, Publisher, Subscription};
