// SPDX-License-Identifier: Apache-2.0

//! Node base shared by both services.
//!
//! A [`Node`] owns what every service needs regardless of its business:
//! the running flag flipped at shutdown, the stored exit code, periodic
//! heartbeat/capability publications, the optional health file, and fault
//! publishing. It also provides envelope-aware pub/sub helpers so services
//! never touch raw bus bytes.

mod dto_channel;
mod node_base;

pub use dto_channel::{EventDtoPublisher, subscribe_event_dto};
pub use node_base::{Node, NodeConfig};
