// SPDX-License-Identifier: Apache-2.0

//! Queues that decouple transport listener threads from service main loops.
//!
//! Listener callbacks run on threads owned by the transport and must not do
//! business work; they push into a [`CmdQueue`] and return. The service main
//! loop pops with a bounded wait so it can keep observing its running flag.

pub mod error;

mod cmd_queue;
mod drain_queue;

pub use cmd_queue::CmdQueue;
pub use drain_queue::DrainQueue;
