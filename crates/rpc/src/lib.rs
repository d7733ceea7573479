// SPDX-License-Identifier: Apache-2.0

//! Request/reply control plane over a pair of bus topics.
//!
//! Each service exposes `/svc/<name>/rpc/request` and `/svc/<name>/rpc/reply`
//! carrying JSON envelopes. Handlers are registered before start and run on
//! the strand the service binds; the arm service binds its SDK strand so
//! RPC commands serialize with bus commands against the same session.
//!
//! Transport/handler success travels in `status`; business failures travel
//! inside `result` so a caller can always distinguish "the call did not
//! happen" from "the call happened and the operation failed".

mod client;
mod error;
mod service;
mod wire;

pub use client::RpcClient;
pub use error::Error;
pub use service::{RpcOptions, RpcService, RpcServiceBuilder};
pub use wire::{Reply, ReplyEnvelope, RequestEnvelope, Status};
