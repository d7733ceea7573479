// SPDX-License-Identifier: Apache-2.0

//! Arm-control service.
//!
//! Mediates the robot SDK behind a bus command topic: commands arrive as KV
//! payloads on `/arm/command`, are validated and dispatched by the command
//! router, executed against the SDK session on a dedicated strand, and
//! answered on `/arm/status`. Failures additionally surface as structured
//! fault events. An optional RPC plane exposes the same command processor
//! for request/reply callers.

pub mod app;
pub mod command;
pub mod error_codes;
pub mod handlers;
pub mod ingress;
pub mod router;
pub mod rpc_glue;
