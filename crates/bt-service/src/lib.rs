// SPDX-License-Identifier: Apache-2.0

//! Behavior-tree service.
//!
//! Orchestrates the arm through the bus: action nodes publish commands with
//! fresh request ids, a correlation cache pairs asynchronously published
//! status messages back to them, and the tree runner hot-reloads the XML
//! tree and ticks it on a fixed cadence. Node failures surface as one-shot
//! system alerts.

pub mod app;
pub mod arm_nodes;
pub mod arm_types;
pub mod bt;
pub mod rpc_plane;
pub mod status_cache;
pub mod tree_runner;
