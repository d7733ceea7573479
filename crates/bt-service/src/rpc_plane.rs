// SPDX-License-Identifier: Apache-2.0

//! RPC control plane of the behavior-tree service.

use crate::tree_runner::BtTreeRunner;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use wxz_bus::Bus;
use wxz_config::BtServiceConfig;
use wxz_engine::Strand;
use wxz_node::Node;
use wxz_rpc::{Reply, RpcOptions, RpcService, RpcServiceBuilder};

/// Starts the RPC plane when enabled: `bt.ping`, `bt.reload`, `bt.stop`.
/// Handlers run on `rpc_strand`, which the main loop drives, so they never
/// race the tick loop for the runner.
#[must_use]
pub fn start_bt_rpc_control_plane(
    config: &BtServiceConfig,
    bus: &Bus,
    node: &Node,
    runner: Arc<Mutex<BtTreeRunner>>,
    rpc_strand: &Strand,
) -> Option<RpcService> {
    if !config.rpc.enable {
        return None;
    }

    let mut builder = RpcServiceBuilder::new(RpcOptions {
        service_name: config.rpc.service_name.clone(),
        sw_version: config.sw_version.clone(),
        domain: config.domain,
        request_topic: config.rpc.request_topic.clone(),
        reply_topic: config.rpc.reply_topic.clone(),
    });

    builder.add_ping_handler("bt.ping");

    {
        let runner = Arc::clone(&runner);
        let bus = bus.clone();
        let observer_cfg = config.observer.clone();
        let dto_source = config.dto_source.clone();
        let max_payload = config.dto_max_payload;
        builder.add_handler("bt.reload", move |_args| {
            let mut runner = runner.lock();
            let result = runner.reload_if_changed();
            if result == crate::tree_runner::TreeReloadResult::Ok {
                runner.configure_observer(&bus, &observer_cfg, &dto_source, max_payload);
            }
            Reply::ok(json!({ "result": result.as_str() }))
        });
    }

    {
        let node = node.clone();
        builder.add_handler("bt.stop", move |_args| {
            node.request_stop();
            Reply::ok(json!({ "requested": true }))
        });
    }

    match builder.start(bus, rpc_strand) {
        Ok(service) => Some(service),
        Err(e) => {
            error!(error = %e, "rpc control plane failed to start");
            None
        }
    }
}
