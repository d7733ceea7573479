// SPDX-License-Identifier: Apache-2.0

//! Composition root of the behavior-tree service.

use crate::arm_nodes::{ArmNodeDeps, register_arm_control_nodes};
use crate::arm_types::TraceContext;
use crate::bt::BehaviorTreeFactory;
use crate::rpc_plane::start_bt_rpc_control_plane;
use crate::status_cache::{ArmRespCache, install_arm_status_cache_updater};
use crate::tree_runner::{BtTreeRunner, TreeReloadResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use wxz_bus::Bus;
use wxz_config::BtServiceConfig;
use wxz_dto::time::now_monotonic_ms;
use wxz_engine::{Executor, Strand};
use wxz_fault::{FaultRecovery, RecoveryRule, install_fault_recovery};
use wxz_node::{EventDtoPublisher, Node, NodeConfig};

/// Runs the behavior-tree service until stopped; returns the process exit
/// code.
#[must_use]
pub fn run(bus: Bus, config: BtServiceConfig) -> i32 {
    let node = Node::new(
        bus.clone(),
        NodeConfig {
            service: "workstation_bt_service".into(),
            node_type: "orchestrator.bt".into(),
            version: config.sw_version.clone(),
            domain: config.domain,
            health_file: config.health_file.clone(),
            capability_topic: config.capability_topic.clone(),
            fault_topic: config.fault_status_topic.clone(),
            heartbeat_topic: config.heartbeat_topic.clone(),
            timesync_topic: config.timesync_topic.clone(),
            heartbeat_period_ms: config.heartbeat_period_ms,
            dto_max_payload: config.dto_max_payload,
        },
    );

    info!(
        domain = config.domain,
        xml = %config.xml_path,
        tick_ms = config.tick_ms,
        reload_ms = config.reload_ms,
        "start"
    );

    let cache = Arc::new(ArmRespCache::new());
    let trace = Arc::new(TraceContext::new());

    let exec = Executor::new(0);
    let ingress_strand = Strand::new(&exec);
    let rpc_strand = Strand::new(&exec);

    let status_sub = install_arm_status_cache_updater(
        &bus,
        &config.arm_status_dto_topic,
        &config.arm_status_dto_schema,
        ingress_strand,
        64,
        Arc::clone(&cache),
        Some(Arc::clone(&trace)),
    );
    let _status_sub = match status_sub {
        Ok(sub) => sub,
        Err(e) => {
            error!(error = %e, "arm status subscription failed; exiting");
            return 2;
        }
    };

    let deps = Arc::new(ArmNodeDeps {
        cmd_pub: EventDtoPublisher::new(
            &bus,
            &config.arm_cmd_dto_topic,
            &config.arm_cmd_dto_schema,
            &config.dto_source,
            config.dto_max_payload,
        ),
        alert_pub: Some(EventDtoPublisher::new(
            &bus,
            &config.system_alert_topic,
            &config.system_alert_dto_schema,
            &config.dto_source,
            config.dto_max_payload,
        )),
        cache: Arc::clone(&cache),
        trace: Some(Arc::clone(&trace)),
        default_timeout_ms: config.arm_timeout_ms,
    });

    let mut factory = BehaviorTreeFactory::new();
    register_arm_control_nodes(&mut factory, deps);

    let runner = Arc::new(Mutex::new(BtTreeRunner::new(
        factory,
        config.xml_path.clone(),
        config.reload_ms,
    )));
    {
        let mut runner = runner.lock();
        if runner.reload_if_changed() == TreeReloadResult::Ok {
            runner.configure_observer(
                &bus,
                &config.observer,
                &config.dto_source,
                config.dto_max_payload,
            );
        }
    }

    let _rpc_service = start_bt_rpc_control_plane(&config, &bus, &node, Arc::clone(&runner), &rpc_strand);

    let _fault_recovery_sub = if config.fault_recovery.enable {
        let restart_node = node.clone();
        let recovery = Arc::new(FaultRecovery::new(
            RecoveryRule::parse_list(&config.fault_recovery.rules),
            config.fault_recovery.marker_file.clone().into(),
            config.fault_recovery.exit_code,
            move |code| {
                restart_node.set_exit_code(code);
                restart_node.request_stop();
            },
        ));
        match install_fault_recovery(&bus, &config.fault_status_topic, recovery) {
            Ok(sub) => Some(sub),
            Err(e) => {
                error!(error = %e, "fault recovery failed to start");
                None
            }
        }
    } else {
        None
    };

    let tick = Duration::from_millis(config.tick_ms.max(1));
    while node.running() {
        node.tick();

        {
            let mut runner = runner.lock();
            if runner.maybe_reload() == Some(TreeReloadResult::Ok) {
                runner.configure_observer(
                    &bus,
                    &config.observer,
                    &config.dto_source,
                    config.dto_max_payload,
                );
            }
            runner.tick_once();
        }

        // Drive the strands for the remainder of the tick budget.
        let deadline = now_monotonic_ms() + tick.as_millis() as u64;
        loop {
            let now = now_monotonic_ms();
            if now >= deadline {
                break;
            }
            let _ = exec.spin_once(Duration::from_millis(deadline - now));
        }
    }

    exec.stop();
    info!("stop");
    node.exit_code()
}
