// SPDX-License-Identifier: Apache-2.0

//! Composition root of the arm-control service.

use crate::handlers::default_router;
use crate::ingress::{ArmControlLoop, Cmd};
use crate::rpc_glue::install_arm_rpc_handlers;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use wxz_arm_sdk::{ArmClient, ArmConnParams, ArmSdkSession, SessionOptions, load_sdk};
use wxz_bus::Bus;
use wxz_channel::CmdQueue;
use wxz_config::ArmControlConfig;
use wxz_engine::{Executor, Strand};
use wxz_fault::{FaultRecovery, RecoveryRule, install_fault_recovery};
use wxz_node::{EventDtoPublisher, Node, NodeConfig};
use wxz_rpc::{RpcOptions, RpcServiceBuilder};
use wxz_telemetry::MetricsRegistry;

/// Exit code for a startup failure (SDK not available).
pub const EXIT_STARTUP_FAILURE: i32 = 2;

/// Runs the arm-control service until stopped; returns the process exit
/// code.
#[must_use]
pub fn run(bus: Bus, config: ArmControlConfig) -> i32 {
    let node = Node::new(
        bus.clone(),
        NodeConfig {
            service: "workstation_arm_control_service".into(),
            node_type: "device.arm".into(),
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
        ip = %config.conn.ip,
        port = config.conn.port,
        domain = config.domain,
        cmd = %config.cmd_dto_topic,
        status = %config.status_dto_topic,
        "start"
    );

    let Some(sdk) = load_sdk() else {
        error!("SDK not available; simulation disabled; exiting");
        return EXIT_STARTUP_FAILURE;
    };
    let session = Arc::new(ArmSdkSession::new(
        sdk,
        ArmConnParams {
            ip: config.conn.ip.clone(),
            port: config.conn.port,
            passwd: config.conn.passwd.clone(),
        },
        SessionOptions {
            start_di_index: config.start_di_index,
            stop_di_index: config.stop_di_index,
            path_index: config.path_index,
        },
    ));
    let arm: Arc<dyn ArmClient> = Arc::clone(&session) as Arc<dyn ArmClient>;

    let router = Arc::new(default_router());
    let queue = Arc::new(CmdQueue::<Cmd>::new(config.queue_max));
    let metrics = MetricsRegistry::new();

    // Zero workers: everything cooperative runs on this loop's spin.
    let exec = Executor::new(0);
    let arm_sdk_strand = Strand::new(&exec);

    let status_pub = EventDtoPublisher::new(
        &bus,
        &config.status_dto_topic,
        &config.status_dto_schema,
        &config.dto_source,
        config.dto_max_payload,
    );

    // RPC plane shares the SDK strand so its commands serialize with bus
    // commands.
    let _rpc_service = if config.rpc.enable {
        let mut builder = RpcServiceBuilder::new(RpcOptions {
            service_name: config.rpc.service_name.clone(),
            sw_version: config.sw_version.clone(),
            domain: config.domain,
            request_topic: config.rpc.request_topic.clone(),
            reply_topic: config.rpc.reply_topic.clone(),
        });
        install_arm_rpc_handlers(&mut builder, Arc::clone(&router), Arc::clone(&arm));
        match builder.start(&bus, &arm_sdk_strand) {
            Ok(service) => Some(service),
            Err(e) => {
                error!(error = %e, "rpc control plane failed to start");
                None
            }
        }
    } else {
        None
    };

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

    let main_loop = ArmControlLoop::new(
        node.clone(),
        exec.clone(),
        arm_sdk_strand,
        router,
        arm,
        Arc::clone(&queue),
        status_pub,
        config,
        metrics,
    );
    main_loop.run(Duration::from_millis(5));

    queue.close();
    exec.stop();
    session.shutdown();
    info!("stop");
    node.exit_code()
}
