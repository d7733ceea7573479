// SPDX-License-Identifier: Apache-2.0

//! Behavior-tree node scenarios: command emission, correlation, deadlines,
//! one-shot alerts, output ports.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wxz_bt_service::arm_nodes::{ArmNodeDeps, register_arm_control_nodes};
use wxz_bt_service::arm_types::{ArmResp, TraceContext};
use wxz_bt_service::bt::{BehaviorTreeFactory, NodeStatus, Tree};
use wxz_bt_service::status_cache::ArmRespCache;
use wxz_bus::{Bus, QosProfile};
use wxz_dto::time::now_monotonic_ms;
use wxz_kv::KvMap;
use wxz_node::{EventDtoPublisher, subscribe_event_dto};

struct Harness {
    cache: Arc<ArmRespCache>,
    commands: Arc<Mutex<Vec<KvMap>>>,
    alerts: Arc<Mutex<Vec<KvMap>>>,
    factory: BehaviorTreeFactory,
    _subs: Vec<wxz_bus::Subscription>,
}

fn harness() -> Harness {
    let bus = Bus::new();
    let cache = Arc::new(ArmRespCache::new());

    let commands: Arc<Mutex<Vec<KvMap>>> = Arc::new(Mutex::new(Vec::new()));
    let cmd_sink = Arc::clone(&commands);
    let cmd_sub = subscribe_event_dto(
        &bus,
        "/arm/command",
        "ws.arm_command.v1",
        QosProfile::reliable(),
        move |dto| cmd_sink.lock().push(wxz_kv::decode(&dto.payload)),
    )
    .expect("cmd sub");

    let alerts: Arc<Mutex<Vec<KvMap>>> = Arc::new(Mutex::new(Vec::new()));
    let alert_sink = Arc::clone(&alerts);
    let alert_sub = subscribe_event_dto(
        &bus,
        "/system/alert",
        "ws.system_alert.v1",
        QosProfile::reliable(),
        move |dto| alert_sink.lock().push(wxz_kv::decode(&dto.payload)),
    )
    .expect("alert sub");

    let deps = Arc::new(ArmNodeDeps {
        cmd_pub: EventDtoPublisher::new(
            &bus,
            "/arm/command",
            "ws.arm_command.v1",
            "workstation_bt_service",
            8192,
        ),
        alert_pub: Some(EventDtoPublisher::new(
            &bus,
            "/system/alert",
            "ws.system_alert.v1",
            "workstation_bt_service",
            8192,
        )),
        cache: Arc::clone(&cache),
        trace: Some(Arc::new(TraceContext::new())),
        default_timeout_ms: 30_000,
    });

    let mut factory = BehaviorTreeFactory::new();
    register_arm_control_nodes(&mut factory, deps);

    Harness {
        cache,
        commands,
        alerts,
        factory,
        _subs: vec![cmd_sub, alert_sub],
    }
}

fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn tree(harness: &Harness, xml: &str) -> Tree {
    harness.factory.create_tree_from_text(xml).expect("tree")
}

fn last_command_id(harness: &Harness) -> String {
    let commands = harness.commands.lock();
    let last = commands.last().expect("a command was published");
    wxz_kv::get_or(last, "id", "").to_owned()
}

fn ok_resp() -> ArmResp {
    ArmResp {
        ok: "1".into(),
        err_code: "0".into(),
        ts_ms: now_monotonic_ms(),
        ..ArmResp::default()
    }
}

#[test]
fn test_power_on_success_flow() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><ArmPowerOn name="power"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    let commands = Arc::clone(&harness.commands);
    assert!(wait_until(|| !commands.lock().is_empty()));
    {
        let commands = commands.lock();
        assert_eq!(
            wxz_kv::get_or(&commands[0], "op", ""),
            "power_on_enable"
        );
        assert!(!wxz_kv::get_or(&commands[0], "id", "").is_empty());
    }

    // Still pending: no matching status yet.
    assert_eq!(tree.tick_root(), NodeStatus::Running);

    let id = last_command_id(&harness);
    harness.cache.put(id, ok_resp());
    assert_eq!(tree.tick_root(), NodeStatus::Success);
    assert!(harness.alerts.lock().is_empty());
}

#[test]
fn test_power_on_timeout_emits_one_alert() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><ArmPowerOn name="power" timeout_ms="20"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    std::thread::sleep(Duration::from_millis(40));
    assert_eq!(tree.tick_root(), NodeStatus::Failure);

    let alerts = Arc::clone(&harness.alerts);
    assert!(wait_until(|| !alerts.lock().is_empty()));
    std::thread::sleep(Duration::from_millis(10));
    {
        let alerts = alerts.lock();
        assert_eq!(alerts.len(), 1, "exactly one alert per activation");
        assert_eq!(
            wxz_kv::get_or(&alerts[0], "error_code", ""),
            "E_ARM_POWER_ON_TIMEOUT"
        );
        assert_eq!(wxz_kv::get_or(&alerts[0], "alert_level", ""), "ERROR");
        assert_eq!(wxz_kv::get_or(&alerts[0], "node_name", ""), "power");
    }
}

#[test]
fn test_power_on_failure_alert_carries_response_fields() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><ArmPowerOn name="power"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    let commands = Arc::clone(&harness.commands);
    assert!(wait_until(|| !commands.lock().is_empty()));

    let id = last_command_id(&harness);
    harness.cache.put(
        id,
        ArmResp {
            ok: "0".into(),
            err_code: "2001".into(),
            err: "sdk_call_failed".into(),
            sdk_code: "7".into(),
            code: "7".into(),
            ts_ms: now_monotonic_ms(),
            ..ArmResp::default()
        },
    );
    assert_eq!(tree.tick_root(), NodeStatus::Failure);

    let alerts = Arc::clone(&harness.alerts);
    assert!(wait_until(|| !alerts.lock().is_empty()));
    {
        let alerts = alerts.lock();
        assert_eq!(
            wxz_kv::get_or(&alerts[0], "error_code", ""),
            "E_ARM_POWER_ON_FAIL"
        );
        assert_eq!(wxz_kv::get_or(&alerts[0], "sdk_code", ""), "7");
        assert_eq!(wxz_kv::get_or(&alerts[0], "arm_err_code", ""), "2001");
        assert_eq!(
            wxz_kv::get_or(&alerts[0], "arm_err", ""),
            "sdk_call_failed"
        );
    }
}

#[test]
fn test_err_code_wins_over_ok() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><ArmMoveJ name="mj" jointpos="0,0,0,0,0,0"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    let commands = Arc::clone(&harness.commands);
    assert!(wait_until(|| !commands.lock().is_empty()));

    // Contradictory response: ok=1 but err_code non-zero. err_code wins.
    let id = last_command_id(&harness);
    harness.cache.put(
        id,
        ArmResp {
            ok: "1".into(),
            err_code: "2001".into(),
            ts_ms: now_monotonic_ms(),
            ..ArmResp::default()
        },
    );
    assert_eq!(tree.tick_root(), NodeStatus::Failure);
}

#[test]
fn test_move_l_missing_input_fails_with_bad_input_alert() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><ArmMoveL name="ml" jointpos="0,0,0,0,0,0"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Failure);
    let alerts = Arc::clone(&harness.alerts);
    assert!(wait_until(|| !alerts.lock().is_empty()));
    assert_eq!(
        wxz_kv::get_or(&alerts.lock()[0], "error_code", ""),
        "E_ARM_BAD_INPUT"
    );
    // No command was published.
    assert!(harness.commands.lock().is_empty());
}

#[test]
fn test_bool_query_maps_value() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><IsArmReady name="ready"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    let commands = Arc::clone(&harness.commands);
    assert!(wait_until(|| !commands.lock().is_empty()));
    assert_eq!(
        wxz_kv::get_or(&commands.lock()[0], "op", ""),
        "is_arm_ready"
    );

    let id = last_command_id(&harness);
    let mut resp = ok_resp();
    let _ = resp.kv.insert("value".into(), "0".into());
    harness.cache.put(id, resp);
    assert_eq!(tree.tick_root(), NodeStatus::Failure);

    // Fresh activation with value=1 succeeds.
    assert_eq!(tree.tick_root(), NodeStatus::Running);
    assert!(wait_until(|| commands.lock().len() >= 2));
    let id = last_command_id(&harness);
    let mut resp = ok_resp();
    let _ = resp.kv.insert("value".into(), "1".into());
    harness.cache.put(id, resp);
    assert_eq!(tree.tick_root(), NodeStatus::Success);
}

#[test]
fn test_get_robot_mode_writes_output_port() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><GetRobotMode name="gm" mode="{robot_mode}"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    let commands = Arc::clone(&harness.commands);
    assert!(wait_until(|| !commands.lock().is_empty()));

    let id = last_command_id(&harness);
    let mut resp = ok_resp();
    let _ = resp.kv.insert("mode".into(), "3".into());
    harness.cache.put(id, resp);
    assert_eq!(tree.tick_root(), NodeStatus::Success);
    assert_eq!(
        tree.blackboard().lock().get("robot_mode").map(String::as_str),
        Some("3")
    );
}

#[test]
fn test_get_joint_actual_pos_requires_reading() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main">
             <GetJointActualPos name="gj" jointpos="{joints}"/>
           </BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    let commands = Arc::clone(&harness.commands);
    assert!(wait_until(|| !commands.lock().is_empty()));

    // Successful response without a jointpos field still fails the node.
    let id = last_command_id(&harness);
    harness.cache.put(id, ok_resp());
    assert_eq!(tree.tick_root(), NodeStatus::Failure);

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    assert!(wait_until(|| commands.lock().len() >= 2));
    let id = last_command_id(&harness);
    let mut resp = ok_resp();
    let _ = resp.kv.insert(
        "jointpos".into(),
        "0.000000,0.785398,1.570796,-0.785398,3.141593,0.523599".into(),
    );
    harness.cache.put(id, resp);
    assert_eq!(tree.tick_root(), NodeStatus::Success);
    assert!(
        tree.blackboard()
            .lock()
            .get("joints")
            .is_some_and(|v| v.starts_with("0.000000,"))
    );
}

#[test]
fn test_simple_op_passes_enable_port() {
    let harness = harness();
    let mut tree = tree(
        &harness,
        r#"<BehaviorTree ID="Main"><SlowSpeed name="ss" enable="1"/></BehaviorTree>"#,
    );

    assert_eq!(tree.tick_root(), NodeStatus::Running);
    let commands = Arc::clone(&harness.commands);
    assert!(wait_until(|| !commands.lock().is_empty()));
    {
        let commands = commands.lock();
        assert_eq!(wxz_kv::get_or(&commands[0], "op", ""), "slowSpeed");
        assert_eq!(wxz_kv::get_or(&commands[0], "enable", ""), "1");
    }
}
