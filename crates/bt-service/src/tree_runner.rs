// SPDX-License-Identifier: Apache-2.0

//! Tree runner: XML hot-reload, tick loop, visualization observer.

use crate::arm_types::load_text_file;
use crate::bt::{BehaviorTreeFactory, NodeStatus, Tree};
use tracing::{error, info, warn};
use wxz_bus::Bus;
use wxz_config::TreeObserverConfig;
use wxz_dto::time::{now_epoch_ms, now_monotonic_ms};
use wxz_kv::KvMap;
use wxz_node::EventDtoPublisher;

/// Outcome of a reload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeReloadResult {
    /// A new tree was parsed and installed.
    Ok,
    /// The file content is identical to the running tree.
    Unchanged,
    /// The file could not be read; the previous tree keeps running.
    ReadError,
    /// The file changed but did not parse; the previous tree keeps running.
    ParseError,
}

impl TreeReloadResult {
    /// Wire token reported over RPC.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TreeReloadResult::Ok => "ok",
            TreeReloadResult::Unchanged => "unchanged",
            TreeReloadResult::ReadError => "read_error",
            TreeReloadResult::ParseError => "parse_error",
        }
    }
}

/// Live tree-state publisher, attached after a successful load.
pub struct TreeObserver {
    publisher: EventDtoPublisher,
    min_interval_ms: u64,
    last_publish_ms: u64,
}

impl TreeObserver {
    /// Binds an observer stream. With the deployment transport this claims
    /// a port and can fail; callers retry on subsequent ports.
    pub fn bind(
        bus: &Bus,
        port: i32,
        max_msg_per_sec: i32,
        source: &str,
        max_payload: usize,
    ) -> Result<Self, wxz_bus::Error> {
        let publisher = EventDtoPublisher::new(
            bus,
            format!("bt/groot/{port}"),
            "ws.bt_tree_state.v1",
            source,
            max_payload,
        );
        let per_sec = i64::from(max_msg_per_sec).max(1) as u64;
        Ok(TreeObserver {
            publisher,
            min_interval_ms: 1000 / per_sec,
            last_publish_ms: 0,
        })
    }

    /// Publishes a root-state sample, rate-limited to the configured
    /// message budget.
    pub fn publish_state(&mut self, root_name: &str, status: NodeStatus) {
        let now = now_monotonic_ms();
        if now.saturating_sub(self.last_publish_ms) < self.min_interval_ms {
            return;
        }
        self.last_publish_ms = now;

        let mut kv = KvMap::new();
        let _ = kv.insert("root".into(), root_name.to_owned());
        let _ = kv.insert(
            "status".into(),
            match status {
                NodeStatus::Idle => "idle",
                NodeStatus::Running => "running",
                NodeStatus::Success => "success",
                NodeStatus::Failure => "failure",
            }
            .into(),
        );
        let _ = kv.insert("ts_ms".into(), now_epoch_ms().to_string());
        let _ = self.publisher.publish_kv(&kv);
    }
}

/// Owns the tree instance: loads the XML, hot-reloads it on change, ticks
/// the root, and feeds the observer.
pub struct BtTreeRunner {
    factory: BehaviorTreeFactory,
    xml_path: String,
    reload_ms: u64,
    last_xml: String,
    tree: Option<Tree>,
    last_reload_ms: u64,
    read_error_reported: bool,
    observer: Option<TreeObserver>,
}

impl BtTreeRunner {
    /// Creates a runner; no tree until the first reload.
    #[must_use]
    pub fn new(factory: BehaviorTreeFactory, xml_path: impl Into<String>, reload_ms: u64) -> Self {
        BtTreeRunner {
            factory,
            xml_path: xml_path.into(),
            reload_ms,
            last_xml: String::new(),
            tree: None,
            last_reload_ms: 0,
            read_error_reported: false,
            observer: None,
        }
    }

    /// Reloads when the file content changed. Read failures are logged once
    /// until a read succeeds again; parse failures keep the previous tree.
    pub fn reload_if_changed(&mut self) -> TreeReloadResult {
        let Some(xml) = load_text_file(&self.xml_path) else {
            if !self.read_error_reported {
                error!(path = %self.xml_path, "failed to read tree xml");
                self.read_error_reported = true;
            }
            return TreeReloadResult::ReadError;
        };
        self.read_error_reported = false;

        if xml == self.last_xml {
            return TreeReloadResult::Unchanged;
        }

        match self.factory.create_tree_from_text(&xml) {
            Ok(tree) => {
                self.tree = Some(tree);
                self.last_xml = xml;
                info!("tree loaded");
                TreeReloadResult::Ok
            }
            Err(e) => {
                error!(error = %e, "tree load error");
                TreeReloadResult::ParseError
            }
        }
    }

    /// Reload under the configured throttle. Returns the result only when a
    /// reload was actually attempted.
    pub fn maybe_reload(&mut self) -> Option<TreeReloadResult> {
        let now = now_monotonic_ms();
        if now.saturating_sub(self.last_reload_ms) < self.reload_ms {
            return None;
        }
        self.last_reload_ms = now;
        Some(self.reload_if_changed())
    }

    /// Ticks the root once, if a tree is loaded.
    pub fn tick_once(&mut self) {
        let Some(tree) = &mut self.tree else {
            return;
        };
        let status = tree.tick_root();
        if let Some(observer) = &mut self.observer {
            observer.publish_state(tree.root_name(), status);
        }
    }

    /// True when a tree is loaded.
    #[must_use]
    pub fn has_tree(&self) -> bool {
        self.tree.is_some()
    }

    /// Attaches the visualization observer, trying successive ports on
    /// bind failure. Failure to attach is non-fatal.
    pub fn configure_observer(
        &mut self,
        bus: &Bus,
        config: &TreeObserverConfig,
        source: &str,
        max_payload: usize,
    ) {
        self.observer = None;
        if !config.enable {
            return;
        }
        if self.tree.is_none() {
            warn!("observer requested but tree not loaded; skipping");
            return;
        }

        let mut port = config.port;
        for attempt in 0..=config.retry.max(0) {
            match TreeObserver::bind(bus, port, config.max_msg_per_sec, source, max_payload) {
                Ok(observer) => {
                    info!(port, "tree observer enabled");
                    self.observer = Some(observer);
                    return;
                }
                Err(e) => {
                    if attempt < config.retry {
                        warn!(port, error = %e, "observer bind failed, retrying next port");
                        port += 1;
                    } else {
                        warn!(port, error = %e, "observer bind failed (ignored)");
                    }
                }
            }
        }
    }
}
