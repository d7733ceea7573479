// SPDX-License-Identifier: Apache-2.0

//! Minimal behavior-tree engine.
//!
//! The deployment tree format is the conventional XML shape: a `<root>`
//! element naming the main tree, `<BehaviorTree ID="...">` definitions, and
//! nested control/action elements whose attributes are ports. This engine
//! implements exactly the node contracts the service needs: stateful actions
//! with `on_start`/`on_running`/`on_halted`, memory `Sequence` and
//! `Fallback` controls, and a string blackboard for output ports.

use parking_lot::Mutex;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::sync::Arc;

/// Tick outcome of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Not started since the last halt/completion.
    Idle,
    /// Started and awaiting completion.
    Running,
    /// Completed successfully.
    Success,
    /// Completed with a failure.
    Failure,
}

/// Shared string blackboard backing output ports.
pub type Blackboard = Arc<Mutex<HashMap<String, String>>>;

/// Build-time context of one node instance: its XML attributes (ports) and
/// the tree blackboard.
#[derive(Clone)]
pub struct NodeContext {
    attrs: HashMap<String, String>,
    blackboard: Blackboard,
}

impl NodeContext {
    /// Creates a context, mainly for tests.
    #[must_use]
    pub fn new(attrs: HashMap<String, String>, blackboard: Blackboard) -> Self {
        NodeContext { attrs, blackboard }
    }

    /// Reads an input port. A value wrapped in `{braces}` is read from the
    /// blackboard at tick time instead of the XML literal.
    #[must_use]
    pub fn input(&self, port: &str) -> Option<String> {
        let raw = self.attrs.get(port)?;
        if let Some(key) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            return self.blackboard.lock().get(key).cloned();
        }
        Some(raw.clone())
    }

    /// Writes an output port. The attribute names the blackboard entry,
    /// either as `{key}` or a bare key.
    pub fn set_output(&self, port: &str, value: impl Into<String>) {
        let Some(raw) = self.attrs.get(port) else {
            return;
        };
        let key = raw
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .unwrap_or(raw);
        let _ = self.blackboard.lock().insert(key.to_owned(), value.into());
    }
}

/// A tree node. Controls tick children; leaves run actions.
pub trait BtNode: Send {
    /// Instance name (XML `name` attribute, or the element tag).
    fn name(&self) -> &str;
    /// Advances the node one tick.
    fn tick(&mut self) -> NodeStatus;
    /// Interrupts the node, releasing per-activation state.
    fn halt(&mut self);
}

/// Stateful action contract: `on_start` once per activation, `on_running`
/// on every subsequent tick, `on_halted` when interrupted.
pub trait StatefulAction: Send {
    /// First tick of an activation.
    fn on_start(&mut self) -> NodeStatus;
    /// Subsequent ticks while running.
    fn on_running(&mut self) -> NodeStatus;
    /// Interruption; clear per-activation state.
    fn on_halted(&mut self);
}

/// Adapter turning a [`StatefulAction`] into a [`BtNode`].
pub struct ActionNode {
    name: String,
    action: Box<dyn StatefulAction>,
    status: NodeStatus,
}

impl ActionNode {
    /// Wraps an action under an instance name.
    #[must_use]
    pub fn new(name: impl Into<String>, action: Box<dyn StatefulAction>) -> Self {
        ActionNode {
            name: name.into(),
            action,
            status: NodeStatus::Idle,
        }
    }
}

impl BtNode for ActionNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self) -> NodeStatus {
        let status = if self.status == NodeStatus::Running {
            self.action.on_running()
        } else {
            self.action.on_start()
        };
        self.status = status;
        status
    }

    fn halt(&mut self) {
        if self.status == NodeStatus::Running {
            self.action.on_halted();
        }
        self.status = NodeStatus::Idle;
    }
}

/// Memory sequence: ticks children in order, remembering the running child;
/// fails fast and resets on completion.
pub struct SequenceNode {
    name: String,
    children: Vec<Box<dyn BtNode>>,
    current: usize,
}

impl BtNode for SequenceNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self) -> NodeStatus {
        while self.current < self.children.len() {
            match self.children[self.current].tick() {
                NodeStatus::Success => self.current += 1,
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Failure => {
                    self.halt();
                    return NodeStatus::Failure;
                }
                NodeStatus::Idle => return NodeStatus::Running,
            }
        }
        self.current = 0;
        NodeStatus::Success
    }

    fn halt(&mut self) {
        for child in &mut self.children {
            child.halt();
        }
        self.current = 0;
    }
}

/// Memory fallback: first succeeding child wins; fails when all fail.
pub struct FallbackNode {
    name: String,
    children: Vec<Box<dyn BtNode>>,
    current: usize,
}

impl BtNode for FallbackNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self) -> NodeStatus {
        while self.current < self.children.len() {
            match self.children[self.current].tick() {
                NodeStatus::Failure => self.current += 1,
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Success => {
                    self.halt();
                    return NodeStatus::Success;
                }
                NodeStatus::Idle => return NodeStatus::Running,
            }
        }
        self.current = 0;
        NodeStatus::Failure
    }

    fn halt(&mut self) {
        for child in &mut self.children {
            child.halt();
        }
        self.current = 0;
    }
}

/// Errors creating a tree from XML.
#[derive(thiserror::Error, Debug)]
pub enum TreeError {
    /// The document is not well-formed XML.
    #[error("XML parse failed: {details}")]
    Xml {
        /// Parser diagnostics.
        details: String,
    },

    /// The document holds no `<BehaviorTree>` definition.
    #[error("No BehaviorTree definition in document")]
    MissingTree,

    /// A `<BehaviorTree>` element has no child node.
    #[error("BehaviorTree `{id}` is empty")]
    EmptyTree {
        /// Tree id.
        id: String,
    },

    /// An element names a node type no builder is registered for.
    #[error("Unknown node type `{type_name}`")]
    UnknownNode {
        /// Offending element tag.
        type_name: String,
    },
}

/// Builder for a registered node type.
pub type NodeBuilder = Box<dyn Fn(&str, &NodeContext) -> Box<dyn BtNode> + Send + Sync>;

/// Registry of node types, populated once at startup.
#[derive(Default)]
pub struct BehaviorTreeFactory {
    builders: HashMap<String, NodeBuilder>,
}

struct XmlElem {
    tag: String,
    attrs: HashMap<String, String>,
    children: Vec<XmlElem>,
}

impl BehaviorTreeFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        BehaviorTreeFactory::default()
    }

    /// Registers a node type; later registrations replace earlier ones.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        builder: impl Fn(&str, &NodeContext) -> Box<dyn BtNode> + Send + Sync + 'static,
    ) {
        let _ = self.builders.insert(type_name.into(), Box::new(builder));
    }

    /// Parses an XML document and instantiates its main tree.
    pub fn create_tree_from_text(&self, xml: &str) -> Result<Tree, TreeError> {
        let root = parse_document(xml)?;

        // <root main_tree_to_execute="..."> wrapping is optional; a bare
        // <BehaviorTree> works too.
        let (defs, main_id) = if root.tag == "root" {
            let main_id = root.attrs.get("main_tree_to_execute").cloned();
            (root.children, main_id)
        } else {
            (vec![root], None)
        };

        let def = defs
            .iter()
            .filter(|e| e.tag == "BehaviorTree")
            .find(|e| match &main_id {
                Some(id) => e.attrs.get("ID") == Some(id),
                None => true,
            })
            .ok_or(TreeError::MissingTree)?;

        let child = def.children.first().ok_or_else(|| TreeError::EmptyTree {
            id: def.attrs.get("ID").cloned().unwrap_or_default(),
        })?;

        let blackboard: Blackboard = Arc::new(Mutex::new(HashMap::new()));
        let root_node = self.build_node(child, &blackboard)?;
        Ok(Tree {
            root: root_node,
            blackboard,
        })
    }

    fn build_node(
        &self,
        elem: &XmlElem,
        blackboard: &Blackboard,
    ) -> Result<Box<dyn BtNode>, TreeError> {
        let name = elem
            .attrs
            .get("name")
            .cloned()
            .unwrap_or_else(|| elem.tag.clone());

        match elem.tag.as_str() {
            "Sequence" => {
                let children = self.build_children(elem, blackboard)?;
                Ok(Box::new(SequenceNode {
                    name,
                    children,
                    current: 0,
                }))
            }
            "Fallback" => {
                let children = self.build_children(elem, blackboard)?;
                Ok(Box::new(FallbackNode {
                    name,
                    children,
                    current: 0,
                }))
            }
            type_name => {
                let builder = self
                    .builders
                    .get(type_name)
                    .ok_or_else(|| TreeError::UnknownNode {
                        type_name: type_name.to_owned(),
                    })?;
                let ctx = NodeContext::new(elem.attrs.clone(), Arc::clone(blackboard));
                Ok(builder(&name, &ctx))
            }
        }
    }

    fn build_children(
        &self,
        elem: &XmlElem,
        blackboard: &Blackboard,
    ) -> Result<Vec<Box<dyn BtNode>>, TreeError> {
        elem.children
            .iter()
            .map(|child| self.build_node(child, blackboard))
            .collect()
    }
}

fn parse_document(xml: &str) -> Result<XmlElem, TreeError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<XmlElem> = Vec::new();
    let mut root: Option<XmlElem> = None;

    let xml_err = |e: quick_xml::Error| TreeError::Xml {
        details: e.to_string(),
    };

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                let elem = elem_from_start(&start)?;
                stack.push(elem);
            }
            Event::Empty(start) => {
                let elem = elem_from_start(&start)?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::End(_) => {
                let elem = stack.pop().ok_or(TreeError::Xml {
                    details: "unbalanced end tag".into(),
                })?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(TreeError::Xml {
            details: "unclosed element".into(),
        });
    }
    root.ok_or(TreeError::Xml {
        details: "empty document".into(),
    })
}

fn elem_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElem, TreeError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TreeError::Xml {
            details: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        let _ = attrs.insert(key, value);
    }
    Ok(XmlElem {
        tag,
        attrs,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElem],
    root: &mut Option<XmlElem>,
    elem: XmlElem,
) -> Result<(), TreeError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
    } else if root.is_none() {
        *root = Some(elem);
    } else {
        return Err(TreeError::Xml {
            details: "multiple top-level elements".into(),
        });
    }
    Ok(())
}

/// An instantiated tree.
pub struct Tree {
    root: Box<dyn BtNode>,
    blackboard: Blackboard,
}

impl Tree {
    /// Ticks the root once.
    pub fn tick_root(&mut self) -> NodeStatus {
        self.root.tick()
    }

    /// Halts the whole tree.
    pub fn halt(&mut self) {
        self.root.halt();
    }

    /// Root node name, for visualization.
    #[must_use]
    pub fn root_name(&self) -> &str {
        self.root.name()
    }

    /// The tree blackboard.
    #[must_use]
    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }
}
