// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.

use crate::port::{OutputPort, PortId};
use crate::types::action::ActionData;
use crate::types::condition::ConditionNodeData;
use crate::types::reference::ReferenceData;
use crate::types::text::TextData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a node, stable across save/load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Position of a node on the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Create a position
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// What a node currently shows in its body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DisplayState {
    /// Regular content, nothing remote to resolve
    #[default]
    Normal,
    /// Remote data is being loaded
    Loading,
    /// Remote data resolved to a display name
    Ready(String),
    /// Remote data could not be loaded
    Error(String),
}

impl DisplayState {
    /// Whether the node shows its error icon
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Type-specific data carried by a node
#[derive(Debug, Clone)]
pub enum NodePayload {
    /// Action node
    Action(ActionData),
    /// Condition node with its cases
    Condition(ConditionNodeData),
    /// Plain text node (npc or player line)
    Text(TextData),
    /// Reference to another design object
    Reference(ReferenceData),
    /// Fields of a plugin node type, kept verbatim
    Custom(serde_json::Map<String, serde_json::Value>),
}

/// Options passed to a node factory when creating a fresh node
#[derive(Debug, Clone, Default)]
pub struct NodeInit {
    /// Where the node is dropped
    pub position: Position,
    /// Type-specific options (e.g. `actionType`)
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl NodeInit {
    /// Options for a node dropped at the given coordinates
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Position::new(x, y),
            options: serde_json::Map::new(),
        }
    }

    /// Add a type-specific option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Read an option
    pub fn option(&self, key: &str) -> Option<&serde_json::Value> {
        self.options.get(key)
    }
}

/// A node instance in the graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Registered type tag
    pub node_type: String,
    /// Position in the graph UI
    pub position: Position,
    /// Input ports
    pub inputs: Vec<PortId>,
    /// Output ports
    pub outputs: Vec<OutputPort>,
    /// Type-specific data
    pub payload: NodePayload,
    /// Display state of remote-backed content
    pub display: DisplayState,
    /// Bumped every time the output ports are rebuilt
    pub port_revision: u64,
}

impl Node {
    /// Create a node with one input and one unlabeled main output
    pub fn new(id: NodeId, node_type: impl Into<String>, position: Position, payload: NodePayload) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            position,
            inputs: vec![PortId::input()],
            outputs: vec![OutputPort::mounted(PortId::main_output(), "", 0.0)],
            payload,
            display: DisplayState::Normal,
            port_revision: 0,
        }
    }

    /// Replace the output ports
    pub fn with_outputs(mut self, outputs: Vec<OutputPort>) -> Self {
        self.outputs = outputs;
        self
    }

    /// IDs of the output ports, in order
    pub fn output_ids(&self) -> impl Iterator<Item = &PortId> {
        self.outputs.iter().map(|p| &p.id)
    }

    /// Get an output port by ID
    pub fn output(&self, port_id: &PortId) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.id == *port_id)
    }

    /// Whether the node has an input port with this ID
    pub fn has_input(&self, port_id: &PortId) -> bool {
        self.inputs.contains(port_id)
    }

    /// Whether the node has an output port with this ID
    pub fn has_output(&self, port_id: &PortId) -> bool {
        self.output(port_id).is_some()
    }

    /// Action data, if this is an action node
    pub fn as_action(&self) -> Option<&ActionData> {
        match &self.payload {
            NodePayload::Action(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable action data
    pub fn as_action_mut(&mut self) -> Option<&mut ActionData> {
        match &mut self.payload {
            NodePayload::Action(data) => Some(data),
            _ => None,
        }
    }

    /// Condition data, if this is a condition node
    pub fn as_condition(&self) -> Option<&ConditionNodeData> {
        match &self.payload {
            NodePayload::Condition(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable condition data
    pub fn as_condition_mut(&mut self) -> Option<&mut ConditionNodeData> {
        match &mut self.payload {
            NodePayload::Condition(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_has_default_ports() {
        let node = Node::new(
            NodeId::new(),
            "npcText",
            Position::new(10.0, 20.0),
            NodePayload::Text(TextData::default()),
        );
        assert!(node.has_input(&PortId::input()));
        assert!(node.has_output(&PortId::main_output()));
        assert_eq!(node.outputs.len(), 1);
        assert!(node.as_action().is_none());
    }

    #[test]
    fn test_node_id_parse() {
        let id = NodeId::new();
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_init_options() {
        let init = NodeInit::at(5.0, 6.0).with_option("actionType", 3);
        assert_eq!(init.position, Position::new(5.0, 6.0));
        assert_eq!(init.option("actionType"), Some(&serde_json::json!(3)));
    }
}
