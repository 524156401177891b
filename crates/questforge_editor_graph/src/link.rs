// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use crate::port::PortId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a link. Editor-local, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

/// Routing waypoint of a link
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

/// One end of a link
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Node the link is attached to
    pub node: NodeId,
    /// Port on that node
    pub port: PortId,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(node: NodeId, port: impl Into<PortId>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

/// Visual chrome of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAppearance {
    /// Draw the link dashed
    pub dashed: bool,
    /// Draw an arrow head at the target
    pub arrow_head: bool,
}

impl Default for LinkAppearance {
    fn default() -> Self {
        Self {
            dashed: false,
            arrow_head: true,
        }
    }
}

/// A directed link from an output port to an input port
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Output side
    pub source: Endpoint,
    /// Input side
    pub target: Endpoint,
    /// Routing waypoints
    pub vertices: Vec<Vertex>,
    /// Optional label
    pub label: Option<String>,
    /// Visual chrome
    pub appearance: LinkAppearance,
}

impl Link {
    /// Create a new link
    pub fn new(source: Endpoint, target: Endpoint) -> Self {
        Self {
            id: LinkId::new(),
            source,
            target,
            vertices: Vec::new(),
            label: None,
            appearance: LinkAppearance::default(),
        }
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the routing waypoints
    pub fn with_vertices(mut self, vertices: Vec<Vertex>) -> Self {
        self.vertices = vertices;
        self
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node == node_id || self.target.node == node_id
    }

    /// Check if this link starts at a specific output port
    pub fn starts_at(&self, node_id: NodeId, port: &PortId) -> bool {
        self.source.node == node_id && self.source.port == *port
    }
}
