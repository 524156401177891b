// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and links.

use crate::link::{Endpoint, Link, LinkId};
use crate::node::{Node, NodeId};
use crate::port::{PortDirection, PortId};
use indexmap::IndexMap;

/// A node graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes in the graph, in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Links between nodes
    links: IndexMap<LinkId, Link>,
    /// Whether a node may link its output to its own input
    allow_self_links: bool,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or forbid links from a node back into itself
    pub fn with_self_links(mut self, allow: bool) -> Self {
        self.allow_self_links = allow;
        self
    }

    /// Whether self links are allowed
    pub fn allows_self_links(&self) -> bool {
        self.allow_self_links
    }

    /// Remove every node and link
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
    }

    /// Add a node to the graph. A node with the same ID is replaced.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;
        self.links.retain(|_, l| !l.involves_node(node_id));
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether a node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Direction of a port on a node, if the port exists
    pub fn port_direction(&self, node_id: NodeId, port: &PortId) -> Option<PortDirection> {
        let node = self.nodes.get(&node_id)?;
        if node.has_output(port) {
            Some(PortDirection::Output)
        } else if node.has_input(port) {
            Some(PortDirection::Input)
        } else {
            None
        }
    }

    /// Link an output port to an input port, enforcing link invariants
    pub fn connect(&mut self, source: Endpoint, target: Endpoint) -> Result<LinkId, ConnectionError> {
        self.validate_link(&source, &target)?;
        Ok(self.insert_link(Link::new(source, target)))
    }

    /// Check whether a link between the two endpoints would be valid
    pub fn validate_link(&self, source: &Endpoint, target: &Endpoint) -> Result<(), ConnectionError> {
        if !self.contains_node(source.node) {
            return Err(ConnectionError::NodeNotFound(source.node));
        }
        if !self.contains_node(target.node) {
            return Err(ConnectionError::NodeNotFound(target.node));
        }

        match self.port_direction(source.node, &source.port) {
            Some(PortDirection::Output) => {}
            Some(PortDirection::Input) => {
                return Err(ConnectionError::SourceNotOutput(source.port.clone()))
            }
            None => return Err(ConnectionError::PortNotFound(source.port.clone())),
        }
        match self.port_direction(target.node, &target.port) {
            Some(PortDirection::Input) => {}
            Some(PortDirection::Output) => {
                return Err(ConnectionError::TargetNotInput(target.port.clone()))
            }
            None => return Err(ConnectionError::PortNotFound(target.port.clone())),
        }

        if source.node == target.node && !self.allow_self_links {
            return Err(ConnectionError::SelfLink);
        }

        if self
            .links
            .values()
            .any(|l| l.source == *source && l.target == *target)
        {
            return Err(ConnectionError::AlreadyConnected);
        }

        Ok(())
    }

    /// Insert a link without port validation (used when rebuilding a saved graph)
    pub fn insert_link(&mut self, link: Link) -> LinkId {
        let id = link.id;
        self.links.insert(id, link);
        id
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        self.links.shift_remove(&link_id)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Drop links of a node whose output port no longer exists
    pub fn prune_dangling_links(&mut self, node_id: NodeId) -> Vec<Link> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };

        let dangling: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.source.node == node_id && !node.has_output(&l.source.port))
            .map(|l| l.id)
            .collect();

        dangling
            .into_iter()
            .filter_map(|id| self.links.shift_remove(&id))
            .collect()
    }
}

/// Error when creating a link
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(PortId),

    /// Link would start at an input port
    #[error("Port {0} is not an output port")]
    SourceNotOutput(PortId),

    /// Link would end at an output port
    #[error("Port {0} is not an input port")]
    TargetNotInput(PortId),

    /// Self links are not allowed in this graph
    #[error("Self-link not allowed")]
    SelfLink,

    /// The same ports are already linked
    #[error("Ports already connected")]
    AlreadyConnected,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodePayload, Position};
    use crate::types::text::TextData;

    fn text_node() -> Node {
        Node::new(
            NodeId::new(),
            "npcText",
            Position::default(),
            NodePayload::Text(TextData::default()),
        )
    }

    #[test]
    fn test_connect_and_cascade_delete() {
        let mut graph = Graph::new();
        let a = graph.add_node(text_node());
        let b = graph.add_node(text_node());

        graph
            .connect(Endpoint::new(a, "output"), Endpoint::new(b, "input"))
            .unwrap();
        assert_eq!(graph.link_count(), 1);

        graph.remove_node(b);
        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_target_must_be_input() {
        let mut graph = Graph::new();
        let a = graph.add_node(text_node());
        let b = graph.add_node(text_node());

        let err = graph
            .connect(Endpoint::new(a, "output"), Endpoint::new(b, "output"))
            .unwrap_err();
        assert_eq!(err, ConnectionError::TargetNotInput(PortId::main_output()));

        let err = graph
            .connect(Endpoint::new(a, "input"), Endpoint::new(b, "input"))
            .unwrap_err();
        assert_eq!(err, ConnectionError::SourceNotOutput(PortId::input()));
    }

    #[test]
    fn test_self_links() {
        let mut graph = Graph::new();
        let a = graph.add_node(text_node());
        let err = graph
            .connect(Endpoint::new(a, "output"), Endpoint::new(a, "input"))
            .unwrap_err();
        assert_eq!(err, ConnectionError::SelfLink);

        let mut graph = Graph::new().with_self_links(true);
        let a = graph.add_node(text_node());
        assert!(graph
            .connect(Endpoint::new(a, "output"), Endpoint::new(a, "input"))
            .is_ok());
    }

    #[test]
    fn test_duplicate_link_rejected() {
        let mut graph = Graph::new();
        let a = graph.add_node(text_node());
        let b = graph.add_node(text_node());
        graph
            .connect(Endpoint::new(a, "output"), Endpoint::new(b, "input"))
            .unwrap();
        let err = graph
            .connect(Endpoint::new(a, "output"), Endpoint::new(b, "input"))
            .unwrap_err();
        assert_eq!(err, ConnectionError::AlreadyConnected);
    }

    #[test]
    fn test_prune_dangling_links() {
        let mut graph = Graph::new();
        let a = graph.add_node(text_node());
        let b = graph.add_node(text_node());
        graph
            .connect(Endpoint::new(a, "output"), Endpoint::new(b, "input"))
            .unwrap();

        graph.node_mut(a).unwrap().outputs.clear();
        let removed = graph.prune_dangling_links(a);
        assert_eq!(removed.len(), 1);
        assert_eq!(graph.link_count(), 0);
    }
}
