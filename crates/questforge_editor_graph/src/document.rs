// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted graph documents.
//!
//! A document is a JSON object keyed by bucket name. Every registered node
//! serializer owns one bucket; the reserved `link` bucket holds the links.
//! Saving fails as a whole when a node has no serializer. Loading skips
//! buckets nobody handles so documents written by newer editors still open.

use crate::graph::Graph;
use crate::link::{Endpoint, Link, Vertex};
use crate::node::{Node, NodeId};
use crate::port::PortId;
use crate::registry::{NodeTypeRegistry, RecordError, LINK_BUCKET};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialized graph: bucket name to records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphDocument {
    buckets: IndexMap<String, Vec<Value>>,
}

impl GraphDocument {
    /// Empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of a bucket
    pub fn bucket(&self, name: &str) -> Option<&[Value]> {
        self.buckets.get(name).map(Vec::as_slice)
    }

    /// Bucket names, in document order
    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Append a record to a bucket, creating it if needed
    pub fn push(&mut self, bucket: &str, record: Value) {
        self.bucket_entry(bucket).push(record);
    }

    /// Make sure a bucket exists, even if empty
    pub fn ensure_bucket(&mut self, bucket: &str) {
        self.bucket_entry(bucket);
    }

    fn bucket_entry(&mut self, bucket: &str) -> &mut Vec<Value> {
        self.buckets.entry(bucket.to_string()).or_default()
    }

    /// Total number of records across all buckets
    pub fn record_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Parse a document from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Render the document as pretty JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The document as a JSON value
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Persisted form of a link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    /// Source node
    pub source_node_id: NodeId,
    /// Output port on the source node
    pub source_node_port: PortId,
    /// Target node
    pub target_node_id: NodeId,
    /// Input port on the target node
    pub target_node_port: PortId,
    /// Routing waypoints
    #[serde(default)]
    pub vertices: Vec<Vertex>,
    /// Optional label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl LinkRecord {
    /// Record of an existing link
    pub fn of(link: &Link) -> Self {
        Self {
            source_node_id: link.source.node,
            source_node_port: link.source.port.clone(),
            target_node_id: link.target.node,
            target_node_port: link.target.port.clone(),
            vertices: link.vertices.clone(),
            label: link.label.clone(),
        }
    }
}

/// Builds links while a document is loaded.
///
/// Front ends that draw custom link chrome install their own factory.
pub trait LinkFactory {
    /// Create the link for a record whose endpoints both exist
    fn create_link(&self, record: &LinkRecord) -> Link;
}

/// Plain links with an arrow head
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLinkFactory;

impl LinkFactory for DefaultLinkFactory {
    fn create_link(&self, record: &LinkRecord) -> Link {
        let link = Link::new(
            Endpoint::new(record.source_node_id, record.source_node_port.clone()),
            Endpoint::new(record.target_node_id, record.target_node_port.clone()),
        )
        .with_vertices(record.vertices.clone());
        match &record.label {
            Some(label) => link.with_label(label.clone()),
            None => link,
        }
    }
}

/// Error while saving or loading a graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A node's type has no serializer
    #[error("Node {node} has unknown type '{tag}'")]
    UnknownNodeType {
        /// Offending node
        node: NodeId,
        /// Its type tag
        tag: String,
    },

    /// A record could not be written or read
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Two records carry the same node ID
    #[error("Duplicate node {0}")]
    DuplicateNode(NodeId),
}

/// Summary of a load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Nodes added
    pub nodes: usize,
    /// Links added
    pub links: usize,
    /// Buckets no serializer handles
    pub skipped_buckets: Vec<String>,
    /// Links whose endpoints were missing
    pub dropped_links: usize,
    /// Links kept although a port they name does not exist on the loaded node
    pub unmatched_ports: usize,
}

/// Serialize every node and link of a graph.
///
/// All registered buckets and the link bucket are present in the result,
/// even when empty.
pub fn serialize_graph(graph: &Graph, registry: &NodeTypeRegistry) -> Result<GraphDocument, GraphError> {
    let mut document = GraphDocument::new();
    for bucket in registry.buckets() {
        document.ensure_bucket(bucket);
    }

    for node in graph.nodes() {
        match registry.serialize_node(node)? {
            Some((bucket, record)) => document.push(bucket, record),
            None => {
                return Err(GraphError::UnknownNodeType {
                    node: node.id,
                    tag: node.node_type.clone(),
                })
            }
        }
    }

    document.ensure_bucket(LINK_BUCKET);
    for link in graph.links() {
        let record = serde_json::to_value(LinkRecord::of(link)).map_err(RecordError::from)?;
        document.push(LINK_BUCKET, record);
    }

    tracing::debug!(
        nodes = graph.node_count(),
        links = graph.link_count(),
        "Serialized graph"
    );
    Ok(document)
}

/// Replace the contents of `graph` with the document.
///
/// `on_node_added` runs for every node before any link is rebuilt. The graph
/// is left untouched when an error is returned.
pub fn deserialize_graph(
    graph: &mut Graph,
    document: &GraphDocument,
    registry: &NodeTypeRegistry,
    link_factory: &dyn LinkFactory,
    mut on_node_added: Option<&mut dyn FnMut(&mut Node)>,
) -> Result<LoadReport, GraphError> {
    let mut rebuilt = Graph::new().with_self_links(graph.allows_self_links());
    let mut report = LoadReport::default();

    for bucket in document.bucket_names() {
        if bucket == LINK_BUCKET {
            continue;
        }
        if registry.tags_for_bucket(bucket).next().is_none() {
            tracing::debug!(bucket, "Skipping bucket without serializer");
            report.skipped_buckets.push(bucket.to_string());
            continue;
        }
        for record in document.bucket(bucket).unwrap_or_default() {
            let Some(result) = registry.deserialize_record(bucket, record) else {
                continue;
            };
            let mut node = result?;
            if rebuilt.contains_node(node.id) {
                return Err(GraphError::DuplicateNode(node.id));
            }
            if let Some(callback) = on_node_added.as_mut() {
                callback(&mut node);
            }
            rebuilt.add_node(node);
            report.nodes += 1;
        }
    }

    for record in document.bucket(LINK_BUCKET).unwrap_or_default() {
        let record: LinkRecord = serde_json::from_value(record.clone()).map_err(RecordError::from)?;
        if !rebuilt.contains_node(record.source_node_id) || !rebuilt.contains_node(record.target_node_id) {
            tracing::warn!(
                source = %record.source_node_id,
                target = %record.target_node_id,
                "Dropping link with missing endpoint"
            );
            report.dropped_links += 1;
            continue;
        }
        let ports_exist = rebuilt
            .node(record.source_node_id)
            .is_some_and(|n| n.has_output(&record.source_node_port))
            && rebuilt
                .node(record.target_node_id)
                .is_some_and(|n| n.has_input(&record.target_node_port));
        if !ports_exist {
            tracing::warn!(
                source = %record.source_node_id,
                source_port = %record.source_node_port,
                target = %record.target_node_id,
                target_port = %record.target_node_port,
                "Keeping link to a port the node does not have"
            );
            report.unmatched_ports += 1;
        }
        rebuilt.insert_link(link_factory.create_link(&record));
        report.links += 1;
    }

    *graph = rebuilt;
    tracing::info!(
        nodes = report.nodes,
        links = report.links,
        skipped = report.skipped_buckets.len(),
        "Loaded graph"
    );
    Ok(report)
}
