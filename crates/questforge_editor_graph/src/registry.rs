// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node type registry.
//!
//! Maps a node type tag to the serializer that turns a [`Node`] into a
//! persisted record and back. Every node kind plugs in here; the graph
//! serializer only ever talks to this registry.

use crate::node::{Node, NodeId, NodeInit, NodePayload, Position};
use crate::types::action::ActionNodeSerializer;
use crate::types::condition::ConditionNodeSerializer;
use crate::types::reference::ReferenceNodeSerializer;
use crate::types::text::TextNodeSerializer;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Bucket reserved for links in the persisted document
pub const LINK_BUCKET: &str = "link";

/// Field that routes a record back to its tag when several tags share a bucket
pub const NODE_TYPE_FIELD: &str = "nodeType";

/// Converts one node kind to and from its persisted record
pub trait NodeSerializer: Send + Sync {
    /// Name of the document bucket the records live in
    fn bucket(&self) -> &str;

    /// Turn a node into its record
    fn serialize(&self, node: &Node) -> Result<Value, RecordError>;

    /// Rebuild a node from its record
    fn deserialize(&self, type_tag: &str, record: &Value) -> Result<Node, RecordError>;

    /// Create a fresh node, e.g. when dropped from the palette
    fn create_new(&self, type_tag: &str, init: &NodeInit) -> Node;
}

/// Error when a record cannot be converted
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Record does not match the expected shape
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Record is for a different node kind
    #[error("Node {node} does not carry a {expected} payload")]
    PayloadMismatch {
        /// Offending node
        node: NodeId,
        /// Payload kind the serializer handles
        expected: &'static str,
    },

    /// A structural constraint of the record is broken
    #[error("Invalid record: {0}")]
    Invalid(String),
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No serializer registered for the tag
    #[error("Unknown node type: {0}")]
    UnknownType(String),

    /// Tried to register a serializer into the link bucket
    #[error("Bucket '{0}' is reserved")]
    ReservedBucket(String),
}

/// Registry of node serializers keyed by type tag
#[derive(Clone, Default)]
pub struct NodeTypeRegistry {
    serializers: IndexMap<String, Arc<dyn NodeSerializer>>,
}

impl NodeTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in action, condition, text and reference types
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.insert("action", Arc::new(ActionNodeSerializer));
        registry.insert("condition", Arc::new(ConditionNodeSerializer));
        registry.insert("npcText", Arc::new(TextNodeSerializer::new("npcText")));
        registry.insert("playerText", Arc::new(TextNodeSerializer::new("playerText")));
        registry.insert("reference", Arc::new(ReferenceNodeSerializer));
        registry
    }

    /// Register a serializer for a type tag, replacing any previous one
    pub fn register(
        &mut self,
        type_tag: impl Into<String>,
        serializer: impl NodeSerializer + 'static,
    ) -> Result<(), RegistryError> {
        if serializer.bucket() == LINK_BUCKET {
            return Err(RegistryError::ReservedBucket(LINK_BUCKET.to_string()));
        }
        self.insert(type_tag, Arc::new(serializer));
        Ok(())
    }

    fn insert(&mut self, type_tag: impl Into<String>, serializer: Arc<dyn NodeSerializer>) {
        let type_tag = type_tag.into();
        tracing::debug!(%type_tag, bucket = serializer.bucket(), "Registered node type");
        self.serializers.insert(type_tag, serializer);
    }

    /// Get the serializer for a tag
    pub fn get(&self, type_tag: &str) -> Option<&dyn NodeSerializer> {
        self.serializers.get(type_tag).map(|s| s.as_ref())
    }

    /// Whether a tag is registered
    pub fn contains(&self, type_tag: &str) -> bool {
        self.serializers.contains_key(type_tag)
    }

    /// All registered tags, in registration order
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.serializers.keys().map(String::as_str)
    }

    /// All bucket names, in registration order and without duplicates
    pub fn buckets(&self) -> Vec<&str> {
        let mut buckets: Vec<&str> = Vec::new();
        for serializer in self.serializers.values() {
            if !buckets.contains(&serializer.bucket()) {
                buckets.push(serializer.bucket());
            }
        }
        buckets
    }

    /// Tags whose records live in the given bucket
    pub fn tags_for_bucket<'a>(&'a self, bucket: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.serializers
            .iter()
            .filter(move |(_, s)| s.bucket() == bucket)
            .map(|(tag, _)| tag.as_str())
    }

    /// Whether more than one tag persists into the bucket
    pub fn is_shared_bucket(&self, bucket: &str) -> bool {
        self.tags_for_bucket(bucket).nth(1).is_some()
    }

    /// Create a fresh node of the given type
    pub fn create_by_type(&self, type_tag: &str, init: &NodeInit) -> Result<Node, RegistryError> {
        let serializer = self
            .get(type_tag)
            .ok_or_else(|| RegistryError::UnknownType(type_tag.to_string()))?;
        Ok(serializer.create_new(type_tag, init))
    }

    /// Serialize a node into `(bucket, record)`
    pub fn serialize_node(&self, node: &Node) -> Result<Option<(&str, Value)>, RecordError> {
        let Some(serializer) = self.get(&node.node_type) else {
            return Ok(None);
        };
        let bucket = serializer.bucket();
        let mut record = serializer.serialize(node)?;
        if self.is_shared_bucket(bucket) {
            if let Value::Object(fields) = &mut record {
                fields.insert(NODE_TYPE_FIELD.to_string(), Value::String(node.node_type.clone()));
            }
        }
        Ok(Some((bucket, record)))
    }

    /// Deserialize a record found in `bucket`. Returns `None` if nothing handles the bucket.
    pub fn deserialize_record(&self, bucket: &str, record: &Value) -> Option<Result<Node, RecordError>> {
        let routed = record
            .get(NODE_TYPE_FIELD)
            .and_then(Value::as_str)
            .filter(|tag| self.get(tag).is_some_and(|s| s.bucket() == bucket));
        let type_tag = match routed {
            Some(tag) => tag,
            None => self.tags_for_bucket(bucket).next()?,
        };
        let serializer = self.get(type_tag)?;
        Some(serializer.deserialize(type_tag, record))
    }
}

impl std::fmt::Debug for NodeTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTypeRegistry")
            .field("types", &self.serializers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fields every node record carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecordBase {
    /// Node ID
    pub id: NodeId,
    /// Horizontal position
    pub x: f64,
    /// Vertical position
    pub y: f64,
}

impl RecordBase {
    /// Base fields of a node
    pub fn of(node: &Node) -> Self {
        Self {
            id: node.id,
            x: node.position.x,
            y: node.position.y,
        }
    }

    /// Position encoded in the record
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Serialize a typed record into JSON
pub fn to_record<T: Serialize>(record: &T) -> Result<Value, RecordError> {
    Ok(serde_json::to_value(record)?)
}

/// Parse a typed record from JSON
pub fn from_record<T: DeserializeOwned>(record: &Value) -> Result<T, RecordError> {
    Ok(T::deserialize(record)?)
}

/// Serializer for plugin node types whose payload is kept as raw JSON fields
#[derive(Debug, Clone)]
pub struct JsonNodeSerializer {
    bucket: String,
}

impl JsonNodeSerializer {
    /// Serializer persisting into `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }
}

impl NodeSerializer for JsonNodeSerializer {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn serialize(&self, node: &Node) -> Result<Value, RecordError> {
        let NodePayload::Custom(fields) = &node.payload else {
            return Err(RecordError::PayloadMismatch {
                node: node.id,
                expected: "custom",
            });
        };
        let mut record = fields.clone();
        let Value::Object(base) = to_record(&RecordBase::of(node))? else {
            return Err(RecordError::Invalid("node base is not an object".to_string()));
        };
        record.extend(base);
        Ok(Value::Object(record))
    }

    fn deserialize(&self, type_tag: &str, record: &Value) -> Result<Node, RecordError> {
        let base: RecordBase = from_record(record)?;
        let mut fields = match record {
            Value::Object(fields) => fields.clone(),
            _ => return Err(RecordError::Invalid("record is not an object".to_string())),
        };
        for key in ["id", "x", "y", NODE_TYPE_FIELD] {
            fields.remove(key);
        }
        Ok(Node::new(base.id, type_tag, base.position(), NodePayload::Custom(fields)))
    }

    fn create_new(&self, type_tag: &str, init: &NodeInit) -> Node {
        Node::new(
            NodeId::new(),
            type_tag,
            init.position,
            NodePayload::Custom(init.options.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_types() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let tags: Vec<&str> = registry.type_tags().collect();
        assert_eq!(tags, ["action", "condition", "npcText", "playerText", "reference"]);
        assert_eq!(
            registry.buckets(),
            ["action", "condition", "npcText", "playerText", "reference"]
        );
        assert!(!registry.is_shared_bucket("action"));
    }

    #[test]
    fn test_unknown_type_is_recoverable() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let err = registry
            .create_by_type("teleport", &NodeInit::at(0.0, 0.0))
            .unwrap_err();
        assert_eq!(err, RegistryError::UnknownType("teleport".to_string()));
    }

    #[test]
    fn test_link_bucket_is_reserved() {
        let mut registry = NodeTypeRegistry::new();
        let err = registry
            .register("fancyLink", JsonNodeSerializer::new(LINK_BUCKET))
            .unwrap_err();
        assert_eq!(err, RegistryError::ReservedBucket("link".to_string()));
    }

    #[test]
    fn test_shared_bucket_routing() {
        let mut registry = NodeTypeRegistry::new();
        registry.register("note", JsonNodeSerializer::new("misc")).unwrap();
        registry.register("marker", JsonNodeSerializer::new("misc")).unwrap();
        assert!(registry.is_shared_bucket("misc"));

        let node = registry
            .create_by_type("marker", &NodeInit::at(1.0, 2.0).with_option("color", "red"))
            .unwrap();
        let (bucket, record) = registry.serialize_node(&node).unwrap().unwrap();
        assert_eq!(bucket, "misc");
        assert_eq!(record[NODE_TYPE_FIELD], json!("marker"));
        assert_eq!(record["color"], json!("red"));

        let restored = registry.deserialize_record("misc", &record).unwrap().unwrap();
        assert_eq!(restored.node_type, "marker");
        assert_eq!(restored.id, node.id);
        assert_eq!(restored.position, Position::new(1.0, 2.0));
    }

    #[test]
    fn test_unhandled_bucket() {
        let registry = NodeTypeRegistry::with_builtin_types();
        assert!(registry.deserialize_record("quest", &json!({})).is_none());
    }
}
