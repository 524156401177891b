// SPDX-License-Identifier: MIT OR Apache-2.0
//! Text nodes (NPC lines and player lines).

use crate::node::{Node, NodeId, NodeInit, NodePayload};
use crate::registry::{from_record, to_record, NodeSerializer, RecordBase, RecordError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a text node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextData {
    /// Line of dialog
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextRecord {
    #[serde(flatten)]
    base: RecordBase,
    #[serde(default)]
    text: String,
}

/// Serializer for text nodes. One instance per bucket.
#[derive(Debug, Clone)]
pub struct TextNodeSerializer {
    bucket: String,
}

impl TextNodeSerializer {
    /// Serializer persisting into `bucket`
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }
}

impl NodeSerializer for TextNodeSerializer {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn serialize(&self, node: &Node) -> Result<Value, RecordError> {
        let NodePayload::Text(data) = &node.payload else {
            return Err(RecordError::PayloadMismatch {
                node: node.id,
                expected: "text",
            });
        };
        to_record(&TextRecord {
            base: RecordBase::of(node),
            text: data.text.clone(),
        })
    }

    fn deserialize(&self, type_tag: &str, record: &Value) -> Result<Node, RecordError> {
        let record: TextRecord = from_record(record)?;
        Ok(Node::new(
            record.base.id,
            type_tag,
            record.base.position(),
            NodePayload::Text(TextData { text: record.text }),
        ))
    }

    fn create_new(&self, type_tag: &str, init: &NodeInit) -> Node {
        let text = init
            .option("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Node::new(
            NodeId::new(),
            type_tag,
            init.position,
            NodePayload::Text(TextData { text }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_record() {
        let serializer = TextNodeSerializer::new("npcText");
        let node = serializer.create_new("npcText", &NodeInit::at(1.0, 2.0).with_option("text", "Hello"));
        let record = serializer.serialize(&node).unwrap();
        assert_eq!(record["text"], json!("Hello"));

        let restored = serializer.deserialize("npcText", &record).unwrap();
        assert!(matches!(&restored.payload, NodePayload::Text(t) if t.text == "Hello"));
    }

    #[test]
    fn test_wrong_payload() {
        let serializer = TextNodeSerializer::new("playerText");
        let node = Node::new(
            NodeId::new(),
            "playerText",
            Default::default(),
            NodePayload::Custom(Default::default()),
        );
        assert!(matches!(
            serializer.serialize(&node),
            Err(RecordError::PayloadMismatch { expected: "text", .. })
        ));
    }
}
