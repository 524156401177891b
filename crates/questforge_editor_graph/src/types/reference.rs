// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference nodes pointing at another design object.

use crate::cache::{ObjectKey, ResourceKind};
use crate::node::{Node, NodeId, NodeInit, NodePayload};
use crate::registry::{from_record, to_record, NodeSerializer, RecordBase, RecordError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a reference node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    /// Free text shown with the reference
    pub reference_text: String,
    /// Referenced object, if one was picked
    pub object: Option<ObjectKey>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceRecord {
    #[serde(flatten)]
    base: RecordBase,
    #[serde(default)]
    reference_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object_type: Option<ResourceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object_id: Option<String>,
}

/// Serializer for the `reference` bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceNodeSerializer;

impl NodeSerializer for ReferenceNodeSerializer {
    fn bucket(&self) -> &str {
        "reference"
    }

    fn serialize(&self, node: &Node) -> Result<Value, RecordError> {
        let NodePayload::Reference(data) = &node.payload else {
            return Err(RecordError::PayloadMismatch {
                node: node.id,
                expected: "reference",
            });
        };
        to_record(&ReferenceRecord {
            base: RecordBase::of(node),
            reference_text: data.reference_text.clone(),
            object_type: data.object.as_ref().map(|o| o.kind),
            object_id: data.object.as_ref().map(|o| o.id.clone()),
        })
    }

    fn deserialize(&self, type_tag: &str, record: &Value) -> Result<Node, RecordError> {
        let record: ReferenceRecord = from_record(record)?;
        let object = match (record.object_type, record.object_id) {
            (Some(kind), Some(id)) => Some(ObjectKey::new(kind, id)),
            (None, None) => None,
            _ => {
                return Err(RecordError::Invalid(format!(
                    "reference node {} needs both objectType and objectId",
                    record.base.id
                )))
            }
        };
        Ok(Node::new(
            record.base.id,
            type_tag,
            record.base.position(),
            NodePayload::Reference(ReferenceData {
                reference_text: record.reference_text,
                object,
            }),
        ))
    }

    fn create_new(&self, type_tag: &str, init: &NodeInit) -> Node {
        let object_type = init
            .option("objectType")
            .cloned()
            .and_then(|v| serde_json::from_value::<ResourceKind>(v).ok());
        let object_id = init.option("objectId").and_then(Value::as_str);
        let object = match (object_type, object_id) {
            (Some(kind), Some(id)) => Some(ObjectKey::new(kind, id)),
            _ => None,
        };
        Node::new(
            NodeId::new(),
            type_tag,
            init.position,
            NodePayload::Reference(ReferenceData {
                reference_text: String::new(),
                object,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_record() {
        let serializer = ReferenceNodeSerializer;
        let node = serializer.create_new(
            "reference",
            &NodeInit::at(0.0, 0.0)
                .with_option("objectType", "quest")
                .with_option("objectId", "q-12"),
        );
        let record = serializer.serialize(&node).unwrap();
        assert_eq!(record["objectType"], json!("quest"));
        assert_eq!(record["objectId"], json!("q-12"));

        let restored = serializer.deserialize("reference", &record).unwrap();
        let NodePayload::Reference(data) = restored.payload else {
            panic!("expected reference payload");
        };
        assert_eq!(data.object, Some(ObjectKey::new(ResourceKind::Quest, "q-12")));
    }

    #[test]
    fn test_half_reference_rejected() {
        let record = json!({ "id": NodeId::new(), "x": 0.0, "y": 0.0, "objectType": "npc" });
        assert!(matches!(
            ReferenceNodeSerializer.deserialize("reference", &record),
            Err(RecordError::Invalid(_))
        ));
    }
}
