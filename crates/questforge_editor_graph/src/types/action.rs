// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action nodes and the catalog of action behaviors.
//!
//! The concrete actions (change an NPC value, hand out an item, ...) live
//! outside this crate. They plug in through [`ActionBehavior`], which tells
//! the editor how many outputs an action exposes and which remote object it
//! refers to.

use crate::cache::{ObjectKey, ResourceKind};
use crate::node::{Node, NodeId, NodeInit, NodePayload};
use crate::registry::{from_record, to_record, NodeSerializer, RecordBase, RecordError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Payload of an action node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionData {
    /// Catalog ID of the action
    pub action_type: u32,
    /// Opaque configuration blob owned by the action behavior
    pub action_data: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionRecord {
    #[serde(flatten)]
    base: RecordBase,
    action_type: u32,
    #[serde(default)]
    action_data: String,
}

/// Serializer for the `action` bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionNodeSerializer;

impl NodeSerializer for ActionNodeSerializer {
    fn bucket(&self) -> &str {
        "action"
    }

    fn serialize(&self, node: &Node) -> Result<Value, RecordError> {
        let data = node.as_action().ok_or(RecordError::PayloadMismatch {
            node: node.id,
            expected: "action",
        })?;
        to_record(&ActionRecord {
            base: RecordBase::of(node),
            action_type: data.action_type,
            action_data: data.action_data.clone(),
        })
    }

    fn deserialize(&self, type_tag: &str, record: &Value) -> Result<Node, RecordError> {
        let record: ActionRecord = from_record(record)?;
        Ok(Node::new(
            record.base.id,
            type_tag,
            record.base.position(),
            NodePayload::Action(ActionData {
                action_type: record.action_type,
                action_data: record.action_data,
            }),
        ))
    }

    fn create_new(&self, type_tag: &str, init: &NodeInit) -> Node {
        let action_type = init
            .option("actionType")
            .and_then(Value::as_u64)
            .and_then(|t| u32::try_from(t).ok())
            .unwrap_or_default();
        let action_data = init
            .option("actionData")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Node::new(
            NodeId::new(),
            type_tag,
            init.position,
            NodePayload::Action(ActionData {
                action_type,
                action_data,
            }),
        )
    }
}

/// Behavior of one kind of action
pub trait ActionBehavior: Send + Sync {
    /// Catalog ID
    fn action_type(&self) -> u32;

    /// Name shown in the action picker
    fn display_name(&self) -> &str;

    /// Label of the main output
    fn main_output_label(&self, _action_data: &str) -> String {
        String::new()
    }

    /// Labels of the outputs beyond the main one
    fn additional_outputs(&self, _action_data: &str) -> Vec<String> {
        Vec::new()
    }

    /// Remote object the action refers to, if any
    fn referenced_object(&self, _action_data: &str) -> Option<ObjectKey> {
        None
    }
}

/// Registry of action behaviors keyed by action type
#[derive(Clone, Default)]
pub struct ActionCatalog {
    behaviors: IndexMap<u32, Arc<dyn ActionBehavior>>,
}

impl ActionCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behavior under its action type
    pub fn register(&mut self, behavior: impl ActionBehavior + 'static) {
        self.behaviors.insert(behavior.action_type(), Arc::new(behavior));
    }

    /// Behavior for an action type
    pub fn get(&self, action_type: u32) -> Option<&dyn ActionBehavior> {
        self.behaviors.get(&action_type).map(|b| b.as_ref())
    }

    /// All behaviors, in registration order
    pub fn behaviors(&self) -> impl Iterator<Item = &dyn ActionBehavior> {
        self.behaviors.values().map(|b| b.as_ref())
    }

    /// `(main label, additional labels)` for an action. Unknown types get one unlabeled output.
    pub fn output_labels(&self, data: &ActionData) -> (String, Vec<String>) {
        match self.get(data.action_type) {
            Some(behavior) => (
                behavior.main_output_label(&data.action_data),
                behavior.additional_outputs(&data.action_data),
            ),
            None => (String::new(), Vec::new()),
        }
    }
}

impl std::fmt::Debug for ActionCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCatalog")
            .field("action_types", &self.behaviors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Action with fixed output labels.
///
/// When `object_kind` is set, the action data is read as JSON and its
/// `objectId` field names the referenced object.
#[derive(Debug, Clone, Default)]
pub struct SimpleAction {
    /// Catalog ID
    pub action_type: u32,
    /// Display name
    pub name: String,
    /// Label of the main output
    pub main_label: String,
    /// Labels of the extra outputs
    pub additional: Vec<String>,
    /// Kind of object referenced through `objectId`
    pub object_kind: Option<ResourceKind>,
}

impl SimpleAction {
    /// Action with a single unlabeled output
    pub fn new(action_type: u32, name: impl Into<String>) -> Self {
        Self {
            action_type,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add labeled outputs
    pub fn with_outputs(mut self, main_label: impl Into<String>, additional: &[&str]) -> Self {
        self.main_label = main_label.into();
        self.additional = additional.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Make the action reference an object of the given kind
    pub fn referencing(mut self, kind: ResourceKind) -> Self {
        self.object_kind = Some(kind);
        self
    }
}

impl ActionBehavior for SimpleAction {
    fn action_type(&self) -> u32 {
        self.action_type
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn main_output_label(&self, _action_data: &str) -> String {
        self.main_label.clone()
    }

    fn additional_outputs(&self, _action_data: &str) -> Vec<String> {
        self.additional.clone()
    }

    fn referenced_object(&self, action_data: &str) -> Option<ObjectKey> {
        let kind = self.object_kind?;
        let data: Value = serde_json::from_str(action_data).ok()?;
        let id = match data.get("objectId")? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(ObjectKey::new(kind, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_shape() {
        let serializer = ActionNodeSerializer;
        let node = serializer.create_new(
            "action",
            &NodeInit::at(100.0, 50.0)
                .with_option("actionType", 5)
                .with_option("actionData", "{\"value\":3}"),
        );
        let record = serializer.serialize(&node).unwrap();
        assert_eq!(record["actionType"], json!(5));
        assert_eq!(record["actionData"], json!("{\"value\":3}"));
        assert_eq!(record["x"], json!(100.0));
        assert_eq!(record["id"], json!(node.id.to_string()));

        let restored = serializer.deserialize("action", &record).unwrap();
        assert_eq!(restored.id, node.id);
        assert_eq!(restored.as_action(), node.as_action());
    }

    #[test]
    fn test_missing_action_type_is_malformed() {
        let record = json!({ "id": NodeId::new(), "x": 0.0, "y": 0.0 });
        assert!(matches!(
            ActionNodeSerializer.deserialize("action", &record),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_catalog_labels() {
        let mut catalog = ActionCatalog::new();
        catalog.register(SimpleAction::new(7, "Roll dice").with_outputs("Success", &["Failure"]));

        let known = ActionData {
            action_type: 7,
            action_data: String::new(),
        };
        assert_eq!(
            catalog.output_labels(&known),
            ("Success".to_string(), vec!["Failure".to_string()])
        );

        let unknown = ActionData {
            action_type: 99,
            action_data: String::new(),
        };
        assert_eq!(catalog.output_labels(&unknown), (String::new(), Vec::new()));
    }

    #[test]
    fn test_referenced_object() {
        let action = SimpleAction::new(3, "Change NPC value").referencing(ResourceKind::Npc);
        assert_eq!(
            action.referenced_object(r#"{"objectId":"42"}"#),
            Some(ObjectKey::new(ResourceKind::Npc, "42"))
        );
        assert_eq!(action.referenced_object("not json"), None);
        assert_eq!(SimpleAction::new(4, "Wait").referenced_object(r#"{"objectId":"1"}"#), None);
    }
}
