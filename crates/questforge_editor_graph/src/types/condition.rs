// SPDX-License-Identifier: MIT OR Apache-2.0
//! Condition nodes.
//!
//! A condition node owns an ordered list of cases, each holding its own
//! condition tree. Every case gets an output port; a final `else` port
//! catches everything no case matched.

use crate::condition::{ConditionCatalog, ConditionElementRecord, ConditionTree};
use crate::node::{Node, NodeId, NodeInit, NodePayload};
use crate::port::{OutputPort, PortId};
use crate::registry::{from_record, to_record, NodeSerializer, RecordBase, RecordError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One branch of a condition node
#[derive(Debug, Clone)]
pub struct ConditionCase {
    /// Case ID, unique within the node
    pub id: u32,
    /// Condition entries of the case
    pub tree: ConditionTree,
}

impl ConditionCase {
    /// Output port of this case
    pub fn port(&self) -> PortId {
        PortId::condition_case(self.id)
    }
}

/// Payload of a condition node
#[derive(Debug, Clone, Default)]
pub struct ConditionNodeData {
    cases: Vec<ConditionCase>,
    next_case_id: u32,
}

impl ConditionNodeData {
    /// Node without cases (only the else branch)
    pub fn new() -> Self {
        Self::default()
    }

    /// Cases, in order
    pub fn cases(&self) -> &[ConditionCase] {
        &self.cases
    }

    /// ID the next case will get
    pub fn next_case_id(&self) -> u32 {
        self.next_case_id
    }

    /// Append an empty case. `None` once every case ID has been handed out.
    pub fn add_case(&mut self) -> Option<u32> {
        let id = self.next_case_id;
        self.next_case_id = id.checked_add(1)?;
        self.cases.push(ConditionCase {
            id,
            tree: ConditionTree::new(),
        });
        Some(id)
    }

    /// Remove a case
    pub fn remove_case(&mut self, case_id: u32) -> Option<ConditionCase> {
        let index = self.cases.iter().position(|c| c.id == case_id)?;
        Some(self.cases.remove(index))
    }

    /// Swap a case with the one `delta` places away. Out of range is a no-op.
    pub fn move_case(&mut self, case_id: u32, delta: isize) -> bool {
        let Some(index) = self.cases.iter().position(|c| c.id == case_id) else {
            return false;
        };
        match index.checked_add_signed(delta).filter(|&t| t < self.cases.len()) {
            Some(target) => {
                self.cases.swap(index, target);
                true
            }
            None => false,
        }
    }

    /// Get a case
    pub fn case(&self, case_id: u32) -> Option<&ConditionCase> {
        self.cases.iter().find(|c| c.id == case_id)
    }

    /// Get a mutable case
    pub fn case_mut(&mut self, case_id: u32) -> Option<&mut ConditionCase> {
        self.cases.iter_mut().find(|c| c.id == case_id)
    }

    /// Output ports: one per case, then `else`
    pub fn output_ports(&self) -> Vec<PortId> {
        self.cases
            .iter()
            .map(ConditionCase::port)
            .chain(std::iter::once(PortId::else_branch()))
            .collect()
    }

    /// Port labels matching [`Self::output_ports`]
    pub fn output_labels(&self, catalog: &dyn ConditionCatalog) -> Vec<String> {
        self.cases
            .iter()
            .map(|c| c.tree.describe(catalog))
            .chain(std::iter::once("Else".to_string()))
            .collect()
    }
}

/// Persisted form of a condition case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionCaseRecord {
    /// Case ID
    pub id: u32,
    /// Root-level entries
    pub condition_elements: Vec<ConditionElementRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionRecord {
    #[serde(flatten)]
    base: RecordBase,
    #[serde(default)]
    conditions: Vec<ConditionCaseRecord>,
    #[serde(default)]
    current_condition_id: Option<u32>,
}

/// Serializer for the `condition` bucket
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionNodeSerializer;

impl ConditionNodeSerializer {
    fn node_with_ports(node: Node, data: &ConditionNodeData) -> Node {
        let outputs = data
            .output_ports()
            .into_iter()
            .map(|id| OutputPort::mounted(id, "", 0.0))
            .collect();
        node.with_outputs(outputs)
    }
}

impl NodeSerializer for ConditionNodeSerializer {
    fn bucket(&self) -> &str {
        "condition"
    }

    fn serialize(&self, node: &Node) -> Result<Value, RecordError> {
        let data = node.as_condition().ok_or(RecordError::PayloadMismatch {
            node: node.id,
            expected: "condition",
        })?;
        to_record(&ConditionRecord {
            base: RecordBase::of(node),
            conditions: data
                .cases
                .iter()
                .map(|c| ConditionCaseRecord {
                    id: c.id,
                    condition_elements: c.tree.to_records(),
                })
                .collect(),
            current_condition_id: Some(data.next_case_id),
        })
    }

    fn deserialize(&self, type_tag: &str, record: &Value) -> Result<Node, RecordError> {
        let record: ConditionRecord = from_record(record)?;

        let mut cases = Vec::with_capacity(record.conditions.len());
        for case in &record.conditions {
            if cases.iter().any(|c: &ConditionCase| c.id == case.id) {
                return Err(RecordError::Invalid(format!(
                    "duplicate condition case {} in node {}",
                    case.id, record.base.id
                )));
            }
            cases.push(ConditionCase {
                id: case.id,
                tree: ConditionTree::from_records(&case.condition_elements)?,
            });
        }

        // Older records may lack the counter; never hand out an ID twice.
        let mut next_free = 0;
        for case in &cases {
            let after = case.id.checked_add(1).ok_or_else(|| {
                RecordError::Invalid(format!(
                    "condition case {} in node {} exhausts the case ID space",
                    case.id, record.base.id
                ))
            })?;
            next_free = next_free.max(after);
        }
        let data = ConditionNodeData {
            cases,
            next_case_id: record.current_condition_id.unwrap_or(0).max(next_free),
        };

        let node = Node::new(
            record.base.id,
            type_tag,
            record.base.position(),
            NodePayload::Condition(data.clone()),
        );
        Ok(Self::node_with_ports(node, &data))
    }

    fn create_new(&self, type_tag: &str, init: &NodeInit) -> Node {
        let data = ConditionNodeData::new();
        let node = Node::new(
            NodeId::new(),
            type_tag,
            init.position,
            NodePayload::Condition(data.clone()),
        );
        Self::node_with_ports(node, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{GroupOperator, PlainConditionCatalog};
    use serde_json::json;

    #[test]
    fn test_case_ids_are_monotonic() {
        let mut data = ConditionNodeData::new();
        assert_eq!(data.add_case(), Some(0));
        assert_eq!(data.add_case(), Some(1));
        data.remove_case(1);
        assert_eq!(data.add_case(), Some(2));
        assert_eq!(
            data.output_ports(),
            vec![PortId::condition_case(0), PortId::condition_case(2), PortId::else_branch()]
        );
    }

    #[test]
    fn test_move_case() {
        let mut data = ConditionNodeData::new();
        let first = data.add_case().unwrap();
        let second = data.add_case().unwrap();
        assert!(data.move_case(second, -1));
        assert_eq!(data.cases()[0].id, second);
        assert!(!data.move_case(first, 1));
    }

    #[test]
    fn test_labels() {
        let mut data = ConditionNodeData::new();
        let case = data.add_case().unwrap();
        let tree = &mut data.case_mut(case).unwrap().tree;
        let a = tree.add_empty_entry();
        tree.set_leaf(a, "hasItem", json!({})).unwrap();
        let b = tree.add_empty_entry();
        tree.set_leaf(b, "isNight", json!({})).unwrap();
        tree.set_selected(a, true).unwrap();
        tree.set_selected(b, true).unwrap();
        tree.group_selected(GroupOperator::Or).unwrap();

        assert_eq!(
            data.output_labels(&PlainConditionCatalog),
            vec!["(hasItem OR isNight)".to_string(), "Else".to_string()]
        );
    }

    #[test]
    fn test_record_round_trip() {
        let serializer = ConditionNodeSerializer;
        let mut node = serializer.create_new("condition", &NodeInit::at(0.0, 0.0));
        assert_eq!(node.outputs.len(), 1);

        let data = node.as_condition_mut().unwrap();
        let case = data.add_case().unwrap();
        let tree = &mut data.case_mut(case).unwrap().tree;
        let leaf = tree.add_empty_entry();
        tree.set_leaf(leaf, "isAlive", json!({ "npc": "7" })).unwrap();

        let record = serializer.serialize(&node).unwrap();
        assert_eq!(
            record["conditions"],
            json!([{
                "id": 0,
                "conditionElements": [{ "conditionType": "isAlive", "conditionData": { "npc": "7" } }],
            }])
        );
        assert_eq!(record["currentConditionId"], json!(1));

        let restored = serializer.deserialize("condition", &record).unwrap();
        let restored_data = restored.as_condition().unwrap();
        assert_eq!(restored_data.next_case_id(), 1);
        assert_eq!(
            restored.output_ids().cloned().collect::<Vec<_>>(),
            vec![PortId::condition_case(0), PortId::else_branch()]
        );
    }

    #[test]
    fn test_counter_never_reuses_ids() {
        let record = json!({
            "id": NodeId::new(),
            "x": 0.0,
            "y": 0.0,
            "conditions": [{ "id": 4, "conditionElements": [] }],
        });
        let node = ConditionNodeSerializer.deserialize("condition", &record).unwrap();
        assert_eq!(node.as_condition().unwrap().next_case_id(), 5);
    }

    #[test]
    fn test_last_case_id_rejected() {
        let record = json!({
            "id": NodeId::new(),
            "x": 0.0,
            "y": 0.0,
            "conditions": [{ "id": u32::MAX, "conditionElements": [] }],
        });
        assert!(matches!(
            ConditionNodeSerializer.deserialize("condition", &record),
            Err(RecordError::Invalid(_))
        ));
    }

    #[test]
    fn test_exhausted_counter_refuses_new_cases() {
        let record = json!({
            "id": NodeId::new(),
            "x": 0.0,
            "y": 0.0,
            "conditions": [{ "id": 3, "conditionElements": [] }],
            "currentConditionId": u32::MAX,
        });
        let mut node = ConditionNodeSerializer.deserialize("condition", &record).unwrap();
        let data = node.as_condition_mut().unwrap();
        assert_eq!(data.next_case_id(), u32::MAX);
        assert_eq!(data.add_case(), None);
        assert_eq!(data.cases().len(), 1);
    }

    #[test]
    fn test_duplicate_case_ids_rejected() {
        let record = json!({
            "id": NodeId::new(),
            "x": 0.0,
            "y": 0.0,
            "conditions": [
                { "id": 1, "conditionElements": [] },
                { "id": 1, "conditionElements": [] },
            ],
        });
        assert!(matches!(
            ConditionNodeSerializer.deserialize("condition", &record),
            Err(RecordError::Invalid(_))
        ));
    }
}
