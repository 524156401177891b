// SPDX-License-Identifier: MIT OR Apache-2.0
//! Condition tree of a single condition case.
//!
//! Entries live in an arena addressed by [`EntryId`]. Groups own an ordered
//! list of child IDs and every child stores the ID of the group holding it.
//! Root-level entries have no parent. All mutations keep the two sides in
//! sync and either apply completely or return an error without touching
//! the tree.
//!
//! Groups with fewer than two children are never left behind: removing an
//! entry from a group collapses the group into its remaining child, walking
//! upward as long as groups keep degenerating. The root list itself is never
//! collapsed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::registry::RecordError;

/// Condition type tag of group entries
pub const GROUP_CONDITION_TYPE: &str = "group";

/// Arena index of a condition entry. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Logical operator of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    /// All children must hold
    And,
    /// Any child must hold
    Or,
}

impl fmt::Display for GroupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// Leaf check or group
#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    /// A single check with an opaque comparison payload
    Leaf {
        /// Condition type tag (empty for a fresh placeholder)
        condition_type: String,
        /// Comparison payload
        data: Value,
    },
    /// AND/OR group of child entries
    Group {
        /// Operator joining the children
        operator: GroupOperator,
        /// Child entries, in order
        children: Vec<EntryId>,
    },
}

/// One entry of a condition tree
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionEntry {
    /// Entry ID
    pub id: EntryId,
    /// Group holding this entry, `None` at root level
    pub parent: Option<EntryId>,
    /// Selection flag used by grouping
    pub selected: bool,
    /// Leaf or group content
    pub kind: EntryKind,
}

impl ConditionEntry {
    /// Whether this entry is a group
    pub fn is_group(&self) -> bool {
        matches!(self.kind, EntryKind::Group { .. })
    }
}

/// Rejected condition edit. The tree is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionEditError {
    /// Selected entries live in different lists
    #[error("Only conditions on the same level can be grouped")]
    CrossParentGrouping,

    /// Grouping needs at least two entries
    #[error("Select at least two conditions to group (selected: {selected})")]
    NotEnoughSelected {
        /// Number of selected entries
        selected: usize,
    },

    /// Target group is the entry itself or lies inside it
    #[error("A condition cannot be moved into itself")]
    CycleDetected,

    /// No entry with this ID
    #[error("Condition entry {0} not found")]
    EntryNotFound(EntryId),

    /// Entry is not a group
    #[error("Condition entry {0} is not a group")]
    NotAGroup(EntryId),

    /// Entry is not a leaf
    #[error("Condition entry {0} is not a leaf condition")]
    NotALeaf(EntryId),
}

/// Persisted form of a condition entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionElementRecord {
    /// Condition type tag, `"group"` for groups
    pub condition_type: String,
    /// Leaf payload, or [`GroupDataRecord`] for groups
    #[serde(default)]
    pub condition_data: Value,
}

/// `conditionData` of a persisted group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDataRecord {
    /// Group operator
    pub operator: GroupOperator,
    /// Children, recursively
    pub condition_elements: Vec<ConditionElementRecord>,
}

/// Turns leaf checks into readable text
pub trait ConditionCatalog: Send + Sync {
    /// Describe a single leaf check
    fn describe(&self, condition_type: &str, data: &Value) -> String;
}

/// Catalog naming each check by its type tag
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainConditionCatalog;

impl ConditionCatalog for PlainConditionCatalog {
    fn describe(&self, condition_type: &str, _data: &Value) -> String {
        if condition_type.is_empty() {
            "(empty condition)".to_string()
        } else {
            condition_type.to_string()
        }
    }
}

/// Editable tree of condition entries
#[derive(Debug, Clone, Default)]
pub struct ConditionTree {
    entries: IndexMap<EntryId, ConditionEntry>,
    root: Vec<EntryId>,
    next_id: u32,
}

impl ConditionTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the tree has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries, groups included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Root-level entries
    pub fn root(&self) -> &[EntryId] {
        &self.root
    }

    /// Get an entry
    pub fn get(&self, id: EntryId) -> Option<&ConditionEntry> {
        self.entries.get(&id)
    }

    /// Parent of an entry (`None` for root-level entries and unknown IDs)
    pub fn parent(&self, id: EntryId) -> Option<EntryId> {
        self.entries.get(&id).and_then(|e| e.parent)
    }

    /// Children of a group (empty for leaves)
    pub fn children(&self, id: EntryId) -> &[EntryId] {
        match self.entries.get(&id).map(|e| &e.kind) {
            Some(EntryKind::Group { children, .. }) => children,
            _ => &[],
        }
    }

    fn entry(&self, id: EntryId) -> Result<&ConditionEntry, ConditionEditError> {
        self.entries.get(&id).ok_or(ConditionEditError::EntryNotFound(id))
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut ConditionEntry, ConditionEditError> {
        self.entries
            .get_mut(&id)
            .ok_or(ConditionEditError::EntryNotFound(id))
    }

    fn allocate(&mut self, parent: Option<EntryId>, kind: EntryKind) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            ConditionEntry {
                id,
                parent,
                selected: false,
                kind,
            },
        );
        id
    }

    /// List that holds entries of the given parent
    fn container(&self, parent: Option<EntryId>) -> &[EntryId] {
        match parent {
            None => &self.root,
            Some(group) => self.children(group),
        }
    }

    /// Parent links always point at groups, so this only fails for unknown IDs
    fn container_mut(&mut self, parent: Option<EntryId>) -> Option<&mut Vec<EntryId>> {
        match parent {
            None => Some(&mut self.root),
            Some(group) => match self.entries.get_mut(&group).map(|e| &mut e.kind) {
                Some(EntryKind::Group { children, .. }) => Some(children),
                _ => None,
            },
        }
    }

    /// Append an empty leaf to the root list
    pub fn add_empty_entry(&mut self) -> EntryId {
        let id = self.allocate(
            None,
            EntryKind::Leaf {
                condition_type: String::new(),
                data: Value::Null,
            },
        );
        self.root.push(id);
        id
    }

    /// Replace the check of a leaf
    pub fn set_leaf(
        &mut self,
        id: EntryId,
        condition_type: impl Into<String>,
        data: Value,
    ) -> Result<(), ConditionEditError> {
        match &mut self.entry_mut(id)?.kind {
            EntryKind::Leaf {
                condition_type: t,
                data: d,
            } => {
                *t = condition_type.into();
                *d = data;
                Ok(())
            }
            EntryKind::Group { .. } => Err(ConditionEditError::NotALeaf(id)),
        }
    }

    /// Set the selection flag of an entry
    pub fn set_selected(&mut self, id: EntryId, selected: bool) -> Result<(), ConditionEditError> {
        self.entry_mut(id)?.selected = selected;
        Ok(())
    }

    /// Flip the selection flag of an entry
    pub fn toggle_selected(&mut self, id: EntryId) -> Result<bool, ConditionEditError> {
        let entry = self.entry_mut(id)?;
        entry.selected = !entry.selected;
        Ok(entry.selected)
    }

    /// Clear every selection flag
    pub fn clear_selection(&mut self) {
        for entry in self.entries.values_mut() {
            entry.selected = false;
        }
    }

    /// Selected entries, depth first in display order
    pub fn selected(&self) -> Vec<EntryId> {
        let mut selected = Vec::new();
        self.collect_selected(&self.root, &mut selected);
        selected
    }

    fn collect_selected(&self, ids: &[EntryId], out: &mut Vec<EntryId>) {
        for &id in ids {
            if self.entries.get(&id).is_some_and(|e| e.selected) {
                out.push(id);
            }
            self.collect_selected(self.children(id), out);
        }
    }

    /// Wrap every selected entry into a new group.
    ///
    /// All selected entries must share one parent. The group takes the place
    /// of the first selected entry.
    pub fn group_selected(&mut self, operator: GroupOperator) -> Result<EntryId, ConditionEditError> {
        let selected = self.selected();
        if selected.len() < 2 {
            return Err(ConditionEditError::NotEnoughSelected {
                selected: selected.len(),
            });
        }

        let parent = self.parent(selected[0]);
        if selected.iter().any(|&id| self.parent(id) != parent) {
            return Err(ConditionEditError::CrossParentGrouping);
        }

        let position = self
            .container(parent)
            .iter()
            .position(|id| selected.contains(id))
            .unwrap_or(0);

        let group = self.allocate(
            parent,
            EntryKind::Group {
                operator,
                children: selected.clone(),
            },
        );
        if let Some(container) = self.container_mut(parent) {
            container.retain(|id| !selected.contains(id));
            container.insert(position, group);
        }

        for id in &selected {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.parent = Some(group);
                entry.selected = false;
            }
        }
        Ok(group)
    }

    /// Swap an entry with the sibling `delta` places away. Out of range is a no-op.
    pub fn move_entry(&mut self, id: EntryId, delta: isize) -> Result<bool, ConditionEditError> {
        let parent = self.entry(id)?.parent;
        let Some(container) = self.container_mut(parent) else {
            return Ok(false);
        };
        let Some(index) = container.iter().position(|&e| e == id) else {
            return Ok(false);
        };
        let Some(target) = index.checked_add_signed(delta).filter(|&t| t < container.len()) else {
            return Ok(false);
        };
        container.swap(index, target);
        Ok(true)
    }

    /// Whether `candidate` is `ancestor` or lies somewhere below it
    pub fn is_within(&self, candidate: EntryId, ancestor: EntryId) -> bool {
        let mut current = Some(candidate);
        // Bounded walk: a chain longer than the arena would be a broken tree.
        for _ in 0..=self.entries.len() {
            match current {
                Some(id) if id == ancestor => return true,
                Some(id) => current = self.parent(id),
                None => return false,
            }
        }
        false
    }

    /// Move an entry to the end of a group, or of the root list when `target` is `None`
    pub fn drop_entry_into_group(
        &mut self,
        id: EntryId,
        target: Option<EntryId>,
    ) -> Result<(), ConditionEditError> {
        let old_parent = self.entry(id)?.parent;
        if let Some(group) = target {
            if !self.entry(group)?.is_group() {
                return Err(ConditionEditError::NotAGroup(group));
            }
            if self.is_within(group, id) {
                return Err(ConditionEditError::CycleDetected);
            }
        }

        if let Some(container) = self.container_mut(old_parent) {
            container.retain(|&e| e != id);
        }
        if let Some(container) = self.container_mut(target) {
            container.push(id);
        }
        self.entry_mut(id)?.parent = target;

        if old_parent != target {
            self.collapse_degenerate(old_parent);
        }
        Ok(())
    }

    /// Remove an entry. A deleted group hands its children to its own parent.
    pub fn delete_entry(&mut self, id: EntryId) -> Result<(), ConditionEditError> {
        let entry = self.entry(id)?;
        let parent = entry.parent;
        if entry.is_group() {
            self.splice_group(id);
        } else {
            if let Some(container) = self.container_mut(parent) {
                container.retain(|&e| e != id);
            }
            self.entries.shift_remove(&id);
        }
        self.collapse_degenerate(parent);
        Ok(())
    }

    /// Dissolve a group, putting its children where the group was
    pub fn ungroup(&mut self, id: EntryId) -> Result<(), ConditionEditError> {
        if !self.entry(id)?.is_group() {
            return Err(ConditionEditError::NotAGroup(id));
        }
        self.delete_entry(id)
    }

    /// Replace a group by its children, in place
    fn splice_group(&mut self, group: EntryId) {
        let Some(entry) = self.entries.shift_remove(&group) else {
            return;
        };
        let EntryKind::Group { children, .. } = entry.kind else {
            return;
        };

        for child in &children {
            if let Some(child) = self.entries.get_mut(child) {
                child.parent = entry.parent;
            }
        }

        let Some(container) = self.container_mut(entry.parent) else {
            return;
        };
        match container.iter().position(|&e| e == group) {
            Some(position) => {
                container.splice(position..=position, children);
            }
            None => container.extend(children),
        }
    }

    /// Collapse groups left with fewer than two children, walking upward
    fn collapse_degenerate(&mut self, mut parent: Option<EntryId>) {
        while let Some(group) = parent {
            let degenerate = self
                .get(group)
                .is_some_and(|e| e.is_group() && self.children(group).len() < 2);
            if !degenerate {
                break;
            }
            parent = self.parent(group);
            tracing::debug!(%group, "Collapsing degenerate condition group");
            self.splice_group(group);
        }
    }

    /// Check that parent links and child lists agree and every entry is reachable once
    pub fn is_consistent(&self) -> bool {
        let mut seen = 0usize;
        let mut stack: Vec<(Option<EntryId>, &[EntryId])> = vec![(None, self.root.as_slice())];
        while let Some((parent, ids)) = stack.pop() {
            for &id in ids {
                let Some(entry) = self.entries.get(&id) else {
                    return false;
                };
                if entry.parent != parent {
                    return false;
                }
                if let EntryKind::Group { children, .. } = &entry.kind {
                    if children.len() < 2 {
                        return false;
                    }
                    stack.push((Some(id), children.as_slice()));
                }
                seen += 1;
                if seen > self.entries.len() {
                    return false;
                }
            }
        }
        seen == self.entries.len()
    }

    /// Persisted form: the root list, recursively
    pub fn to_records(&self) -> Vec<ConditionElementRecord> {
        self.records_of(&self.root)
    }

    fn records_of(&self, ids: &[EntryId]) -> Vec<ConditionElementRecord> {
        ids.iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| match &entry.kind {
                EntryKind::Leaf {
                    condition_type,
                    data,
                } => ConditionElementRecord {
                    condition_type: condition_type.clone(),
                    condition_data: data.clone(),
                },
                EntryKind::Group { operator, children } => ConditionElementRecord {
                    condition_type: GROUP_CONDITION_TYPE.to_string(),
                    condition_data: serde_json::json!({
                        "operator": operator,
                        "conditionElements": self.records_of(children),
                    }),
                },
            })
            .collect()
    }

    /// Rebuild a tree from its persisted form, deriving parent links from nesting.
    ///
    /// Groups stored with fewer than two children are collapsed on load.
    pub fn from_records(records: &[ConditionElementRecord]) -> Result<Self, RecordError> {
        let mut tree = Self::new();
        let root = tree.build(records, None)?;
        tree.root = root;

        // Innermost first: children are allocated after their group.
        loop {
            let degenerate = tree
                .entries
                .values()
                .rev()
                .find(|e| matches!(&e.kind, EntryKind::Group { children, .. } if children.len() < 2))
                .map(|e| e.id);
            let Some(group) = degenerate else {
                break;
            };
            tree.splice_group(group);
        }
        Ok(tree)
    }

    fn build(
        &mut self,
        records: &[ConditionElementRecord],
        parent: Option<EntryId>,
    ) -> Result<Vec<EntryId>, RecordError> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = if record.condition_type == GROUP_CONDITION_TYPE {
                let group_data = GroupDataRecord::deserialize(&record.condition_data)?;
                let id = self.allocate(
                    parent,
                    EntryKind::Group {
                        operator: group_data.operator,
                        children: Vec::new(),
                    },
                );
                let children = self.build(&group_data.condition_elements, Some(id))?;
                if let Some(EntryKind::Group { children: slot, .. }) =
                    self.entries.get_mut(&id).map(|e| &mut e.kind)
                {
                    *slot = children;
                }
                id
            } else {
                self.allocate(
                    parent,
                    EntryKind::Leaf {
                        condition_type: record.condition_type.clone(),
                        data: record.condition_data.clone(),
                    },
                )
            };
            ids.push(id);
        }
        Ok(ids)
    }

    /// Readable summary, e.g. `a AND (b OR c)` for two root entries and a group
    pub fn describe(&self, catalog: &dyn ConditionCatalog) -> String {
        self.describe_list(&self.root, GroupOperator::And, catalog)
    }

    fn describe_list(&self, ids: &[EntryId], operator: GroupOperator, catalog: &dyn ConditionCatalog) -> String {
        ids.iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| match &entry.kind {
                EntryKind::Leaf {
                    condition_type,
                    data,
                } => catalog.describe(condition_type, data),
                EntryKind::Group { operator, children } => {
                    format!("({})", self.describe_list(children, *operator, catalog))
                }
            })
            .collect::<Vec<_>>()
            .join(&format!(" {operator} "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(tree: &mut ConditionTree, name: &str) -> EntryId {
        let id = tree.add_empty_entry();
        tree.set_leaf(id, name, json!({ "value": name })).unwrap();
        id
    }

    fn select(tree: &mut ConditionTree, ids: &[EntryId]) {
        for &id in ids {
            tree.set_selected(id, true).unwrap();
        }
    }

    fn names(tree: &ConditionTree, ids: &[EntryId]) -> Vec<String> {
        ids.iter()
            .map(|&id| match &tree.get(id).unwrap().kind {
                EntryKind::Leaf { condition_type, .. } => condition_type.clone(),
                EntryKind::Group { operator, .. } => format!("group:{operator}"),
            })
            .collect()
    }

    /// Tree `[a, (b AND c), d]`
    fn sample() -> (ConditionTree, [EntryId; 5]) {
        let mut tree = ConditionTree::new();
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        let c = leaf(&mut tree, "c");
        let d = leaf(&mut tree, "d");
        select(&mut tree, &[b, c]);
        let group = tree.group_selected(GroupOperator::And).unwrap();
        (tree, [a, b, c, d, group])
    }

    #[test]
    fn test_add_empty_entry() {
        let mut tree = ConditionTree::new();
        let id = tree.add_empty_entry();
        assert_eq!(tree.root(), &[id]);
        assert_eq!(tree.parent(id), None);
        assert_eq!(
            tree.to_records(),
            vec![ConditionElementRecord {
                condition_type: String::new(),
                condition_data: Value::Null,
            }]
        );
    }

    #[test]
    fn test_group_selected() {
        let (tree, [a, b, c, d, group]) = sample();

        assert_eq!(tree.root(), &[a, group, d]);
        assert_eq!(tree.children(group), &[b, c]);
        assert_eq!(tree.parent(b), Some(group));
        assert_eq!(tree.parent(c), Some(group));
        assert!(tree.selected().is_empty());
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_group_keeps_found_order() {
        let mut tree = ConditionTree::new();
        let a = leaf(&mut tree, "a");
        let b = leaf(&mut tree, "b");
        let c = leaf(&mut tree, "c");
        select(&mut tree, &[c, a]);

        let group = tree.group_selected(GroupOperator::Or).unwrap();
        assert_eq!(tree.root(), &[group, b]);
        assert_eq!(tree.children(group), &[a, c]);
    }

    #[test]
    fn test_cross_parent_grouping_rejected() {
        let (mut tree, [a, b, ..]) = sample();
        let before = tree.to_records();

        select(&mut tree, &[a, b]);
        let err = tree.group_selected(GroupOperator::Or).unwrap_err();
        assert_eq!(err, ConditionEditError::CrossParentGrouping);
        assert_eq!(tree.to_records(), before);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_grouping_needs_two_entries() {
        let mut tree = ConditionTree::new();
        let a = leaf(&mut tree, "a");
        tree.set_selected(a, true).unwrap();
        assert_eq!(
            tree.group_selected(GroupOperator::And).unwrap_err(),
            ConditionEditError::NotEnoughSelected { selected: 1 }
        );
    }

    #[test]
    fn test_nested_grouping() {
        let (mut tree, [a, b, c, d, group]) = sample();
        let e = leaf(&mut tree, "e");
        tree.drop_entry_into_group(e, Some(group)).unwrap();

        select(&mut tree, &[c, e]);
        let inner = tree.group_selected(GroupOperator::Or).unwrap();
        assert_eq!(tree.children(group), &[b, inner]);
        assert_eq!(tree.parent(inner), Some(group));
        assert_eq!(tree.root(), &[a, group, d]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_entry() {
        let (mut tree, [a, b, c, d, group]) = sample();

        assert!(tree.move_entry(a, 1).unwrap());
        assert_eq!(tree.root(), &[group, a, d]);

        assert!(!tree.move_entry(d, 1).unwrap());
        assert!(!tree.move_entry(group, -1).unwrap());

        assert!(tree.move_entry(c, -1).unwrap());
        assert_eq!(tree.children(group), &[c, b]);
    }

    #[test]
    fn test_drop_into_group_and_back() {
        let (mut tree, [a, b, c, d, group]) = sample();

        tree.drop_entry_into_group(a, Some(group)).unwrap();
        assert_eq!(tree.root(), &[group, d]);
        assert_eq!(tree.children(group), &[b, c, a]);
        assert_eq!(tree.parent(a), Some(group));

        tree.drop_entry_into_group(a, None).unwrap();
        assert_eq!(tree.root(), &[group, d, a]);
        assert_eq!(tree.parent(a), None);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_drop_into_own_descendant_rejected() {
        let (mut tree, [_, b, c, _, group]) = sample();
        select(&mut tree, &[b, c]);
        let inner = {
            // Build (group (inner b c)) by nesting through a second group.
            let e = leaf(&mut tree, "e");
            tree.drop_entry_into_group(e, Some(group)).unwrap();
            tree.group_selected(GroupOperator::Or).unwrap()
        };
        let before = tree.to_records();

        assert_eq!(
            tree.drop_entry_into_group(group, Some(inner)).unwrap_err(),
            ConditionEditError::CycleDetected
        );
        assert_eq!(
            tree.drop_entry_into_group(group, Some(group)).unwrap_err(),
            ConditionEditError::CycleDetected
        );
        assert_eq!(tree.to_records(), before);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_drop_into_leaf_rejected() {
        let (mut tree, [a, _, _, d, _]) = sample();
        assert_eq!(
            tree.drop_entry_into_group(a, Some(d)).unwrap_err(),
            ConditionEditError::NotAGroup(d)
        );
    }

    #[test]
    fn test_drag_out_collapses_group() {
        let (mut tree, [a, b, c, d, group]) = sample();

        tree.drop_entry_into_group(b, None).unwrap();
        assert!(tree.get(group).is_none());
        assert_eq!(tree.root(), &[a, c, d, b]);
        assert_eq!(tree.parent(c), None);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_delete_collapses_two_child_group() {
        let (mut tree, [a, b, c, d, group]) = sample();

        tree.delete_entry(b).unwrap();
        assert!(tree.get(b).is_none());
        assert!(tree.get(group).is_none());
        assert_eq!(tree.root(), &[a, c, d]);
        assert_eq!(tree.parent(c), None);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_delete_group_promotes_children() {
        let (mut tree, [a, b, c, d, group]) = sample();

        tree.delete_entry(group).unwrap();
        assert_eq!(tree.root(), &[a, b, c, d]);
        assert_eq!(tree.parent(b), None);
        assert_eq!(tree.len(), 4);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_collapse_walks_upward() {
        // [(x AND (y OR z))] -> delete y -> [(x AND z)]
        let mut tree = ConditionTree::new();
        let x = leaf(&mut tree, "x");
        let y = leaf(&mut tree, "y");
        let z = leaf(&mut tree, "z");
        select(&mut tree, &[y, z]);
        let inner = tree.group_selected(GroupOperator::Or).unwrap();
        select(&mut tree, &[x, inner]);
        let outer = tree.group_selected(GroupOperator::And).unwrap();

        tree.delete_entry(y).unwrap();
        assert!(tree.get(inner).is_none());
        assert_eq!(tree.children(outer), &[x, z]);
        assert_eq!(tree.parent(z), Some(outer));

        tree.delete_entry(x).unwrap();
        assert!(tree.get(outer).is_none());
        assert_eq!(tree.root(), &[z]);
        assert_eq!(tree.parent(z), None);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_ungroup_requires_group() {
        let (mut tree, [a, b, c, d, group]) = sample();
        assert_eq!(tree.ungroup(a).unwrap_err(), ConditionEditError::NotAGroup(a));
        tree.ungroup(group).unwrap();
        assert_eq!(tree.root(), &[a, b, c, d]);
    }

    #[test]
    fn test_record_round_trip() {
        let (tree, _) = sample();
        let records = tree.to_records();
        assert_eq!(records[1].condition_type, GROUP_CONDITION_TYPE);
        assert_eq!(records[1].condition_data["operator"], json!("AND"));

        let rebuilt = ConditionTree::from_records(&records).unwrap();
        assert_eq!(rebuilt.to_records(), records);
        assert!(rebuilt.is_consistent());

        let group = rebuilt.root()[1];
        for &child in rebuilt.children(group) {
            assert_eq!(rebuilt.parent(child), Some(group));
        }
    }

    #[test]
    fn test_degenerate_group_collapsed_on_load() {
        let records = vec![ConditionElementRecord {
            condition_type: GROUP_CONDITION_TYPE.to_string(),
            condition_data: json!({
                "operator": "OR",
                "conditionElements": [{ "conditionType": "hasItem", "conditionData": {} }],
            }),
        }];
        let tree = ConditionTree::from_records(&records).unwrap();
        assert_eq!(names(&tree, tree.root()), ["hasItem"]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_malformed_group_rejected() {
        let records = vec![ConditionElementRecord {
            condition_type: GROUP_CONDITION_TYPE.to_string(),
            condition_data: json!({ "operator": "XOR" }),
        }];
        assert!(ConditionTree::from_records(&records).is_err());
    }

    #[test]
    fn test_describe() {
        let (tree, _) = sample();
        assert_eq!(tree.describe(&PlainConditionCatalog), "a AND (b AND c) AND d");
    }
}
