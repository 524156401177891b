// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph editor: owns a graph and wires the node types, the port
//! synchronizer, condition editing and remote lookups together.
//!
//! Every structural edit is synchronous. Remote enrichment of a node's
//! display runs after the node is in the graph and never affects the graph
//! structure; a result for a node that was deleted meanwhile is dropped.

use crate::cache::{ObjectKey, SharedObjectCache};
use crate::condition::{ConditionCatalog, ConditionEditError, EntryId, GroupOperator};
use crate::document::{
    deserialize_graph, serialize_graph, DefaultLinkFactory, GraphDocument, GraphError, LinkFactory, LoadReport,
};
use crate::graph::{ConnectionError, Graph};
use crate::link::{Endpoint, LinkId};
use crate::node::{DisplayState, Node, NodeId, NodeInit, NodePayload};
use crate::notice::WarningBanner;
use crate::port_sync::{PortSyncOutcome, PortSynchronizer};
use crate::registry::{NodeTypeRegistry, RegistryError};
use crate::settings::EditorSettings;
use crate::types::action::ActionCatalog;
use crate::types::condition::ConditionNodeData;
use futures::future::{join_all, BoxFuture};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Veto raised by a deletion check
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Node {node} cannot be deleted: {reason}")]
pub struct DeleteRejected {
    /// Node that stays
    pub node: NodeId,
    /// Why it stays
    pub reason: String,
}

impl DeleteRejected {
    /// Create a veto for a node
    pub fn new(node: NodeId, reason: impl Into<String>) -> Self {
        Self {
            node,
            reason: reason.into(),
        }
    }
}

/// Asynchronous check run before a node is deleted
pub trait DeletionGate: Send + Sync {
    /// Resolve to `Ok(())` to allow the deletion
    fn check(&self, node: &Node) -> BoxFuture<'static, Result<(), DeleteRejected>>;
}

impl<F> DeletionGate for F
where
    F: Fn(&Node) -> BoxFuture<'static, Result<(), DeleteRejected>> + Send + Sync,
{
    fn check(&self, node: &Node) -> BoxFuture<'static, Result<(), DeleteRejected>> {
        self(node)
    }
}

/// Error of an editor operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Node is not an action node
    #[error("Node {0} is not an action")]
    NotAnAction(NodeId),

    /// Node is not a condition node
    #[error("Node {0} is not a condition")]
    NotACondition(NodeId),

    /// Condition node has no such case
    #[error("Node {node} has no condition case {case}")]
    CaseNotFound {
        /// Condition node
        node: NodeId,
        /// Missing case
        case: u32,
    },

    /// Every case ID of the condition node is taken
    #[error("Node {0} has no free condition case ID left")]
    CaseIdsExhausted(NodeId),

    /// A deletion check vetoed
    #[error(transparent)]
    DeleteRejected(#[from] DeleteRejected),
}

/// Edit of one condition case
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionEdit {
    /// Append an empty leaf to the root list
    AddEmpty,
    /// Replace the check of a leaf
    SetLeaf {
        /// Leaf to edit
        entry: EntryId,
        /// Condition type tag
        condition_type: String,
        /// Comparison payload
        data: Value,
    },
    /// Set the selection flag of an entry
    Select {
        /// Entry
        entry: EntryId,
        /// New flag
        selected: bool,
    },
    /// Flip the selection flag of an entry
    ToggleSelected(EntryId),
    /// Clear every selection flag
    ClearSelection,
    /// Group the selected entries
    Group(GroupOperator),
    /// Swap an entry with a sibling
    Move {
        /// Entry to move
        entry: EntryId,
        /// Offset of the sibling
        delta: isize,
    },
    /// Reparent an entry; `None` targets the root list
    DropInto {
        /// Entry to move
        entry: EntryId,
        /// New parent group
        target: Option<EntryId>,
    },
    /// Delete an entry
    Delete(EntryId),
    /// Dissolve a group
    Ungroup(EntryId),
}

/// Result of a condition edit the editor accepted for processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The tree changed (or the edit was a no-op)
    Applied {
        /// Entry created by the edit
        created: Option<EntryId>,
    },
    /// The edit was refused and the warning banner raised
    Rejected(ConditionEditError),
}

/// Node counts per type plus the link count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStatistics {
    /// Registered type tag to number of nodes, in registration order
    pub nodes_by_type: IndexMap<String, usize>,
    /// Number of links
    pub links: usize,
}

impl GraphStatistics {
    /// Number of nodes over all types
    pub fn total_nodes(&self) -> usize {
        self.nodes_by_type.values().sum()
    }
}

/// Pending lookup of a node's display name
#[derive(Debug, Clone)]
pub struct DisplayRequest {
    /// Node to update
    pub node: NodeId,
    /// Object to resolve
    pub key: ObjectKey,
    cache: SharedObjectCache,
}

impl DisplayRequest {
    /// Run the lookup
    pub async fn resolve(self) -> DisplayUpdate {
        let state = match self.cache.load(&self.key).await {
            Ok(object) => DisplayState::Ready(object.name.clone()),
            Err(err) => DisplayState::Error(err.to_string()),
        };
        DisplayUpdate {
            node: self.node,
            state,
        }
    }
}

/// Finished lookup, ready to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayUpdate {
    /// Node to update
    pub node: NodeId,
    /// New display state
    pub state: DisplayState,
}

/// Graph editor state
pub struct GraphEditor {
    graph: Graph,
    registry: Arc<NodeTypeRegistry>,
    actions: Arc<ActionCatalog>,
    conditions: Arc<dyn ConditionCatalog>,
    cache: SharedObjectCache,
    settings: EditorSettings,
    port_sync: PortSynchronizer,
    banner: WarningBanner,
    link_factory: Box<dyn LinkFactory + Send + Sync>,
    delete_checks: HashMap<String, Arc<dyn DeletionGate>>,
    delete_hook: Option<Arc<dyn DeletionGate>>,
    last_error: Option<String>,
}

impl GraphEditor {
    /// Create an editor with an empty graph
    pub fn new(
        registry: Arc<NodeTypeRegistry>,
        actions: Arc<ActionCatalog>,
        conditions: Arc<dyn ConditionCatalog>,
        cache: SharedObjectCache,
        settings: EditorSettings,
    ) -> Self {
        Self {
            graph: Graph::new().with_self_links(settings.allow_self_links),
            registry,
            actions,
            conditions,
            cache,
            port_sync: PortSynchronizer::new(settings.node_body_height),
            banner: WarningBanner::new(settings.warning_lifetime()),
            settings,
            link_factory: Box::new(DefaultLinkFactory),
            delete_checks: HashMap::new(),
            delete_hook: None,
            last_error: None,
        }
    }

    /// Use a custom factory for links created on load
    pub fn with_link_factory(mut self, factory: impl LinkFactory + Send + Sync + 'static) -> Self {
        self.link_factory = Box::new(factory);
        self
    }

    /// Install the check run before deleting nodes of a type
    pub fn set_delete_check(&mut self, type_tag: impl Into<String>, gate: impl DeletionGate + 'static) {
        self.delete_checks.insert(type_tag.into(), Arc::new(gate));
    }

    /// Install the external hook run before any deletion
    pub fn set_delete_hook(&mut self, gate: impl DeletionGate + 'static) {
        self.delete_hook = Some(Arc::new(gate));
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The node type registry
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// The remote object cache
    pub fn cache(&self) -> &SharedObjectCache {
        &self.cache
    }

    /// Settings the editor was built with
    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Warning banner
    pub fn banner(&self) -> &WarningBanner {
        &self.banner
    }

    /// Error flag left by the last failed node creation
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Create a node of a registered type and add it to the graph
    pub fn add_node(&mut self, type_tag: &str, init: &NodeInit) -> Result<NodeId, RegistryError> {
        let mut node = match self.registry.create_by_type(type_tag, init) {
            Ok(node) => node,
            Err(err) => {
                tracing::warn!("Cannot create node: {err}");
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };
        self.last_error = None;
        wire_ports(&self.port_sync, &self.actions, self.conditions.as_ref(), &mut node);
        let node_id = self.graph.add_node(node);
        tracing::debug!(node = %node_id, type_tag, "Added node");
        Ok(node_id)
    }

    /// Change the action of an action node and resync its ports
    pub fn set_action(
        &mut self,
        node_id: NodeId,
        action_type: u32,
        action_data: impl Into<String>,
    ) -> Result<PortSyncOutcome, EditorError> {
        let node = self.graph.node_mut(node_id).ok_or(EditorError::NodeNotFound(node_id))?;
        let data = node.as_action_mut().ok_or(EditorError::NotAnAction(node_id))?;
        data.action_type = action_type;
        data.action_data = action_data.into();
        self.sync_node_ports(node_id)
    }

    /// Recompute a node's output ports and drop links from ports that vanished
    pub fn sync_node_ports(&mut self, node_id: NodeId) -> Result<PortSyncOutcome, EditorError> {
        let node = self.graph.node_mut(node_id).ok_or(EditorError::NodeNotFound(node_id))?;
        let outcome = wire_ports(&self.port_sync, &self.actions, self.conditions.as_ref(), node);
        if let PortSyncOutcome::Rebuilt { removed } = &outcome {
            if !removed.is_empty() {
                let pruned = self.graph.prune_dangling_links(node_id);
                tracing::debug!(node = %node_id, pruned = pruned.len(), "Removed links of vanished ports");
            }
        }
        Ok(outcome)
    }

    /// Apply pending port labels once the front end mounted the ports
    pub fn confirm_ports_mounted(&mut self, node_id: NodeId) -> Result<bool, EditorError> {
        let node = self.graph.node_mut(node_id).ok_or(EditorError::NodeNotFound(node_id))?;
        Ok(PortSynchronizer::confirm_mounted(node))
    }

    /// Edit the condition tree of one case.
    ///
    /// A refused edit leaves the tree unchanged and raises the warning banner.
    pub fn edit_condition(
        &mut self,
        node_id: NodeId,
        case_id: u32,
        edit: ConditionEdit,
    ) -> Result<EditOutcome, EditorError> {
        let node = self.graph.node_mut(node_id).ok_or(EditorError::NodeNotFound(node_id))?;
        let data = node.as_condition_mut().ok_or(EditorError::NotACondition(node_id))?;
        let tree = &mut data
            .case_mut(case_id)
            .ok_or(EditorError::CaseNotFound {
                node: node_id,
                case: case_id,
            })?
            .tree;

        let result = match edit {
            ConditionEdit::AddEmpty => Ok(Some(tree.add_empty_entry())),
            ConditionEdit::SetLeaf {
                entry,
                condition_type,
                data,
            } => tree.set_leaf(entry, condition_type, data).map(|()| None),
            ConditionEdit::Select { entry, selected } => tree.set_selected(entry, selected).map(|()| None),
            ConditionEdit::ToggleSelected(entry) => tree.toggle_selected(entry).map(|_| None),
            ConditionEdit::ClearSelection => {
                tree.clear_selection();
                Ok(None)
            }
            ConditionEdit::Group(operator) => tree.group_selected(operator).map(Some),
            ConditionEdit::Move { entry, delta } => tree.move_entry(entry, delta).map(|_| None),
            ConditionEdit::DropInto { entry, target } => tree.drop_entry_into_group(entry, target).map(|()| None),
            ConditionEdit::Delete(entry) => tree.delete_entry(entry).map(|()| None),
            ConditionEdit::Ungroup(entry) => tree.ungroup(entry).map(|()| None),
        };

        match result {
            Ok(created) => {
                self.sync_node_ports(node_id)?;
                Ok(EditOutcome::Applied { created })
            }
            Err(err) => {
                self.banner.raise(err.to_string());
                Ok(EditOutcome::Rejected(err))
            }
        }
    }

    /// Append a case to a condition node
    pub fn add_condition_case(&mut self, node_id: NodeId) -> Result<u32, EditorError> {
        let case_id = self
            .condition_mut(node_id)?
            .add_case()
            .ok_or(EditorError::CaseIdsExhausted(node_id))?;
        self.sync_node_ports(node_id)?;
        Ok(case_id)
    }

    /// Remove a case; links leaving its port go with it
    pub fn remove_condition_case(&mut self, node_id: NodeId, case_id: u32) -> Result<(), EditorError> {
        self.condition_mut(node_id)?
            .remove_case(case_id)
            .ok_or(EditorError::CaseNotFound {
                node: node_id,
                case: case_id,
            })?;
        self.sync_node_ports(node_id)?;
        Ok(())
    }

    /// Swap a case with a neighbor
    pub fn move_condition_case(&mut self, node_id: NodeId, case_id: u32, delta: isize) -> Result<bool, EditorError> {
        let moved = self.condition_mut(node_id)?.move_case(case_id, delta);
        if moved {
            self.sync_node_ports(node_id)?;
        }
        Ok(moved)
    }

    fn condition_mut(&mut self, node_id: NodeId) -> Result<&mut ConditionNodeData, EditorError> {
        self.graph
            .node_mut(node_id)
            .ok_or(EditorError::NodeNotFound(node_id))?
            .as_condition_mut()
            .ok_or(EditorError::NotACondition(node_id))
    }

    /// Link an output port to an input port
    pub fn connect(&mut self, source: Endpoint, target: Endpoint) -> Result<LinkId, ConnectionError> {
        self.graph.connect(source, target)
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId) -> bool {
        self.graph.disconnect(link_id).is_some()
    }

    /// Delete a node after its type check and the external hook agreed.
    ///
    /// The node and its links stay when either check vetoes.
    pub async fn delete_node(&mut self, node_id: NodeId) -> Result<Node, EditorError> {
        let node = self.graph.node(node_id).ok_or(EditorError::NodeNotFound(node_id))?;
        let type_check = self.delete_checks.get(&node.node_type).map(|gate| gate.check(node));
        let hook = self.delete_hook.clone();

        if let Some(check) = type_check {
            check.await?;
        }
        if let Some(hook) = hook {
            let node = self.graph.node(node_id).ok_or(EditorError::NodeNotFound(node_id))?;
            hook.check(node).await?;
        }

        let removed = self.graph.remove_node(node_id).ok_or(EditorError::NodeNotFound(node_id))?;
        tracing::info!(node = %node_id, node_type = %removed.node_type, "Deleted node");
        Ok(removed)
    }

    /// Serialize the graph
    pub fn save(&self) -> Result<GraphDocument, GraphError> {
        serialize_graph(&self.graph, &self.registry)
    }

    /// Replace the graph with a document. Ports are wired before links are rebuilt.
    pub fn load(&mut self, document: &GraphDocument) -> Result<LoadReport, GraphError> {
        let port_sync = &self.port_sync;
        let actions = &self.actions;
        let conditions = self.conditions.as_ref();
        let mut wire = |node: &mut Node| {
            wire_ports(port_sync, actions, conditions, node);
        };
        let report = deserialize_graph(
            &mut self.graph,
            document,
            &self.registry,
            self.link_factory.as_ref(),
            Some(&mut wire),
        )?;
        self.banner.clear();
        self.last_error = None;
        Ok(report)
    }

    /// Remote object a node displays, if any
    pub fn referenced_object(&self, node: &Node) -> Option<ObjectKey> {
        match &node.payload {
            NodePayload::Reference(reference) => reference.object.clone(),
            NodePayload::Action(action) => self
                .actions
                .get(action.action_type)?
                .referenced_object(&action.action_data),
            _ => None,
        }
    }

    /// Start enriching a node's display: marks it loading and returns the lookup to run
    pub fn display_request(&mut self, node_id: NodeId) -> Option<DisplayRequest> {
        let key = self.graph.node(node_id).and_then(|node| self.referenced_object(node));
        let node = self.graph.node_mut(node_id)?;
        match key {
            Some(key) => {
                node.display = DisplayState::Loading;
                Some(DisplayRequest {
                    node: node_id,
                    key,
                    cache: self.cache.clone(),
                })
            }
            None => {
                node.display = DisplayState::Normal;
                None
            }
        }
    }

    /// Apply a finished lookup. Returns false when the node is gone.
    pub fn apply_display(&mut self, update: DisplayUpdate) -> bool {
        match self.graph.node_mut(update.node) {
            Some(node) => {
                node.display = update.state;
                true
            }
            None => {
                tracing::debug!(node = %update.node, "Dropping display update for removed node");
                false
            }
        }
    }

    /// Resolve and apply one node's display
    pub async fn refresh_display(&mut self, node_id: NodeId) -> Option<DisplayState> {
        let request = self.display_request(node_id)?;
        let update = request.resolve().await;
        let state = update.state.clone();
        self.apply_display(update).then_some(state)
    }

    /// Resolve every node's display concurrently
    pub async fn refresh_all_displays(&mut self) -> Vec<DisplayUpdate> {
        let node_ids: Vec<NodeId> = self.graph.node_ids().collect();
        let requests: Vec<DisplayRequest> = node_ids
            .into_iter()
            .filter_map(|node_id| self.display_request(node_id))
            .collect();

        let updates = join_all(requests.into_iter().map(DisplayRequest::resolve)).await;
        for update in &updates {
            self.apply_display(update.clone());
        }
        updates
    }

    /// Drop a cached object, e.g. after it changed upstream
    pub fn invalidate_object(&self, key: &ObjectKey) {
        self.cache.invalidate(key);
    }

    /// Node counts for every registered type, plus links
    pub fn statistics(&self) -> GraphStatistics {
        let mut nodes_by_type: IndexMap<String, usize> =
            self.registry.type_tags().map(|tag| (tag.to_string(), 0)).collect();
        for node in self.graph.nodes() {
            if let Some(count) = nodes_by_type.get_mut(&node.node_type) {
                *count += 1;
            }
        }
        GraphStatistics {
            nodes_by_type,
            links: self.graph.link_count(),
        }
    }
}

impl std::fmt::Debug for GraphEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEditor")
            .field("nodes", &self.graph.node_count())
            .field("links", &self.graph.link_count())
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Bring a node's output ports in line with its behavior
fn wire_ports(
    port_sync: &PortSynchronizer,
    actions: &ActionCatalog,
    conditions: &dyn ConditionCatalog,
    node: &mut Node,
) -> PortSyncOutcome {
    match &node.payload {
        NodePayload::Action(data) => {
            let (main, additional) = actions.output_labels(data);
            port_sync.sync_action(node, &main, &additional)
        }
        NodePayload::Condition(data) => {
            let ports = data.output_ports();
            let labels = data.output_labels(conditions);
            port_sync.sync(node, ports, labels)
        }
        _ => PortSyncOutcome::Unchanged,
    }
}
