// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keeps a node's output ports in line with its behavior.
//!
//! Output counts of action and condition nodes change at run time. The
//! synchronizer compares the labels a node currently shows against the ones
//! its behavior asks for and only rebuilds the ports when they differ, so an
//! unchanged node never sees port churn (which would break a link drag in
//! progress).

use crate::node::Node;
use crate::port::{OutputPort, PortId};

/// Default height of a node body, in canvas units
pub const DEFAULT_BODY_HEIGHT: f64 = 60.0;

/// Result of a synchronization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSyncOutcome {
    /// Ports already matched
    Unchanged,
    /// Ports were rebuilt
    Rebuilt {
        /// Ports that no longer exist
        removed: Vec<PortId>,
    },
}

impl PortSyncOutcome {
    /// Whether the ports were rebuilt
    pub fn is_rebuilt(&self) -> bool {
        matches!(self, Self::Rebuilt { .. })
    }
}

/// Recomputes output ports and their layout
#[derive(Debug, Clone, Copy)]
pub struct PortSynchronizer {
    body_height: f64,
}

impl Default for PortSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_HEIGHT)
    }
}

impl PortSynchronizer {
    /// Synchronizer for nodes of the given body height
    pub fn new(body_height: f64) -> Self {
        Self { body_height }
    }

    /// Labels an action node should show. A lone output stays unlabeled.
    pub fn action_labels(main_label: &str, additional: &[String]) -> Vec<String> {
        if additional.is_empty() {
            return vec![String::new()];
        }
        std::iter::once(main_label.to_string())
            .chain(additional.iter().cloned())
            .collect()
    }

    /// Port IDs of an action node with `count` outputs
    pub fn action_ports(count: usize) -> Vec<PortId> {
        std::iter::once(PortId::main_output())
            .chain((1..count.max(1)).map(PortId::additional_output))
            .collect()
    }

    /// Vertical offset of port `index` out of `count`
    pub fn offset(&self, index: usize, count: usize) -> f64 {
        self.body_height / (count as f64 + 1.0) * (index as f64 + 1.0)
    }

    /// Sync an action node against its behavior's labels
    pub fn sync_action(&self, node: &mut Node, main_label: &str, additional: &[String]) -> PortSyncOutcome {
        let labels = Self::action_labels(main_label, additional);
        let ports = Self::action_ports(labels.len());
        self.sync(node, ports, labels)
    }

    /// Make the node expose exactly `ports` with `labels`.
    ///
    /// Nothing is touched when IDs and labels already match by value.
    /// `ports` and `labels` must have the same length.
    pub fn sync(&self, node: &mut Node, ports: Vec<PortId>, mut labels: Vec<String>) -> PortSyncOutcome {
        if ports.len() == 1 {
            labels = vec![String::new()];
        }
        labels.resize(ports.len(), String::new());

        let unchanged = node.outputs.len() == ports.len()
            && node
                .outputs
                .iter()
                .zip(ports.iter().zip(&labels))
                .all(|(current, (id, label))| current.id == *id && current.effective_label() == label);
        if unchanged {
            return PortSyncOutcome::Unchanged;
        }

        let removed: Vec<PortId> = node
            .outputs
            .iter()
            .map(|p| p.id.clone())
            .filter(|id| !ports.contains(id))
            .collect();

        let count = ports.len();
        node.outputs = ports
            .into_iter()
            .zip(labels)
            .enumerate()
            .map(|(index, (id, label))| OutputPort::unmounted(id, label, self.offset(index, count)))
            .collect();
        node.port_revision += 1;

        tracing::debug!(
            node = %node.id,
            ports = count,
            removed = removed.len(),
            "Rebuilt output ports"
        );
        PortSyncOutcome::Rebuilt { removed }
    }

    /// Apply pending labels once the node's port elements exist
    pub fn confirm_mounted(node: &mut Node) -> bool {
        let mut changed = false;
        for port in &mut node.outputs {
            changed |= port.mount();
        }
        changed
    }
}
