// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the single input port every built-in node exposes
pub const INPUT_PORT: &str = "input";
/// Name of the main output port of action-like nodes
pub const MAIN_OUTPUT_PORT: &str = "output";
/// Prefix of the numbered extra outputs of action nodes
pub const ADDITIONAL_OUTPUT_PREFIX: &str = "additionalOutput";
/// Name of the terminal branch of condition nodes
pub const ELSE_PORT: &str = "else";

/// Identifier of a port, unique within its node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub String);

impl PortId {
    /// Create a port ID from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The standard input port
    pub fn input() -> Self {
        Self::new(INPUT_PORT)
    }

    /// The main output port
    pub fn main_output() -> Self {
        Self::new(MAIN_OUTPUT_PORT)
    }

    /// The `index`-th additional output (1-based, as persisted)
    pub fn additional_output(index: usize) -> Self {
        Self(format!("{ADDITIONAL_OUTPUT_PREFIX}{index}"))
    }

    /// Output port of a condition case
    pub fn condition_case(case_id: u32) -> Self {
        Self(format!("condition{case_id}"))
    }

    /// The else branch of a condition node
    pub fn else_branch() -> Self {
        Self::new(ELSE_PORT)
    }

    /// Get the raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PortId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// An output port as currently rendered on a node.
///
/// Label text is only applied once the port element is mounted: a freshly
/// laid out port carries its text in `pending_label` until
/// [`OutputPort::mount`] moves it into `label`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPort {
    /// Port ID
    pub id: PortId,
    /// Label currently shown (`None` until mounted)
    pub label: Option<String>,
    /// Label waiting for the port element to exist
    pub pending_label: Option<String>,
    /// Vertical offset inside the node body
    pub offset_y: f64,
}

impl OutputPort {
    /// Create an already-mounted port with a visible label
    pub fn mounted(id: PortId, label: impl Into<String>, offset_y: f64) -> Self {
        Self {
            id,
            label: Some(label.into()),
            pending_label: None,
            offset_y,
        }
    }

    /// Create a port whose label still has to be applied
    pub fn unmounted(id: PortId, label: impl Into<String>, offset_y: f64) -> Self {
        Self {
            id,
            label: None,
            pending_label: Some(label.into()),
            offset_y,
        }
    }

    /// Label the port will show once mounted
    pub fn effective_label(&self) -> &str {
        self.pending_label
            .as_deref()
            .or(self.label.as_deref())
            .unwrap_or("")
    }

    /// Apply the pending label. Returns whether anything changed.
    pub fn mount(&mut self) -> bool {
        match self.pending_label.take() {
            Some(label) => {
                self.label = Some(label);
                true
            }
            None => false,
        }
    }
}
