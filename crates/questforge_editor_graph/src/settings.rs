// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings shared by the graph core and its front ends.

use crate::port_sync::DEFAULT_BODY_HEIGHT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of a warning banner, in milliseconds
pub const DEFAULT_WARNING_LIFETIME_MS: u64 = 4000;

/// Tunables of the graph editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Height of a node body, used to lay out output ports
    pub node_body_height: f64,
    /// How long a warning stays visible
    pub warning_lifetime_ms: u64,
    /// Allow a node to link to its own input
    pub allow_self_links: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            node_body_height: DEFAULT_BODY_HEIGHT,
            warning_lifetime_ms: DEFAULT_WARNING_LIFETIME_MS,
            allow_self_links: false,
        }
    }
}

impl EditorSettings {
    /// Warning lifetime as a duration
    pub fn warning_lifetime(&self) -> Duration {
        Duration::from_millis(self.warning_lifetime_ms)
    }
}
