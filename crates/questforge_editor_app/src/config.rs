// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application configuration.
//!
//! This module manages the settings of the editor tooling:
//! - Log filter directives
//! - Remote API location and per-kind endpoints
//! - Graph editor tunables
//!
//! Configuration lives in a RON file. A missing file means defaults.

use crate::error::AppError;
use questforge_editor_graph::{EditorSettings, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "questforge_editor.ron";

/// Log filter used when nothing else is configured
pub const DEFAULT_LOG_FILTER: &str = "questforge_editor_app=info,questforge_editor_graph=info";

/// Location of the remote design object API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL every endpoint is relative to
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Endpoint path per resource kind
    pub endpoints: BTreeMap<ResourceKind, String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let endpoints = ResourceKind::all()
            .iter()
            .map(|&kind| (kind, default_endpoint(kind).to_string()))
            .collect();
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_ms: 10_000,
            endpoints,
        }
    }
}

fn default_endpoint(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Npc => "npcs",
        ResourceKind::Item => "items",
        ResourceKind::Skill => "skills",
        ResourceKind::Quest => "quests",
        ResourceKind::WikiPage => "wiki/pages",
        ResourceKind::DailyRoutineEvent => "npcs/dailyRoutineEvents",
    }
}

impl RemoteConfig {
    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Endpoint path of a resource kind
    pub fn endpoint(&self, kind: ResourceKind) -> &str {
        self.endpoints
            .get(&kind)
            .map_or_else(|| default_endpoint(kind), String::as_str)
    }
}

/// Settings of the editor binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Extra `tracing` filter directives, comma separated
    pub log_filter: String,
    /// Remote object API
    pub remote: RemoteConfig,
    /// Graph editor tunables
    pub editor: EditorSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            remote: RemoteConfig::default(),
            editor: EditorSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        ron::from_str(&content).map_err(|e| AppError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the given file, or the default file in the working directory.
    ///
    /// A missing file yields the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, AppError> {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE_NAME));
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content).map_err(|e| AppError::io(path, e))
    }
}
