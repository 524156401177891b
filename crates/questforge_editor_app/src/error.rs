// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors of the editor binary.

use questforge_editor_graph::GraphError;
use std::path::PathBuf;

/// Error of a command
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Cause
        source: std::io::Error,
    },

    /// The configuration file is not valid RON
    #[error("Invalid configuration {}: {message}", path.display())]
    Config {
        /// Configuration file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// The configuration could not be rendered
    #[error("Cannot render configuration: {0}")]
    ConfigRender(#[from] ron::Error),

    /// Refusing to overwrite an existing configuration
    #[error("Configuration {} already exists (use --force to overwrite)", .0.display())]
    ConfigExists(PathBuf),

    /// The graph document is not valid JSON
    #[error("Invalid graph document: {0}")]
    Json(#[from] serde_json::Error),

    /// The graph could not be loaded or saved
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
