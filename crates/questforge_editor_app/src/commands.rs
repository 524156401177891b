// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command implementations of the editor binary.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::loader::OfflineLoader;
use questforge_editor_graph::condition::PlainConditionCatalog;
use questforge_editor_graph::{
    ActionCatalog, DisplayState, GraphDocument, GraphEditor, GraphStatistics, LoadReport, NodeId,
    NodeTypeRegistry, ObjectLoader, SharedObjectCache,
};
use std::path::Path;
use std::sync::Arc;

/// Editor with the built-in node types, backed by `loader`
pub fn build_editor(config: &AppConfig, loader: Arc<dyn ObjectLoader>) -> GraphEditor {
    GraphEditor::new(
        Arc::new(NodeTypeRegistry::with_builtin_types()),
        Arc::new(ActionCatalog::new()),
        Arc::new(PlainConditionCatalog),
        SharedObjectCache::new(loader),
        config.editor.clone(),
    )
}

/// Read a graph document
pub async fn read_document(path: &Path) -> Result<GraphDocument, AppError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::io(path, e))?;
    Ok(GraphDocument::from_json(&content)?)
}

/// Load a document into a fresh editor
pub async fn open(
    config: &AppConfig,
    loader: Arc<dyn ObjectLoader>,
    path: &Path,
) -> Result<(GraphEditor, GraphDocument, LoadReport), AppError> {
    let document = read_document(path).await?;
    let mut editor = build_editor(config, loader);
    let report = editor.load(&document)?;
    tracing::info!(
        path = %path.display(),
        nodes = report.nodes,
        links = report.links,
        "Opened graph"
    );
    Ok((editor, document, report))
}

/// Node counts per type
pub async fn stats(config: &AppConfig, path: &Path) -> Result<GraphStatistics, AppError> {
    let (editor, _, _) = open(config, Arc::new(OfflineLoader), path).await?;
    Ok(editor.statistics())
}

/// Outcome of a load/save cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// What the load found
    pub load: LoadReport,
    /// Buckets whose records changed after re-saving
    pub changed_buckets: Vec<String>,
}

impl CheckReport {
    /// Whether the document survives a load/save cycle untouched
    pub fn is_clean(&self) -> bool {
        self.load.skipped_buckets.is_empty()
            && self.load.dropped_links == 0
            && self.load.unmatched_ports == 0
            && self.changed_buckets.is_empty()
    }
}

/// Load and re-save a document, comparing the result with the input
pub async fn check(config: &AppConfig, path: &Path) -> Result<CheckReport, AppError> {
    let (editor, original, load) = open(config, Arc::new(OfflineLoader), path).await?;
    let saved = editor.save()?;
    Ok(CheckReport {
        load,
        changed_buckets: changed_buckets(&original, &saved),
    })
}

fn changed_buckets(original: &GraphDocument, saved: &GraphDocument) -> Vec<String> {
    saved
        .bucket_names()
        .filter(|&name| original.bucket(name).unwrap_or_default() != saved.bucket(name).unwrap_or_default())
        .map(str::to_string)
        .collect()
}

/// Display state of one node after resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    /// Node
    pub node: NodeId,
    /// Its type tag
    pub node_type: String,
    /// What the node shows
    pub state: DisplayState,
}

/// Resolve the display names of every referenced object
pub async fn resolve(
    config: &AppConfig,
    loader: Arc<dyn ObjectLoader>,
    path: &Path,
) -> Result<Vec<ResolvedNode>, AppError> {
    let (mut editor, _, _) = open(config, loader, path).await?;
    let updates = editor.refresh_all_displays().await;
    let stats = editor.cache().stats();
    tracing::info!(resolved = updates.len(), fetches = stats.fetches, "Resolved referenced objects");

    Ok(updates
        .into_iter()
        .filter_map(|update| {
            let node = editor.graph().node(update.node)?;
            Some(ResolvedNode {
                node: update.node,
                node_type: node.node_type.clone(),
                state: update.state,
            })
        })
        .collect())
}

/// Write the default configuration
pub fn init_config(path: &Path, force: bool) -> Result<(), AppError> {
    if path.exists() && !force {
        return Err(AppError::ConfigExists(path.to_path_buf()));
    }
    AppConfig::default().save(path)?;
    tracing::info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

/// Print statistics as a table
pub fn print_stats(stats: &GraphStatistics) {
    for (node_type, count) in &stats.nodes_by_type {
        println!("{node_type:<12} {count:>6}");
    }
    println!("{:<12} {:>6}", "links", stats.links);
    println!("{:<12} {:>6}", "total nodes", stats.total_nodes());
}

/// Print the outcome of a check
pub fn print_check(report: &CheckReport) {
    println!("nodes: {}, links: {}", report.load.nodes, report.load.links);
    for bucket in &report.load.skipped_buckets {
        println!("skipped bucket: {bucket}");
    }
    if report.load.dropped_links > 0 {
        println!("dropped links: {}", report.load.dropped_links);
    }
    if report.load.unmatched_ports > 0 {
        println!("links to missing ports: {}", report.load.unmatched_ports);
    }
    for bucket in &report.changed_buckets {
        println!("changed on re-save: {bucket}");
    }
    println!("{}", if report.is_clean() { "round trip: ok" } else { "round trip: differs" });
}

/// Print resolved display states
pub fn print_resolved(nodes: &[ResolvedNode]) {
    for resolved in nodes {
        match &resolved.state {
            DisplayState::Ready(name) => println!("{} {:<10} Ready {name}", resolved.node, resolved.node_type),
            DisplayState::Error(message) => {
                println!("{} {:<10} Error {message}", resolved.node, resolved.node_type);
            }
            DisplayState::Normal | DisplayState::Loading => {}
        }
    }
}
