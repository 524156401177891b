// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph core for the `QuestForge` editor.
//!
//! This crate provides the graph model behind the quest editor:
//! - Dialogue lines (npc and player text)
//! - Actions with behavior-defined outputs
//! - Conditions with nested AND/OR condition trees
//! - References to other design objects
//!
//! ## Architecture
//!
//! The core is built on a generic graph model with:
//! - A registry of node types, each owning a persistence bucket
//! - Link validation between output and input ports
//! - Port synchronization for nodes with a run-time output count
//! - A shared, coalescing cache for remote design objects
//! - JSON document serialization

pub mod node;
pub mod port;
pub mod link;
pub mod graph;
pub mod registry;
pub mod types;
pub mod condition;
pub mod port_sync;
pub mod cache;
pub mod document;
pub mod settings;
pub mod notice;
pub mod editor;

pub use node::{DisplayState, Node, NodeId, NodeInit, NodePayload, Position};
pub use port::{OutputPort, PortDirection, PortId};
pub use link::{Endpoint, Link, LinkAppearance, LinkId, Vertex};
pub use graph::{ConnectionError, Graph};
pub use registry::{NodeSerializer, NodeTypeRegistry, RecordError, RegistryError};
pub use condition::{ConditionCatalog, ConditionEditError, ConditionTree, EntryId, GroupOperator};
pub use port_sync::{PortSyncOutcome, PortSynchronizer};
pub use cache::{LoadError, ObjectKey, ObjectLoader, RemoteObject, ResourceKind, SharedObjectCache};
pub use document::{GraphDocument, GraphError, LinkFactory, LinkRecord, LoadReport};
pub use settings::EditorSettings;
pub use notice::WarningBanner;
pub use editor::{ConditionEdit, DeleteRejected, EditOutcome, EditorError, GraphEditor, GraphStatistics};
pub use types::action::{ActionBehavior, ActionCatalog, ActionData, SimpleAction};
