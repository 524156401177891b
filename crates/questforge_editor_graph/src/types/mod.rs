// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types registered by
//! [`NodeTypeRegistry::with_builtin_types`](crate::registry::NodeTypeRegistry::with_builtin_types).

pub mod action;
pub mod condition;
pub mod reference;
pub mod text;
