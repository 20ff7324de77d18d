//! Node registry: short footer ids to host names and display labels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive record for a serving node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub short_id: String,
    pub host: String,
    pub label: String,
}

impl NodeDescriptor {
    pub fn new(short_id: impl Into<String>, host: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            short_id: short_id.into(),
            host: host.into(),
            label: label.into(),
        }
    }

    /// Stand-in for an id nobody told us about yet.
    pub fn synthesized(short_id: &str) -> Self {
        Self::new(short_id, format!("unknown-{short_id}"), short_id.to_uppercase())
    }
}

const BUILTIN: &[(&str, &str, &str)] = &[
    ("i067", "idt183067", "IDT067"),
    ("i068", "idt183068", "IDT068"),
    ("i069", "idt183069", "IDT069"),
];

#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, NodeDescriptor>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NodeRegistry {
    /// The three nodes known to serve the default target.
    pub fn builtin() -> Self {
        let nodes = BUILTIN
            .iter()
            .map(|(id, host, label)| (id.to_string(), NodeDescriptor::new(*id, *host, *label)))
            .collect();
        Self { nodes }
    }

    /// Add or replace entries. Ids are stored lowercase.
    pub fn with_nodes(mut self, extra: impl IntoIterator<Item = NodeDescriptor>) -> Self {
        for mut node in extra {
            node.short_id = node.short_id.to_lowercase();
            self.nodes.insert(node.short_id.clone(), node);
        }
        self
    }

    pub fn get(&self, short_id: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(&short_id.to_lowercase())
    }

    /// Look up `short_id`, synthesizing a descriptor when it is unknown.
    /// Never fails, so a new node upstream cannot break a probe run.
    pub fn resolve(&self, short_id: &str) -> NodeDescriptor {
        self.get(short_id)
            .cloned()
            .unwrap_or_else(|| NodeDescriptor::synthesized(short_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Resolve against the built-in table only.
pub fn resolve(short_id: &str) -> NodeDescriptor {
    NodeRegistry::builtin().resolve(short_id)
}
