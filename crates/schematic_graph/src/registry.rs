// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of available node types.
//!
//! Maps a stable string tag to a descriptor holding the type's factory. The
//! behavior trait object produced by the factory is the node's entire
//! dispatch table, resolved once when the node is added to a graph; nothing
//! is looked up by type introspection at execution time.

use crate::node::NodeBehavior;
use indexmap::IndexMap;

/// Factory producing a fresh behavior instance for one node type.
pub type NodeFactory = Box<dyn Fn() -> Box<dyn NodeBehavior>>;

/// One registered node type.
pub struct NodeDescriptor {
    /// Stable type tag, as serialized in graph assets
    pub tag: String,
    /// Display name
    pub name: String,
    factory: NodeFactory,
}

impl NodeDescriptor {
    /// Create a descriptor
    pub fn new(
        tag: impl Into<String>,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn NodeBehavior> + 'static,
    ) -> Self {
        Self {
            tag: tag.into(),
            name: name.into(),
            factory: Box::new(factory),
        }
    }

    /// Instantiate a fresh behavior of this type
    pub fn instantiate(&self) -> Box<dyn NodeBehavior> {
        (self.factory)()
    }
}

impl std::fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry of node types by tag.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    types: IndexMap<String, NodeDescriptor>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type, replacing any previous entry with the same tag
    pub fn register(&mut self, descriptor: NodeDescriptor) {
        self.types.insert(descriptor.tag.clone(), descriptor);
    }

    /// Get a descriptor by tag
    pub fn get(&self, tag: &str) -> Option<&NodeDescriptor> {
        self.types.get(tag)
    }

    /// All registered descriptors, in registration order
    pub fn types(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.types.values()
    }

    /// Instantiate a behavior by tag
    pub fn instantiate(&self, tag: &str) -> Option<Box<dyn NodeBehavior>> {
        self.get(tag).map(NodeDescriptor::instantiate)
    }
}
