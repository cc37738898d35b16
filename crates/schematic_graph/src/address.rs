// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable addressing of node instances and ports within a graph.

use serde::{Deserialize, Serialize};

/// Address of a node instance within one graph.
///
/// `source` selects the node-type table the instance lives in, `node` its
/// position within that table. Addresses are assigned once when a node is
/// added and are never reused after removal within the same graph, so a
/// stale link can never silently rebind to a new node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeAddress {
    /// Index of the node-type table
    pub source: u32,
    /// Index within the table
    pub node: u32,
}

impl NodeAddress {
    /// Create an address from its two components
    pub fn new(source: u32, node: u32) -> Self {
        Self { source, node }
    }
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.node)
    }
}

/// Index of a port within a node's ordered port list.
///
/// Stable within a single validation pass; any invalidation regenerates the
/// whole list, so callers must re-resolve indices afterwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PortIndex(pub u32);

impl std::fmt::Display for PortIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (node, port) pair - one endpoint of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Owning node
    pub node: NodeAddress,
    /// Port on that node
    pub port: PortIndex,
}

impl PortRef {
    /// Create a port reference
    pub fn new(node: NodeAddress, port: PortIndex) -> Self {
        Self { node, port }
    }
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_equality() {
        let a = NodeAddress::new(0, 3);
        let b = NodeAddress::new(0, 3);
        let c = NodeAddress::new(1, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "0:3");
    }
}
