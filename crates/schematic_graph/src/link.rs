// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::address::PortRef;
use serde::{Deserialize, Serialize};

/// Handle to a link in the metadata store's link arena.
///
/// Stable until the link is removed; removal frees the slot for reuse, so
/// handles must not be held across topology edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub u32);

/// A directed edge between two compatible ports.
///
/// Validated at creation time: endpoint ports have opposite directions,
/// identical modes, and pass type compatibility. An invalid link is never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Source endpoint (an output port)
    pub from: PortRef,
    /// Target endpoint (an input port)
    pub to: PortRef,
}

impl Link {
    /// Create a link between two endpoints
    pub fn new(from: PortRef, to: PortRef) -> Self {
        Self { from, to }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
