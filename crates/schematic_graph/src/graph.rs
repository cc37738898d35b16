// SPDX-License-Identifier: MIT OR Apache-2.0
//! The graph: node instance tables, link set, subgraph slots.
//!
//! A graph lives in two phases. While `Uninitialized` it is edited and
//! validated through `&mut self` methods; once initialized it is executed
//! through `&self` methods only (see `engine`). The borrow checker therefore
//! rules out topology mutation while a flow propagation is in progress.

use crate::address::{NodeAddress, PortRef};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Severity, ValidationReport};
use crate::engine::{GraphEnv, LifecycleState};
use crate::link::{Link, LinkId};
use crate::metadata::GraphMetadata;
use crate::node::{NodeBehavior, PortContext};
use crate::port::{Multiplicity, PortMode};
use crate::registry::NodeRegistry;
use crate::validate::{validate_link, validate_subgraph, LinkRejection, SubgraphError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identity of a graph asset; drives the subgraph self-embedding check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

/// Error from a graph edit operation
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Type tag not present in the registry
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    /// No live node at the address
    #[error("node not found: {0}")]
    NodeNotFound(NodeAddress),

    /// The graph is past its edit phase
    #[error("graph is {0}; editing requires an uninitialized graph")]
    BadState(LifecycleState),

    /// Subgraph embedding refused
    #[error(transparent)]
    Subgraph(#[from] SubgraphError),
}

/// Error when creating a link
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// No live node at the address
    #[error("node not found: {0}")]
    NodeNotFound(NodeAddress),

    /// Port index out of range (possibly stale)
    #[error("port not found: {0}")]
    PortNotFound(PortRef),

    /// The ports failed compatibility validation
    #[error(transparent)]
    Rejected(#[from] LinkRejection),

    /// Single-capacity input already has an incoming link
    #[error("port already connected: {0}")]
    PortAlreadyConnected(PortRef),

    /// Self-loop not allowed
    #[error("self-loop not allowed")]
    SelfLoop,

    /// The graph is past its edit phase
    #[error("graph is {0}; editing requires an uninitialized graph")]
    BadState(LifecycleState),
}

pub(crate) struct NodeTable {
    pub(crate) tag: String,
    // Tombstoned on removal so addresses are never reused
    pub(crate) instances: Vec<Option<RefCell<Box<dyn NodeBehavior>>>>,
}

/// A node graph: instance tables per node type, metadata store, subgraphs.
pub struct Graph {
    id: GraphId,
    name: String,
    pub(crate) tables: Vec<NodeTable>,
    table_index: HashMap<String, u32>,
    pub(crate) metadata: GraphMetadata,
    pub(crate) subgraphs: IndexMap<NodeAddress, Box<Graph>>,
    pub(crate) state: Cell<LifecycleState>,
    bound_revision: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            tables: Vec::new(),
            table_index: HashMap::new(),
            metadata: GraphMetadata::new(),
            subgraphs: IndexMap::new(),
            state: Cell::new(LifecycleState::Uninitialized),
            bound_revision: 0,
        }
    }

    /// Graph identity
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read access to the metadata store
    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    fn require_editable(&self) -> Result<(), GraphError> {
        match self.state.get() {
            LifecycleState::Uninitialized => Ok(()),
            state => Err(GraphError::BadState(state)),
        }
    }

    // === Nodes ===

    /// Add a node of a registered type, generating its ports immediately.
    ///
    /// The returned address is stable for the lifetime of the graph and is
    /// never reused, even after the node is removed.
    pub fn add_node(
        &mut self,
        registry: &NodeRegistry,
        tag: &str,
        env: &GraphEnv<'_>,
    ) -> Result<NodeAddress, GraphError> {
        self.require_editable()?;
        let behavior = registry
            .instantiate(tag)
            .ok_or_else(|| GraphError::UnknownNodeType(tag.to_string()))?;

        let source = match self.table_index.get(tag) {
            Some(source) => *source,
            None => {
                let source = self.metadata.add_source();
                debug_assert_eq!(source as usize, self.tables.len());
                self.tables.push(NodeTable {
                    tag: tag.to_string(),
                    instances: Vec::new(),
                });
                self.table_index.insert(tag.to_string(), source);
                source
            }
        };

        let address = self.metadata.add_node(source);
        debug_assert_eq!(
            address.node as usize,
            self.tables[source as usize].instances.len()
        );

        let ctx = PortContext::new(env.blackboard);
        behavior.create_ports(&mut self.metadata, address, &ctx);
        for handle in ctx.take_unbound() {
            tracing::warn!(node = %address, handle = handle.0, "node added with unbound property");
        }

        self.tables[source as usize]
            .instances
            .push(Some(RefCell::new(behavior)));
        Ok(address)
    }

    /// Remove a node, its links, and any embedded subgraph
    pub fn remove_node(&mut self, address: NodeAddress) -> Result<(), GraphError> {
        self.require_editable()?;
        if !self.metadata.remove_node(address) {
            return Err(GraphError::NodeNotFound(address));
        }
        self.tables[address.source as usize].instances[address.node as usize] = None;
        self.subgraphs.shift_remove(&address);
        Ok(())
    }

    /// Type tag of the node at an address
    pub fn node_tag(&self, address: NodeAddress) -> Option<&str> {
        let table = self.tables.get(address.source as usize)?;
        table
            .instances
            .get(address.node as usize)?
            .as_ref()
            .map(|_| table.tag.as_str())
    }

    pub(crate) fn node_cell(
        &self,
        address: NodeAddress,
    ) -> Option<&RefCell<Box<dyn NodeBehavior>>> {
        self.tables
            .get(address.source as usize)?
            .instances
            .get(address.node as usize)?
            .as_ref()
    }

    // === Links ===

    /// Create a link after full validation; an invalid link is never persisted.
    pub fn connect(
        &mut self,
        env: &GraphEnv<'_>,
        from: PortRef,
        to: PortRef,
    ) -> Result<LinkId, ConnectError> {
        if self.state.get() != LifecycleState::Uninitialized {
            return Err(ConnectError::BadState(self.state.get()));
        }
        if from.node == to.node {
            return Err(ConnectError::SelfLoop);
        }
        for endpoint in [from, to] {
            if !self.metadata.contains(endpoint.node) {
                return Err(ConnectError::NodeNotFound(endpoint.node));
            }
        }
        let from_port = self
            .metadata
            .port(from.node, from.port)
            .ok_or(ConnectError::PortNotFound(from))?;
        let to_port = self
            .metadata
            .port(to.node, to.port)
            .ok_or(ConnectError::PortNotFound(to))?;

        validate_link(from_port, to_port, env.classes)?;

        // A single-capacity data input takes at most one incoming link
        if to_port.mode == PortMode::Data
            && to_port.multiplicity == Multiplicity::Single
            && self.metadata.links_to(to).next().is_some()
        {
            return Err(ConnectError::PortAlreadyConnected(to));
        }

        let id = self
            .metadata
            .add_link(Link::new(from, to))
            .map_err(|_| ConnectError::PortNotFound(to))?;
        Ok(id)
    }

    /// Remove a link
    pub fn disconnect(&mut self, id: LinkId) -> Option<Link> {
        if self.require_editable().is_err() {
            return None;
        }
        self.metadata.remove_link(id)
    }

    // === Subgraphs ===

    /// Embed a graph as a black-box node behind the given address.
    ///
    /// Refused (and the slot left empty) if the candidate would directly or
    /// transitively embed this graph, or if nesting exceeds the depth
    /// ceiling.
    pub fn set_subgraph(&mut self, address: NodeAddress, child: Graph) -> Result<(), GraphError> {
        self.require_editable()?;
        if !self.metadata.contains(address) {
            return Err(GraphError::NodeNotFound(address));
        }
        validate_subgraph(self.id, &child)?;
        self.subgraphs.insert(address, Box::new(child));
        Ok(())
    }

    /// Remove an embedded subgraph, returning it
    pub fn remove_subgraph(&mut self, address: NodeAddress) -> Option<Graph> {
        if self.require_editable().is_err() {
            return None;
        }
        self.subgraphs.shift_remove(&address).map(|b| *b)
    }

    /// The subgraph embedded at an address, if any
    pub fn subgraph(&self, address: NodeAddress) -> Option<&Graph> {
        self.subgraphs.get(&address).map(|b| b.as_ref())
    }

    /// All embedded subgraphs
    pub fn subgraphs(&self) -> impl Iterator<Item = &Graph> {
        self.subgraphs.values().map(|b| b.as_ref())
    }

    // === Invalidation & validation ===

    /// Mark a node stale so its ports are regenerated on the next validation
    /// pass, optionally dropping its links. Returns all transitively
    /// affected addresses.
    pub fn invalidate_node(
        &mut self,
        address: NodeAddress,
        invalidate_links: bool,
    ) -> Result<Vec<NodeAddress>, GraphError> {
        self.require_editable()?;
        if !self.metadata.contains(address) {
            return Err(GraphError::NodeNotFound(address));
        }
        let affected = self.metadata.invalidate_node(address, invalidate_links);
        tracing::debug!(graph = %self.name, ?affected, "invalidated nodes");
        Ok(affected)
    }

    /// Mark every node stale (e.g. after the blackboard property set changed)
    pub fn invalidate_all(&mut self) -> Result<(), GraphError> {
        self.require_editable()?;
        let addresses: Vec<_> = self.metadata.node_addresses().collect();
        for address in addresses {
            self.metadata.invalidate_node(address, false);
        }
        Ok(())
    }

    /// Validate the graph: regenerate stale ports, re-check every persisted
    /// link, and recurse into subgraphs.
    ///
    /// Links whose endpoints vanished or no longer pass compatibility are
    /// removed (never left dangling) and reported. Runs the same pass
    /// automatically over all nodes whenever the blackboard's property set
    /// has changed since the last validation.
    pub fn validate(&mut self, env: &GraphEnv<'_>) -> Result<ValidationReport, GraphError> {
        self.require_editable()?;
        let mut report = ValidationReport::new();

        let revision = env.blackboard.revision();
        if revision != self.bound_revision {
            self.invalidate_all()?;
            self.bound_revision = revision;
        }

        // Regenerate ports of stale nodes
        for source in 0..self.tables.len() {
            for node in 0..self.tables[source].instances.len() {
                let address = NodeAddress::new(source as u32, node as u32);
                let Some(cell) = self.tables[source].instances[node].as_ref() else {
                    continue;
                };
                if self.metadata.port_count(address) > 0 {
                    continue;
                }
                let ctx = PortContext::new(env.blackboard);
                cell.borrow().create_ports(&mut self.metadata, address, &ctx);
                for handle in ctx.take_unbound() {
                    // Broken until the user rebinds or restores the property;
                    // the hidden-port fallback only keeps the graph running
                    report.push(Diagnostic {
                        severity: Severity::Error,
                        graph: self.name.clone(),
                        address: Some(address),
                        port: None,
                        kind: DiagnosticKind::UnboundProperty(handle),
                    });
                }
            }
        }

        // Re-check persisted links against the regenerated ports
        let links: Vec<(LinkId, Link)> = self.metadata.links().collect();
        for (id, link) in links {
            let verdict = {
                let from = self.metadata.port(link.from.node, link.from.port);
                let to = self.metadata.port(link.to.node, link.to.port);
                match (from, to) {
                    (Some(from), Some(to)) => validate_link(from, to, env.classes)
                        .err()
                        .map(DiagnosticKind::InvalidLink),
                    _ => Some(DiagnosticKind::DanglingLink),
                }
            };
            if let Some(kind) = verdict {
                self.metadata.remove_link(id);
                tracing::warn!(graph = %self.name, %link, "removed link: {}", kind);
                report.push(Diagnostic {
                    severity: Severity::Warning,
                    graph: self.name.clone(),
                    address: Some(link.to.node),
                    port: Some(link.to.port),
                    kind,
                });
            }
        }

        // Subgraphs validate against the same environment (shared blackboard)
        for child in self.subgraphs.values_mut() {
            let child_report = child.validate(env)?;
            report.merge(child_report);
        }

        Ok(report)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.metadata.node_count())
            .field("links", &self.metadata.link_count())
            .field("subgraphs", &self.subgraphs.len())
            .field("state", &self.state.get())
            .finish()
    }
}
