// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph metadata store: per-node port lists and link chains.
//!
//! Links live in one arena with doubly-linked per-port chains for both
//! endpoints, giving O(1) insertion and O(1) removal by splicing without
//! per-port dynamic containers. Chain order is link-registration order, which
//! is the order flow propagation and `Multiple`-input aggregation observe.

use crate::address::{NodeAddress, PortIndex, PortRef};
use crate::link::{Link, LinkId};
use crate::port::Port;
use std::collections::HashSet;

/// Error from a metadata store operation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetadataError {
    /// No node registered at the address
    #[error("node not found: {0}")]
    NodeNotFound(NodeAddress),

    /// Port index out of range for the node (possibly stale after invalidation)
    #[error("port {port} out of range on node {address}")]
    PortOutOfRange {
        /// Node looked up
        address: NodeAddress,
        /// Offending index
        port: PortIndex,
    },
}

/// One endpoint chain: head and tail of a doubly-linked list of link records.
#[derive(Debug, Clone, Copy, Default)]
struct Chain {
    head: Option<LinkId>,
    tail: Option<LinkId>,
}

/// A link plus its position in both endpoint chains.
#[derive(Debug, Clone, Copy)]
struct LinkRecord {
    link: Link,
    prev_from: Option<LinkId>,
    next_from: Option<LinkId>,
    prev_to: Option<LinkId>,
    next_to: Option<LinkId>,
}

/// Per-node metadata: ordered ports plus per-port link chains.
///
/// Chain vectors only ever grow; after an invalidation clears the port list
/// the chains keep describing surviving links until the next validation pass
/// re-checks them against the regenerated ports.
#[derive(Debug, Default)]
struct NodeMeta {
    ports: Vec<Port>,
    out_chains: Vec<Chain>,
    in_chains: Vec<Chain>,
}

#[derive(Debug, Default)]
struct SourceTable {
    // Tombstoned on removal; addresses are never reused
    nodes: Vec<Option<NodeMeta>>,
}

/// Owns, per node address, the node's port list and its link chains.
///
/// Mutated only during the edit/validate phase; execution reads it through
/// `&self` queries.
#[derive(Debug, Default)]
pub struct GraphMetadata {
    sources: Vec<SourceTable>,
    links: Vec<Option<LinkRecord>>,
    free: Vec<u32>,
}

impl GraphMetadata {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new node-type table, returning its source index
    pub fn add_source(&mut self) -> u32 {
        self.sources.push(SourceTable::default());
        (self.sources.len() - 1) as u32
    }

    /// Register a node in an existing table, returning its address
    pub fn add_node(&mut self, source: u32) -> NodeAddress {
        let table = &mut self.sources[source as usize];
        table.nodes.push(Some(NodeMeta::default()));
        NodeAddress::new(source, (table.nodes.len() - 1) as u32)
    }

    /// Remove a node, unlinking every link that touches it.
    ///
    /// The address is tombstoned and never reused.
    pub fn remove_node(&mut self, address: NodeAddress) -> bool {
        if self.node(address).is_none() {
            return false;
        }
        for id in self.node_link_ids(address) {
            self.remove_link(id);
        }
        self.sources[address.source as usize].nodes[address.node as usize] = None;
        true
    }

    /// Whether a live node exists at the address
    pub fn contains(&self, address: NodeAddress) -> bool {
        self.node(address).is_some()
    }

    /// Number of live nodes across all tables
    pub fn node_count(&self) -> usize {
        self.sources
            .iter()
            .map(|t| t.nodes.iter().flatten().count())
            .sum()
    }

    /// All live node addresses, in table order
    pub fn node_addresses(&self) -> impl Iterator<Item = NodeAddress> + '_ {
        self.sources.iter().enumerate().flat_map(|(s, table)| {
            table.nodes.iter().enumerate().filter_map(move |(n, meta)| {
                meta.as_ref()
                    .map(|_| NodeAddress::new(s as u32, n as u32))
            })
        })
    }

    fn node(&self, address: NodeAddress) -> Option<&NodeMeta> {
        self.sources
            .get(address.source as usize)?
            .nodes
            .get(address.node as usize)?
            .as_ref()
    }

    fn node_mut(&mut self, address: NodeAddress) -> Option<&mut NodeMeta> {
        self.sources
            .get_mut(address.source as usize)?
            .nodes
            .get_mut(address.node as usize)?
            .as_mut()
    }

    // === Ports ===

    /// Append a port to the node's port list, returning its index.
    ///
    /// Indices are stable until the node is invalidated; after that the list
    /// is regenerated from scratch, never patched.
    pub fn add_port(&mut self, address: NodeAddress, port: Port) -> Result<PortIndex, MetadataError> {
        let meta = self
            .node_mut(address)
            .ok_or(MetadataError::NodeNotFound(address))?;
        meta.ports.push(port);
        if meta.out_chains.len() < meta.ports.len() {
            meta.out_chains.push(Chain::default());
            meta.in_chains.push(Chain::default());
        }
        Ok(PortIndex((meta.ports.len() - 1) as u32))
    }

    /// Look up a port; `None` for unknown nodes or stale indices
    pub fn port(&self, address: NodeAddress, index: PortIndex) -> Option<&Port> {
        self.node(address)?.ports.get(index.0 as usize)
    }

    /// Number of ports currently on the node (0 after invalidation)
    pub fn port_count(&self, address: NodeAddress) -> usize {
        self.node(address).map_or(0, |meta| meta.ports.len())
    }

    /// All ports on a node, in index order
    pub fn ports(&self, address: NodeAddress) -> &[Port] {
        self.node(address).map_or(&[], |meta| meta.ports.as_slice())
    }

    /// Find a port index by name
    pub fn find_port(&self, address: NodeAddress, name: &str) -> Option<PortIndex> {
        self.node(address)?
            .ports
            .iter()
            .position(|p| p.name == name)
            .map(|i| PortIndex(i as u32))
    }

    // === Links ===

    /// Insert a validated link, appending to both endpoint chains.
    ///
    /// Compatibility checking is the caller's job; the store only verifies
    /// that both endpoints exist.
    pub fn add_link(&mut self, link: Link) -> Result<LinkId, MetadataError> {
        self.check_endpoint(link.from)?;
        self.check_endpoint(link.to)?;

        let id = match self.free.pop() {
            Some(slot) => LinkId(slot),
            None => {
                self.links.push(None);
                LinkId((self.links.len() - 1) as u32)
            }
        };

        let from_chain = self.chain(link.from, ChainSide::Outgoing);
        let to_chain = self.chain(link.to, ChainSide::Incoming);
        let record = LinkRecord {
            link,
            prev_from: from_chain.tail,
            next_from: None,
            prev_to: to_chain.tail,
            next_to: None,
        };

        // Splice onto the tail of both chains
        if let Some(tail) = record.prev_from {
            self.record_mut(tail).next_from = Some(id);
        }
        if let Some(tail) = record.prev_to {
            self.record_mut(tail).next_to = Some(id);
        }
        {
            let chain = self.chain_mut(link.from, ChainSide::Outgoing);
            chain.tail = Some(id);
            if chain.head.is_none() {
                chain.head = Some(id);
            }
        }
        {
            let chain = self.chain_mut(link.to, ChainSide::Incoming);
            chain.tail = Some(id);
            if chain.head.is_none() {
                chain.head = Some(id);
            }
        }

        self.links[id.0 as usize] = Some(record);
        Ok(id)
    }

    /// Remove a link by splicing it out of both endpoint chains
    pub fn remove_link(&mut self, id: LinkId) -> Option<Link> {
        let record = self.links.get_mut(id.0 as usize)?.take()?;

        // Outgoing chain of the source port
        match record.prev_from {
            Some(prev) => self.record_mut(prev).next_from = record.next_from,
            None => self.chain_mut(record.link.from, ChainSide::Outgoing).head = record.next_from,
        }
        match record.next_from {
            Some(next) => self.record_mut(next).prev_from = record.prev_from,
            None => self.chain_mut(record.link.from, ChainSide::Outgoing).tail = record.prev_from,
        }

        // Incoming chain of the target port
        match record.prev_to {
            Some(prev) => self.record_mut(prev).next_to = record.next_to,
            None => self.chain_mut(record.link.to, ChainSide::Incoming).head = record.next_to,
        }
        match record.next_to {
            Some(next) => self.record_mut(next).prev_to = record.prev_to,
            None => self.chain_mut(record.link.to, ChainSide::Incoming).tail = record.prev_to,
        }

        self.free.push(id.0);
        Some(record.link)
    }

    /// Look up a link by id
    pub fn link(&self, id: LinkId) -> Option<Link> {
        self.links.get(id.0 as usize)?.as_ref().map(|r| r.link)
    }

    /// All live links, with their ids
    pub fn links(&self) -> impl Iterator<Item = (LinkId, Link)> + '_ {
        self.links
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|r| (LinkId(i as u32), r.link)))
    }

    /// Number of live links
    pub fn link_count(&self) -> usize {
        self.links.iter().flatten().count()
    }

    /// Links leaving an output port, in registration order
    pub fn links_from(&self, port: PortRef) -> LinkIter<'_> {
        LinkIter {
            meta: self,
            next: self.try_chain(port, ChainSide::Outgoing).and_then(|c| c.head),
            side: ChainSide::Outgoing,
        }
    }

    /// Links arriving at an input port, in registration order
    pub fn links_to(&self, port: PortRef) -> LinkIter<'_> {
        LinkIter {
            meta: self,
            next: self.try_chain(port, ChainSide::Incoming).and_then(|c| c.head),
            side: ChainSide::Incoming,
        }
    }

    /// Ids of every link touching the node, in either direction
    pub fn node_link_ids(&self, address: NodeAddress) -> Vec<LinkId> {
        let mut ids = Vec::new();
        let Some(meta) = self.node(address) else {
            return ids;
        };
        for port in 0..meta.out_chains.len() {
            let port = PortRef::new(address, PortIndex(port as u32));
            ids.extend(self.links_from(port).map(|(id, _)| id));
        }
        for port in 0..meta.in_chains.len() {
            let port = PortRef::new(address, PortIndex(port as u32));
            ids.extend(self.links_to(port).map(|(id, _)| id));
        }
        ids
    }

    // === Invalidation ===

    /// Mark a node stale: clear its port list so it must be regenerated
    /// before the next read, optionally unlinking all of its links.
    ///
    /// Propagates transitively to every node whose dynamic input was fed by
    /// this node, since that input's resolved type may no longer hold.
    /// Returns all affected addresses (the node itself first). Idempotent:
    /// invalidating an already-stale node again changes nothing further.
    pub fn invalidate_node(
        &mut self,
        address: NodeAddress,
        invalidate_links: bool,
    ) -> Vec<NodeAddress> {
        let mut affected = Vec::new();
        let mut visited = HashSet::new();
        self.invalidate_inner(address, invalidate_links, &mut visited, &mut affected);
        affected
    }

    fn invalidate_inner(
        &mut self,
        address: NodeAddress,
        invalidate_links: bool,
        visited: &mut HashSet<NodeAddress>,
        affected: &mut Vec<NodeAddress>,
    ) {
        if !visited.insert(address) || self.node(address).is_none() {
            return;
        }
        affected.push(address);

        // Dependents must be collected before ports/links are torn down
        let mut dependents = Vec::new();
        if let Some(meta) = self.node(address) {
            for port in 0..meta.out_chains.len() {
                let port = PortRef::new(address, PortIndex(port as u32));
                for (_, link) in self.links_from(port) {
                    let target = link.to;
                    let dynamic = self
                        .port(target.node, target.port)
                        .is_some_and(Port::is_dynamic);
                    if dynamic {
                        dependents.push(target.node);
                    }
                }
            }
        }

        if let Some(meta) = self.node_mut(address) {
            meta.ports.clear();
        }
        if invalidate_links {
            for id in self.node_link_ids(address) {
                self.remove_link(id);
            }
        }

        for dependent in dependents {
            self.invalidate_inner(dependent, invalidate_links, visited, affected);
        }
    }

    // === Internals ===

    fn check_endpoint(&self, port: PortRef) -> Result<(), MetadataError> {
        let meta = self
            .node(port.node)
            .ok_or(MetadataError::NodeNotFound(port.node))?;
        if (port.port.0 as usize) >= meta.ports.len() {
            return Err(MetadataError::PortOutOfRange {
                address: port.node,
                port: port.port,
            });
        }
        Ok(())
    }

    fn try_chain(&self, port: PortRef, side: ChainSide) -> Option<&Chain> {
        let meta = self.node(port.node)?;
        match side {
            ChainSide::Outgoing => meta.out_chains.get(port.port.0 as usize),
            ChainSide::Incoming => meta.in_chains.get(port.port.0 as usize),
        }
    }

    fn chain(&self, port: PortRef, side: ChainSide) -> Chain {
        self.try_chain(port, side).copied().unwrap_or_default()
    }

    fn chain_mut(&mut self, port: PortRef, side: ChainSide) -> &mut Chain {
        let meta = self
            .node_mut(port.node)
            .expect("chain endpoint must exist while its links do");
        let chains = match side {
            ChainSide::Outgoing => &mut meta.out_chains,
            ChainSide::Incoming => &mut meta.in_chains,
        };
        &mut chains[port.port.0 as usize]
    }

    fn record_mut(&mut self, id: LinkId) -> &mut LinkRecord {
        self.links[id.0 as usize]
            .as_mut()
            .expect("chain neighbor must be live")
    }
}

#[derive(Debug, Clone, Copy)]
enum ChainSide {
    Outgoing,
    Incoming,
}

/// Iterator over one endpoint chain, yielding links in registration order.
pub struct LinkIter<'a> {
    meta: &'a GraphMetadata,
    next: Option<LinkId>,
    side: ChainSide,
}

impl Iterator for LinkIter<'_> {
    type Item = (LinkId, Link);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let record = self.meta.links[id.0 as usize]
            .as_ref()
            .expect("chain member must be live");
        self.next = match self.side {
            ChainSide::Outgoing => record.next_from,
            ChainSide::Incoming => record.next_to,
        };
        Some((id, record.link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DataType;

    fn two_nodes() -> (GraphMetadata, NodeAddress, NodeAddress) {
        let mut meta = GraphMetadata::new();
        let source = meta.add_source();
        let a = meta.add_node(source);
        let b = meta.add_node(source);
        (meta, a, b)
    }

    #[test]
    fn test_port_indices_are_sequential() {
        let (mut meta, a, _) = two_nodes();
        let p0 = meta.add_port(a, Port::exit("out")).unwrap();
        let p1 = meta.add_port(a, Port::output("value", DataType::Int)).unwrap();
        assert_eq!(p0, PortIndex(0));
        assert_eq!(p1, PortIndex(1));
        assert_eq!(meta.port_count(a), 2);
        assert!(meta.port(a, PortIndex(2)).is_none());
    }

    #[test]
    fn test_link_chain_registration_order() {
        let (mut meta, a, b) = two_nodes();
        let out = meta.add_port(a, Port::output("v", DataType::Int)).unwrap();
        let mut ins = Vec::new();
        for name in ["x", "y", "z"] {
            ins.push(meta.add_port(b, Port::input(name, DataType::Int)).unwrap());
        }
        let from = PortRef::new(a, out);
        let mut ids = Vec::new();
        for to in &ins {
            ids.push(meta.add_link(Link::new(from, PortRef::new(b, *to))).unwrap());
        }

        let seen: Vec<_> = meta.links_from(from).map(|(id, _)| id).collect();
        assert_eq!(seen, ids);

        // Incoming chain of each input holds exactly its own link
        for (to, id) in ins.iter().zip(&ids) {
            let incoming: Vec<_> = meta.links_to(PortRef::new(b, *to)).map(|(i, _)| i).collect();
            assert_eq!(incoming, vec![*id]);
        }
    }

    #[test]
    fn test_remove_link_splices_chain() {
        let (mut meta, a, b) = two_nodes();
        let out = meta.add_port(a, Port::output("v", DataType::Int)).unwrap();
        let input = meta
            .add_port(b, Port::input("xs", DataType::Int).multiple())
            .unwrap();
        let from = PortRef::new(a, out);
        let to = PortRef::new(b, input);
        let ids: Vec<_> = (0..3)
            .map(|_| meta.add_link(Link::new(from, to)).unwrap())
            .collect();

        meta.remove_link(ids[1]).unwrap();
        let remaining: Vec<_> = meta.links_from(from).map(|(id, _)| id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2]]);
        let incoming: Vec<_> = meta.links_to(to).map(|(id, _)| id).collect();
        assert_eq!(incoming, vec![ids[0], ids[2]]);
        assert_eq!(meta.link_count(), 2);

        // Freed slot is reused for the next link
        let reused = meta.add_link(Link::new(from, to)).unwrap();
        assert_eq!(reused, ids[1]);
        let order: Vec<_> = meta.links_from(from).map(|(id, _)| id).collect();
        assert_eq!(order, vec![ids[0], ids[2], reused]);
    }

    #[test]
    fn test_remove_node_unlinks_everything() {
        let (mut meta, a, b) = two_nodes();
        let out = meta.add_port(a, Port::output("v", DataType::Int)).unwrap();
        let input = meta.add_port(b, Port::input("x", DataType::Int)).unwrap();
        meta.add_link(Link::new(PortRef::new(a, out), PortRef::new(b, input)))
            .unwrap();

        assert!(meta.remove_node(a));
        assert!(!meta.contains(a));
        assert_eq!(meta.link_count(), 0);
        assert_eq!(meta.links_to(PortRef::new(b, input)).count(), 0);
        // Tombstoned, not shifted: b keeps its address
        assert!(meta.contains(b));
    }

    #[test]
    fn test_invalidation_clears_ports_and_is_idempotent() {
        let (mut meta, a, _) = two_nodes();
        meta.add_port(a, Port::output("v", DataType::Int)).unwrap();
        meta.add_port(a, Port::exit("done")).unwrap();

        let first = meta.invalidate_node(a, false);
        assert_eq!(first, vec![a]);
        assert_eq!(meta.port_count(a), 0);

        let again = meta.invalidate_node(a, false);
        assert_eq!(again, vec![a]);
        assert_eq!(meta.port_count(a), 0);

        // Regeneration starts from index zero again
        let idx = meta.add_port(a, Port::exit("done")).unwrap();
        assert_eq!(idx, PortIndex(0));
    }

    #[test]
    fn test_invalidation_propagates_through_dynamic_inputs() {
        let (mut meta, a, b) = two_nodes();
        let source = meta.add_source();
        let c = meta.add_node(source);

        let a_out = meta.add_port(a, Port::dynamic_output("v")).unwrap();
        let b_in = meta.add_port(b, Port::dynamic_input("x")).unwrap();
        let b_out = meta.add_port(b, Port::dynamic_output("y")).unwrap();
        let c_in = meta.add_port(c, Port::input("x", DataType::Int)).unwrap();
        meta.add_link(Link::new(PortRef::new(a, a_out), PortRef::new(b, b_in)))
            .unwrap();
        meta.add_link(Link::new(PortRef::new(b, b_out), PortRef::new(c, c_in)))
            .unwrap();

        let affected = meta.invalidate_node(a, false);
        // b's dynamic input depended on a; c's input is statically typed
        assert_eq!(affected, vec![a, b]);
        assert_eq!(meta.port_count(b), 0);
        assert_eq!(meta.port_count(c), 1);
    }
}
