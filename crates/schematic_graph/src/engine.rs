// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph execution: lifecycle, flow propagation, data resolution.
//!
//! Execution is single-threaded, synchronous, and re-entrant. Flow
//! activations walk exit links depth-first in registration order; a fired
//! node runs to completion before control returns to the node that fired it.
//! Data values are pulled on demand with no caching layer; every read
//! recomputes. The engine itself never suspends and has no scheduler - it is
//! driven entirely by external callers.

use crate::address::{NodeAddress, PortIndex, PortRef};
use crate::blackboard::{BlackboardSource, PropertyHandle};
use crate::graph::Graph;
use crate::port::{Multiplicity, PortDirection, PortMode};
use crate::value::{ClassRegistry, Value};
use std::cell::{Cell, RefCell};

/// Default ceiling for nested flow activations before propagation is aborted.
pub const DEFAULT_FLOW_DEPTH_LIMIT: u32 = 256;

/// Lifecycle of an active graph instance.
///
/// There is no paused state at this layer; pausing is a host concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, not yet initialized
    Uninitialized,
    /// Nodes initialized, not receiving ticks/activations
    Initialized,
    /// Active: ticks and flow activations are accepted
    Running,
    /// Torn down; terminal
    Deinitialized,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Deinitialized => "deinitialized",
        };
        f.write_str(s)
    }
}

/// Error from a lifecycle or flow operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Operation not valid in the current lifecycle state
    #[error("graph is {actual}, expected {expected}")]
    BadState {
        /// State the operation requires
        expected: &'static str,
        /// State the graph is in
        actual: LifecycleState,
    },

    /// No live node at the address
    #[error("node not found: {0}")]
    NodeNotFound(NodeAddress),

    /// The triggered port is not a flow Enter port
    #[error("port {port} on node {address} is not an enter port")]
    NotAnEnterPort {
        /// Node looked up
        address: NodeAddress,
        /// Offending port
        port: PortIndex,
    },

    /// Nested flow activations exceeded the configured ceiling
    #[error("flow depth limit exceeded at node {address}")]
    DepthLimitExceeded {
        /// Node whose activation was refused
        address: NodeAddress,
    },

    /// A flow cycle re-activated a node already on the flow stack
    #[error("flow cycle: node {address} re-entered while active")]
    ReentrantNode {
        /// Node the cycle closed on
        address: NodeAddress,
    },
}

/// Host environment a graph runs against.
///
/// The core never owns the blackboard or the class table; the host passes
/// them into every edit, lifecycle, and run call. A subgraph shares its
/// parent's environment unless the host explicitly isolates it.
pub struct GraphEnv<'a> {
    /// Property store for bindings and runtime reads
    pub blackboard: &'a dyn BlackboardSource,
    /// Class table for reference-type assignability
    pub classes: &'a ClassRegistry,
    /// Ceiling for nested flow activations
    pub flow_depth_limit: u32,
}

impl<'a> GraphEnv<'a> {
    /// Create an environment with the default flow depth limit
    pub fn new(blackboard: &'a dyn BlackboardSource, classes: &'a ClassRegistry) -> Self {
        Self {
            blackboard,
            classes,
            flow_depth_limit: DEFAULT_FLOW_DEPTH_LIMIT,
        }
    }

    /// Override the flow depth limit
    pub fn with_flow_depth_limit(mut self, limit: u32) -> Self {
        self.flow_depth_limit = limit;
        self
    }
}

/// Shared per-propagation state: activation depth and the first error.
#[derive(Default)]
pub(crate) struct ExecState {
    depth: Cell<u32>,
    error: RefCell<Option<ExecutionError>>,
}

impl ExecState {
    fn record(&self, error: ExecutionError) {
        tracing::error!(%error, "flow propagation error");
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn failed(&self) -> bool {
        self.error.borrow().is_some()
    }

    fn take(&self) -> Option<ExecutionError> {
        self.error.borrow_mut().take()
    }
}

/// Execution context handed to node behavior hooks.
///
/// Carries the node's own address plus everything needed to fire exits, pull
/// input values, and read the blackboard.
pub struct NodeContext<'a> {
    graph: &'a Graph,
    env: &'a GraphEnv<'a>,
    exec: &'a ExecState,
    address: NodeAddress,
}

impl<'a> NodeContext<'a> {
    /// Address of the node this context belongs to
    pub fn address(&self) -> NodeAddress {
        self.address
    }

    /// The owning graph
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// The subgraph embedded behind this node, if any
    pub fn subgraph(&self) -> Option<&Graph> {
        self.graph.subgraph(self.address)
    }

    /// The blackboard the graph runs against
    pub fn blackboard(&self) -> &dyn BlackboardSource {
        self.env.blackboard
    }

    /// Read a blackboard property's current value
    pub fn property(&self, handle: PropertyHandle) -> Option<Value> {
        self.env.blackboard.property_value(handle)
    }

    /// Fire an Exit port, synchronously activating every linked Enter port
    /// in link-registration order.
    ///
    /// Each activated node runs to completion before the next link is
    /// followed. Depth overflow and flow cycles abort the propagation and
    /// surface from the outer [`Graph::trigger`] call.
    pub fn fire(&mut self, port: PortIndex) {
        let port_ref = PortRef::new(self.address, port);
        let Some(meta_port) = self.graph.metadata().port(self.address, port) else {
            tracing::warn!(node = %self.address, %port, "fire on unknown port ignored");
            return;
        };
        if !meta_port.is_exit() {
            tracing::warn!(node = %self.address, %port, "fire on non-exit port ignored");
            return;
        }
        for (_, link) in self.graph.metadata().links_from(port_ref) {
            if self.exec.failed() {
                return;
            }
            self.activate(link.to);
        }
    }

    fn activate(&mut self, target: PortRef) {
        let depth = self.exec.depth.get();
        if depth >= self.env.flow_depth_limit {
            self.exec.record(ExecutionError::DepthLimitExceeded {
                address: target.node,
            });
            return;
        }
        let Some(cell) = self.graph.node_cell(target.node) else {
            tracing::warn!(node = %target.node, "activation of missing node ignored");
            return;
        };
        match cell.try_borrow_mut() {
            Ok(mut behavior) => {
                self.exec.depth.set(depth + 1);
                let mut ctx = NodeContext {
                    graph: self.graph,
                    env: self.env,
                    exec: self.exec,
                    address: target.node,
                };
                behavior.on_enter(target.port, &mut ctx);
                self.exec.depth.set(depth);
            }
            // The node is already on the flow stack: a flow cycle
            Err(_) => self.exec.record(ExecutionError::ReentrantNode {
                address: target.node,
            }),
        }
    }

    /// Resolve a data input's value by pulling the producing node.
    ///
    /// A `Single` input pulls its one incoming link; a `Multiple` input
    /// aggregates every incoming link's value into an array in registration
    /// order, skipping unresolved ones (an upstream array contributes its
    /// elements). Returns `None` when nothing is linked or the port is
    /// unknown; data reads never raise.
    pub fn input(&mut self, port: PortIndex) -> Option<Value> {
        let port_ref = PortRef::new(self.address, port);
        let meta_port = self.graph.metadata().port(self.address, port)?;
        if meta_port.mode != PortMode::Data || meta_port.direction != PortDirection::Input {
            tracing::warn!(node = %self.address, %port, "input read on non-data-input port");
            return None;
        }
        match meta_port.multiplicity {
            Multiplicity::Single => {
                let (_, link) = self.graph.metadata().links_to(port_ref).next()?;
                self.pull(link.from)
            }
            Multiplicity::Multiple => {
                let mut items = Vec::new();
                for (_, link) in self.graph.metadata().links_to(port_ref) {
                    match self.pull(link.from) {
                        Some(Value::Array(values)) => items.extend(values),
                        Some(value) => items.push(value),
                        None => {}
                    }
                }
                Some(Value::Array(items))
            }
        }
    }

    /// Like [`input`](Self::input), falling back to the port's declared type
    /// default when nothing is linked.
    ///
    /// Returns `None` only for unknown ports and unresolved dynamic ports,
    /// which have no type to default from.
    pub fn input_or_default(&mut self, port: PortIndex) -> Option<Value> {
        if let Some(value) = self.input(port) {
            return Some(value);
        }
        let declared = self
            .graph
            .metadata()
            .port(self.address, port)?
            .data_type
            .clone()?;
        tracing::warn!(node = %self.address, %port, "input unresolved, using type default");
        Some(declared.default_value())
    }

    /// Pull an output port's value, computing it on demand.
    pub(crate) fn pull(&mut self, from: PortRef) -> Option<Value> {
        let depth = self.exec.depth.get();
        if depth >= self.env.flow_depth_limit {
            tracing::warn!(node = %from.node, "data pull depth limit reached");
            return None;
        }
        let cell = self.graph.node_cell(from.node)?;
        match cell.try_borrow_mut() {
            Ok(mut behavior) => {
                self.exec.depth.set(depth + 1);
                let mut ctx = NodeContext {
                    graph: self.graph,
                    env: self.env,
                    exec: self.exec,
                    address: from.node,
                };
                let value = behavior.output_value(from.port, &mut ctx);
                self.exec.depth.set(depth);
                value
            }
            Err(_) => {
                tracing::warn!(node = %from.node, "data pull from active node skipped");
                None
            }
        }
    }
}

impl Graph {
    fn require_state(
        &self,
        expected: &'static str,
        ok: &[LifecycleState],
    ) -> Result<(), ExecutionError> {
        let actual = self.state.get();
        if ok.contains(&actual) {
            Ok(())
        } else {
            Err(ExecutionError::BadState { expected, actual })
        }
    }

    /// Initialize every node, then every subgraph, and enter `Initialized`.
    ///
    /// Nodes resolve external references (blackboard, host handles) here;
    /// every side effect registered here must be undone in
    /// [`deinitialize`](Self::deinitialize).
    pub fn initialize(&self, env: &GraphEnv<'_>) -> Result<(), ExecutionError> {
        self.require_state("uninitialized", &[LifecycleState::Uninitialized])?;
        let exec = ExecState::default();
        for address in self.metadata.node_addresses().collect::<Vec<_>>() {
            if let Some(cell) = self.node_cell(address) {
                let mut ctx = NodeContext {
                    graph: self,
                    env,
                    exec: &exec,
                    address,
                };
                cell.borrow_mut().on_initialize(&mut ctx);
            }
        }
        for child in self.subgraphs.values() {
            child.initialize(env)?;
        }
        self.state.set(LifecycleState::Initialized);
        tracing::debug!(graph = %self.name(), "graph initialized");
        Ok(())
    }

    /// Toggle between `Initialized` and `Running`, recursing into subgraphs
    pub fn set_active(&self, active: bool) -> Result<(), ExecutionError> {
        if active {
            self.require_state("initialized", &[LifecycleState::Initialized])?;
        } else {
            self.require_state("running", &[LifecycleState::Running])?;
        }
        for child in self.subgraphs.values() {
            child.set_active(active)?;
        }
        self.state.set(if active {
            LifecycleState::Running
        } else {
            LifecycleState::Initialized
        });
        Ok(())
    }

    /// Tear down subgraphs first, then every node in reverse order. Terminal.
    pub fn deinitialize(&self, env: &GraphEnv<'_>) -> Result<(), ExecutionError> {
        self.require_state(
            "initialized or running",
            &[LifecycleState::Initialized, LifecycleState::Running],
        )?;
        for child in self.subgraphs.values().rev() {
            child.deinitialize(env)?;
        }
        let exec = ExecState::default();
        for address in self.metadata.node_addresses().collect::<Vec<_>>().into_iter().rev() {
            if let Some(cell) = self.node_cell(address) {
                let mut ctx = NodeContext {
                    graph: self,
                    env,
                    exec: &exec,
                    address,
                };
                cell.borrow_mut().on_deinitialize(&mut ctx);
            }
        }
        self.state.set(LifecycleState::Deinitialized);
        tracing::debug!(graph = %self.name(), "graph deinitialized");
        Ok(())
    }

    /// Forward a host frame tick to every node, then every subgraph
    pub fn tick(&self, env: &GraphEnv<'_>, dt: f32) -> Result<(), ExecutionError> {
        self.require_state("running", &[LifecycleState::Running])?;
        let exec = ExecState::default();
        for address in self.metadata.node_addresses().collect::<Vec<_>>() {
            if let Some(cell) = self.node_cell(address) {
                let mut ctx = NodeContext {
                    graph: self,
                    env,
                    exec: &exec,
                    address,
                };
                cell.borrow_mut().on_tick(dt, &mut ctx);
            }
        }
        for child in self.subgraphs.values() {
            child.tick(env, dt)?;
        }
        if let Some(error) = exec.take() {
            return Err(error);
        }
        Ok(())
    }

    /// Activate a node's Enter port and propagate flow until it settles.
    ///
    /// Synchronous: every node reached by the activation has finished before
    /// this returns. Depth overflow or a flow cycle aborts propagation and
    /// is returned as the error.
    pub fn trigger(
        &self,
        env: &GraphEnv<'_>,
        address: NodeAddress,
        port: PortIndex,
    ) -> Result<(), ExecutionError> {
        self.require_state("running", &[LifecycleState::Running])?;
        let is_enter = self
            .metadata
            .port(address, port)
            .is_some_and(crate::port::Port::is_enter);
        if !is_enter {
            return Err(ExecutionError::NotAnEnterPort { address, port });
        }
        let cell = self
            .node_cell(address)
            .ok_or(ExecutionError::NodeNotFound(address))?;

        let exec = ExecState::default();
        exec.depth.set(1);
        let mut ctx = NodeContext {
            graph: self,
            env,
            exec: &exec,
            address,
        };
        cell.borrow_mut().on_enter(port, &mut ctx);
        if let Some(error) = exec.take() {
            return Err(error);
        }
        Ok(())
    }

    /// Read an output port's value on demand.
    ///
    /// Recomputes on every call; there is no caching between reads. Returns
    /// `None` when the value cannot be resolved - data reads never raise.
    pub fn output_value(&self, env: &GraphEnv<'_>, from: PortRef) -> Option<Value> {
        if self
            .require_state(
                "initialized or running",
                &[LifecycleState::Initialized, LifecycleState::Running],
            )
            .is_err()
        {
            tracing::warn!(graph = %self.name(), "output read outside initialized/running");
            return None;
        }
        let exec = ExecState::default();
        let mut ctx = NodeContext {
            graph: self,
            env,
            exec: &exec,
            address: from.node,
        };
        ctx.pull(from)
    }
}
