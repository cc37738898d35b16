// SPDX-License-Identifier: MIT OR Apache-2.0
//! The node contract implemented by node-type plugins.

use crate::address::{NodeAddress, PortIndex};
use crate::blackboard::{BlackboardSource, PropertyHandle};
use crate::engine::NodeContext;
use crate::metadata::GraphMetadata;
use crate::value::Value;
use std::cell::RefCell;

/// Bind-time context handed to [`NodeBehavior::create_ports`].
///
/// Gives port generation access to the blackboard so dynamic ports can
/// resolve their types from referenced properties, and collects the handles
/// of properties that failed to resolve for the validation report.
pub struct PortContext<'a> {
    /// The property store the owning graph runs against
    pub blackboard: &'a dyn BlackboardSource,
    unbound: RefCell<Vec<PropertyHandle>>,
}

impl<'a> PortContext<'a> {
    /// Create a context over a property store
    pub fn new(blackboard: &'a dyn BlackboardSource) -> Self {
        Self {
            blackboard,
            unbound: RefCell::new(Vec::new()),
        }
    }

    /// Record a property reference that did not resolve
    pub fn report_unbound(&self, handle: PropertyHandle) {
        self.unbound.borrow_mut().push(handle);
    }

    /// Drain the unresolved references collected so far
    pub(crate) fn take_unbound(&self) -> Vec<PropertyHandle> {
        std::mem::take(&mut self.unbound.borrow_mut())
    }
}

/// Behavior of one node type.
///
/// A node type must generate its ports and implement at least one of the
/// defaulted hooks: a flow-enter handler, a flow-exit emitter (fired from
/// `on_enter`/`on_tick` through the context), or an output value provider.
///
/// External resource references (blackboard lookups, host handles) are
/// resolved in `on_initialize`, not at construction, and every side effect
/// registered there must be torn down by `on_deinitialize`.
pub trait NodeBehavior {
    /// Generate this node's ports into the metadata store.
    ///
    /// Called whenever the node is (re)validated; the previous port list has
    /// already been cleared and indices restart at zero.
    fn create_ports(&self, meta: &mut GraphMetadata, address: NodeAddress, ctx: &PortContext<'_>);

    /// Called once when the owning graph initializes
    fn on_initialize(&mut self, ctx: &mut NodeContext<'_>) {
        let _ = ctx;
    }

    /// Called once when the owning graph deinitializes
    fn on_deinitialize(&mut self, ctx: &mut NodeContext<'_>) {
        let _ = ctx;
    }

    /// An Enter port of this node was activated
    fn on_enter(&mut self, port: PortIndex, ctx: &mut NodeContext<'_>) {
        let _ = (port, ctx);
    }

    /// Host frame tick, forwarded while the graph is running
    fn on_tick(&mut self, dt: f32, ctx: &mut NodeContext<'_>) {
        let _ = (dt, ctx);
    }

    /// Compute the value of an output port.
    ///
    /// Called on demand, every time the port is read; there is no caching
    /// layer between producers and consumers.
    fn output_value(&mut self, port: PortIndex, ctx: &mut NodeContext<'_>) -> Option<Value> {
        let _ = (port, ctx);
        None
    }
}
