// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blackboard binding layer.
//!
//! Nodes reference blackboard properties by a serialized handle and resolve
//! their dynamic ports' types against the property table at validation time.
//! The concrete store lives outside the core; this module only defines the
//! handle, the binding, and the trait the store implements.

use crate::port::{Port, PortDirection};
use crate::value::{DataType, Value};
use serde::{Deserialize, Serialize};

/// Handle identifying a blackboard property.
///
/// The FNV-1a hash of the property name. Hashing here (rather than
/// `std::hash`) keeps handles stable across processes and serialized assets.
/// Collisions between distinct names are rejected by the store at
/// registration time, not silently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyHandle(pub u64);

impl PropertyHandle {
    /// Hash a property name into its handle
    pub fn from_name(name: &str) -> Self {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        let mut hash = OFFSET;
        for byte in name.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(PRIME);
        }
        Self(hash)
    }
}

/// Read access to an external property store.
///
/// Implemented by the concrete blackboard crate; the core only ever consumes
/// this interface. `revision` must change whenever the property *set* (names
/// or declared types) changes, so graphs know to regenerate dynamic ports.
pub trait BlackboardSource {
    /// Declared type of a property, if it exists
    fn property_type(&self, handle: PropertyHandle) -> Option<DataType>;

    /// Current value of a property, if it exists
    fn property_value(&self, handle: PropertyHandle) -> Option<Value>;

    /// Monotonic counter bumped on every property-set change
    fn revision(&self) -> u64;
}

/// The empty blackboard, for graphs that reference no properties.
impl BlackboardSource for () {
    fn property_type(&self, _handle: PropertyHandle) -> Option<DataType> {
        None
    }

    fn property_value(&self, _handle: PropertyHandle) -> Option<Value> {
        None
    }

    fn revision(&self) -> u64 {
        0
    }
}

/// A node's serialized reference to a blackboard property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBinding {
    /// Handle of the referenced property
    pub handle: PropertyHandle,
}

impl PropertyBinding {
    /// Create a binding to a property by name
    pub fn by_name(name: &str) -> Self {
        Self {
            handle: PropertyHandle::from_name(name),
        }
    }

    /// Resolve the bound property's declared type
    pub fn resolve(&self, blackboard: &dyn BlackboardSource) -> Option<DataType> {
        blackboard.property_type(self.handle)
    }

    /// Materialize a dynamic port for this binding.
    ///
    /// If the property exists, the port carries its declared type. If it was
    /// deleted, the port falls back to hidden and untyped rather than failing
    /// hard; the next validation pass reports the unbound reference and
    /// removes any link still bound to the port.
    pub fn resolve_port(
        &self,
        name: impl Into<String>,
        direction: PortDirection,
        ctx: &crate::node::PortContext<'_>,
    ) -> Port {
        let name = name.into();
        let make = |name: String| match direction {
            PortDirection::Input => Port::dynamic_input(name),
            PortDirection::Output => Port::dynamic_output(name),
        };
        match self.resolve(ctx.blackboard) {
            Some(data_type) => {
                let mut port = make(name);
                port.data_type = Some(data_type);
                port
            }
            None => {
                tracing::warn!(handle = self.handle.0, "blackboard property missing; port hidden");
                ctx.report_unbound(self.handle);
                make(name).hidden()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_stable() {
        let a = PropertyHandle::from_name("health");
        let b = PropertyHandle::from_name("health");
        let c = PropertyHandle::from_name("mana");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // FNV-1a of the empty string is the offset basis
        assert_eq!(PropertyHandle::from_name("").0, 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn test_missing_property_falls_back_to_hidden_untyped() {
        let ctx = crate::node::PortContext::new(&());
        let binding = PropertyBinding::by_name("gone");
        let port = binding.resolve_port("value", PortDirection::Output, &ctx);
        assert!(port.hidden);
        assert!(port.data_type.is_none());
    }
}
