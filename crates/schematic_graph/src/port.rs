// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::value::DataType;
use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// What a port carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortMode {
    /// Value-carrying port
    Data,
    /// Control-flow port (Enter/Exit); carries activation only, never a value
    Flow,
}

/// How many incoming links a data input accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multiplicity {
    /// At most one incoming link
    Single,
    /// Any number of incoming links, aggregated into an array in link order
    Multiple,
}

/// Which side of the node a port is laid out on.
///
/// Follows direction by default; graph-boundary ports can override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortSide {
    /// Left edge (input-like)
    Left,
    /// Right edge (output-like)
    Right,
}

/// A port on a node.
///
/// Immutable once added to the metadata store; changing a node's ports means
/// invalidating the node and regenerating the whole list. A `Flow` port never
/// carries a `data_type`; a `Data` port is either typed or fully dynamic
/// (`data_type == None`, resolved at bind time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data or control-flow
    pub mode: PortMode,
    /// Declared type; `None` means dynamic
    pub data_type: Option<DataType>,
    /// Incoming-link capacity (meaningful for data inputs)
    pub multiplicity: Multiplicity,
    /// Allow covariant class matches in the reverse direction
    pub accepts_subclass: bool,
    /// Hidden ports are invisible and unconnectable
    pub hidden: bool,
    /// External ports belong to a subgraph boundary and cannot be linked inside it
    pub external: bool,
    /// Layout side
    pub side: PortSide,
}

impl Port {
    fn new(
        name: impl Into<String>,
        direction: PortDirection,
        mode: PortMode,
        data_type: Option<DataType>,
    ) -> Self {
        let side = match direction {
            PortDirection::Input => PortSide::Left,
            PortDirection::Output => PortSide::Right,
        };
        Self {
            name: name.into(),
            direction,
            mode,
            data_type,
            multiplicity: Multiplicity::Single,
            accepts_subclass: false,
            hidden: false,
            external: false,
            side,
        }
    }

    /// Create a flow Enter port (control sink)
    pub fn enter(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Input, PortMode::Flow, None)
    }

    /// Create a flow Exit port (control source)
    pub fn exit(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Output, PortMode::Flow, None)
    }

    /// Create a typed data input port
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PortDirection::Input, PortMode::Data, Some(data_type))
    }

    /// Create a typed data output port
    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PortDirection::Output, PortMode::Data, Some(data_type))
    }

    /// Create a dynamic (bind-time typed) data input port
    pub fn dynamic_input(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Input, PortMode::Data, None)
    }

    /// Create a dynamic (bind-time typed) data output port
    pub fn dynamic_output(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Output, PortMode::Data, None)
    }

    /// Allow multiple incoming links, aggregated in link order
    pub fn multiple(mut self) -> Self {
        self.multiplicity = Multiplicity::Multiple;
        self
    }

    /// Accept subclass matches in the reverse assignability direction
    pub fn accepts_subclass(mut self) -> Self {
        self.accepts_subclass = true;
        self
    }

    /// Hide the port
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Mark the port as a subgraph boundary port
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    /// Override the layout side
    pub fn on_side(mut self, side: PortSide) -> Self {
        self.side = side;
        self
    }

    /// Whether this is a flow Enter port
    pub fn is_enter(&self) -> bool {
        self.mode == PortMode::Flow && self.direction == PortDirection::Input
    }

    /// Whether this is a flow Exit port
    pub fn is_exit(&self) -> bool {
        self.mode == PortMode::Flow && self.direction == PortDirection::Output
    }

    /// Whether this data port has no declared type yet
    pub fn is_dynamic(&self) -> bool {
        self.mode == PortMode::Data && self.data_type.is_none()
    }
}
