// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node-graph execution core for Schematic.
//!
//! This crate provides the runtime model behind Schematic graphs:
//! - Typed data ports and control-flow (Enter/Exit) ports
//! - Link validation with class-aware assignability
//! - Subgraph embedding with self-reference and depth checks
//! - A synchronous hybrid execution engine (event-driven flow, pull-based data)
//! - Blackboard property binding for bind-time typed ports
//!
//! ## Architecture
//!
//! Node behavior lives behind the [`NodeBehavior`] trait and is registered in
//! a [`NodeRegistry`] by string tag. A [`Graph`] owns node instances in
//! per-type tables and keeps all topology (ports, links) in a separate
//! [`GraphMetadata`] store. Editing and validation happen through `&mut`
//! methods while the graph is uninitialized; execution happens through `&self`
//! methods against a host-supplied [`GraphEnv`].

pub mod address;
pub mod blackboard;
pub mod diagnostics;
pub mod engine;
pub mod graph;
pub mod link;
pub mod metadata;
pub mod node;
pub mod port;
pub mod registry;
pub mod validate;
pub mod value;

pub use address::{NodeAddress, PortIndex, PortRef};
pub use blackboard::{BlackboardSource, PropertyBinding, PropertyHandle};
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity, ValidationReport};
pub use engine::{ExecutionError, GraphEnv, LifecycleState, NodeContext};
pub use graph::{ConnectError, Graph, GraphError, GraphId};
pub use link::{Link, LinkId};
pub use metadata::{GraphMetadata, MetadataError};
pub use node::{NodeBehavior, PortContext};
pub use port::{Multiplicity, Port, PortDirection, PortMode, PortSide};
pub use registry::{NodeDescriptor, NodeFactory, NodeRegistry};
pub use validate::{LinkRejection, SubgraphError};
pub use value::{ClassId, ClassRegistry, DataType, ObjectRef, Value};
