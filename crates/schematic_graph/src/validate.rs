// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link compatibility and subgraph embedding validation.
//!
//! Both validators are pure decision functions: failures are returned as
//! values for diagnostics, never panicked or thrown, and an offending
//! link/embedding is simply not created.

use crate::graph::{Graph, GraphId};
use crate::port::{Multiplicity, Port, PortDirection, PortMode};
use crate::value::{ClassRegistry, DataType};

/// Maximum subgraph nesting depth accepted at edit time.
pub const MAX_SUBGRAPH_DEPTH: usize = 100;

/// Reason a candidate link was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkRejection {
    /// One of the ports is hidden
    #[error("port is hidden")]
    HiddenPort,

    /// One of the ports belongs to a subgraph boundary
    #[error("port is external")]
    ExternalPort,

    /// Both ports sit on the same layout side
    #[error("ports are on the same layout side")]
    SameSide,

    /// Both ports have the same direction
    #[error("ports have the same direction")]
    SameDirection,

    /// The link's source is an input port (an Enter port can never source a link)
    #[error("link source must be an output port")]
    SourceIsInput,

    /// The link's target is an output port (an Exit port can never be a link target)
    #[error("link target must be an input port")]
    TargetIsOutput,

    /// One port is flow, the other data
    #[error("flow port linked to data port")]
    ModeMismatch,

    /// Both data ports are dynamic; the link type would be unresolvable
    #[error("both ports are dynamic")]
    BothDynamic,

    /// Value types differ
    #[error("type mismatch: {from} -> {to}")]
    TypeMismatch {
        /// Output-side type
        from: DataType,
        /// Input-side type
        to: DataType,
    },

    /// Array output feeding a `Multiple` input of a different element type
    #[error("array element type {element} does not match aggregate input {input}")]
    ArrayElementMismatch {
        /// Element type of the array output
        element: DataType,
        /// Declared type of the aggregating input
        input: DataType,
    },

    /// Reference types fail the declared assignability direction
    #[error("class {from} is not assignable to {to}")]
    NotAssignable {
        /// Output-side class index
        from: u32,
        /// Input-side class index
        to: u32,
    },
}

/// Decide whether a link `from -> to` may be created.
///
/// `from` must be the source (output-side) port of the candidate link and
/// `to` its target. Returns the precise rejection reason for diagnostics.
pub fn validate_link(
    from: &Port,
    to: &Port,
    classes: &ClassRegistry,
) -> Result<(), LinkRejection> {
    if from.hidden || to.hidden {
        return Err(LinkRejection::HiddenPort);
    }
    if from.external || to.external {
        return Err(LinkRejection::ExternalPort);
    }
    if from.side == to.side {
        return Err(LinkRejection::SameSide);
    }
    if from.direction == to.direction {
        return Err(LinkRejection::SameDirection);
    }
    if from.direction == PortDirection::Input {
        return Err(LinkRejection::SourceIsInput);
    }
    if to.direction == PortDirection::Output {
        return Err(LinkRejection::TargetIsOutput);
    }
    if from.mode != to.mode {
        return Err(LinkRejection::ModeMismatch);
    }
    if from.mode == PortMode::Flow {
        // Flow links carry no type; opposite directions is all that matters
        return Ok(());
    }

    match (&from.data_type, &to.data_type) {
        (None, None) => Err(LinkRejection::BothDynamic),
        // One dynamic side resolves at bind time
        (None, Some(_)) | (Some(_), None) => Ok(()),
        (Some(out_ty), Some(in_ty)) => check_types(out_ty, in_ty, to, classes),
    }
}

/// Boolean form of [`validate_link`]
pub fn are_ports_compatible(from: &Port, to: &Port, classes: &ClassRegistry) -> bool {
    validate_link(from, to, classes).is_ok()
}

fn check_types(
    out_ty: &DataType,
    in_ty: &DataType,
    to: &Port,
    classes: &ClassRegistry,
) -> Result<(), LinkRejection> {
    // Aggregation: a Multiple input of element type T accepts an Array(T)
    // output as the whole aggregate.
    if to.multiplicity == Multiplicity::Multiple {
        if let DataType::Array(element) = out_ty {
            if element.as_ref() == in_ty {
                return Ok(());
            }
            return Err(LinkRejection::ArrayElementMismatch {
                element: (**element).clone(),
                input: in_ty.clone(),
            });
        }
    }

    match (out_ty, in_ty) {
        (DataType::Object(from_class), DataType::Object(to_class)) => {
            // Default: the produced class must be assignable to the consumed
            // class. An input that accepts subclasses flips the direction.
            let ok = if to.accepts_subclass {
                classes.is_assignable(*to_class, *from_class)
            } else {
                classes.is_assignable(*from_class, *to_class)
            };
            if ok {
                Ok(())
            } else {
                Err(LinkRejection::NotAssignable {
                    from: from_class.0,
                    to: to_class.0,
                })
            }
        }
        _ if out_ty == in_ty => Ok(()),
        _ => Err(LinkRejection::TypeMismatch {
            from: out_ty.clone(),
            to: in_ty.clone(),
        }),
    }
}

/// Reason a subgraph embedding was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubgraphError {
    /// The candidate contains the embedding graph, directly or transitively
    #[error("graph embeds itself (path: {path})")]
    SelfEmbedding {
        /// Names from the candidate down to the offending graph
        path: String,
    },

    /// Nesting exceeds [`MAX_SUBGRAPH_DEPTH`]
    #[error("subgraph nesting deeper than {MAX_SUBGRAPH_DEPTH} (path: {path})")]
    DepthExceeded {
        /// Names down to where the ceiling was hit
        path: String,
    },
}

/// Check whether `candidate` may be embedded under the graph identified by
/// `root`.
///
/// Walks the candidate's own subgraph references, refusing direct or
/// transitive self-embedding and unbounded nesting. Runs at edit time only;
/// execution assumes a previously validated, acyclic subgraph tree.
pub fn validate_subgraph(root: GraphId, candidate: &Graph) -> Result<(), SubgraphError> {
    let mut path = String::new();
    validate_subgraph_at(root, candidate, 0, &mut path)
}

fn validate_subgraph_at(
    root: GraphId,
    candidate: &Graph,
    level: usize,
    path: &mut String,
) -> Result<(), SubgraphError> {
    if !path.is_empty() {
        path.push('/');
    }
    path.push_str(candidate.name());

    if candidate.id() == root {
        return Err(SubgraphError::SelfEmbedding { path: path.clone() });
    }
    if level >= MAX_SUBGRAPH_DEPTH {
        return Err(SubgraphError::DepthExceeded { path: path.clone() });
    }

    for child in candidate.subgraphs() {
        let len = path.len();
        validate_subgraph_at(root, child, level + 1, path)?;
        path.truncate(len);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ClassId;

    fn classes() -> (ClassRegistry, ClassId, ClassId) {
        let mut registry = ClassRegistry::new();
        let base = registry.register("Actor", None);
        let derived = registry.register("Pawn", Some(base));
        (registry, base, derived)
    }

    #[test]
    fn test_flow_links_need_matching_mode_only() {
        let (registry, _, _) = classes();
        let exit = Port::exit("out");
        let enter = Port::enter("in");
        assert!(are_ports_compatible(&exit, &enter, &registry));
        assert_eq!(
            validate_link(&exit, &Port::input("x", DataType::Int), &registry),
            Err(LinkRejection::ModeMismatch)
        );
    }

    #[test]
    fn test_enter_cannot_source_exit_cannot_receive() {
        let (registry, _, _) = classes();
        // Reversed flow link: enter as source, exit as target
        let err = validate_link(&Port::enter("in"), &Port::exit("out"), &registry);
        assert_eq!(err, Err(LinkRejection::SourceIsInput));
    }

    #[test]
    fn test_same_direction_and_side_rejected() {
        let (registry, _, _) = classes();
        let a = Port::output("a", DataType::Int);
        let b = Port::output("b", DataType::Int);
        assert_eq!(
            validate_link(&a, &b, &registry),
            Err(LinkRejection::SameSide)
        );

        // Opposite sides but same direction
        let b = Port::output("b", DataType::Int).on_side(crate::port::PortSide::Left);
        assert_eq!(
            validate_link(&a, &b, &registry),
            Err(LinkRejection::SameDirection)
        );
    }

    #[test]
    fn test_hidden_and_external_rejected() {
        let (registry, _, _) = classes();
        let out = Port::output("v", DataType::Int);
        let hidden = Port::input("x", DataType::Int).hidden();
        let external = Port::input("x", DataType::Int).external();
        assert_eq!(
            validate_link(&out, &hidden, &registry),
            Err(LinkRejection::HiddenPort)
        );
        assert_eq!(
            validate_link(&out, &external, &registry),
            Err(LinkRejection::ExternalPort)
        );
    }

    #[test]
    fn test_value_types_require_exact_equality() {
        let (registry, _, _) = classes();
        let out = Port::output("v", DataType::Int);
        assert!(are_ports_compatible(
            &out,
            &Port::input("x", DataType::Int),
            &registry
        ));
        assert!(matches!(
            validate_link(&out, &Port::input("x", DataType::Float), &registry),
            Err(LinkRejection::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_dynamic_matches_unless_both_dynamic() {
        let (registry, _, _) = classes();
        let dynamic_out = Port::dynamic_output("v");
        let typed_in = Port::input("x", DataType::String);
        assert!(are_ports_compatible(&dynamic_out, &typed_in, &registry));
        assert!(are_ports_compatible(
            &Port::output("v", DataType::String),
            &Port::dynamic_input("x"),
            &registry
        ));
        assert_eq!(
            validate_link(&dynamic_out, &Port::dynamic_input("x"), &registry),
            Err(LinkRejection::BothDynamic)
        );
    }

    #[test]
    fn test_reference_assignability_direction() {
        let (registry, base, derived) = classes();
        let derived_out = Port::output("v", DataType::Object(derived));
        let base_in = Port::input("x", DataType::Object(base));
        // Producing a subclass where the base is consumed is the safe default
        assert!(are_ports_compatible(&derived_out, &base_in, &registry));

        let base_out = Port::output("v", DataType::Object(base));
        let derived_in = Port::input("x", DataType::Object(derived));
        assert!(matches!(
            validate_link(&base_out, &derived_in, &registry),
            Err(LinkRejection::NotAssignable { .. })
        ));
        // accepts_subclass flips the direction
        let loose_in = Port::input("x", DataType::Object(derived)).accepts_subclass();
        assert!(are_ports_compatible(&base_out, &loose_in, &registry));
    }

    #[test]
    fn test_multiple_input_accepts_matching_array() {
        let (registry, _, _) = classes();
        let array_out = Port::output("vs", DataType::Array(Box::new(DataType::Int)));
        let aggregate = Port::input("xs", DataType::Int).multiple();
        assert!(are_ports_compatible(&array_out, &aggregate, &registry));

        let wrong = Port::output("vs", DataType::Array(Box::new(DataType::Float)));
        assert!(matches!(
            validate_link(&wrong, &aggregate, &registry),
            Err(LinkRejection::ArrayElementMismatch { .. })
        ));

        // Without Multiple capacity the array must match exactly
        let single = Port::input("xs", DataType::Int);
        assert!(matches!(
            validate_link(&array_out, &single, &registry),
            Err(LinkRejection::TypeMismatch { .. })
        ));
    }
}
