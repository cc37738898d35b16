// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured validation diagnostics.
//!
//! Produced at edit/validation time for build-tool and editor consumption,
//! never for runtime control flow.

use crate::address::{NodeAddress, PortIndex};
use crate::blackboard::PropertyHandle;
use crate::validate::LinkRejection;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The graph was repaired (e.g. a dead link removed) and remains usable
    Warning,
    /// Something the graph references is broken until the user intervenes
    Error,
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// A persisted link no longer passes compatibility and was removed
    InvalidLink(LinkRejection),
    /// A link endpoint's port index no longer exists; the link was removed
    DanglingLink,
    /// A node references a blackboard property that no longer exists
    UnboundProperty(PropertyHandle),
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLink(reason) => write!(f, "invalid link removed: {reason}"),
            Self::DanglingLink => write!(f, "dangling link removed"),
            Self::UnboundProperty(handle) => {
                write!(f, "blackboard property {:#x} not found", handle.0)
            }
        }
    }
}

/// One validation finding, locating the offending node/port when known.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Name of the graph the finding belongs to
    pub graph: String,
    /// Offending node, if the finding is node-scoped
    pub address: Option<NodeAddress>,
    /// Offending port, if the finding is port-scoped
    pub port: Option<PortIndex>,
    /// The finding itself
    pub kind: DiagnosticKind,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.graph)?;
        if let Some(address) = self.address {
            write!(f, " node {address}")?;
        }
        if let Some(port) = self.port {
            write!(f, " port {port}")?;
        }
        write!(f, ": {}", self.kind)
    }
}

/// Result of a validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// All findings, in discovery order
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether validation found nothing at all
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Whether validation found no hard errors (warnings allowed)
    pub fn is_runnable(&self) -> bool {
        self.diagnostics
            .iter()
            .all(|d| d.severity != Severity::Error)
    }

    /// Append a finding
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(%diagnostic, "validation finding");
        self.diagnostics.push(diagnostic);
    }

    /// Merge another report (e.g. from a subgraph) into this one
    pub fn merge(&mut self, other: ValidationReport) {
        self.diagnostics.extend(other.diagnostics);
    }
}
