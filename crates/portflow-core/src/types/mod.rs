//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the resolution engine:
//! - Arena handles (`NodeKey`, `PortId`)
//! - Service identifiers (`NodeIdentifier`, `PortIdentifier`)
//! - Port roles (`PortRole`)
//! - Error types (`PortflowError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! All handle types implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! collections, which keeps every observable iteration order stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ARENA HANDLES
// =============================================================================

/// Stable handle of a node inside a `Network` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable handle of a port: the owning node plus the port's slot in that node.
///
/// Links between ports are stored as `PortId` values, never as references,
/// so nodes and ports never form ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortId {
    /// The node that owns the port.
    pub node: NodeKey,
    /// Position of the port in its node's port list.
    pub slot: u32,
}

impl PortId {
    #[must_use]
    pub const fn new(node: NodeKey, slot: u32) -> Self {
        Self { node, slot }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.slot)
    }
}

// =============================================================================
// SERVICE IDENTIFIERS
// =============================================================================

/// Identifier handed out by node storage: a numeric id plus the node type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIdentifier {
    pub id: u64,
    pub node_type: String,
}

impl NodeIdentifier {
    #[must_use]
    pub fn new(id: u64, node_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.node_type, self.id)
    }
}

/// A port addressed through the service layer: node identifier plus port tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortIdentifier {
    pub node: NodeIdentifier,
    pub tag: String,
}

impl PortIdentifier {
    #[must_use]
    pub fn new(node: NodeIdentifier, tag: impl Into<String>) -> Self {
        Self {
            node,
            tag: tag.into(),
        }
    }
}

// =============================================================================
// PORT ROLE
// =============================================================================

/// Direction of data through a port.
///
/// `ContextDependent` only appears in node type descriptions. Once a node is
/// resolved, every port reports a concrete role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum PortRole {
    /// Unknown / unconstrained.
    #[default]
    Neutral,
    /// Data sink.
    Input,
    /// Data source.
    Output,
    /// Undetermined until the node commits to a context state.
    ContextDependent,
}

impl PortRole {
    /// Integer code stored in the relationship matrix.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Neutral => 0,
            Self::Input => 1,
            Self::Output => 2,
            Self::ContextDependent => 3,
        }
    }

    /// Inverse of [`PortRole::code`].
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Neutral),
            1 => Some(Self::Input),
            2 => Some(Self::Output),
            3 => Some(Self::ContextDependent),
            _ => None,
        }
    }

    /// The role a link partner must have: inputs face outputs and vice versa.
    #[must_use]
    pub const fn mirror(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
            other => other,
        }
    }

    /// True for `Input` and `Output`.
    #[must_use]
    pub const fn is_directed(self) -> bool {
        matches!(self, Self::Input | Self::Output)
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Neutral => "neutral",
            Self::Input => "input",
            Self::Output => "output",
            Self::ContextDependent => "context_dependent",
        };
        f.write_str(name)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of errors, used by the service layer to pick
/// status codes without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Resolution,
    StateIndex,
    Conflict,
    Internal,
}

/// Errors that can occur in portflow.
///
/// - No silent failures
/// - Use `Result<T, PortflowError>` for fallible operations
/// - The engine never panics on validated input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortflowError {
    /// A node type description failed construction-time validation.
    /// Carries every violation found, not just the first.
    #[error("invalid description of node type {node_type}: [{}]", .violations.join("; "))]
    InvalidDescription {
        node_type: String,
        violations: Vec<String>,
    },

    /// Request data could not be interpreted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No port with the given tag exists on the node.
    #[error("port {tag} not found")]
    PortNotFound { tag: String },

    /// The port handle does not resolve to a port.
    #[error("port {0} does not exist")]
    UnknownPort(PortId),

    /// The node key is not present in the network.
    #[error("node {0} not found")]
    NodeNotFound(NodeKey),

    /// The identifier is not present in node storage.
    #[error("node {0} not found in storage")]
    IdentifierNotFound(NodeIdentifier),

    /// The node type is not registered.
    #[error("no adapter registered for node type {0}")]
    AdapterNotFound(String),

    /// The port already has a link partner.
    #[error("port {0} is already linked")]
    PortAlreadyLinked(PortId),

    /// A port cannot be linked to itself.
    #[error("port {0} cannot be linked to itself")]
    SelfLink(PortId),

    /// No combination of context states is consistent.
    #[error("no valid configuration found")]
    Unsatisfiable,

    /// More than one combination of context states is consistent.
    #[error("ambiguous configuration: {} valid combinations {:?}", .0.len(), .0)]
    Ambiguous(Vec<Vec<usize>>),

    /// The candidate space exceeds the configured ceiling.
    #[error("search space too large: {combinations} combinations exceed limit {limit}")]
    SearchSpaceTooLarge { combinations: u128, limit: usize },

    /// `select_state` was called with an index outside the node's states.
    #[error("state index {index} out of range (node has {count} context states)")]
    StateIndexOutOfRange { index: usize, count: usize },

    /// The node's port roles have not been resolved yet.
    #[error("node {0} is not configured")]
    NotConfigured(String),

    /// Bounds-checked matrix access failed.
    #[error("matrix index ({row}, {col}) out of range for {rows}x{cols}")]
    MatrixIndexOutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// A node behavior reported a failure.
    #[error("node behavior failed: {0}")]
    Behavior(String),

    /// Reading or parsing an external document failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl PortflowError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDescription { .. } | Self::InvalidRequest(_) => ErrorKind::Validation,
            Self::PortNotFound { .. }
            | Self::UnknownPort(_)
            | Self::NodeNotFound(_)
            | Self::IdentifierNotFound(_)
            | Self::AdapterNotFound(_) => ErrorKind::NotFound,
            Self::Unsatisfiable | Self::Ambiguous(_) | Self::SearchSpaceTooLarge { .. } => {
                ErrorKind::Resolution
            }
            Self::StateIndexOutOfRange { .. } => ErrorKind::StateIndex,
            Self::PortAlreadyLinked(_) | Self::SelfLink(_) | Self::NotConfigured(_) => {
                ErrorKind::Conflict
            }
            Self::MatrixIndexOutOfRange { .. } | Self::Behavior(_) | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
