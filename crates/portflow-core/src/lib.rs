//! # portflow-core
//!
//! The context resolution engine for portflow node graphs.
//!
//! A node is a set of typed ports. Some ports have a fixed role (input or
//! output); others are context-dependent, and the node type lists the
//! alternative role assignments ("context states") it can take. Given a graph
//! of linked nodes, the engine finds the single combination of context states
//! under which every link joins exactly one output to one input, and commits
//! it to every node.
//!
//! ## Architectural Constraints
//!
//! - Synchronous and pure: NO async, NO network dependencies
//! - Deterministic: `BTreeMap`/`BTreeSet` wherever iteration order is observable
//! - No partial commits: a failed resolution leaves every node untouched
//! - Node behavior is opaque: adapters own the engineering computation
//! - Logs through `tracing` and never prints

// =============================================================================
// MODULES
// =============================================================================

pub mod adapter;
pub mod catalog;
pub mod description;
pub mod filter;
pub mod matrix;
pub mod network;
pub mod node;
pub mod primitives;
pub mod selector;
pub mod session;
pub mod storage;
pub mod types;
pub mod variants;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ErrorKind, NodeIdentifier, NodeKey, PortId, PortIdentifier, PortRole, PortflowError,
};

// =============================================================================
// RE-EXPORTS: Resolution Engine
// =============================================================================

pub use description::{ContextState, NodeTypeDescription, PortAssignment, PortDescriptor};
pub use filter::{Filter, PortState};
pub use matrix::IntMatrix;
pub use network::{ComponentCheck, ComponentResolution, ConfigurationReport, Network};
pub use node::{ConnectionLine, Port, RepresentationNode};
pub use selector::{ContextSelector, PairValidator, SelectorPhase, default_validator, validate_matrix};
pub use variants::{VariantIter, combination_count, snake_ints, snake_variants, variants};

// =============================================================================
// RE-EXPORTS: Service Layer
// =============================================================================

pub use adapter::{AdapterRegistry, NodeAdapter, NodeBehavior, NodeState, RequestData};
pub use catalog::builtin_registry;
pub use session::{
    CheckedComponent, CreateNodeRequest, LinkRequest, NodeView, PortView, ResolvedComponent,
    ServiceDescription, Session, SessionStatus, StateRequest, TypedNode, UpdateNodeRequest,
};
pub use storage::{MapNodeStorage, NodeStorage};
