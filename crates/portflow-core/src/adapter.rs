//! # Adapters
//!
//! Per-node-type capabilities, looked up by node-type name.
//!
//! An adapter supplies the type description and creates the node's
//! behavior: the opaque computation a node performs when processed. The
//! engine never looks inside a behavior.

use crate::description::NodeTypeDescription;
use crate::node::RepresentationNode;
use crate::{PortId, PortflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Parameters for creating or updating a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(default)]
    pub kwargs: BTreeMap<String, f64>,
    /// Instance count per multi-port prefix. Only read at creation.
    #[serde(default)]
    pub multi_ports: BTreeMap<String, usize>,
}

impl RequestData {
    #[must_use]
    pub fn with_kwarg(mut self, key: impl Into<String>, value: f64) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_multi_port(mut self, prefix: impl Into<String>, count: usize) -> Self {
        self.multi_ports.insert(prefix.into(), count);
        self
    }
}

/// Snapshot of selected node fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub fields: BTreeMap<String, f64>,
}

/// The computation a node performs. Opaque to the engine.
pub trait NodeBehavior: Send + Sync + fmt::Debug {
    fn update(&mut self, data: &RequestData) -> Result<(), PortflowError>;

    /// Values of `fields`, or of every field when `fields` is empty.
    fn state(&self, fields: &[String]) -> Result<NodeState, PortflowError>;

    /// Run the node. `node` carries the resolved port roles.
    fn process(&mut self, node: &RepresentationNode) -> Result<(), PortflowError>;
}

/// Capabilities of one node type.
pub trait NodeAdapter: Send + Sync {
    fn description(&self) -> Arc<NodeTypeDescription>;

    fn create(&self, data: &RequestData) -> Result<Box<dyn NodeBehavior>, PortflowError>;

    fn update(&self, behavior: &mut dyn NodeBehavior, data: &RequestData) -> Result<(), PortflowError> {
        behavior.update(data)
    }

    fn get_state(&self, behavior: &dyn NodeBehavior, fields: &[String]) -> Result<NodeState, PortflowError> {
        behavior.state(fields)
    }

    fn get_port(&self, tag: &str, node: &RepresentationNode) -> Result<PortId, PortflowError> {
        node.port_by_name(tag)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Node-type name → adapter.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn NodeAdapter>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("node_types", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the adapter's node-type name, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn NodeAdapter>) {
        let name = adapter.description().node_type.clone();
        self.adapters.insert(name, adapter);
    }

    pub fn get_adapter(&self, node_type: &str) -> Result<Arc<dyn NodeAdapter>, PortflowError> {
        self.adapters
            .get(node_type)
            .cloned()
            .ok_or_else(|| PortflowError::AdapterNotFound(node_type.to_string()))
    }

    /// Descriptions of every registered type, by name.
    #[must_use]
    pub fn descriptions(&self) -> Vec<Arc<NodeTypeDescription>> {
        self.adapters.values().map(|a| a.description()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
