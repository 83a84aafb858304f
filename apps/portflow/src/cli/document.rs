//! # Graph Documents
//!
//! A JSON file describing nodes by name and the links between their ports:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "name": "feed", "type": "source", "kwargs": { "rate": 2.0 } },
//!     { "name": "join", "type": "collector", "multi_ports": { "inlet": 2 } }
//!   ],
//!   "links": [
//!     { "from": { "node": "feed", "port": "out" }, "to": { "node": "join", "port": "inlet_1" } }
//!   ]
//! }
//! ```
//!
//! Loading a document creates every node in file order, then links in file
//! order, into a fresh session. Nothing is resolved yet.

use portflow_core::{NodeIdentifier, PortIdentifier, PortflowError, RequestData, Session};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Largest graph document accepted (16 MB).
const MAX_DOCUMENT_SIZE: u64 = 16 * 1024 * 1024;

// =============================================================================
// DOCUMENT FORMAT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub kwargs: BTreeMap<String, f64>,
    #[serde(default)]
    pub multi_ports: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkEnd {
    pub node: String,
    pub port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    pub from: LinkEnd,
    pub to: LinkEnd,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

/// A document loaded into a live session.
#[derive(Debug)]
pub struct LoadedGraph {
    pub session: Session,
    /// Identifiers in document order, paired with the document name.
    pub nodes: Vec<(String, NodeIdentifier)>,
}

impl GraphDocument {
    pub fn from_json(text: &str) -> Result<Self, PortflowError> {
        serde_json::from_str(text)
            .map_err(|e| PortflowError::InvalidRequest(format!("invalid graph document: {}", e)))
    }

    /// Read and parse a document from disk.
    pub fn from_file(path: &Path) -> Result<Self, PortflowError> {
        let path = validate_file_path(path)?;
        let size = std::fs::metadata(&path)
            .map_err(|e| PortflowError::Io(format!("cannot read file metadata: {}", e)))?
            .len();
        if size > MAX_DOCUMENT_SIZE {
            return Err(PortflowError::Io(format!(
                "file size {} bytes exceeds maximum allowed {} bytes",
                size, MAX_DOCUMENT_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path)
            .map_err(|e| PortflowError::Io(format!("cannot read '{}': {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Create the nodes and links in a new session over the built-in catalog.
    ///
    /// The first failing node or link aborts the load with its error.
    pub fn load(&self, max_combinations: usize) -> Result<LoadedGraph, PortflowError> {
        let mut session = Session::with_builtins().with_max_combinations(max_combinations);
        let mut by_name: BTreeMap<&str, NodeIdentifier> = BTreeMap::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());

        for spec in &self.nodes {
            if by_name.contains_key(spec.name.as_str()) {
                return Err(PortflowError::InvalidRequest(format!(
                    "duplicate node name '{}'",
                    spec.name
                )));
            }
            let data = RequestData {
                kwargs: spec.kwargs.clone(),
                multi_ports: spec.multi_ports.clone(),
            };
            let id = session.create_node(&spec.node_type, Some(&spec.name), &data)?;
            by_name.insert(&spec.name, id.clone());
            nodes.push((spec.name.clone(), id));
        }

        let resolve = |end: &LinkEnd| -> Result<PortIdentifier, PortflowError> {
            by_name
                .get(end.node.as_str())
                .map(|id| PortIdentifier::new(id.clone(), end.port.clone()))
                .ok_or_else(|| {
                    PortflowError::InvalidRequest(format!("link names unknown node '{}'", end.node))
                })
        };
        for link in &self.links {
            session.link(&resolve(&link.from)?, &resolve(&link.to)?)?;
        }

        Ok(LoadedGraph { session, nodes })
    }
}

/// Canonicalize an input path and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, PortflowError> {
    let canonical = path.canonicalize().map_err(|e| {
        PortflowError::Io(format!("invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(PortflowError::Io(format!(
            "path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

// =============================================================================
// TESTS
// =============================================================================
