//! # Session Module
//!
//! The node service façade: one graph of live nodes, addressed by the
//! identifiers node storage hands out.
//!
//! A session ties together:
//! - the adapter registry (node-type capabilities)
//! - node storage (identifier → arena key)
//! - the network arena (ports, links, resolution)
//! - the per-node behaviors created by adapters
//!
//! Batch operations return one `Result` per item so the transport layer can
//! report partial success.

use crate::adapter::{AdapterRegistry, NodeBehavior, NodeState, RequestData};
use crate::catalog::builtin_registry;
use crate::description::NodeTypeDescription;
use crate::network::Network;
use crate::storage::{MapNodeStorage, NodeStorage};
use crate::{NodeIdentifier, NodeKey, PortIdentifier, PortId, PortRole, PortflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

// =============================================================================
// REQUEST & VIEW TYPES
// =============================================================================

/// Value kept in node storage for every live node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedNode {
    pub node_type: String,
    pub key: NodeKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNodeRequest {
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: RequestData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNodeRequest {
    pub id: NodeIdentifier,
    #[serde(default)]
    pub data: RequestData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRequest {
    pub id: NodeIdentifier,
    /// Empty means every field.
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub from: PortIdentifier,
    pub to: PortIdentifier,
}

/// Every registered node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub node_types: Vec<NodeTypeDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortView {
    pub tag: String,
    pub prefix: String,
    pub declared_role: PortRole,
    pub effective_role: PortRole,
    pub linked_to: Option<PortIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: NodeIdentifier,
    pub name: String,
    pub resolved: bool,
    pub selected_state: Option<usize>,
    pub ports: Vec<PortView>,
}

/// Winning context-state index per node of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedComponent {
    pub nodes: Vec<NodeIdentifier>,
    pub selection: Vec<usize>,
}

/// Every valid selection of one component, without committing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedComponent {
    pub nodes: Vec<NodeIdentifier>,
    pub valid: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub node_count: usize,
    pub link_count: usize,
    pub unresolved_count: usize,
    pub node_type_count: usize,
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug)]
pub struct Session {
    registry: AdapterRegistry,
    storage: MapNodeStorage<TypedNode>,
    network: Network,
    behaviors: BTreeMap<NodeKey, Box<dyn NodeBehavior>>,
    identifiers: BTreeMap<NodeKey, NodeIdentifier>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(builtin_registry())
    }
}

impl Session {
    #[must_use]
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            storage: MapNodeStorage::new(),
            network: Network::new(),
            behaviors: BTreeMap::new(),
            identifiers: BTreeMap::new(),
        }
    }

    /// Session over the built-in catalog.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self::default()
    }

    /// Combination ceiling for every resolution run.
    #[must_use]
    pub fn with_max_combinations(mut self, limit: usize) -> Self {
        self.network = std::mem::take(&mut self.network).with_max_combinations(limit);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    // =========================================================================
    // NODE LIFECYCLE
    // =========================================================================

    /// Create a node of `node_type`.
    ///
    /// Nothing is stored if the adapter or the description rejects the data.
    pub fn create_node(
        &mut self,
        node_type: &str,
        name: Option<&str>,
        data: &RequestData,
    ) -> Result<NodeIdentifier, PortflowError> {
        let adapter = self.registry.get_adapter(node_type)?;
        let behavior = adapter.create(data)?;
        let key = self.network.add_node(adapter.description(), &data.multi_ports)?;

        let id = self.storage.add(
            node_type,
            TypedNode {
                node_type: node_type.to_string(),
                key,
            },
        );
        let label = name.map_or_else(|| format!("{node_type}-{}", id.id), str::to_string);
        self.network.node_mut(key)?.set_name(label);
        self.behaviors.insert(key, behavior);
        self.identifiers.insert(key, id.clone());

        info!(node = %id, key = %key, "node created");
        Ok(id)
    }

    pub fn create_nodes(
        &mut self,
        requests: &[CreateNodeRequest],
    ) -> Vec<Result<NodeIdentifier, PortflowError>> {
        requests
            .iter()
            .map(|r| self.create_node(&r.node_type, r.name.as_deref(), &r.data))
            .collect()
    }

    pub fn update_node(&mut self, id: &NodeIdentifier, data: &RequestData) -> Result<(), PortflowError> {
        let key = self.key_of(id)?;
        let adapter = self.registry.get_adapter(&id.node_type)?;
        let behavior = self
            .behaviors
            .get_mut(&key)
            .ok_or_else(|| PortflowError::IdentifierNotFound(id.clone()))?;
        adapter.update(behavior.as_mut(), data)
    }

    pub fn update_nodes(&mut self, requests: &[UpdateNodeRequest]) -> Vec<Result<(), PortflowError>> {
        requests
            .iter()
            .map(|r| self.update_node(&r.id, &r.data))
            .collect()
    }

    /// Drop a node. Its link partners become unlinked.
    pub fn delete_node(&mut self, id: &NodeIdentifier) -> Result<(), PortflowError> {
        let typed = self.storage.drop_node(id)?;
        self.network.remove_node(typed.key)?;
        self.behaviors.remove(&typed.key);
        self.identifiers.remove(&typed.key);
        info!(node = %id, "node deleted");
        Ok(())
    }

    pub fn delete_nodes(&mut self, ids: &[NodeIdentifier]) -> Vec<Result<(), PortflowError>> {
        ids.iter().map(|id| self.delete_node(id)).collect()
    }

    pub fn node_state(&self, id: &NodeIdentifier, fields: &[String]) -> Result<NodeState, PortflowError> {
        let key = self.key_of(id)?;
        let adapter = self.registry.get_adapter(&id.node_type)?;
        let behavior = self
            .behaviors
            .get(&key)
            .ok_or_else(|| PortflowError::IdentifierNotFound(id.clone()))?;
        adapter.get_state(behavior.as_ref(), fields)
    }

    pub fn node_states(&self, requests: &[StateRequest]) -> Vec<Result<NodeState, PortflowError>> {
        requests
            .iter()
            .map(|r| self.node_state(&r.id, &r.fields))
            .collect()
    }

    // =========================================================================
    // LINKING & RESOLUTION
    // =========================================================================

    pub fn link(&mut self, from: &PortIdentifier, to: &PortIdentifier) -> Result<(), PortflowError> {
        let a = self.port_of(from)?;
        let b = self.port_of(to)?;
        self.network.link(a, b)?;
        debug!(from = %from.node, from_tag = %from.tag, to = %to.node, to_tag = %to.tag, "link created");
        Ok(())
    }

    pub fn link_many(&mut self, requests: &[LinkRequest]) -> Vec<Result<(), PortflowError>> {
        requests
            .iter()
            .map(|r| self.link(&r.from, &r.to))
            .collect()
    }

    /// Resolve every connected component.
    pub fn configure(&mut self) -> Result<Vec<ResolvedComponent>, PortflowError> {
        let report = self.network.configure_all()?;
        Ok(report
            .components
            .into_iter()
            .map(|c| ResolvedComponent {
                nodes: self.identifiers_of(&c.nodes),
                selection: c.selection,
            })
            .collect())
    }

    /// List every valid selection per component. Commits nothing.
    pub fn check(&self) -> Result<Vec<CheckedComponent>, PortflowError> {
        let checks = self.network.check_all()?;
        Ok(checks
            .into_iter()
            .map(|c| CheckedComponent {
                nodes: self.identifiers_of(&c.nodes),
                valid: c.valid,
            })
            .collect())
    }

    /// Run a node's behavior. The node must be resolved.
    pub fn process(&mut self, id: &NodeIdentifier) -> Result<(), PortflowError> {
        let key = self.key_of(id)?;
        let node = self.network.node(key)?;
        if !node.is_resolved() {
            return Err(PortflowError::NotConfigured(id.to_string()));
        }
        let behavior = self
            .behaviors
            .get_mut(&key)
            .ok_or_else(|| PortflowError::IdentifierNotFound(id.clone()))?;
        behavior.process(node)?;
        debug!(node = %id, "node processed");
        Ok(())
    }

    pub fn process_many(&mut self, ids: &[NodeIdentifier]) -> Vec<Result<(), PortflowError>> {
        ids.iter().map(|id| self.process(id)).collect()
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    #[must_use]
    pub fn describe(&self) -> ServiceDescription {
        ServiceDescription {
            node_types: self
                .registry
                .descriptions()
                .iter()
                .map(|d| d.as_ref().clone())
                .collect(),
        }
    }

    pub fn node_view(&self, id: &NodeIdentifier) -> Result<NodeView, PortflowError> {
        let key = self.key_of(id)?;
        let node = self.network.node(key)?;

        let mut ports = Vec::with_capacity(node.ports().len());
        for port in node.ports() {
            let linked_to = match port.link() {
                Some(partner) => Some(self.port_identifier(partner)?),
                None => None,
            };
            ports.push(PortView {
                tag: port.tag().to_string(),
                prefix: port.prefix().to_string(),
                declared_role: port.role(),
                effective_role: node.effective_role(port.id())?,
                linked_to,
            });
        }

        Ok(NodeView {
            id: id.clone(),
            name: node.name().to_string(),
            resolved: node.is_resolved(),
            selected_state: node.selected_state(),
            ports,
        })
    }

    /// Identifiers of every live node, in id order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeIdentifier> {
        self.storage.identifiers()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            node_count: self.network.len(),
            link_count: self.network.link_count(),
            unresolved_count: self.network.unresolved().len(),
            node_type_count: self.registry.len(),
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn key_of(&self, id: &NodeIdentifier) -> Result<NodeKey, PortflowError> {
        Ok(self.storage.get(id)?.key)
    }

    fn port_of(&self, port: &PortIdentifier) -> Result<PortId, PortflowError> {
        let key = self.key_of(&port.node)?;
        let adapter = self.registry.get_adapter(&port.node.node_type)?;
        adapter.get_port(&port.tag, self.network.node(key)?)
    }

    fn port_identifier(&self, port: PortId) -> Result<PortIdentifier, PortflowError> {
        let id = self
            .identifiers
            .get(&port.node)
            .ok_or(PortflowError::NodeNotFound(port.node))?;
        let tag = self.network.node(port.node)?.port(port)?.tag();
        Ok(PortIdentifier::new(id.clone(), tag))
    }

    fn identifiers_of(&self, keys: &[NodeKey]) -> Vec<NodeIdentifier> {
        keys.iter()
            .filter_map(|key| self.identifiers.get(key).cloned())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PIPE, SINK, SOURCE};

    fn pipe_data() -> RequestData {
        RequestData::default().with_kwarg("sigma", 0.98)
    }

    fn chain(session: &mut Session) -> (NodeIdentifier, NodeIdentifier, NodeIdentifier) {
        let source = session
            .create_node(SOURCE, None, &RequestData::default().with_kwarg("rate", 1.0))
            .expect("source");
        let pipe = session.create_node(PIPE, Some("main"), &pipe_data()).expect("pipe");
        let sink = session
            .create_node(SINK, None, &RequestData::default())
            .expect("sink");
        session
            .link(
                &PortIdentifier::new(source.clone(), "out"),
                &PortIdentifier::new(pipe.clone(), "a"),
            )
            .expect("link");
        session
            .link(
                &PortIdentifier::new(pipe.clone(), "b"),
                &PortIdentifier::new(sink.clone(), "in"),
            )
            .expect("link");
        (source, pipe, sink)
    }

    #[test]
    fn identifiers_come_from_storage() {
        let mut session = Session::with_builtins();
        let a = session.create_node(SINK, None, &RequestData::default()).expect("a");
        let b = session.create_node(SINK, None, &RequestData::default()).expect("b");
        assert_eq!(a, NodeIdentifier::new(1, SINK));
        assert_eq!(b, NodeIdentifier::new(2, SINK));
    }

    #[test]
    fn failed_creation_stores_nothing() {
        let mut session = Session::with_builtins();
        assert!(session.create_node(PIPE, None, &RequestData::default()).is_err());
        assert!(session.create_node("turbine", None, &RequestData::default()).is_err());
        assert!(session.node_ids().is_empty());
        assert_eq!(session.status().node_count, 0);
    }

    #[test]
    fn configure_then_process() {
        let mut session = Session::with_builtins();
        let (_, pipe, _) = chain(&mut session);

        assert!(matches!(
            session.process(&pipe),
            Err(PortflowError::NotConfigured(_))
        ));

        let resolved = session.configure().expect("configure");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].selection, vec![0, 0, 0]);

        session.process(&pipe).expect("process");
        let state = session.node_state(&pipe, &["runs".to_string()]).expect("state");
        assert_eq!(state.fields.get("runs"), Some(&1.0));
    }

    #[test]
    fn failed_configure_changes_no_node() {
        let mut session = Session::with_builtins();
        let (_, pipe, _) = chain(&mut session);
        let lone = session.create_node(PIPE, None, &pipe_data()).expect("lone");

        assert_eq!(
            session.configure(),
            Err(PortflowError::Ambiguous(vec![vec![0], vec![1]]))
        );
        let view = session.node_view(&pipe).expect("view");
        assert!(!view.resolved);
        assert_eq!(view.selected_state, None);
        assert_eq!(session.status().unresolved_count, 2);

        session.delete_node(&lone).expect("delete");
        session.configure().expect("configure");
        assert_eq!(session.node_view(&pipe).expect("view").selected_state, Some(0));
    }

    #[test]
    fn node_view_reports_roles_and_links() {
        let mut session = Session::with_builtins();
        let (source, pipe, _) = chain(&mut session);
        session.configure().expect("configure");

        let view = session.node_view(&pipe).expect("view");
        assert_eq!(view.name, "main");
        assert!(view.resolved);
        assert_eq!(view.selected_state, Some(0));
        assert_eq!(view.ports[0].effective_role, PortRole::Input);
        assert_eq!(view.ports[0].declared_role, PortRole::ContextDependent);
        assert_eq!(
            view.ports[0].linked_to,
            Some(PortIdentifier::new(source, "out"))
        );
    }

    #[test]
    fn delete_unlinks_partners() {
        let mut session = Session::with_builtins();
        let (source, pipe, _) = chain(&mut session);
        session.delete_node(&pipe).expect("delete");

        assert!(session.node_view(&pipe).is_err());
        let view = session.node_view(&source).expect("view");
        assert_eq!(view.ports[0].linked_to, None);
        assert_eq!(session.status().link_count, 0);
        assert!(session.delete_node(&pipe).is_err());
    }

    #[test]
    fn batch_results_are_per_item() {
        let mut session = Session::with_builtins();
        let results = session.create_nodes(&[
            CreateNodeRequest {
                node_type: SINK.into(),
                name: None,
                data: RequestData::default(),
            },
            CreateNodeRequest {
                node_type: "nope".into(),
                name: None,
                data: RequestData::default(),
            },
        ]);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(PortflowError::AdapterNotFound(_))));
    }

    #[test]
    fn wrong_node_type_in_identifier_is_not_found() {
        let mut session = Session::with_builtins();
        let sink = session.create_node(SINK, None, &RequestData::default()).expect("sink");
        let disguised = NodeIdentifier::new(sink.id, SOURCE);
        assert!(matches!(
            session.node_state(&disguised, &[]),
            Err(PortflowError::IdentifierNotFound(_))
        ));
    }

    #[test]
    fn check_lists_without_committing() {
        let mut session = Session::with_builtins();
        let a = session.create_node(PIPE, None, &pipe_data()).expect("a");
        let b = session.create_node(PIPE, None, &pipe_data()).expect("b");
        session
            .link(&PortIdentifier::new(a.clone(), "b"), &PortIdentifier::new(b, "a"))
            .expect("link");

        let checks = session.check().expect("check");
        assert_eq!(checks[0].valid.len(), 2);
        assert_eq!(session.status().unresolved_count, 2);
        assert!(matches!(
            session.configure(),
            Err(PortflowError::Ambiguous(_))
        ));
        assert!(!session.node_view(&a).expect("view").resolved);
    }

    #[test]
    fn describe_lists_catalog() {
        let session = Session::with_builtins();
        let names: Vec<String> = session
            .describe()
            .node_types
            .into_iter()
            .map(|d| d.node_type)
            .collect();
        assert_eq!(
            names,
            vec!["collector", "mixer", "pipe", "sink", "source", "splitter"]
        );
    }
}
