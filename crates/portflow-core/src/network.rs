//! # Network
//!
//! Arena of representation nodes keyed by `NodeKey`.
//!
//! Links are symmetric handle pairs stored on both ports. Connected
//! components are found with an explicit visited-set traversal and resolved
//! independently. Commits happen only once every component has a unique
//! winner.

use crate::description::NodeTypeDescription;
use crate::node::RepresentationNode;
use crate::primitives::DEFAULT_MAX_COMBINATIONS;
use crate::selector::ContextSelector;
use crate::{NodeKey, PortId, PortflowError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// Winning selection of one connected component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentResolution {
    pub nodes: Vec<NodeKey>,
    pub selection: Vec<usize>,
}

/// Outcome of resolving every component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigurationReport {
    pub components: Vec<ComponentResolution>,
}

/// Dry-run result for one component: every valid combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentCheck {
    pub nodes: Vec<NodeKey>,
    pub valid: Vec<Vec<usize>>,
}

#[derive(Debug, Clone)]
pub struct Network {
    nodes: BTreeMap<NodeKey, RepresentationNode>,
    next_key: u64,
    max_combinations: usize,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_key: 1,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
        }
    }
}

impl Network {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Combination ceiling applied to every resolution run.
    #[must_use]
    pub fn with_max_combinations(mut self, limit: usize) -> Self {
        self.max_combinations = limit;
        self
    }

    #[must_use]
    pub fn max_combinations(&self) -> usize {
        self.max_combinations
    }

    // =========================================================================
    // NODES
    // =========================================================================

    /// Construct a node and place it in the arena.
    pub fn add_node(
        &mut self,
        description: Arc<NodeTypeDescription>,
        multi_port_counts: &BTreeMap<String, usize>,
    ) -> Result<NodeKey, PortflowError> {
        let key = NodeKey(self.next_key);
        let node = RepresentationNode::new(key, description, multi_port_counts)?;
        self.next_key = self.next_key.saturating_add(1);
        self.nodes.insert(key, node);
        Ok(key)
    }

    pub fn node(&self, key: NodeKey) -> Result<&RepresentationNode, PortflowError> {
        self.nodes.get(&key).ok_or(PortflowError::NodeNotFound(key))
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Result<&mut RepresentationNode, PortflowError> {
        self.nodes
            .get_mut(&key)
            .ok_or(PortflowError::NodeNotFound(key))
    }

    /// Remove a node, clearing the link on every partner port.
    pub fn remove_node(&mut self, key: NodeKey) -> Result<RepresentationNode, PortflowError> {
        let node = self
            .nodes
            .remove(&key)
            .ok_or(PortflowError::NodeNotFound(key))?;
        for partner in node.ports().iter().filter_map(|p| p.link()) {
            if let Some(other) = self.nodes.get_mut(&partner.node)
                && let Ok(port) = other.port_mut(partner)
            {
                port.set_link(None);
            }
        }
        debug!(node = %key, "node removed");
        Ok(node)
    }

    #[must_use]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Nodes in key order.
    pub fn nodes(&self) -> impl Iterator<Item = &RepresentationNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    /// Link two ports symmetrically.
    ///
    /// A port is linked at most once; relinking requires `unlink` first.
    pub fn link(&mut self, a: PortId, b: PortId) -> Result<(), PortflowError> {
        if a == b {
            return Err(PortflowError::SelfLink(a));
        }
        for id in [a, b] {
            if self.node(id.node)?.port(id)?.link().is_some() {
                return Err(PortflowError::PortAlreadyLinked(id));
            }
        }
        self.node_mut(a.node)?.port_mut(a)?.set_link(Some(b));
        self.node_mut(b.node)?.port_mut(b)?.set_link(Some(a));
        debug!(from = %a, to = %b, "ports linked");
        Ok(())
    }

    /// Clear a link on both sides. Returns the former partner.
    pub fn unlink(&mut self, port: PortId) -> Result<Option<PortId>, PortflowError> {
        let partner = self.node(port.node)?.port(port)?.link();
        self.node_mut(port.node)?.port_mut(port)?.set_link(None);
        if let Some(partner) = partner
            && let Some(other) = self.nodes.get_mut(&partner.node)
            && let Ok(p) = other.port_mut(partner)
        {
            p.set_link(None);
        }
        Ok(partner)
    }

    /// Number of links (each counted once).
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|n| n.ports())
            .filter(|p| p.link().is_some_and(|partner| p.id() < partner))
            .count()
    }

    /// Keys of nodes still waiting for a context state.
    #[must_use]
    pub fn unresolved(&self) -> Vec<NodeKey> {
        self.nodes
            .values()
            .filter(|n| !n.is_resolved())
            .map(RepresentationNode::key)
            .collect()
    }

    // =========================================================================
    // COMPONENTS & RESOLUTION
    // =========================================================================

    /// Connected components by port links, each sorted by key.
    ///
    /// Components are ordered by their smallest key.
    #[must_use]
    pub fn components(&self) -> Vec<Vec<NodeKey>> {
        let mut visited = BTreeSet::new();
        let mut components = Vec::new();

        for &start in self.nodes.keys() {
            if !visited.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(key) = queue.pop_front() {
                let Some(node) = self.nodes.get(&key) else {
                    continue;
                };
                for partner in node.ports().iter().filter_map(|p| p.link()) {
                    if self.nodes.contains_key(&partner.node) && visited.insert(partner.node) {
                        component.push(partner.node);
                        queue.push_back(partner.node);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Resolve the listed nodes as one run.
    pub fn configure(&mut self, keys: &[NodeKey]) -> Result<Vec<usize>, PortflowError> {
        let limit = self.max_combinations;
        let mut selector = ContextSelector::new(self.nodes_mut(keys)?).with_max_combinations(limit);
        selector.configure()
    }

    /// Resolve every component, then commit all of them.
    ///
    /// Every component is resolved before anything is committed: the first
    /// failing component aborts the run and no node changes.
    pub fn configure_all(&mut self) -> Result<ConfigurationReport, PortflowError> {
        let limit = self.max_combinations;
        let mut report = ConfigurationReport::default();
        for component in self.components() {
            let selection = ContextSelector::new(self.nodes_ref(&component)?)
                .with_max_combinations(limit)
                .resolve()?;
            report.components.push(ComponentResolution {
                nodes: component,
                selection,
            });
        }

        for resolution in &report.components {
            for (&key, &index) in resolution.nodes.iter().zip(&resolution.selection) {
                self.node_mut(key)?.select_state(index)?;
            }
        }
        info!(components = report.components.len(), "network configured");
        Ok(report)
    }

    /// Every valid combination per component. Commits nothing.
    pub fn check_all(&self) -> Result<Vec<ComponentCheck>, PortflowError> {
        let limit = self.max_combinations;
        let mut checks = Vec::new();
        for component in self.components() {
            let valid = ContextSelector::new(self.nodes_ref(&component)?)
                .with_max_combinations(limit)
                .valid_configurations()?;
            checks.push(ComponentCheck {
                nodes: component,
                valid,
            });
        }
        Ok(checks)
    }

    /// Shared borrows of `keys`, in the given order.
    fn nodes_ref(&self, keys: &[NodeKey]) -> Result<Vec<&RepresentationNode>, PortflowError> {
        keys.iter().map(|&key| self.node(key)).collect()
    }

    /// Mutable borrows of `keys`, in the given order, duplicates dropped.
    fn nodes_mut(&mut self, keys: &[NodeKey]) -> Result<Vec<&mut RepresentationNode>, PortflowError> {
        let wanted: BTreeSet<NodeKey> = keys.iter().copied().collect();
        if let Some(missing) = wanted.iter().find(|k| !self.nodes.contains_key(*k)) {
            return Err(PortflowError::NodeNotFound(*missing));
        }

        let mut borrowed: BTreeMap<NodeKey, &mut RepresentationNode> = self
            .nodes
            .iter_mut()
            .filter(|(key, _)| wanted.contains(*key))
            .map(|(key, node)| (*key, node))
            .collect();

        Ok(keys.iter().filter_map(|key| borrowed.remove(key)).collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
