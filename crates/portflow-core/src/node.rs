//! # Representation Node
//!
//! A live instance of a node type: it owns its ports, exposes one connection
//! line per candidate context state, and commits to one of them.
//!
//! Enumerating candidates (`connection_lines`) is kept apart from committing
//! (`select_state`), so a resolution run can inspect a whole graph before any
//! node changes.

use crate::description::NodeTypeDescription;
use crate::filter::{Filter, PortState};
use crate::primitives::multi_port_tag;
use crate::{NodeKey, PortId, PortRole, PortflowError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Full port→role assignment of one node under one context state.
pub type ConnectionLine = PortState;

// =============================================================================
// PORT
// =============================================================================

/// An attachment point owned by a node.
///
/// The owner is `id().node`; the link partner is stored as a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    id: PortId,
    tag: String,
    prefix: String,
    multi: bool,
    role: PortRole,
    link: Option<PortId>,
}

impl Port {
    #[must_use]
    pub fn id(&self) -> PortId {
        self.id
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    /// Declared role. `ContextDependent` until the node is resolved.
    #[must_use]
    pub fn role(&self) -> PortRole {
        self.role
    }

    #[must_use]
    pub fn link(&self) -> Option<PortId> {
        self.link
    }

    pub(crate) fn set_link(&mut self, partner: Option<PortId>) {
        self.link = partner;
    }
}

// =============================================================================
// REPRESENTATION NODE
// =============================================================================

#[derive(Debug, Clone)]
pub struct RepresentationNode {
    key: NodeKey,
    description: Arc<NodeTypeDescription>,
    name: String,
    ports: Vec<Port>,
    tag_index: BTreeMap<String, u32>,
    lines: Vec<ConnectionLine>,
    selected: Option<usize>,
    require_ports: BTreeSet<PortId>,
    update_ports: BTreeSet<PortId>,
}

impl RepresentationNode {
    /// Build a node, allocating and tagging its ports.
    ///
    /// Fails with `InvalidDescription` listing every violation found. Multi
    /// port `p` with count `n` yields tags `p_n, p_{n-1}, ..., p_1`.
    pub fn new(
        key: NodeKey,
        description: Arc<NodeTypeDescription>,
        multi_port_counts: &BTreeMap<String, usize>,
    ) -> Result<Self, PortflowError> {
        description.validate(multi_port_counts)?;

        let mut counters = multi_port_counts.clone();
        let mut ports = Vec::new();
        for descriptor in &description.base_ports {
            let instances = if descriptor.multi {
                let counter = counters.get_mut(&descriptor.prefix);
                let mut tags = Vec::new();
                if let Some(counter) = counter {
                    while *counter > 0 {
                        tags.push(multi_port_tag(&descriptor.prefix, *counter));
                        *counter -= 1;
                    }
                }
                tags
            } else {
                vec![descriptor.prefix.clone()]
            };

            for tag in instances {
                let slot = u32::try_from(ports.len()).map_err(|_| {
                    PortflowError::InvalidRequest(format!("too many ports on {}", description.node_type))
                })?;
                ports.push(Port {
                    id: PortId::new(key, slot),
                    tag,
                    prefix: descriptor.prefix.clone(),
                    multi: descriptor.multi,
                    role: descriptor.role,
                    link: None,
                });
            }
        }

        let tag_index = ports.iter().map(|p| (p.tag.clone(), p.id.slot)).collect();
        let lines = build_lines(&description, &ports);

        let mut node = Self {
            key,
            name: description.node_type.clone(),
            description,
            ports,
            tag_index,
            lines,
            selected: None,
            require_ports: BTreeSet::new(),
            update_ports: BTreeSet::new(),
        };
        node.refresh_role_sets();
        Ok(node)
    }

    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    #[must_use]
    pub fn description(&self) -> &Arc<NodeTypeDescription> {
        &self.description
    }

    #[must_use]
    pub fn node_type(&self) -> &str {
        &self.description.node_type
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // -------------------------------------------------------------------------
    // Port lookup
    // -------------------------------------------------------------------------

    /// Exact tag lookup.
    pub fn port_by_name(&self, tag: &str) -> Result<PortId, PortflowError> {
        self.tag_index
            .get(tag)
            .map(|&slot| PortId::new(self.key, slot))
            .ok_or_else(|| PortflowError::PortNotFound {
                tag: tag.to_string(),
            })
    }

    pub fn port(&self, id: PortId) -> Result<&Port, PortflowError> {
        if id.node != self.key {
            return Err(PortflowError::UnknownPort(id));
        }
        self.ports
            .get(id.slot as usize)
            .ok_or(PortflowError::UnknownPort(id))
    }

    pub(crate) fn port_mut(&mut self, id: PortId) -> Result<&mut Port, PortflowError> {
        if id.node != self.key {
            return Err(PortflowError::UnknownPort(id));
        }
        self.ports
            .get_mut(id.slot as usize)
            .ok_or(PortflowError::UnknownPort(id))
    }

    /// Ports in allocation order.
    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Every instance of `prefix` (one for single ports, `n` for multi ports).
    pub fn ports_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Port> + 'a {
        self.ports.iter().filter(move |p| p.prefix == prefix)
    }

    // -------------------------------------------------------------------------
    // Candidates and commitment
    // -------------------------------------------------------------------------

    /// One line per context state, or a single line of fixed roles.
    #[must_use]
    pub fn connection_lines(&self) -> &[ConnectionLine] {
        &self.lines
    }

    /// Number of context states declared by the node type.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.description.context_states.len()
    }

    /// Commit to context state `index`.
    ///
    /// A node without context states accepts any index and stays as it is.
    pub fn select_state(&mut self, index: usize) -> Result<(), PortflowError> {
        let count = self.state_count();
        if count == 0 {
            return Ok(());
        }
        if index >= count {
            return Err(PortflowError::StateIndexOutOfRange { index, count });
        }
        self.selected = Some(index);
        self.refresh_role_sets();
        Ok(())
    }

    #[must_use]
    pub fn selected_state(&self) -> Option<usize> {
        self.selected
    }

    /// True once every port has a concrete role.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state_count() == 0 || self.selected.is_some()
    }

    /// Role of a port given the committed state.
    ///
    /// Context-dependent ports report `ContextDependent` until resolved.
    pub fn effective_role(&self, id: PortId) -> Result<PortRole, PortflowError> {
        let port = self.port(id)?;
        Ok(self.resolved_role(port))
    }

    /// Ports whose effective role is `Input`.
    #[must_use]
    pub fn require_ports(&self) -> &BTreeSet<PortId> {
        &self.require_ports
    }

    /// Ports whose effective role is `Output`.
    #[must_use]
    pub fn update_ports(&self) -> &BTreeSet<PortId> {
        &self.update_ports
    }

    // -------------------------------------------------------------------------
    // Neighbour requirements
    // -------------------------------------------------------------------------

    /// Requirement this node places on its link partners.
    ///
    /// For every candidate line (only the committed one once resolved), each
    /// linked port asks its partner for the mirrored role. Candidates are
    /// combined with `any`.
    #[must_use]
    pub fn neighbor_filter(&self) -> Filter {
        let candidates: Vec<&ConnectionLine> = match self.selected {
            Some(index) => self.lines.get(index).into_iter().collect(),
            None => self.lines.iter().collect(),
        };

        Filter::any(candidates.into_iter().map(|line| {
            let mirrored: PortState = line
                .iter()
                .filter_map(|(id, role)| {
                    let partner = self.port(*id).ok()?.link?;
                    Some((partner, role.mirror()))
                })
                .collect();
            Filter::from_reference(mirrored)
        }))
    }

    /// Indices of the connection lines that pass `filter`.
    #[must_use]
    pub fn matching_states(&self, filter: &Filter) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| filter.validate(line))
            .map(|(index, _)| index)
            .collect()
    }

    fn resolved_role(&self, port: &Port) -> PortRole {
        if port.role != PortRole::ContextDependent {
            return port.role;
        }
        self.selected
            .and_then(|index| self.description.context_states.get(index))
            .and_then(|state| state.role_of(&port.prefix))
            .unwrap_or(PortRole::ContextDependent)
    }

    fn refresh_role_sets(&mut self) {
        let mut require = BTreeSet::new();
        let mut update = BTreeSet::new();
        for port in &self.ports {
            match self.resolved_role(port) {
                PortRole::Input => {
                    require.insert(port.id);
                }
                PortRole::Output => {
                    update.insert(port.id);
                }
                PortRole::Neutral | PortRole::ContextDependent => {}
            }
        }
        self.require_ports = require;
        self.update_ports = update;
    }
}

fn build_lines(description: &NodeTypeDescription, ports: &[Port]) -> Vec<ConnectionLine> {
    if description.context_states.is_empty() {
        return vec![ports.iter().map(|p| (p.id, p.role)).collect()];
    }
    description
        .context_states
        .iter()
        .map(|state| {
            ports
                .iter()
                .map(|p| {
                    let role = if p.role == PortRole::ContextDependent {
                        state.role_of(&p.prefix).unwrap_or(PortRole::Neutral)
                    } else {
                        p.role
                    };
                    (p.id, role)
                })
                .collect()
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
