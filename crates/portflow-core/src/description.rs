//! # Node Type Descriptions
//!
//! Static, externally supplied shape of a node type: its base ports and the
//! mutually exclusive context states that assign roles to its
//! context-dependent ports.
//!
//! Descriptions travel as JSON on the service boundary, so every type here is
//! serde-serializable.

use crate::primitives::{MAX_MULTI_PORT_INSTANCES, MAX_PORTS_PER_NODE, parse_multi_port_tag};
use crate::{PortRole, PortflowError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One base port of a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub prefix: String,
    /// Multi ports are instantiated `n` times per node, tagged `prefix_n`.
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub role: PortRole,
}

impl PortDescriptor {
    /// Single port with a fixed role.
    #[must_use]
    pub fn fixed(prefix: impl Into<String>, role: PortRole) -> Self {
        Self {
            prefix: prefix.into(),
            multi: false,
            role,
        }
    }

    /// Multi port with a fixed role.
    #[must_use]
    pub fn multi(prefix: impl Into<String>, role: PortRole) -> Self {
        Self {
            prefix: prefix.into(),
            multi: true,
            role,
        }
    }

    /// Single port whose role is chosen by a context state.
    #[must_use]
    pub fn context_dependent(prefix: impl Into<String>) -> Self {
        Self::fixed(prefix, PortRole::ContextDependent)
    }
}

/// Role assigned to one prefix by a context state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAssignment {
    pub prefix: String,
    pub role: PortRole,
}

/// A complete alternative role assignment for the context-dependent ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextState {
    pub assignments: Vec<PortAssignment>,
}

impl ContextState {
    #[must_use]
    pub fn new<P: Into<String>>(assignments: impl IntoIterator<Item = (P, PortRole)>) -> Self {
        Self {
            assignments: assignments
                .into_iter()
                .map(|(prefix, role)| PortAssignment {
                    prefix: prefix.into(),
                    role,
                })
                .collect(),
        }
    }

    /// Role this state assigns to `prefix`, if any.
    #[must_use]
    pub fn role_of(&self, prefix: &str) -> Option<PortRole> {
        self.assignments
            .iter()
            .find(|a| a.prefix == prefix)
            .map(|a| a.role)
    }
}

/// Description of one node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTypeDescription {
    pub node_type: String,
    pub base_ports: Vec<PortDescriptor>,
    #[serde(default)]
    pub context_states: Vec<ContextState>,
}

impl NodeTypeDescription {
    #[must_use]
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            base_ports: Vec::new(),
            context_states: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: PortDescriptor) -> Self {
        self.base_ports.push(port);
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: ContextState) -> Self {
        self.context_states.push(state);
        self
    }

    /// Prefixes of every context-dependent base port.
    #[must_use]
    pub fn context_dependent_prefixes(&self) -> BTreeSet<&str> {
        self.base_ports
            .iter()
            .filter(|p| p.role == PortRole::ContextDependent)
            .map(|p| p.prefix.as_str())
            .collect()
    }

    /// Check the description against the multi-port counts of one instance.
    ///
    /// Every violation is collected; the error lists all of them.
    pub fn validate(&self, multi_port_counts: &BTreeMap<String, usize>) -> Result<(), PortflowError> {
        let mut violations = Vec::new();

        let mut seen = BTreeSet::new();
        let mut total_ports = 0usize;
        for port in &self.base_ports {
            if port.prefix.is_empty() {
                violations.push("base port with empty prefix".to_string());
            }
            if !seen.insert(port.prefix.as_str()) {
                violations.push(format!("duplicate prefix '{}'", port.prefix));
            }
            if port.multi && port.role == PortRole::ContextDependent {
                violations.push(format!(
                    "multi port '{}' cannot be context-dependent",
                    port.prefix
                ));
            }
            if port.multi {
                match multi_port_counts.get(&port.prefix) {
                    None => violations.push(format!(
                        "multi port '{}' has no instance count",
                        port.prefix
                    )),
                    Some(&count) if count > MAX_MULTI_PORT_INSTANCES => violations.push(format!(
                        "multi port '{}' count {} exceeds {}",
                        port.prefix, count, MAX_MULTI_PORT_INSTANCES
                    )),
                    Some(&count) => total_ports = total_ports.saturating_add(count),
                }
            } else {
                total_ports = total_ports.saturating_add(1);
            }
        }
        self.check_tag_clashes(multi_port_counts, &mut violations);
        if total_ports > MAX_PORTS_PER_NODE {
            violations.push(format!(
                "{total_ports} ports exceed the per-node limit of {MAX_PORTS_PER_NODE}"
            ));
        }

        let context_dependent = self.context_dependent_prefixes();
        if context_dependent.is_empty() {
            if !self.context_states.is_empty() {
                violations.push(format!(
                    "{} context states declared without context-dependent ports",
                    self.context_states.len()
                ));
            }
        } else if self.context_states.is_empty() {
            violations.push("context-dependent ports declared without context states".to_string());
        }

        if !context_dependent.is_empty() {
            for (index, state) in self.context_states.iter().enumerate() {
                self.check_state(index, state, &context_dependent, &mut violations);
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PortflowError::InvalidDescription {
                node_type: self.node_type.clone(),
                violations,
            })
        }
    }

    /// A single port named like a generated multi-port tag would shadow it.
    fn check_tag_clashes(
        &self,
        multi_port_counts: &BTreeMap<String, usize>,
        violations: &mut Vec<String>,
    ) {
        let multi: BTreeSet<&str> = self
            .base_ports
            .iter()
            .filter(|p| p.multi)
            .map(|p| p.prefix.as_str())
            .collect();
        for port in self.base_ports.iter().filter(|p| !p.multi) {
            let Some((stem, n)) = parse_multi_port_tag(&port.prefix) else {
                continue;
            };
            let count = multi_port_counts.get(stem).copied().unwrap_or(0);
            if multi.contains(stem) && (1..=count).contains(&n) {
                violations.push(format!(
                    "port '{}' clashes with instance {n} of multi port '{stem}'",
                    port.prefix
                ));
            }
        }
    }

    fn check_state(
        &self,
        index: usize,
        state: &ContextState,
        context_dependent: &BTreeSet<&str>,
        violations: &mut Vec<String>,
    ) {
        let mut assigned = BTreeSet::new();
        for assignment in &state.assignments {
            let prefix = assignment.prefix.as_str();
            if !assigned.insert(prefix) {
                violations.push(format!("state {index} assigns '{prefix}' twice"));
            }
            if !context_dependent.contains(prefix) {
                violations.push(format!(
                    "state {index} assigns '{prefix}', which is not a context-dependent port"
                ));
            }
            if !assignment.role.is_directed() {
                violations.push(format!(
                    "state {index} assigns role {} to '{prefix}'",
                    assignment.role
                ));
            }
        }
        for missing in context_dependent.difference(&assigned) {
            violations.push(format!("state {index} does not assign '{missing}'"));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn bipole() -> NodeTypeDescription {
        NodeTypeDescription::new("pipe")
            .with_port(PortDescriptor::context_dependent("a"))
            .with_port(PortDescriptor::context_dependent("b"))
            .with_state(ContextState::new([("a", PortRole::Input), ("b", PortRole::Output)]))
            .with_state(ContextState::new([("a", PortRole::Output), ("b", PortRole::Input)]))
    }

    fn violations(description: &NodeTypeDescription, counts: &BTreeMap<String, usize>) -> Vec<String> {
        match description.validate(counts) {
            Err(PortflowError::InvalidDescription { violations, .. }) => violations,
            other => panic!("expected InvalidDescription, got {other:?}"),
        }
    }

    #[test]
    fn valid_bipole() {
        assert!(bipole().validate(&BTreeMap::new()).is_ok());
    }

    #[test]
    fn all_violations_are_collected() {
        let description = NodeTypeDescription::new("broken")
            .with_port(PortDescriptor::fixed("x", PortRole::Input))
            .with_port(PortDescriptor::fixed("x", PortRole::Output))
            .with_port(PortDescriptor {
                prefix: "m".into(),
                multi: true,
                role: PortRole::ContextDependent,
            })
            .with_port(PortDescriptor::multi("n", PortRole::Input));

        let found = violations(&description, &BTreeMap::new());
        assert!(found.iter().any(|v| v.contains("duplicate prefix 'x'")));
        assert!(found.iter().any(|v| v.contains("'m' cannot be context-dependent")));
        assert!(found.iter().any(|v| v.contains("'n' has no instance count")));
    }

    #[test]
    fn state_must_cover_exactly_the_context_dependent_set() {
        let description = NodeTypeDescription::new("pipe")
            .with_port(PortDescriptor::context_dependent("a"))
            .with_port(PortDescriptor::context_dependent("b"))
            .with_port(PortDescriptor::fixed("c", PortRole::Output))
            .with_state(ContextState::new([("a", PortRole::Input), ("c", PortRole::Output)]));

        let found = violations(&description, &BTreeMap::new());
        assert!(found.iter().any(|v| v.contains("does not assign 'b'")));
        assert!(found.iter().any(|v| v.contains("'c', which is not a context-dependent port")));
    }

    #[test]
    fn state_cannot_assign_context_dependent_role() {
        let description = NodeTypeDescription::new("pipe")
            .with_port(PortDescriptor::context_dependent("a"))
            .with_state(ContextState::new([("a", PortRole::ContextDependent)]));

        let found = violations(&description, &BTreeMap::new());
        assert!(found.iter().any(|v| v.contains("context_dependent")));
    }

    #[test]
    fn context_dependent_ports_need_states() {
        let description =
            NodeTypeDescription::new("pipe").with_port(PortDescriptor::context_dependent("a"));
        let found = violations(&description, &BTreeMap::new());
        assert!(found.iter().any(|v| v.contains("without context states")));
    }

    #[test]
    fn states_without_context_dependent_ports_are_rejected() {
        let description = NodeTypeDescription::new("source")
            .with_port(PortDescriptor::fixed("out", PortRole::Output))
            .with_state(ContextState::default());
        assert!(description.validate(&BTreeMap::new()).is_err());
    }

    #[test]
    fn single_port_cannot_shadow_multi_instance() {
        let description = NodeTypeDescription::new("t")
            .with_port(PortDescriptor::fixed("x_1", PortRole::Input))
            .with_port(PortDescriptor::multi("x", PortRole::Output));

        let counts = BTreeMap::from([("x".to_string(), 1)]);
        let found = violations(&description, &counts);
        assert_eq!(
            found,
            vec!["port 'x_1' clashes with instance 1 of multi port 'x'".to_string()]
        );

        // x_1 does not collide while no instance is allocated
        let counts = BTreeMap::from([("x".to_string(), 0)]);
        assert!(description.validate(&counts).is_ok());
    }

    #[test]
    fn multi_count_ceiling() {
        let description = NodeTypeDescription::new("collector")
            .with_port(PortDescriptor::multi("inlet", PortRole::Input));
        let counts = BTreeMap::from([("inlet".to_string(), MAX_MULTI_PORT_INSTANCES + 1)]);
        let found = violations(&description, &counts);
        assert!(found.iter().any(|v| v.contains("exceeds")));
    }
}
