//! # Built-in Node Types
//!
//! A small catalog covering every description feature: fixed ports, bipoles,
//! three-port context nodes and multi ports.
//!
//! | Type        | Ports                              | States |
//! |-------------|------------------------------------|--------|
//! | `source`    | `out` output                       | -      |
//! | `sink`      | `in` input                         | -      |
//! | `pipe`      | `a`, `b` context-dependent         | 2      |
//! | `splitter`  | `a`, `b`, `c` context-dependent    | 3 (one input, two outputs) |
//! | `mixer`     | `a`, `b`, `c` context-dependent    | 3 (two inputs, one output) |
//! | `collector` | `inlet` multi input, `outlet` output | -    |
//!
//! Behaviors only hold numeric parameters and count processing runs.

use crate::adapter::{AdapterRegistry, NodeAdapter, NodeBehavior, NodeState, RequestData};
use crate::description::{ContextState, NodeTypeDescription, PortDescriptor};
use crate::node::RepresentationNode;
use crate::{PortRole, PortflowError};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SOURCE: &str = "source";
pub const SINK: &str = "sink";
pub const PIPE: &str = "pipe";
pub const SPLITTER: &str = "splitter";
pub const MIXER: &str = "mixer";
pub const COLLECTOR: &str = "collector";

/// State field reporting how many times the node was processed.
pub const RUNS_FIELD: &str = "runs";

/// Registry holding every built-in node type.
#[must_use]
pub fn builtin_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    let entries: [(NodeTypeDescription, &'static [&'static str]); 6] = [
        (source(), &["rate"]),
        (sink(), &[]),
        (pipe(), &["sigma"]),
        (splitter(), &["ratio"]),
        (mixer(), &[]),
        (collector(), &[]),
    ];
    for (description, required) in entries {
        registry.register(Arc::new(CatalogAdapter {
            description: Arc::new(description),
            required,
        }));
    }
    registry
}

// =============================================================================
// DESCRIPTIONS
// =============================================================================

fn source() -> NodeTypeDescription {
    NodeTypeDescription::new(SOURCE).with_port(PortDescriptor::fixed("out", PortRole::Output))
}

fn sink() -> NodeTypeDescription {
    NodeTypeDescription::new(SINK).with_port(PortDescriptor::fixed("in", PortRole::Input))
}

fn pipe() -> NodeTypeDescription {
    NodeTypeDescription::new(PIPE)
        .with_port(PortDescriptor::context_dependent("a"))
        .with_port(PortDescriptor::context_dependent("b"))
        .with_state(ContextState::new([("a", PortRole::Input), ("b", PortRole::Output)]))
        .with_state(ContextState::new([("a", PortRole::Output), ("b", PortRole::Input)]))
}

/// Three context ports where exactly one takes the `odd` role.
fn tripole(node_type: &str, odd: PortRole) -> NodeTypeDescription {
    let rest = odd.mirror();
    let tags = ["a", "b", "c"];
    let mut description = tags
        .iter()
        .fold(NodeTypeDescription::new(node_type), |d, tag| {
            d.with_port(PortDescriptor::context_dependent(*tag))
        });
    for odd_tag in tags {
        description = description.with_state(ContextState::new(
            tags.iter()
                .map(|tag| (*tag, if *tag == odd_tag { odd } else { rest })),
        ));
    }
    description
}

fn splitter() -> NodeTypeDescription {
    tripole(SPLITTER, PortRole::Input)
}

fn mixer() -> NodeTypeDescription {
    tripole(MIXER, PortRole::Output)
}

fn collector() -> NodeTypeDescription {
    NodeTypeDescription::new(COLLECTOR)
        .with_port(PortDescriptor::multi("inlet", PortRole::Input))
        .with_port(PortDescriptor::fixed("outlet", PortRole::Output))
}

// =============================================================================
// ADAPTER & BEHAVIOR
// =============================================================================

struct CatalogAdapter {
    description: Arc<NodeTypeDescription>,
    required: &'static [&'static str],
}

impl NodeAdapter for CatalogAdapter {
    fn description(&self) -> Arc<NodeTypeDescription> {
        Arc::clone(&self.description)
    }

    fn create(&self, data: &RequestData) -> Result<Box<dyn NodeBehavior>, PortflowError> {
        let behavior = ParameterBehavior::new(&self.description.node_type, self.required, data)?;
        Ok(Box::new(behavior))
    }
}

/// Parameter holder used by every built-in type.
#[derive(Debug, Clone)]
pub struct ParameterBehavior {
    node_type: String,
    required: &'static [&'static str],
    params: BTreeMap<String, f64>,
    runs: u32,
}

impl ParameterBehavior {
    fn new(
        node_type: &str,
        required: &'static [&'static str],
        data: &RequestData,
    ) -> Result<Self, PortflowError> {
        check_finite(&data.kwargs)?;
        let behavior = Self {
            node_type: node_type.to_string(),
            required,
            params: data.kwargs.clone(),
            runs: 0,
        };
        behavior.check_required()?;
        Ok(behavior)
    }

    fn check_required(&self) -> Result<(), PortflowError> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|key| !self.params.contains_key(*key))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(PortflowError::InvalidRequest(format!(
            "{} requires parameter(s): {}",
            self.node_type,
            missing.join(", ")
        )))
    }
}

fn check_finite(kwargs: &BTreeMap<String, f64>) -> Result<(), PortflowError> {
    match kwargs.iter().find(|(_, value)| !value.is_finite()) {
        Some((key, value)) => Err(PortflowError::InvalidRequest(format!(
            "parameter {key} is not finite: {value}"
        ))),
        None => Ok(()),
    }
}

impl NodeBehavior for ParameterBehavior {
    fn update(&mut self, data: &RequestData) -> Result<(), PortflowError> {
        if !data.multi_ports.is_empty() {
            return Err(PortflowError::InvalidRequest(
                "multi-port counts are fixed at creation".to_string(),
            ));
        }
        check_finite(&data.kwargs)?;
        self.params
            .extend(data.kwargs.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(())
    }

    fn state(&self, fields: &[String]) -> Result<NodeState, PortflowError> {
        let mut all = self.params.clone();
        all.insert(RUNS_FIELD.to_string(), f64::from(self.runs));

        if fields.is_empty() {
            return Ok(NodeState { fields: all });
        }
        let mut selected = BTreeMap::new();
        for field in fields {
            let value = all.get(field).copied().ok_or_else(|| {
                PortflowError::InvalidRequest(format!("{} has no field {field}", self.node_type))
            })?;
            selected.insert(field.clone(), value);
        }
        Ok(NodeState { fields: selected })
    }

    fn process(&mut self, node: &RepresentationNode) -> Result<(), PortflowError> {
        if !node.is_resolved() {
            return Err(PortflowError::NotConfigured(format!(
                "{} {}",
                node.name(),
                node.key()
            )));
        }
        self.check_required()
            .map_err(|err| PortflowError::Behavior(err.to_string()))?;
        self.runs = self.runs.saturating_add(1);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
