//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::document::{GraphDocument, LoadedGraph};
use crate::api;
use crate::config::PortflowConfig;
use portflow_core::{CheckedComponent, NodeView, PortflowError, Session};
use std::path::Path;

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server over an empty session.
pub async fn cmd_server(config: PortflowConfig, quiet: bool) -> Result<(), PortflowError> {
    let session = Session::with_builtins().with_max_combinations(config.max_combinations);

    if !quiet {
        println!("portflow node service starting...");
        println!();
        println!("Configuration:");
        println!("  Address:          {}", config.bind_address());
        println!("  Max combinations: {}", config.max_combinations);
        println!("  Rate limit:       {} req/s", config.rate_limit);
        println!();
        println!("Endpoints:");
        println!("  GET  /health        - Health check");
        println!("  GET  /status        - Session counts");
        println!("  GET  /describe      - Node types");
        println!("  POST /nodes         - Create nodes");
        println!("  GET  /nodes/{{id}}    - Node view");
        println!("  POST /link          - Link ports");
        println!("  POST /configure     - Resolve every component");
        println!("  POST /process       - Run nodes");
        println!();
        println!("Press Ctrl+C to stop");
        println!();
    }

    api::run_server(config, session).await
}

// =============================================================================
// DESCRIBE COMMAND
// =============================================================================

/// Print every built-in node type.
pub fn cmd_describe(json_mode: bool) -> Result<(), PortflowError> {
    let description = Session::with_builtins().describe();

    if json_mode {
        println!("{}", to_json(&description)?);
        return Ok(());
    }

    println!("Node Types");
    println!("==========");
    for node_type in &description.node_types {
        println!();
        println!("{}", node_type.node_type);
        for port in &node_type.base_ports {
            let kind = if port.multi { " (multi)" } else { "" };
            println!("  {:<10} {}{}", port.prefix, port.role, kind);
        }
        for (index, state) in node_type.context_states.iter().enumerate() {
            let roles: Vec<String> = state
                .assignments
                .iter()
                .map(|a| format!("{}={}", a.prefix, a.role))
                .collect();
            println!("  state {}: {}", index, roles.join(" "));
        }
    }

    Ok(())
}

// =============================================================================
// RESOLVE COMMAND
// =============================================================================

/// Load a graph document, resolve every component and print the roles.
pub fn cmd_resolve(
    config: &PortflowConfig,
    json_mode: bool,
    file: &Path,
) -> Result<(), PortflowError> {
    let LoadedGraph { mut session, nodes } =
        GraphDocument::from_file(file)?.load(config.max_combinations)?;
    let components = session.configure()?;

    let views = nodes
        .iter()
        .map(|(_, id)| session.node_view(id))
        .collect::<Result<Vec<NodeView>, _>>()?;

    if json_mode {
        let output = serde_json::json!({
            "components": components,
            "nodes": views,
        });
        println!("{}", to_json(&output)?);
        return Ok(());
    }

    println!("Resolved {} component(s)", components.len());
    for view in &views {
        println!();
        match view.selected_state {
            Some(state) => println!("{} [{}] state {}", view.name, view.id, state),
            None => println!("{} [{}]", view.name, view.id),
        }
        for port in &view.ports {
            let partner = port
                .linked_to
                .as_ref()
                .map(|p| format!(" -> {}.{}", p.node, p.tag))
                .unwrap_or_default();
            let role = port.effective_role.to_string();
            println!("  {:<10} {:<8}{}", port.tag, role, partner);
        }
    }

    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Report every valid selection per component. Fails unless each component
/// has exactly one.
pub fn cmd_check(
    config: &PortflowConfig,
    json_mode: bool,
    file: &Path,
) -> Result<(), PortflowError> {
    let LoadedGraph { session, .. } =
        GraphDocument::from_file(file)?.load(config.max_combinations)?;
    let components = session.check()?;

    if json_mode {
        println!("{}", to_json(&components)?);
    } else {
        for (index, component) in components.iter().enumerate() {
            let names: Vec<String> = component.nodes.iter().map(ToString::to_string).collect();
            println!(
                "component {} [{}]: {}",
                index + 1,
                names.join(", "),
                verdict(component)
            );
            for selection in &component.valid {
                println!("  {:?}", selection);
            }
        }
    }

    first_failure(&components)
}

fn verdict(component: &CheckedComponent) -> &'static str {
    match component.valid.len() {
        0 => "unsatisfiable",
        1 => "unique",
        _ => "ambiguous",
    }
}

/// The error `configure` would raise for the first non-unique component.
fn first_failure(components: &[CheckedComponent]) -> Result<(), PortflowError> {
    for component in components {
        match component.valid.len() {
            0 => return Err(PortflowError::Unsatisfiable),
            1 => {}
            _ => return Err(PortflowError::Ambiguous(component.valid.clone())),
        }
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, PortflowError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PortflowError::Io(format!("cannot encode output: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
