//! # portflow CLI Module
//!
//! This module implements the CLI interface for portflow.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `describe` - List the registered node types
//! - `resolve` - Load a graph document, resolve it and print port roles
//! - `check` - Report unsatisfiable or ambiguous components without committing

mod commands;
mod document;

use crate::config::PortflowConfig;
use clap::{Parser, Subcommand};
use portflow_core::PortflowError;
use std::path::PathBuf;

pub use commands::*;
pub use document::{GraphDocument, LinkEnd, LinkSpec, LoadedGraph, NodeSpec};

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// portflow - port-role resolution for node graphs
///
/// Nodes expose typed ports; context-dependent ports take their direction
/// from whatever they are linked to.
#[derive(Parser, Debug)]
#[command(name = "portflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Combination ceiling per component (overrides config and environment)
    #[arg(long, global = true)]
    pub max_combinations: Option<usize>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List registered node types with their ports and context states
    Describe,

    /// Resolve a graph document and print the committed port roles
    Resolve {
        /// Path to the graph document (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List every valid selection per component without committing
    Check {
        /// Path to the graph document (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), PortflowError> {
    let mut config = PortflowConfig::load(cli.config.as_deref())?;
    if let Some(limit) = cli.max_combinations {
        config.max_combinations = limit;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            cmd_server(config, cli.quiet).await
        }
        Some(Commands::Resolve { file }) => cmd_resolve(&config, json_mode, &file),
        Some(Commands::Check { file }) => cmd_check(&config, json_mode, &file),
        Some(Commands::Describe) | None => cmd_describe(json_mode),
    }
}
