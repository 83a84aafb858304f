//! # portflow
//!
//! Binary entry point for the portflow node service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/portflow (THE BINARY)               │
//! │                                                          │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────────┐   │
//! │  │   CLI       │   │  HTTP API   │   │    Config     │   │
//! │  │  (clap)     │   │  (axum)     │   │ (toml + env)  │   │
//! │  └──────┬──────┘   └──────┬──────┘   └───────┬───────┘   │
//! │         └─────────────────┼──────────────────┘           │
//! │                           ▼                              │
//! │                  ┌─────────────────┐                     │
//! │                  │  portflow-core  │                     │
//! │                  │   (resolution)  │                     │
//! │                  └─────────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! portflow server --host 0.0.0.0 --port 8080
//! portflow describe
//! portflow resolve -f graph.json
//! portflow check -f graph.json
//! ```

use clap::Parser;
use portflow::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // PORTFLOW_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("PORTFLOW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "portflow=info,portflow_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_banner() {
    println!(
        r#"
  portflow v{}
  port-role resolution for node graphs
"#,
        env!("CARGO_PKG_VERSION")
    );
}
