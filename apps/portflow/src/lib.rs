//! # portflow
//!
//! The service around `portflow-core`: an HTTP API over one live node
//! session, a CLI that resolves graph documents, and layered configuration.

pub mod api;
pub mod cli;
pub mod config;

pub use config::PortflowConfig;
