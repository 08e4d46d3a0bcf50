//! MCP Server Entry Point
//!
//! Resolves the startup configuration from flags and environment variables,
//! then binds the dispatcher to the selected transport (stdio by default,
//! or a REST listener). See `core::config` for the full list of settings.
//!
//! Logs always go to stderr; `RUST_LOG` controls the level (default `info`).

mod core;
mod tools;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::core::transport;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match transport::serve(Arc::new(config)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
