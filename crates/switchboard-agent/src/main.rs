//! Switchboard Agent Binary
//!
//! Serves the built-in capabilities over length-prefixed publish frames on
//! stdin/stdout. Logs go to stderr.

use anyhow::{Context, Result};
use std::sync::Arc;
use switchboard_agent::{Agent, AgentConfig, CapabilityRegistry, StdioTransport};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => AgentConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => AgentConfig::from_env().context("Failed to load config from environment")?,
    };

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Switchboard agent {}", config.agent_id);

    let registry = CapabilityRegistry::builder().with_builtins().build();
    info!("Registered capabilities: {}", registry.methods().join(", "));

    let transport = Arc::new(StdioTransport::stdio(config.max_frame_size));
    let mut agent = Agent::new(&config, registry, transport);

    let shutdown_tx = agent.shutdown_sender().context("Shutdown sender already taken")?;
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for interrupt: {}", e);
                // Dropping the sender would stop the agent
                let _shutdown_tx = shutdown_tx;
                std::future::pending::<()>().await;
            }
        }
    });

    if let Err(e) = agent.run().await {
        error!("Agent error: {:#}", e);
        std::process::exit(1);
    }

    info!("Agent shutting down");
    Ok(())
}
