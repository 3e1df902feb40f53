use clap::Parser;
use peer_overlay::config::NodeConfig;
use peer_overlay::server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::parse();

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!("Starting node on {}", config.bind);
    if !config.seeds.is_empty() {
        tracing::info!("Seed nodes: {:?}", config.seeds);
    }

    let node = server::start(config).await?;
    tracing::info!(
        "Node {} up: control {} / transfer {}",
        node.state.node_id,
        node.control_addr,
        node.transfer_addr
    );
    tracing::info!("Press Ctrl+C to shutdown");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
        _ = node.wait() => {}
    }

    Ok(())
}
